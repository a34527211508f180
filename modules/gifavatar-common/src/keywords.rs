use serde::{Deserialize, Serialize};

/// Result of checking a post against its required keywords.
///
/// Every required keyword lands in exactly one of the two lists, in the order it
/// was required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

impl KeywordMatch {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Case-insensitive substring match of each required keyword against the post text.
///
/// Keywords are compared with surrounding whitespace trimmed but reported as given.
/// A blank keyword is trivially present.
pub fn match_keywords(post_text: &str, required: &[String]) -> KeywordMatch {
    let haystack = post_text.to_lowercase();
    let mut result = KeywordMatch::default();

    for keyword in required {
        let needle = keyword.trim().to_lowercase();
        if haystack.contains(&needle) {
            result.matched.push(keyword.clone());
        } else {
            result.missing.push(keyword.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_keyword_present() {
        let m = match_keywords("Check out gifavatar.app!", &kw(&["gifavatar.app"]));
        assert_eq!(m.matched, kw(&["gifavatar.app"]));
        assert!(m.missing.is_empty());
        assert!(m.is_complete());
    }

    #[test]
    fn matching_ignores_case() {
        let m = match_keywords("Made with GIFAVATAR.APP #AvatarGIF", &kw(&["gifavatar.app", "#avatargif"]));
        assert!(m.is_complete());
    }

    #[test]
    fn order_follows_required_list() {
        let required = kw(&["zeta", "alpha", "missing-one", "beta", "missing-two"]);
        let m = match_keywords("beta alpha zeta", &required);
        assert_eq!(m.matched, kw(&["zeta", "alpha", "beta"]));
        assert_eq!(m.missing, kw(&["missing-one", "missing-two"]));
    }

    #[test]
    fn union_covers_required() {
        let required = kw(&["a", "gif", "nope", " Avatar "]);
        let m = match_keywords("my new gif avatar", &required);
        let mut all: Vec<String> = m.matched.iter().chain(m.missing.iter()).cloned().collect();
        all.sort();
        let mut expected = required.clone();
        expected.sort();
        assert_eq!(all, expected);
        assert!(m.matched.contains(&" Avatar ".to_string()));
    }

    #[test]
    fn empty_required_is_fully_matched() {
        let m = match_keywords("anything", &[]);
        assert!(m.matched.is_empty());
        assert!(m.missing.is_empty());
        assert!(m.is_complete());
    }

    #[test]
    fn empty_post_misses_everything_but_blank() {
        let m = match_keywords("", &kw(&["gifavatar.app", "  "]));
        assert_eq!(m.missing, kw(&["gifavatar.app"]));
        assert_eq!(m.matched, kw(&["  "]));
    }
}
