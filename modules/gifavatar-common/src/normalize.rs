//! Canonicalization of social post URLs.
//!
//! The canonical URL is what gets stored and fetched. Query parameters are
//! dropped unless they identify the post, which also strips tracking parameters
//! (`utm_*`, `fbclid`, `s`, `t`, ...). A canonical URL maps to itself.
//!
//! Deduplication runs on the post key instead. Several canonical URLs can name
//! one post (an X status under any handle, a Threads post by `/t/` code or under
//! its author), and all of them share a key such as `X:123` or `THREADS:C3xYz`.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::UrlError;
use crate::types::SocialPlatform;

static RE_X_HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").unwrap());
static RE_NUMERIC_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{1,25}$").unwrap());
static RE_THREADS_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@[A-Za-z0-9_.]{1,30}$").unwrap());
static RE_SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());
static RE_FB_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").unwrap());
static RE_FB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,100}$").unwrap());
static RE_LINKEDIN_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(activity|ugcPost|share)-([0-9]{5,25})(?:-|$)").unwrap());
static RE_LINKEDIN_URN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^urn:li:(activity|ugcPost|share):([0-9]{5,25})$").unwrap());

/// A canonical post URL together with the platform it belongs to and the key
/// identifying the post itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedUrl {
    platform: SocialPlatform,
    url: String,
    post_key: String,
}

impl NormalizedUrl {
    pub fn platform(&self) -> SocialPlatform {
        self.platform
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Platform-scoped post identity, equal for every URL form of one post.
    pub fn post_key(&self) -> &str {
        &self.post_key
    }

    pub fn into_string(self) -> String {
        self.url
    }
}

impl std::fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

/// Normalize a raw post URL into its canonical form.
///
/// A missing scheme is read as `https://`. Fails when the input does not parse,
/// is not http(s), is not on a supported platform, or is not a post URL (profile
/// pages, feeds and short links are rejected).
pub fn normalize(raw: &str) -> Result<NormalizedUrl, UrlError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|e| UrlError::Unparseable {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }

    let host = parsed
        .host_str()
        .unwrap_or_default()
        .trim_end_matches('.')
        .to_lowercase();
    let platform =
        platform_for_host(&host).ok_or_else(|| UrlError::UnsupportedPlatform(host.clone()))?;

    // Empty segments come from trailing or doubled slashes.
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let canonical = match platform {
        SocialPlatform::X => canonical_x(&segments),
        SocialPlatform::Threads => canonical_threads(&segments),
        SocialPlatform::Facebook => canonical_facebook(&segments, &parsed),
        SocialPlatform::Linkedin => canonical_linkedin(&segments),
    };

    canonical
        .map(|(url, id)| NormalizedUrl {
            platform,
            url,
            post_key: format!("{platform}:{id}"),
        })
        .ok_or_else(|| UrlError::NotAPost {
            platform,
            url: trimmed.to_string(),
        })
}

/// Map a lower-cased host (any subdomain) to its platform.
fn platform_for_host(host: &str) -> Option<SocialPlatform> {
    let on = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if on("x.com") || on("twitter.com") {
        Some(SocialPlatform::X)
    } else if on("threads.net") || on("threads.com") {
        Some(SocialPlatform::Threads)
    } else if on("facebook.com") || on("fb.com") {
        Some(SocialPlatform::Facebook)
    } else if on("linkedin.com") {
        Some(SocialPlatform::Linkedin)
    } else {
        None
    }
}

// Each canonical_* returns the canonical URL and the platform-local post id.

fn canonical_x(segments: &[&str]) -> Option<(String, String)> {
    match segments {
        ["i", "web", "status", id, ..] | ["i", "status", id, ..] if RE_NUMERIC_ID.is_match(id) => {
            Some((format!("https://x.com/i/status/{id}"), id.to_string()))
        }
        [handle, "status" | "statuses", id, ..]
            if RE_X_HANDLE.is_match(handle) && RE_NUMERIC_ID.is_match(id) =>
        {
            Some((
                format!("https://x.com/{}/status/{id}", handle.to_lowercase()),
                id.to_string(),
            ))
        }
        _ => None,
    }
}

fn canonical_threads(segments: &[&str]) -> Option<(String, String)> {
    match segments {
        [user, "post", code, ..]
            if RE_THREADS_USER.is_match(user) && RE_SHORTCODE.is_match(code) =>
        {
            Some((
                format!("https://threads.net/{}/post/{code}", user.to_lowercase()),
                code.to_string(),
            ))
        }
        ["t", code, ..] if RE_SHORTCODE.is_match(code) => {
            Some((format!("https://threads.net/t/{code}"), code.to_string()))
        }
        _ => None,
    }
}

fn canonical_facebook(segments: &[&str], url: &Url) -> Option<(String, String)> {
    // Post ids (`pfbid...`) are case-sensitive; page and group names are not.
    // Facebook object ids are global, so the owning page or group is not part of the key.
    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| RE_FB_ID.is_match(v))
    };

    match segments {
        ["permalink.php"] | ["story.php"] => {
            let story = query("story_fbid")?;
            let owner = query("id")?;
            Some((
                format!("https://facebook.com/permalink.php?story_fbid={story}&id={owner}"),
                format!("post:{story}"),
            ))
        }
        ["photo.php"] | ["photo"] => {
            let fbid = query("fbid")?;
            Some((
                format!("https://facebook.com/photo.php?fbid={fbid}"),
                format!("photo:{fbid}"),
            ))
        }
        ["watch"] => {
            let id = query("v")?;
            Some((format!("https://facebook.com/watch?v={id}"), format!("video:{id}")))
        }
        ["reel", id, ..] if RE_FB_ID.is_match(id) => {
            Some((format!("https://facebook.com/reel/{id}"), format!("video:{id}")))
        }
        ["share", kind @ ("p" | "v" | "r"), code, ..] if RE_FB_ID.is_match(code) => Some((
            format!("https://facebook.com/share/{kind}/{code}"),
            format!("share:{kind}:{code}"),
        )),
        ["groups", group, kind @ ("posts" | "permalink"), id, ..]
            if RE_FB_NAME.is_match(group) && RE_FB_ID.is_match(id) =>
        {
            Some((
                format!("https://facebook.com/groups/{}/{kind}/{id}", group.to_lowercase()),
                format!("post:{id}"),
            ))
        }
        [page, "posts", id, ..] if RE_FB_NAME.is_match(page) && RE_FB_ID.is_match(id) => Some((
            format!("https://facebook.com/{}/posts/{id}", page.to_lowercase()),
            format!("post:{id}"),
        )),
        [page, "videos", id, ..] if RE_FB_NAME.is_match(page) && RE_FB_ID.is_match(id) => Some((
            format!("https://facebook.com/{}/videos/{id}", page.to_lowercase()),
            format!("video:{id}"),
        )),
        _ => None,
    }
}

fn canonical_linkedin(segments: &[&str]) -> Option<(String, String)> {
    let (kind, id) = match segments {
        ["posts", slug, ..] => {
            let caps = RE_LINKEDIN_SLUG.captures(slug)?;
            (caps[1].to_string(), caps[2].to_string())
        }
        ["feed", "update", urn, ..] => {
            let urn = urn.replace("%3A", ":").replace("%3a", ":");
            let caps = RE_LINKEDIN_URN.captures(&urn)?;
            (caps[1].to_string(), caps[2].to_string())
        }
        _ => return None,
    };
    Some((
        format!("https://linkedin.com/feed/update/urn:li:{kind}:{id}"),
        format!("{kind}:{id}"),
    ))
}
