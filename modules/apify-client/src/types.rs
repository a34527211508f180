use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// A start URL entry for actor inputs that take `startUrls`.
#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

// --- X/Twitter ---

/// Input for the apidojo/tweet-scraper actor, scoped to explicit post URLs.
#[derive(Debug, Clone, Serialize)]
pub struct TweetScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
}

/// Author info nested inside a Tweet.
#[derive(Debug, Clone, Deserialize)]
pub struct TweetAuthor {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub name: Option<String>,
}

/// A single tweet from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "full_text")]
    pub full_text: Option<String>,
    pub url: Option<String>,
    pub author: Option<TweetAuthor>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<i64>,
    #[serde(rename = "retweetCount")]
    pub retweet_count: Option<i64>,
    #[serde(rename = "quoteCount")]
    pub quote_count: Option<i64>,
    #[serde(rename = "replyCount")]
    pub reply_count: Option<i64>,
    /// The actor emits `{"noResults": true}` placeholder items for dead URLs.
    #[serde(rename = "noResults", default)]
    pub no_results: bool,
}

impl Tweet {
    /// Returns whichever text field is populated, preferring `full_text`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }
}

// --- Threads ---

/// Input for the Threads post scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadsScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
}

/// A single Threads post from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadsPost {
    pub url: Option<String>,
    pub code: Option<String>,
    #[serde(alias = "caption")]
    pub text: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<i64>,
    #[serde(rename = "replyCount")]
    pub reply_count: Option<i64>,
    #[serde(rename = "repostCount")]
    pub repost_count: Option<i64>,
    #[serde(rename = "quoteCount")]
    pub quote_count: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

// --- Facebook ---

/// Input for the apify/facebook-posts-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct FacebookScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
}

/// A single Facebook post from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookPost {
    pub url: Option<String>,
    pub text: Option<String>,
    pub time: Option<String>,
    #[serde(rename = "pageName")]
    pub page_name: Option<String>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
}

// --- LinkedIn ---

/// Input for the LinkedIn post scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedInScraperInput {
    pub urls: Vec<String>,
    #[serde(rename = "limitPerSource")]
    pub limit_per_source: u32,
}

/// A single LinkedIn post from the Apify dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedInPost {
    pub url: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "authorName")]
    pub author_name: Option<String>,
    #[serde(rename = "numLikes")]
    pub num_likes: Option<i64>,
    #[serde(rename = "numComments")]
    pub num_comments: Option<i64>,
    #[serde(rename = "numShares")]
    pub num_shares: Option<i64>,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tweet_prefers_full_text() {
        let tweet: Tweet = serde_json::from_value(serde_json::json!({
            "text": "short",
            "full_text": "the long one",
            "likeCount": 4,
        }))
        .unwrap();
        assert_eq!(tweet.content(), Some("the long one"));
        assert_eq!(tweet.like_count, Some(4));
        assert!(!tweet.no_results);
    }

    #[test]
    fn tweet_placeholder_for_dead_url() {
        let tweet: Tweet = serde_json::from_value(serde_json::json!({"noResults": true})).unwrap();
        assert!(tweet.no_results);
        assert_eq!(tweet.content(), None);
    }

    #[test]
    fn threads_post_accepts_caption_alias() {
        let post: ThreadsPost = serde_json::from_value(serde_json::json!({
            "caption": "hello threads",
            "likeCount": 12,
            "replyCount": 3,
        }))
        .unwrap();
        assert_eq!(post.text.as_deref(), Some("hello threads"));
        assert_eq!(post.repost_count, None);
    }

    #[test]
    fn tweet_input_serializes_camel_case() {
        let input = TweetScraperInput {
            start_urls: vec!["https://x.com/alice/status/1".into()],
            max_items: 1,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["startUrls"][0], "https://x.com/alice/status/1");
        assert_eq!(json["maxItems"], 1);
    }
}
