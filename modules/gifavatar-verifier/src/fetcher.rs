use std::sync::Arc;

use apify_client::{ApifyClient, ApifyError};
use async_trait::async_trait;
use tracing::{debug, warn};

use gifavatar_common::{AppConfig, NormalizedUrl, SocialPlatform};

/// Post text and engagement counts as seen by the scraper at fetch time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostEngagement {
    pub post_text: String,
    pub likes: i32,
    pub comments: i32,
    pub shares: i32,
}

impl PostEngagement {
    pub fn total(&self) -> i32 {
        self.likes
            .saturating_add(self.comments)
            .saturating_add(self.shares)
    }
}

/// Why a fetch produced no usable engagement. Both kinds are retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network failure, upstream HTTP error, failed actor run, or timeout.
    #[error("Fetch transport error: {0}")]
    Transport(String),

    /// The upstream answered but the post could not be read from the response.
    #[error("Fetch parse error: {0}")]
    Parse(String),
}

impl From<ApifyError> for FetchError {
    fn from(err: ApifyError) -> Self {
        if err.is_parse() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

// --- EngagementFetcher trait ---

#[async_trait]
pub trait EngagementFetcher: Send + Sync {
    async fn fetch(&self, url: &NormalizedUrl) -> Result<PostEngagement, FetchError>;
}

/// Fetcher used when no scraping credentials are configured.
/// Every attempt fails as a transport error, leaving submissions retryable.
pub struct UnconfiguredFetcher;

#[async_trait]
impl EngagementFetcher for UnconfiguredFetcher {
    async fn fetch(&self, url: &NormalizedUrl) -> Result<PostEngagement, FetchError> {
        debug!(url = %url, "Engagement fetch skipped, no scraper configured");
        Err(FetchError::Transport(
            "no engagement fetcher configured (APIFY_API_KEY unset)".to_string(),
        ))
    }
}

// --- Apify ---

/// Scrapes a single post through the platform's Apify actor.
pub struct ApifyEngagementFetcher {
    client: ApifyClient,
}

impl ApifyEngagementFetcher {
    pub fn new(client: ApifyClient) -> Self {
        Self { client }
    }

    fn missing(url: &NormalizedUrl) -> FetchError {
        FetchError::Parse(format!("no post returned for {url}"))
    }
}

/// Scraper counts are optional and i64; stored counters are non-negative i32.
fn count(value: Option<i64>) -> i32 {
    value.unwrap_or(0).clamp(0, i32::MAX as i64) as i32
}

fn sum(values: &[Option<i64>]) -> i32 {
    values.iter().fold(0i32, |acc, v| acc.saturating_add(count(*v)))
}

#[async_trait]
impl EngagementFetcher for ApifyEngagementFetcher {
    async fn fetch(&self, url: &NormalizedUrl) -> Result<PostEngagement, FetchError> {
        let target = url.as_str();

        let engagement = match url.platform() {
            SocialPlatform::X => {
                let tweet = self
                    .client
                    .scrape_x_post(target)
                    .await?
                    .ok_or_else(|| Self::missing(url))?;
                PostEngagement {
                    post_text: tweet.content().unwrap_or_default().to_string(),
                    likes: count(tweet.like_count),
                    comments: count(tweet.reply_count),
                    shares: sum(&[tweet.retweet_count, tweet.quote_count]),
                }
            }
            SocialPlatform::Threads => {
                let post = self
                    .client
                    .scrape_threads_post(target)
                    .await?
                    .ok_or_else(|| Self::missing(url))?;
                PostEngagement {
                    post_text: post.text.unwrap_or_default(),
                    likes: count(post.like_count),
                    comments: count(post.reply_count),
                    shares: sum(&[post.repost_count, post.quote_count]),
                }
            }
            SocialPlatform::Facebook => {
                let post = self
                    .client
                    .scrape_facebook_post(target)
                    .await?
                    .ok_or_else(|| Self::missing(url))?;
                PostEngagement {
                    post_text: post.text.unwrap_or_default(),
                    likes: count(post.likes),
                    comments: count(post.comments),
                    shares: count(post.shares),
                }
            }
            SocialPlatform::Linkedin => {
                let post = self
                    .client
                    .scrape_linkedin_post(target)
                    .await?
                    .ok_or_else(|| Self::missing(url))?;
                PostEngagement {
                    post_text: post.text.unwrap_or_default(),
                    likes: count(post.num_likes),
                    comments: count(post.num_comments),
                    shares: count(post.num_shares),
                }
            }
        };

        debug!(
            url = %url,
            likes = engagement.likes,
            comments = engagement.comments,
            shares = engagement.shares,
            total = engagement.total(),
            "Fetched post engagement"
        );
        Ok(engagement)
    }
}

/// Pick the fetcher for the configured credentials.
pub fn build_fetcher(config: &AppConfig) -> Arc<dyn EngagementFetcher> {
    match &config.apify_api_key {
        Some(key) => Arc::new(ApifyEngagementFetcher::new(ApifyClient::new(key.clone()))),
        None => {
            warn!("APIFY_API_KEY not set, every verification attempt will fail until it is");
            Arc::new(UnconfiguredFetcher)
        }
    }
}
