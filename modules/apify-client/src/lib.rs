pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    FacebookPost, FacebookScraperInput, LinkedInPost, LinkedInScraperInput, RunData, StartUrl,
    ThreadsPost, ThreadsScraperInput, Tweet, TweetAuthor, TweetScraperInput,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apidojo/tweet-scraper.
const TWEET_SCRAPER: &str = "61RPP7dywgiy0JPD0";

/// Actor ID for apify/facebook-posts-scraper.
const FACEBOOK_POSTS_SCRAPER: &str = "KoJrdxJCTtpon81KY";

/// Actor for Threads post scraping (username~name form is accepted by the API).
const THREADS_POST_SCRAPER: &str = "apify~threads-scraper";

/// Actor for LinkedIn post scraping.
const LINKEDIN_POST_SCRAPER: &str = "supreme_coder~linkedin-post";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root (local stubs, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize>(&self, actor_id: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    /// Unbounded: callers wrap this in their own timeout.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    continue;
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        // Decode from text so a malformed body surfaces as a parse error, not a network one.
        let body = resp.text().await?;
        let items: Vec<T> = serde_json::from_str(&body)?;
        Ok(items)
    }

    /// Run an actor end-to-end: start run, poll, fetch results.
    pub async fn run_actor<I, T>(&self, actor_id: &str, input: &I) -> Result<Vec<T>>
    where
        I: Serialize,
        T: DeserializeOwned,
    {
        let run = self.start_run(actor_id, input).await?;
        tracing::info!(actor_id, run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        self.get_dataset_items(&completed.default_dataset_id).await
    }

    /// Scrape a single X post by URL. Returns `None` if the actor found nothing.
    pub async fn scrape_x_post(&self, post_url: &str) -> Result<Option<Tweet>> {
        tracing::info!(post_url, "Starting X post scrape");

        let input = TweetScraperInput {
            start_urls: vec![post_url.to_string()],
            max_items: 1,
        };
        let tweets: Vec<Tweet> = self.run_actor(TWEET_SCRAPER, &input).await?;
        tracing::info!(count = tweets.len(), "Fetched tweets");

        Ok(tweets.into_iter().find(|t| !t.no_results))
    }

    /// Scrape a single Threads post by URL.
    pub async fn scrape_threads_post(&self, post_url: &str) -> Result<Option<ThreadsPost>> {
        tracing::info!(post_url, "Starting Threads post scrape");

        let input = ThreadsScraperInput {
            start_urls: vec![StartUrl {
                url: post_url.to_string(),
            }],
            results_limit: 1,
        };
        let posts: Vec<ThreadsPost> = self.run_actor(THREADS_POST_SCRAPER, &input).await?;
        tracing::info!(count = posts.len(), "Fetched Threads posts");

        Ok(posts.into_iter().next())
    }

    /// Scrape a single Facebook post by URL.
    pub async fn scrape_facebook_post(&self, post_url: &str) -> Result<Option<FacebookPost>> {
        tracing::info!(post_url, "Starting Facebook post scrape");

        let input = FacebookScraperInput {
            start_urls: vec![StartUrl {
                url: post_url.to_string(),
            }],
            results_limit: 1,
        };
        let posts: Vec<FacebookPost> = self.run_actor(FACEBOOK_POSTS_SCRAPER, &input).await?;
        tracing::info!(count = posts.len(), "Fetched Facebook posts");

        Ok(posts.into_iter().next())
    }

    /// Scrape a single LinkedIn post by URL.
    pub async fn scrape_linkedin_post(&self, post_url: &str) -> Result<Option<LinkedInPost>> {
        tracing::info!(post_url, "Starting LinkedIn post scrape");

        let input = LinkedInScraperInput {
            urls: vec![post_url.to_string()],
            limit_per_source: 1,
        };
        let posts: Vec<LinkedInPost> = self.run_actor(LINKEDIN_POST_SCRAPER, &input).await?;
        tracing::info!(count = posts.len(), "Fetched LinkedIn posts");

        Ok(posts.into_iter().next())
    }
}
