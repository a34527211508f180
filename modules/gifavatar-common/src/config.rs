use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Scraping
    pub apify_api_key: Option<String>,
    pub fetch_timeout_secs: u64,

    // Web server
    pub api_host: String,
    pub api_port: u16,
    pub submissions_per_hour: usize,

    // Verification policy
    pub required_keywords: Vec<String>,
    pub max_rescans: i32,
    pub credit_base_award: i32,
    pub credit_invalid_penalty: i32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            apify_api_key: std::env::var("APIFY_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            fetch_timeout_secs: parse_env("FETCH_TIMEOUT_SECS", 120)?,
            api_host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: parse_env("API_PORT", 3000)?,
            submissions_per_hour: parse_env("SUBMISSIONS_PER_HOUR", 10)?,
            required_keywords: parse_keyword_list(
                &std::env::var("REQUIRED_KEYWORDS").unwrap_or_else(|_| "gifavatar.app".to_string()),
            ),
            max_rescans: parse_env("MAX_RESCANS", 5)?,
            credit_base_award: parse_env("CREDIT_BASE_AWARD", 10)?,
            credit_invalid_penalty: parse_env("CREDIT_INVALID_PENALTY", 0)?,
        };

        if config.credit_base_award < 0 || config.credit_invalid_penalty < 0 {
            anyhow::bail!("credit amounts must be non-negative");
        }
        if config.max_rescans < 0 {
            anyhow::bail!("MAX_RESCANS must be non-negative");
        }

        config.log_keys();
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let head: String = val.chars().take(5).collect();
            format!("{}...({} chars)", head, val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  APIFY_API_KEY: {}", preview_opt(&self.apify_api_key));
        tracing::info!("  REQUIRED_KEYWORDS: {:?}", self.required_keywords);
        tracing::info!(
            "  MAX_RESCANS: {}, FETCH_TIMEOUT_SECS: {}",
            self.max_rescans,
            self.fetch_timeout_secs
        );
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        _ => Ok(default),
    }
}

/// Split a comma-separated keyword list, dropping blanks and repeats.
pub fn parse_keyword_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in raw.split(',').map(str::trim).filter(|w| !w.is_empty()) {
        if !out.iter().any(|w| w.eq_ignore_ascii_case(word)) {
            out.push(word.to_string());
        }
    }
    out
}
