use thiserror::Error;

use crate::types::SocialPlatform;

/// Why a submitted URL was rejected before anything was persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Invalid URL format: could not parse {url:?}: {reason}")]
    Unparseable { url: String, reason: String },

    #[error("Invalid URL format: scheme {0:?} is not http or https")]
    UnsupportedScheme(String),

    #[error("Invalid URL format: {0:?} is not a supported social platform")]
    UnsupportedPlatform(String),

    #[error("Invalid URL format: {url:?} is not a {platform} post URL")]
    NotAPost { platform: SocialPlatform, url: String },

    #[error("Invalid URL format: URL is a {detected} post but {declared} was declared")]
    PlatformMismatch {
        declared: SocialPlatform,
        detected: SocialPlatform,
    },
}
