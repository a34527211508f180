pub mod config;
pub mod error;
pub mod keywords;
pub mod normalize;
pub mod types;

pub use config::AppConfig;
pub use error::UrlError;
pub use keywords::{match_keywords, KeywordMatch};
pub use normalize::{normalize, NormalizedUrl};
pub use types::*;
