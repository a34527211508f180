use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApifyError>;

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Run failed with status: {0}")]
    RunFailed(String),
}

impl ApifyError {
    /// True when the response arrived but its body could not be understood.
    pub fn is_parse(&self) -> bool {
        matches!(self, ApifyError::Parse(_))
    }
}

impl From<reqwest::Error> for ApifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApifyError::Parse(err.to_string())
        } else {
            ApifyError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApifyError {
    fn from(err: serde_json::Error) -> Self {
        ApifyError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_classify_as_parse() {
        let err: ApifyError = serde_json::from_str::<Vec<u32>>("{not json")
            .unwrap_err()
            .into();
        assert!(err.is_parse());
        assert!(err.to_string().starts_with("Parse error"));
    }

    #[test]
    fn run_failure_is_not_parse() {
        assert!(!ApifyError::RunFailed("TIMED-OUT".into()).is_parse());
    }
}
