use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::NormalizedUrl;

// --- Enums ---

/// Platforms a submission can point at. Closed set; stored by its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocialPlatform {
    X,
    Threads,
    Facebook,
    Linkedin,
}

impl SocialPlatform {
    pub const ALL: [SocialPlatform; 4] = [
        SocialPlatform::X,
        SocialPlatform::Threads,
        SocialPlatform::Facebook,
        SocialPlatform::Linkedin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::X => "X",
            SocialPlatform::Threads => "THREADS",
            SocialPlatform::Facebook => "FACEBOOK",
            SocialPlatform::Linkedin => "LINKEDIN",
        }
    }
}

impl std::fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SocialPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(SocialPlatform::X),
            "THREADS" => Ok(SocialPlatform::Threads),
            "FACEBOOK" => Ok(SocialPlatform::Facebook),
            "LINKEDIN" => Ok(SocialPlatform::Linkedin),
            other => Err(format!("unknown social platform: {other}")),
        }
    }
}

/// Lifecycle of a submission.
///
/// `Verifying` is the only initial state. `ValidationFailed` is the only state a
/// rescan may leave; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Verifying,
    Validated,
    Invalid,
    Duplicate,
    ValidationFailed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Verifying => "VERIFYING",
            SubmissionStatus::Validated => "VALIDATED",
            SubmissionStatus::Invalid => "INVALID",
            SubmissionStatus::Duplicate => "DUPLICATE",
            SubmissionStatus::ValidationFailed => "VALIDATION_FAILED",
        }
    }

    /// No orchestrator-driven transition leaves these states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Validated | SubmissionStatus::Invalid | SubmissionStatus::Duplicate
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmissionStatus::ValidationFailed)
    }

    /// Whether this record holds the claim on its post.
    pub fn claims_post(&self) -> bool {
        !matches!(self, SubmissionStatus::Duplicate)
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VERIFYING" => Ok(SubmissionStatus::Verifying),
            "VALIDATED" => Ok(SubmissionStatus::Validated),
            "INVALID" => Ok(SubmissionStatus::Invalid),
            "DUPLICATE" => Ok(SubmissionStatus::Duplicate),
            "VALIDATION_FAILED" => Ok(SubmissionStatus::ValidationFailed),
            other => Err(format!("unknown submission status: {other}")),
        }
    }
}

// --- Submission ---

/// A user's claim that a social post promotes the product.
///
/// Engagement counters are `i32` to match the integer columns they are stored in;
/// they are clamped to be non-negative wherever they are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialSubmission {
    pub id: Uuid,
    pub user_id: String,
    pub platform: SocialPlatform,
    pub original_url: String,
    pub url_normalized: String,
    /// Identity of the post across URL forms, see `NormalizedUrl::post_key`.
    pub post_key: String,
    pub status: SubmissionStatus,
    pub required_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub post_text: Option<String>,
    pub likes: i32,
    pub comments: i32,
    pub shares: i32,
    pub best_engagement_total: i32,
    pub credit_awarded: i32,
    pub credit_penalty: i32,
    pub rescan_count: i32,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialSubmission {
    /// A fresh record with zeroed counters. The store assigns final timestamps on insert.
    pub fn new(
        user_id: impl Into<String>,
        original_url: impl Into<String>,
        normalized: &NormalizedUrl,
        required_keywords: Vec<String>,
        status: SubmissionStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            platform: normalized.platform(),
            original_url: original_url.into(),
            url_normalized: normalized.as_str().to_string(),
            post_key: normalized.post_key().to_string(),
            status,
            required_keywords,
            missing_keywords: Vec::new(),
            matched_keywords: Vec::new(),
            post_text: None,
            likes: 0,
            comments: 0,
            shares: 0,
            best_engagement_total: 0,
            credit_awarded: 0,
            credit_penalty: 0,
            rescan_count: 0,
            verified_at: None,
            last_attempt_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// likes + comments + shares from the most recent successful fetch.
    pub fn engagement_total(&self) -> i32 {
        self.likes
            .saturating_add(self.comments)
            .saturating_add(self.shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_to_wire_names() {
        assert_eq!(
            serde_json::to_value(SocialPlatform::Linkedin).unwrap(),
            "LINKEDIN"
        );
        assert_eq!(
            serde_json::to_value(SubmissionStatus::ValidationFailed).unwrap(),
            "VALIDATION_FAILED"
        );
        for p in SocialPlatform::ALL {
            assert_eq!(p.as_str().parse::<SocialPlatform>().unwrap(), p);
            assert_eq!(serde_json::to_value(p).unwrap(), p.as_str());
        }
    }

    #[test]
    fn status_parse_rejects_lowercase() {
        assert!("validated".parse::<SubmissionStatus>().is_err());
        assert_eq!(
            "DUPLICATE".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Duplicate
        );
    }

    #[test]
    fn terminal_and_retryable_are_disjoint() {
        for status in [
            SubmissionStatus::Verifying,
            SubmissionStatus::Validated,
            SubmissionStatus::Invalid,
            SubmissionStatus::Duplicate,
            SubmissionStatus::ValidationFailed,
        ] {
            assert!(!(status.is_terminal() && status.is_retryable()), "{status}");
        }
        assert!(!SubmissionStatus::Verifying.is_terminal());
        assert!(!SubmissionStatus::Duplicate.claims_post());
        assert!(SubmissionStatus::Invalid.claims_post());
    }

    #[test]
    fn submission_json_uses_camel_case_fields() {
        let normalized = crate::normalize("https://x.com/alice/status/123").unwrap();
        let sub = SocialSubmission::new(
            "user_1",
            "https://x.com/alice/status/123?utm=abc",
            &normalized,
            vec!["gifavatar.app".into()],
            SubmissionStatus::Verifying,
        );
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["urlNormalized"], "https://x.com/alice/status/123");
        assert_eq!(json["postKey"], "X:123");
        assert_eq!(json["platform"], "X");
        assert_eq!(json["status"], "VERIFYING");
        assert_eq!(json["bestEngagementTotal"], 0);
        assert!(json["postText"].is_null());
    }

    #[test]
    fn engagement_total_saturates() {
        let normalized = crate::normalize("https://x.com/alice/status/1").unwrap();
        let mut sub = SocialSubmission::new(
            "u",
            "https://x.com/alice/status/1",
            &normalized,
            vec![],
            SubmissionStatus::Verifying,
        );
        sub.likes = i32::MAX;
        sub.comments = 5;
        assert_eq!(sub.engagement_total(), i32::MAX);
    }
}
