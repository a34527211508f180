// Credit decisions for settled submissions, and the hook that hands them to the ledger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use gifavatar_common::SocialSubmission;

/// Decides the credit a submission earns (VALIDATED) or costs (INVALID).
/// Both amounts are non-negative.
pub trait CreditPolicy: Send + Sync {
    fn award(&self, submission: &SocialSubmission) -> i32;
    fn penalty(&self, submission: &SocialSubmission) -> i32;
}

/// Base award plus the highest engagement tier reached by `best_engagement_total`.
#[derive(Debug, Clone)]
pub struct TieredCreditPolicy {
    pub base_award: i32,
    pub invalid_penalty: i32,
    /// (minimum engagement, bonus), highest threshold first.
    pub tiers: Vec<(i32, i32)>,
}

impl TieredCreditPolicy {
    pub fn new(base_award: i32, invalid_penalty: i32) -> Self {
        Self {
            base_award: base_award.max(0),
            invalid_penalty: invalid_penalty.max(0),
            ..Self::default()
        }
    }

    fn tier_bonus(&self, engagement: i32) -> i32 {
        self.tiers
            .iter()
            .find(|(threshold, _)| engagement >= *threshold)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0)
    }
}

impl Default for TieredCreditPolicy {
    fn default() -> Self {
        Self {
            base_award: 10,
            invalid_penalty: 0,
            tiers: vec![(1000, 50), (100, 20), (10, 5)],
        }
    }
}

impl CreditPolicy for TieredCreditPolicy {
    fn award(&self, submission: &SocialSubmission) -> i32 {
        self.base_award
            .saturating_add(self.tier_bonus(submission.best_engagement_total))
            .max(0)
    }

    fn penalty(&self, _submission: &SocialSubmission) -> i32 {
        self.invalid_penalty.max(0)
    }
}

// --- Ledger ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    Award,
    Penalty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditEntry {
    pub submission_id: Uuid,
    pub user_id: String,
    pub kind: CreditKind,
    pub amount: i32,
}

impl CreditEntry {
    /// The ledger entry a settled submission produces, if any.
    pub fn for_submission(submission: &SocialSubmission) -> Option<Self> {
        let (kind, amount) = if submission.credit_awarded > 0 {
            (CreditKind::Award, submission.credit_awarded)
        } else if submission.credit_penalty > 0 {
            (CreditKind::Penalty, submission.credit_penalty)
        } else {
            return None;
        };
        Some(Self {
            submission_id: submission.id,
            user_id: submission.user_id.clone(),
            kind,
            amount,
        })
    }
}

/// External credit ledger. Called after a settled transition is persisted.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn record(&self, entry: &CreditEntry) -> anyhow::Result<()>;
}

pub struct NoopCreditLedger;

#[async_trait]
impl CreditLedger for NoopCreditLedger {
    async fn record(&self, entry: &CreditEntry) -> anyhow::Result<()> {
        debug!(
            submission_id = %entry.submission_id,
            user_id = %entry.user_id,
            kind = ?entry.kind,
            amount = entry.amount,
            "Credit entry not forwarded, no ledger configured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifavatar_common::{normalize, SubmissionStatus};

    fn with_engagement(total: i32) -> SocialSubmission {
        let url = normalize("https://x.com/alice/status/1").unwrap();
        let mut s = SocialSubmission::new("alice", "x", &url, vec![], SubmissionStatus::Verifying);
        s.best_engagement_total = total;
        s
    }

    #[test]
    fn award_follows_engagement_tiers() {
        let policy = TieredCreditPolicy::default();
        assert_eq!(policy.award(&with_engagement(0)), 10);
        assert_eq!(policy.award(&with_engagement(9)), 10);
        assert_eq!(policy.award(&with_engagement(10)), 15);
        assert_eq!(policy.award(&with_engagement(150)), 30);
        assert_eq!(policy.award(&with_engagement(1000)), 60);
    }

    #[test]
    fn configured_amounts_are_never_negative() {
        let policy = TieredCreditPolicy::new(-5, -1);
        assert_eq!(policy.award(&with_engagement(0)), 0);
        assert_eq!(policy.penalty(&with_engagement(0)), 0);
    }

    #[test]
    fn entry_only_for_nonzero_credit() {
        let mut s = with_engagement(0);
        assert!(CreditEntry::for_submission(&s).is_none());

        s.credit_penalty = 3;
        let entry = CreditEntry::for_submission(&s).unwrap();
        assert_eq!(entry.kind, CreditKind::Penalty);
        assert_eq!(entry.amount, 3);
    }
}
