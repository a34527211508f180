//! Verification state machine for social submissions.
//!
//! A submission starts in `VERIFYING`. One attempt fetches the post, records what
//! it saw, and settles the record as `VALIDATED`, `INVALID`, or `VALIDATION_FAILED`.
//! Only `VALIDATION_FAILED` may be rescanned. A second claim on an already-claimed
//! post is stored as `DUPLICATE` and never fetched. Each user holds at most one
//! record per post.
//!
//! Fetch failures are state, not errors. The only synchronous rejection at submit
//! time is an unusable URL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use gifavatar_common::{
    match_keywords, normalize, AppConfig, SocialPlatform, SocialSubmission, SubmissionStatus,
    UrlError,
};

use crate::credit::{CreditEntry, CreditLedger, CreditPolicy, NoopCreditLedger, TieredCreditPolicy};
use crate::error::{Result, StoreError, VerifyError};
use crate::fetcher::{EngagementFetcher, FetchError, PostEngagement};
use crate::repository::SubmissionRepository;

/// A user's request to register a post.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: String,
    pub url: String,
    /// Platform the caller claims the URL belongs to. Must agree with the URL.
    pub platform: Option<SocialPlatform>,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// A new record was stored (possibly as `DUPLICATE`).
    Created(SocialSubmission),
    /// The same user already submitted this post, in any URL form; nothing was stored.
    AlreadySubmitted(SocialSubmission),
}

impl SubmitOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, SubmitOutcome::Created(_))
    }

    pub fn submission(&self) -> &SocialSubmission {
        match self {
            SubmitOutcome::Created(s) | SubmitOutcome::AlreadySubmitted(s) => s,
        }
    }

    pub fn into_submission(self) -> SocialSubmission {
        match self {
            SubmitOutcome::Created(s) | SubmitOutcome::AlreadySubmitted(s) => s,
        }
    }
}

/// Per-outcome counts from one `sweep_failed` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub validated: usize,
    pub invalid: usize,
    pub failed: usize,
    /// `VERIFYING` records picked up because their first attempt never finished.
    pub stalled: usize,
    /// Lost an optimistic write to another attempt.
    pub conflicts: usize,
    pub errors: usize,
}

#[derive(Clone, TypedBuilder)]
pub struct Verifier {
    repo: Arc<dyn SubmissionRepository>,
    fetcher: Arc<dyn EngagementFetcher>,
    #[builder(default = Arc::new(TieredCreditPolicy::default()) as Arc<dyn CreditPolicy>)]
    credit_policy: Arc<dyn CreditPolicy>,
    #[builder(default = Arc::new(NoopCreditLedger) as Arc<dyn CreditLedger>)]
    ledger: Arc<dyn CreditLedger>,
    #[builder(default = vec!["gifavatar.app".to_string()])]
    required_keywords: Vec<String>,
    #[builder(default = Duration::from_secs(120))]
    fetch_timeout: Duration,
    #[builder(default = 5)]
    max_rescans: i32,
}

impl Verifier {
    /// Wire a verifier from env config. The ledger stays the no-op default.
    pub fn from_config(
        config: &AppConfig,
        repo: Arc<dyn SubmissionRepository>,
        fetcher: Arc<dyn EngagementFetcher>,
    ) -> Self {
        Self::builder()
            .repo(repo)
            .fetcher(fetcher)
            .credit_policy(Arc::new(TieredCreditPolicy::new(
                config.credit_base_award,
                config.credit_invalid_penalty,
            )))
            .required_keywords(config.required_keywords.clone())
            .fetch_timeout(config.fetch_timeout())
            .max_rescans(config.max_rescans)
            .build()
    }

    // --- Submission ---

    /// Register a post without fetching it.
    pub async fn submit(&self, new: NewSubmission) -> Result<SubmitOutcome> {
        let normalized = normalize(&new.url)?;
        if let Some(declared) = new.platform {
            if declared != normalized.platform() {
                return Err(UrlError::PlatformMismatch {
                    declared,
                    detected: normalized.platform(),
                }
                .into());
            }
        }

        let record = SocialSubmission::new(
            new.user_id,
            new.url,
            &normalized,
            self.required_keywords.clone(),
            SubmissionStatus::Verifying,
        );

        if let Some(existing) = self.existing_for_user(&record).await? {
            return Ok(SubmitOutcome::AlreadySubmitted(existing));
        }
        if let Some(claim) = self.repo.find_by_normalized_url(&normalized).await? {
            return self.create_duplicate(&claim, record).await;
        }

        match self.repo.create(&record).await {
            Ok(created) => {
                info!(
                    submission_id = %created.id,
                    user_id = %created.user_id,
                    platform = %created.platform,
                    url = %created.url_normalized,
                    post_key = %created.post_key,
                    "Submission created"
                );
                Ok(SubmitOutcome::Created(created))
            }
            // Lost an insert race, to another user's claim or to this user's own
            // concurrent submit.
            Err(StoreError::PostClaimed(key)) => {
                if let Some(existing) = self.existing_for_user(&record).await? {
                    return Ok(SubmitOutcome::AlreadySubmitted(existing));
                }
                let claim = self.repo.find_by_normalized_url(&normalized).await?;
                let claim = claim.ok_or(StoreError::PostClaimed(key))?;
                self.create_duplicate(&claim, record).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Submit, then run the first attempt inline for a newly created record.
    pub async fn submit_and_verify(&self, new: NewSubmission) -> Result<SubmitOutcome> {
        match self.submit(new).await? {
            SubmitOutcome::Created(s) if s.status == SubmissionStatus::Verifying => {
                let verified = self.verify(s.id).await?;
                Ok(SubmitOutcome::Created(verified))
            }
            other => Ok(other),
        }
    }

    async fn existing_for_user(
        &self,
        record: &SocialSubmission,
    ) -> Result<Option<SocialSubmission>> {
        let existing = self
            .repo
            .find_for_user(&record.user_id, &record.post_key)
            .await?;
        if let Some(existing) = &existing {
            info!(
                submission_id = %existing.id,
                user_id = %existing.user_id,
                status = %existing.status,
                "Resubmission of an existing post, returning stored record"
            );
        }
        Ok(existing)
    }

    async fn create_duplicate(
        &self,
        claim: &SocialSubmission,
        mut record: SocialSubmission,
    ) -> Result<SubmitOutcome> {
        record.status = SubmissionStatus::Duplicate;
        let duplicate = match self.repo.create(&record).await {
            Ok(duplicate) => duplicate,
            // The same user's concurrent submit stored its row first.
            Err(StoreError::PostClaimed(key)) => {
                let existing = self.existing_for_user(&record).await?;
                let existing = existing.ok_or(StoreError::PostClaimed(key))?;
                return Ok(SubmitOutcome::AlreadySubmitted(existing));
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            submission_id = %duplicate.id,
            user_id = %duplicate.user_id,
            claimed_by = %claim.id,
            url = %duplicate.url_normalized,
            post_key = %duplicate.post_key,
            "Submission marked duplicate"
        );
        Ok(SubmitOutcome::Created(duplicate))
    }

    // --- Attempts ---

    /// Run the first attempt on a `VERIFYING` submission.
    pub async fn verify(&self, id: Uuid) -> Result<SocialSubmission> {
        let submission = self.get(id).await?;
        if submission.status != SubmissionStatus::Verifying {
            return Err(VerifyError::InvalidTransition {
                id,
                status: submission.status,
                operation: "verify",
            });
        }
        self.attempt(submission).await
    }

    /// Retry a `VALIDATION_FAILED` submission.
    pub async fn rescan(&self, id: Uuid) -> Result<SocialSubmission> {
        let submission = self.get(id).await?;
        if submission.status.is_terminal() {
            return Err(VerifyError::NotRetryable {
                id,
                status: submission.status,
            });
        }
        if !submission.status.is_retryable() {
            return Err(VerifyError::InvalidTransition {
                id,
                status: submission.status,
                operation: "rescan",
            });
        }
        if submission.rescan_count >= self.max_rescans {
            return Err(VerifyError::RescanLimitReached {
                id,
                limit: self.max_rescans,
            });
        }
        self.attempt(submission).await
    }

    /// Attempt up to `limit` submissions: stalled `VERIFYING` records first, then
    /// `VALIDATION_FAILED` records under the rescan cap, least recently attempted first.
    pub async fn sweep_failed(&self, limit: u32) -> Result<SweepReport> {
        let stalled = self.list_stalled(limit).await?;
        let remaining = limit.saturating_sub(stalled.len() as u32);
        let failed = if remaining > 0 {
            self.repo.list_rescannable(self.max_rescans, remaining).await?
        } else {
            Vec::new()
        };

        let mut report = SweepReport {
            stalled: stalled.len(),
            ..SweepReport::default()
        };
        for submission in stalled.into_iter().chain(failed) {
            report.scanned += 1;
            let id = submission.id;
            match self.attempt(submission).await {
                Ok(s) => match s.status {
                    SubmissionStatus::Validated => report.validated += 1,
                    SubmissionStatus::Invalid => report.invalid += 1,
                    _ => report.failed += 1,
                },
                Err(VerifyError::ConcurrentAttempt(_)) => report.conflicts += 1,
                Err(e) => {
                    warn!(submission_id = %id, error = %e, "Sweep rescan failed");
                    report.errors += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            validated = report.validated,
            invalid = report.invalid,
            failed = report.failed,
            stalled = report.stalled,
            conflicts = report.conflicts,
            errors = report.errors,
            "Sweep of failed submissions complete"
        );
        Ok(report)
    }

    /// `VERIFYING` records created more than one fetch timeout ago. Their inline
    /// first attempt lost a write or never ran.
    async fn list_stalled(&self, limit: u32) -> Result<Vec<SocialSubmission>> {
        let cutoff = chrono::Duration::from_std(self.fetch_timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout));
        let Some(cutoff) = cutoff else {
            return Ok(Vec::new());
        };

        // Never-attempted records list oldest first, so the stalled ones lead.
        let verifying = self
            .repo
            .list_by_status(SubmissionStatus::Verifying, limit)
            .await?;
        Ok(verifying
            .into_iter()
            .take_while(|s| s.created_at < cutoff)
            .collect())
    }

    async fn attempt(&self, submission: SocialSubmission) -> Result<SocialSubmission> {
        let url = normalize(&submission.url_normalized)?;
        let outcome = self.fetch_with_timeout(&url).await;

        if let Err(e) = &outcome {
            warn!(submission_id = %submission.id, url = %url, error = %e, "Engagement fetch failed");
        }

        let mut next = submission;
        apply_attempt(&mut next, outcome, self.credit_policy.as_ref(), Utc::now());

        let saved = match self.repo.update(&next).await {
            Ok(saved) => saved,
            Err(StoreError::StaleWrite(id)) => {
                warn!(submission_id = %id, "Attempt lost to a concurrent write, discarding result");
                return Err(VerifyError::ConcurrentAttempt(id));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            submission_id = %saved.id,
            status = %saved.status,
            rescan_count = saved.rescan_count,
            engagement = saved.engagement_total(),
            missing = ?saved.missing_keywords,
            "Verification attempt recorded"
        );

        self.settle_credits(&saved).await;
        Ok(saved)
    }

    async fn fetch_with_timeout(
        &self,
        url: &gifavatar_common::NormalizedUrl,
    ) -> std::result::Result<PostEngagement, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Transport(format!(
                "fetch timed out after {:?}",
                self.fetch_timeout
            ))),
        }
    }

    async fn settle_credits(&self, submission: &SocialSubmission) {
        if !submission.status.is_terminal() {
            return;
        }
        let Some(entry) = CreditEntry::for_submission(submission) else {
            return;
        };
        if let Err(e) = self.ledger.record(&entry).await {
            warn!(
                submission_id = %entry.submission_id,
                user_id = %entry.user_id,
                amount = entry.amount,
                error = %e,
                "Failed to forward credit entry to ledger"
            );
        }
    }

    // --- Reads ---

    pub async fn get(&self, id: Uuid) -> Result<SocialSubmission> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(VerifyError::NotFound(id))
    }

    pub async fn list_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<SocialSubmission>> {
        Ok(self.repo.list_by_user(user_id, limit).await?)
    }
}

/// Fold one fetch outcome into a submission. Pure; the caller persists the result.
///
/// `rescan_count` stays 0 on the first attempt and counts every later one.
/// A failed fetch leaves post text, counts, and keyword lists as they were.
pub fn apply_attempt(
    submission: &mut SocialSubmission,
    outcome: std::result::Result<PostEngagement, FetchError>,
    policy: &dyn CreditPolicy,
    now: DateTime<Utc>,
) {
    if submission.last_attempt_at.is_some() {
        submission.rescan_count = submission.rescan_count.saturating_add(1);
    }
    submission.last_attempt_at = Some(now);

    let engagement = match outcome {
        Ok(engagement) => engagement,
        Err(e) => {
            submission.status = SubmissionStatus::ValidationFailed;
            submission.error_message = Some(e.to_string());
            return;
        }
    };

    submission.likes = engagement.likes.max(0);
    submission.comments = engagement.comments.max(0);
    submission.shares = engagement.shares.max(0);
    submission.best_engagement_total = submission
        .best_engagement_total
        .max(submission.engagement_total());

    let keywords = match_keywords(&engagement.post_text, &submission.required_keywords);
    let complete = keywords.is_complete();
    submission.matched_keywords = keywords.matched;
    submission.missing_keywords = keywords.missing;
    submission.post_text = Some(engagement.post_text);
    submission.error_message = None;

    if complete {
        submission.status = SubmissionStatus::Validated;
        submission.verified_at.get_or_insert(now);
        submission.credit_awarded = policy.award(submission);
        submission.credit_penalty = 0;
    } else {
        submission.status = SubmissionStatus::Invalid;
        submission.credit_awarded = 0;
        submission.credit_penalty = policy.penalty(submission);
    }
}
