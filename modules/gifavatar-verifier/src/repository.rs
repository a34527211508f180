// Persistence seam for submissions.
//
// Implemented by PgSubmissionStore (postgres) and MemorySubmissionStore (tests, local runs).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use gifavatar_common::{NormalizedUrl, SocialSubmission, SubmissionStatus};

use crate::error::StoreError;

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SocialSubmission>, StoreError>;

    /// The record holding the claim on the post behind `url`, matched by post key.
    /// Never a `DUPLICATE` row.
    async fn find_by_normalized_url(
        &self,
        url: &NormalizedUrl,
    ) -> Result<Option<SocialSubmission>, StoreError>;

    /// The user's own record for a post, claiming or `DUPLICATE`.
    async fn find_for_user(
        &self,
        user_id: &str,
        post_key: &str,
    ) -> Result<Option<SocialSubmission>, StoreError>;

    /// Insert a new record and return it as stored (timestamps assigned by the store).
    ///
    /// Fails with `StoreError::PostClaimed` when the record would claim a post another
    /// record already claims, or when its user already has a record for the post.
    async fn create(&self, submission: &SocialSubmission) -> Result<SocialSubmission, StoreError>;

    /// Write the mutable fields of `submission`, provided the stored `updated_at` still
    /// equals `submission.updated_at`. Returns the stored record with a new `updated_at`.
    ///
    /// Fails with `StoreError::StaleWrite` when another writer got there first.
    async fn update(&self, submission: &SocialSubmission) -> Result<SocialSubmission, StoreError>;

    /// Records in a status, least recently attempted first, then oldest first.
    async fn list_by_status(
        &self,
        status: SubmissionStatus,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError>;

    /// `VALIDATION_FAILED` records with `rescan_count < max_rescans`, in
    /// `list_by_status` order.
    async fn list_rescannable(
        &self,
        max_rescans: i32,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError>;

    /// A user's records, newest first.
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError>;
}

/// In-process store with the same claim and optimistic-write rules as Postgres.
#[derive(Default)]
pub struct MemorySubmissionStore {
    rows: RwLock<HashMap<Uuid, SocialSubmission>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn oldest_attempts(
        &self,
        keep: impl Fn(&SocialSubmission) -> bool,
        limit: u32,
    ) -> Vec<SocialSubmission> {
        let rows = self.rows.read().await;
        let mut matching: Vec<SocialSubmission> =
            rows.values().filter(|s| keep(*s)).cloned().collect();
        // None sorts before Some, matching NULLS FIRST.
        matching.sort_by_key(|s| (s.last_attempt_at, s.created_at));
        matching.truncate(limit as usize);
        matching
    }
}

#[async_trait]
impl SubmissionRepository for MemorySubmissionStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SocialSubmission>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_normalized_url(
        &self,
        url: &NormalizedUrl,
    ) -> Result<Option<SocialSubmission>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|s| s.post_key == url.post_key() && s.status.claims_post())
            .cloned())
    }

    async fn find_for_user(
        &self,
        user_id: &str,
        post_key: &str,
    ) -> Result<Option<SocialSubmission>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id && s.post_key == post_key)
            .min_by_key(|s| s.created_at)
            .cloned())
    }

    async fn create(&self, submission: &SocialSubmission) -> Result<SocialSubmission, StoreError> {
        let mut rows = self.rows.write().await;

        let conflict = rows.values().any(|s| {
            s.post_key == submission.post_key
                && (s.user_id == submission.user_id
                    || (s.status.claims_post() && submission.status.claims_post()))
        });
        if conflict {
            return Err(StoreError::PostClaimed(submission.post_key.clone()));
        }
        if rows.contains_key(&submission.id) {
            return Err(StoreError::Corrupt(format!(
                "id {} already exists",
                submission.id
            )));
        }

        let now = Utc::now();
        let mut stored = submission.clone();
        stored.created_at = now;
        stored.updated_at = now;
        rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, submission: &SocialSubmission) -> Result<SocialSubmission, StoreError> {
        let mut rows = self.rows.write().await;
        let current = rows
            .get_mut(&submission.id)
            .ok_or(StoreError::NotFound(submission.id))?;

        if current.updated_at != submission.updated_at {
            return Err(StoreError::StaleWrite(submission.id));
        }

        let previous_best = current.best_engagement_total;
        let previous_verified = current.verified_at;
        let version = Utc::now().max(current.updated_at + Duration::microseconds(1));

        *current = SocialSubmission {
            // Identity and creation fields are immutable.
            id: current.id,
            user_id: current.user_id.clone(),
            platform: current.platform,
            original_url: current.original_url.clone(),
            url_normalized: current.url_normalized.clone(),
            post_key: current.post_key.clone(),
            required_keywords: current.required_keywords.clone(),
            created_at: current.created_at,
            best_engagement_total: previous_best.max(submission.best_engagement_total),
            verified_at: previous_verified.or(submission.verified_at),
            updated_at: version,
            ..submission.clone()
        };

        Ok(current.clone())
    }

    async fn list_by_status(
        &self,
        status: SubmissionStatus,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError> {
        Ok(self.oldest_attempts(|s| s.status == status, limit).await)
    }

    async fn list_rescannable(
        &self,
        max_rescans: i32,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError> {
        Ok(self
            .oldest_attempts(
                |s| s.status == SubmissionStatus::ValidationFailed && s.rescan_count < max_rescans,
                limit,
            )
            .await)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError> {
        let rows = self.rows.read().await;
        let mut matching: Vec<SocialSubmission> =
            rows.values().filter(|s| s.user_id == user_id).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifavatar_common::normalize;

    fn submission(user: &str, url: &str, status: SubmissionStatus) -> SocialSubmission {
        let normalized = normalize(url).unwrap();
        SocialSubmission::new(user, url, &normalized, vec!["gifavatar.app".into()], status)
    }

    #[tokio::test]
    async fn second_claim_on_same_post_is_rejected() {
        let store = MemorySubmissionStore::new();
        store
            .create(&submission("alice", "https://x.com/alice/status/1", SubmissionStatus::Verifying))
            .await
            .unwrap();

        let err = store
            .create(&submission("bob", "https://x.com/i/web/status/1/", SubmissionStatus::Verifying))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PostClaimed(key) if key == "X:1"));
    }

    #[tokio::test]
    async fn one_record_per_user_and_post() {
        let store = MemorySubmissionStore::new();
        store
            .create(&submission("alice", "https://x.com/alice/status/1", SubmissionStatus::Verifying))
            .await
            .unwrap();
        store
            .create(&submission("bob", "https://x.com/alice/status/1", SubmissionStatus::Duplicate))
            .await
            .unwrap();

        let err = store
            .create(&submission("bob", "https://x.com/bob/status/1", SubmissionStatus::Duplicate))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PostClaimed(_)));
        assert_eq!(store.len().await, 2);

        let own = store.find_for_user("bob", "X:1").await.unwrap().unwrap();
        assert_eq!(own.status, SubmissionStatus::Duplicate);
        assert!(store.find_for_user("carol", "X:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_rows_do_not_claim() {
        let store = MemorySubmissionStore::new();
        let original = store
            .create(&submission("alice", "https://x.com/alice/status/1", SubmissionStatus::Verifying))
            .await
            .unwrap();
        store
            .create(&submission("bob", "https://x.com/alice/status/1", SubmissionStatus::Duplicate))
            .await
            .unwrap();

        let claim = store
            .find_by_normalized_url(&normalize("https://twitter.com/i/web/status/1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claim.id, original.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn stale_update_is_rejected() {
        let store = MemorySubmissionStore::new();
        let created = store
            .create(&submission("alice", "https://x.com/alice/status/1", SubmissionStatus::Verifying))
            .await
            .unwrap();

        let mut first = created.clone();
        first.status = SubmissionStatus::ValidationFailed;
        first.error_message = Some("boom".into());
        let saved = store.update(&first).await.unwrap();
        assert!(saved.updated_at > created.updated_at);

        let mut second = created.clone();
        second.status = SubmissionStatus::Validated;
        let err = store.update(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite(id) if id == created.id));

        let stored = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::ValidationFailed);
    }

    #[tokio::test]
    async fn update_never_lowers_best_engagement() {
        let store = MemorySubmissionStore::new();
        let mut sub = store
            .create(&submission("alice", "https://x.com/alice/status/1", SubmissionStatus::Verifying))
            .await
            .unwrap();
        sub.best_engagement_total = 50;
        let mut sub = store.update(&sub).await.unwrap();
        sub.best_engagement_total = 10;
        let sub = store.update(&sub).await.unwrap();
        assert_eq!(sub.best_engagement_total, 50);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let store = MemorySubmissionStore::new();
        let sub = submission("alice", "https://x.com/alice/status/1", SubmissionStatus::Verifying);
        assert!(matches!(
            store.update(&sub).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_by_status_puts_never_attempted_first() {
        let store = MemorySubmissionStore::new();
        let a = store
            .create(&submission("a", "https://x.com/a/status/1", SubmissionStatus::Verifying))
            .await
            .unwrap();
        let mut b = store
            .create(&submission("b", "https://x.com/b/status/2", SubmissionStatus::Verifying))
            .await
            .unwrap();
        b.last_attempt_at = Some(Utc::now());
        store.update(&b).await.unwrap();

        let listed = store
            .list_by_status(SubmissionStatus::Verifying, 10)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);

        let limited = store
            .list_by_status(SubmissionStatus::Verifying, 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn list_rescannable_leaves_out_capped_records() {
        let store = MemorySubmissionStore::new();
        let mut ids = Vec::new();
        for (n, rescans) in [(1, 3), (2, 0), (3, 2)] {
            let mut s = store
                .create(&submission("a", &format!("https://x.com/a/status/{n}"), SubmissionStatus::Verifying))
                .await
                .unwrap();
            s.status = SubmissionStatus::ValidationFailed;
            s.error_message = Some("down".into());
            s.rescan_count = rescans;
            s.last_attempt_at = Some(Utc::now() - Duration::minutes(10 - n));
            ids.push(store.update(&s).await.unwrap().id);
        }

        let listed = store.list_rescannable(3, 10).await.unwrap();
        let listed: Vec<Uuid> = listed.iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![ids[1], ids[2]]);

        assert_eq!(store.list_rescannable(3, 1).await.unwrap()[0].id, ids[1]);
    }
}
