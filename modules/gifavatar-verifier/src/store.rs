// Postgres persistence for social submissions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use gifavatar_common::{NormalizedUrl, SocialSubmission, SubmissionStatus};

use crate::error::StoreError;
use crate::repository::SubmissionRepository;

#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

/// A row from the social_submissions table. Enum columns are TEXT.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    user_id: String,
    platform: String,
    original_url: String,
    url_normalized: String,
    post_key: String,
    status: String,
    required_keywords: Vec<String>,
    missing_keywords: Vec<String>,
    matched_keywords: Vec<String>,
    post_text: Option<String>,
    likes: i32,
    comments: i32,
    shares: i32,
    best_engagement_total: i32,
    credit_awarded: i32,
    credit_penalty: i32,
    rescan_count: i32,
    verified_at: Option<DateTime<Utc>>,
    last_attempt_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubmissionRow> for SocialSubmission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(SocialSubmission {
            id: row.id,
            user_id: row.user_id,
            platform: row.platform.parse().map_err(StoreError::Corrupt)?,
            original_url: row.original_url,
            url_normalized: row.url_normalized,
            post_key: row.post_key,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            required_keywords: row.required_keywords,
            missing_keywords: row.missing_keywords,
            matched_keywords: row.matched_keywords,
            post_text: row.post_text,
            likes: row.likes,
            comments: row.comments,
            shares: row.shares,
            best_engagement_total: row.best_engagement_total,
            credit_awarded: row.credit_awarded,
            credit_penalty: row.credit_penalty,
            rescan_count: row.rescan_count,
            verified_at: row.verified_at,
            last_attempt_at: row.last_attempt_at,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn rows_to_submissions(rows: Vec<SubmissionRow>) -> Result<Vec<SocialSubmission>, StoreError> {
    rows.into_iter().map(SocialSubmission::try_from).collect()
}

/// Map a unique-index violation on insert (post claim, or one record per user and
/// post) to a claim conflict.
fn map_insert_error(err: sqlx::Error, post_key: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::PostClaimed(post_key.to_string());
        }
    }
    StoreError::Database(err)
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionRepository for PgSubmissionStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SocialSubmission>, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM social_submissions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SocialSubmission::try_from).transpose()
    }

    async fn find_by_normalized_url(
        &self,
        url: &NormalizedUrl,
    ) -> Result<Option<SocialSubmission>, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM social_submissions
            WHERE post_key = $1 AND status <> 'DUPLICATE'
            LIMIT 1
            "#,
        )
        .bind(url.post_key())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SocialSubmission::try_from).transpose()
    }

    async fn find_for_user(
        &self,
        user_id: &str,
        post_key: &str,
    ) -> Result<Option<SocialSubmission>, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM social_submissions
            WHERE user_id = $1 AND post_key = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(post_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SocialSubmission::try_from).transpose()
    }

    async fn create(&self, s: &SocialSubmission) -> Result<SocialSubmission, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO social_submissions
                (id, user_id, platform, original_url, url_normalized, post_key, status,
                 required_keywords, missing_keywords, matched_keywords, post_text,
                 likes, comments, shares, best_engagement_total,
                 credit_awarded, credit_penalty, rescan_count,
                 verified_at, last_attempt_at, error_message,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, now(), now())
            RETURNING *
            "#,
        )
        .bind(s.id)
        .bind(&s.user_id)
        .bind(s.platform.as_str())
        .bind(&s.original_url)
        .bind(&s.url_normalized)
        .bind(&s.post_key)
        .bind(s.status.as_str())
        .bind(&s.required_keywords)
        .bind(&s.missing_keywords)
        .bind(&s.matched_keywords)
        .bind(&s.post_text)
        .bind(s.likes)
        .bind(s.comments)
        .bind(s.shares)
        .bind(s.best_engagement_total)
        .bind(s.credit_awarded)
        .bind(s.credit_penalty)
        .bind(s.rescan_count)
        .bind(s.verified_at)
        .bind(s.last_attempt_at)
        .bind(&s.error_message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &s.post_key))?;

        debug!(submission_id = %row.id, status = %row.status, "Inserted submission");
        SocialSubmission::try_from(row)
    }

    async fn update(&self, s: &SocialSubmission) -> Result<SocialSubmission, StoreError> {
        // GREATEST/COALESCE keep best_engagement_total monotone and verified_at write-once
        // even if a caller hands in an older value.
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            UPDATE social_submissions SET
                status                = $2,
                missing_keywords      = $3,
                matched_keywords      = $4,
                post_text             = $5,
                likes                 = $6,
                comments              = $7,
                shares                = $8,
                best_engagement_total = GREATEST(best_engagement_total, $9),
                credit_awarded        = $10,
                credit_penalty        = $11,
                rescan_count          = $12,
                verified_at           = COALESCE(verified_at, $13),
                last_attempt_at       = $14,
                error_message         = $15,
                updated_at            = GREATEST(now(), updated_at + interval '1 microsecond')
            WHERE id = $1 AND updated_at = $16
            RETURNING *
            "#,
        )
        .bind(s.id)
        .bind(s.status.as_str())
        .bind(&s.missing_keywords)
        .bind(&s.matched_keywords)
        .bind(&s.post_text)
        .bind(s.likes)
        .bind(s.comments)
        .bind(s.shares)
        .bind(s.best_engagement_total)
        .bind(s.credit_awarded)
        .bind(s.credit_penalty)
        .bind(s.rescan_count)
        .bind(s.verified_at)
        .bind(s.last_attempt_at)
        .bind(&s.error_message)
        .bind(s.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => SocialSubmission::try_from(row),
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM social_submissions WHERE id = $1)",
                )
                .bind(s.id)
                .fetch_one(&self.pool)
                .await?;

                if exists {
                    Err(StoreError::StaleWrite(s.id))
                } else {
                    Err(StoreError::NotFound(s.id))
                }
            }
        }
    }

    async fn list_by_status(
        &self,
        status: SubmissionStatus,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM social_submissions
            WHERE status = $1
            ORDER BY last_attempt_at ASC NULLS FIRST, created_at ASC
            LIMIT $2
            "#,
        )
        .bind(status.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows_to_submissions(rows)
    }

    async fn list_rescannable(
        &self,
        max_rescans: i32,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM social_submissions
            WHERE status = 'VALIDATION_FAILED' AND rescan_count < $1
            ORDER BY last_attempt_at ASC NULLS FIRST, created_at ASC
            LIMIT $2
            "#,
        )
        .bind(max_rescans)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows_to_submissions(rows)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SocialSubmission>, StoreError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT * FROM social_submissions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows_to_submissions(rows)
    }
}
