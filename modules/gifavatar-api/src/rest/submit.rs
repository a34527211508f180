use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::info;

use gifavatar_common::SocialPlatform;
use gifavatar_verifier::{NewSubmission, SubmitOutcome};

use super::{error_body, verify_error_response};
use crate::AppState;

const MAX_URL_LEN: usize = 2048;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    user_id: String,
    url: String,
    platform: Option<String>,
}

/// Check rate limit for an IP. Returns true if the request is allowed, false if rate-limited.
/// Prunes expired entries and records the new request if allowed.
pub fn check_rate_limit(entries: &mut Vec<Instant>, now: Instant, max_per_hour: usize) -> bool {
    let cutoff = now - Duration::from_secs(3600);
    entries.retain(|t| *t > cutoff);
    if entries.len() >= max_per_hour {
        return false;
    }
    entries.push(now);
    true
}

/// Prune empty entries from the rate limiter HashMap to prevent unbounded growth.
pub fn prune_empty_entries(limiter: &mut HashMap<IpAddr, Vec<Instant>>, now: Instant) {
    let cutoff = now - Duration::from_secs(3600);
    limiter.retain(|_, entries| {
        entries.retain(|t| *t > cutoff);
        !entries.is_empty()
    });
}

fn parse_platform(raw: Option<&str>) -> Result<Option<SocialPlatform>, String> {
    match raw.map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) => p.to_ascii_uppercase().parse().map(Some),
    }
}

pub async fn api_submit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<SubmitRequest>,
) -> impl IntoResponse {
    let url = body.url.trim().to_string();
    if url.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "url is required");
    }
    if url.len() > MAX_URL_LEN {
        return error_body(
            StatusCode::BAD_REQUEST,
            format!("URL too long (max {MAX_URL_LEN} characters)"),
        );
    }
    let user_id = body.user_id.trim().to_string();
    if user_id.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "userId is required");
    }
    let platform = match parse_platform(body.platform.as_deref()) {
        Ok(p) => p,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, e),
    };

    let ip = addr.ip();
    {
        let mut limiter = state.rate_limiter.lock().await;
        if limiter.len() > 1000 {
            prune_empty_entries(&mut limiter, Instant::now());
        }
        let entries = limiter.entry(ip).or_default();
        if !check_rate_limit(entries, Instant::now(), state.submissions_per_hour) {
            return error_body(
                StatusCode::TOO_MANY_REQUESTS,
                format!(
                    "Rate limit exceeded, max {} submissions per hour",
                    state.submissions_per_hour
                ),
            );
        }
    }

    let request = NewSubmission {
        user_id,
        url,
        platform,
    };
    match state.verifier.submit_and_verify(request).await {
        Ok(SubmitOutcome::Created(submission)) => {
            info!(
                submission_id = %submission.id,
                platform = %submission.platform,
                status = %submission.status,
                "Submission received"
            );
            (StatusCode::CREATED, Json(submission)).into_response()
        }
        Ok(SubmitOutcome::AlreadySubmitted(submission)) => {
            (StatusCode::OK, Json(submission)).into_response()
        }
        Err(e) => verify_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    use gifavatar_common::NormalizedUrl;
    use gifavatar_verifier::{
        EngagementFetcher, FetchError, MemorySubmissionStore, PostEngagement, Verifier,
    };

    // --- rate limiter tests ---

    #[test]
    fn rate_limit_allows_exactly_at_limit() {
        let mut entries = Vec::new();
        let now = Instant::now();
        for _ in 0..10 {
            assert!(check_rate_limit(&mut entries, now, 10));
        }
        assert_eq!(entries.len(), 10);
    }

    #[test]
    fn rate_limit_rejects_over_limit() {
        let mut entries = Vec::new();
        let now = Instant::now();
        for _ in 0..3 {
            assert!(check_rate_limit(&mut entries, now, 3));
        }
        assert!(!check_rate_limit(&mut entries, now, 3));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn rate_limit_expires_old_entries() {
        let now = Instant::now() + Duration::from_secs(7200);
        let old = now - Duration::from_secs(3601);
        let mut entries = vec![old; 10];
        assert!(check_rate_limit(&mut entries, now, 10));
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn prune_drops_idle_addresses() {
        let now = Instant::now() + Duration::from_secs(7200);
        let mut limiter = HashMap::new();
        limiter.insert(IpAddr::from([10, 0, 0, 1]), vec![now - Duration::from_secs(4000)]);
        limiter.insert(IpAddr::from([10, 0, 0, 2]), vec![now]);
        prune_empty_entries(&mut limiter, now);
        assert_eq!(limiter.len(), 1);
        assert!(limiter.contains_key(&IpAddr::from([10, 0, 0, 2])));
    }

    #[test]
    fn platform_is_parsed_case_insensitively() {
        assert_eq!(parse_platform(None), Ok(None));
        assert_eq!(parse_platform(Some("  ")), Ok(None));
        assert_eq!(parse_platform(Some("threads")), Ok(Some(SocialPlatform::Threads)));
        assert!(parse_platform(Some("myspace")).is_err());
    }

    // --- handler tests ---

    struct FixedFetcher(&'static str);

    #[async_trait]
    impl EngagementFetcher for FixedFetcher {
        async fn fetch(&self, _url: &NormalizedUrl) -> Result<PostEngagement, FetchError> {
            Ok(PostEngagement {
                post_text: self.0.to_string(),
                likes: 10,
                comments: 3,
                shares: 2,
            })
        }
    }

    fn app(post_text: &'static str, per_hour: usize) -> Router {
        let verifier = Verifier::builder()
            .repo(Arc::new(MemorySubmissionStore::new()))
            .fetcher(Arc::new(FixedFetcher(post_text)))
            .build();
        let state = Arc::new(AppState::new(verifier, per_hour));
        crate::router(state).layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 7], 4000))))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn submit_body(user: &str, url: &str) -> Option<serde_json::Value> {
        Some(serde_json::json!({ "userId": user, "url": url }))
    }

    #[tokio::test]
    async fn submit_verifies_inline_and_resubmit_returns_existing() {
        let app = app("see gifavatar.app", 10);

        let (status, created) = call(
            &app,
            "POST",
            "/api/submissions",
            submit_body("alice", "https://x.com/alice/status/123?s=20"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "VALIDATED");
        assert_eq!(created["platform"], "X");
        assert_eq!(created["urlNormalized"], "https://x.com/alice/status/123");
        assert_eq!(created["bestEngagementTotal"], 15);

        let (status, again) = call(
            &app,
            "POST",
            "/api/submissions",
            submit_body("alice", "https://x.com/alice/status/123"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["id"], created["id"]);

        let (status, dup) = call(
            &app,
            "POST",
            "/api/submissions",
            submit_body("bob", "https://twitter.com/alice/status/123"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(dup["status"], "DUPLICATE");

        let (status, dup_again) = call(
            &app,
            "POST",
            "/api/submissions",
            submit_body("bob", "https://x.com/i/web/status/123"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dup_again["id"], dup["id"]);
    }

    #[tokio::test]
    async fn bad_input_is_bad_request() {
        let app = app("see gifavatar.app", 10);

        let (status, body) = call(
            &app,
            "POST",
            "/api/submissions",
            submit_body("alice", "https://example.com/nope"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid URL format"));

        let (status, _) = call(
            &app,
            "POST",
            "/api/submissions",
            Some(serde_json::json!({
                "userId": "alice",
                "url": "https://x.com/alice/status/1",
                "platform": "LINKEDIN",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "POST", "/api/submissions", submit_body(" ", "https://x.com/a/status/1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submit_is_rate_limited_per_ip() {
        let app = app("see gifavatar.app", 1);

        let (status, _) = call(
            &app,
            "POST",
            "/api/submissions",
            submit_body("alice", "https://x.com/alice/status/1"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = call(
            &app,
            "POST",
            "/api/submissions",
            submit_body("alice", "https://x.com/alice/status/2"),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn detail_rescan_and_listing() {
        let app = app("no keyword here", 10);

        let (_, created) = call(
            &app,
            "POST",
            "/api/submissions",
            submit_body("alice", "https://x.com/alice/status/5"),
        )
        .await;
        assert_eq!(created["status"], "INVALID");
        assert_eq!(created["missingKeywords"], serde_json::json!(["gifavatar.app"]));
        let id = created["id"].as_str().unwrap().to_string();

        let (status, detail) = call(&app, "GET", &format!("/api/submissions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["id"], created["id"]);

        let (status, _) = call(&app, "POST", &format!("/api/submissions/{id}/rescan"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let missing = uuid::Uuid::new_v4();
        let (status, _) = call(&app, "GET", &format!("/api/submissions/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, listed) = call(&app, "GET", "/api/users/alice/submissions?limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn health_check() {
        let app = app("", 10);
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
