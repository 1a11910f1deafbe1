//! Admission endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::ratelimit::{Limits, RateLimiter};

/// Admission request from an endpoint handler.
#[derive(Debug, Deserialize)]
pub struct AdmitRequest {
    pub identifier: String,
    #[serde(default)]
    pub max_requests: Option<u32>,
    #[serde(default)]
    pub window_ms: Option<u64>,
}

/// Admission decision.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdmitResponse {
    pub allowed: bool,
    pub count: usize,
    pub max_requests: u32,
    pub window_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    #[serde(default)]
    pub window_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub identifier: String,
    pub count: usize,
    pub window_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Decide whether a request from `identifier` may proceed.
///
/// Answers 200 when admitted and 429 when over limit, with a `Retry-After`
/// header whenever a wait would help.
#[instrument(skip(limiter, req), fields(identifier = %req.identifier))]
pub async fn admit(
    State(limiter): State<Arc<RateLimiter>>,
    Json(req): Json<AdmitRequest>,
) -> impl IntoResponse {
    let defaults = limiter.limits();
    let limits = Limits::new(
        req.max_requests.unwrap_or(defaults.max_requests),
        req.window_ms.unwrap_or(defaults.window_ms),
    );

    let admission = limiter.check(&req.identifier, limits);
    let count = admission.count;

    let mut headers = HeaderMap::new();
    let (status, retry_after_ms) = if admission.admitted {
        debug!(count, "Request admitted");
        (StatusCode::OK, None)
    } else {
        let retry_after = admission.retry_after;
        if let Some(wait) = retry_after {
            // Whole seconds, rounded up so callers never retry early.
            let secs = wait.as_millis().div_ceil(1000);
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs as u64));
        }
        info!(
            count,
            max_requests = limits.max_requests,
            retry_after_ms = ?retry_after.map(|d| d.as_millis()),
            "Request rate limited"
        );
        (
            StatusCode::TOO_MANY_REQUESTS,
            retry_after.map(|d| d.as_millis() as u64),
        )
    };

    (
        status,
        headers,
        Json(AdmitResponse {
            allowed: admission.admitted,
            count,
            max_requests: limits.max_requests,
            window_ms: limits.window_ms,
            retry_after_ms,
        }),
    )
}

/// Report the live request count for `identifier`.
pub async fn count(
    State(limiter): State<Arc<RateLimiter>>,
    Path(identifier): Path<String>,
    Query(query): Query<CountQuery>,
) -> Json<CountResponse> {
    let window_ms = query.window_ms.unwrap_or(limiter.limits().window_ms);
    let count = limiter.count_with(&identifier, window_ms);

    Json(CountResponse {
        identifier,
        count,
        window_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::router;
    use crate::ratelimit::ManualClock;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<RateLimiter>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = Arc::new(RateLimiter::with_clock(Limits::default(), clock.clone()));
        (router(limiter.clone()), limiter, clock)
    }

    fn admit_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/admit")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = test_app();

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: HealthResponse = read_json(response).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.service, "visitguard");
    }

    #[tokio::test]
    async fn test_admit_then_reject() {
        let (app, _, clock) = test_app();

        for (i, t) in [0, 10, 20].into_iter().enumerate() {
            clock.set(t);
            let response = app
                .clone()
                .oneshot(admit_request(r#"{"identifier":"1.2.3.4"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body: AdmitResponse = read_json(response).await;
            assert!(body.allowed);
            assert_eq!(body.count, i + 1);
            assert_eq!(body.retry_after_ms, None);
        }

        clock.set(30);
        let response = app
            .clone()
            .oneshot(admit_request(r#"{"identifier":"1.2.3.4"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
        let body: AdmitResponse = read_json(response).await;
        assert!(!body.allowed);
        assert_eq!(body.count, 3);
        assert_eq!(body.max_requests, 3);
        assert_eq!(body.retry_after_ms, Some(59_970));
    }

    #[tokio::test]
    async fn test_admit_with_overrides() {
        let (app, limiter, _) = test_app();

        let response = app
            .clone()
            .oneshot(admit_request(
                r#"{"identifier":"5.6.7.8","max_requests":1,"window_ms":1000}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(admit_request(
                r#"{"identifier":"5.6.7.8","max_requests":1,"window_ms":1000}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: AdmitResponse = read_json(response).await;
        assert_eq!(body.window_ms, 1_000);
        assert_eq!(limiter.count_with("5.6.7.8", 1_000), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_has_no_retry_after() {
        let (app, _, _) = test_app();

        let response = app
            .oneshot(admit_request(r#"{"identifier":"a","max_requests":0}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
        let body: AdmitResponse = read_json(response).await;
        assert_eq!(body.retry_after_ms, None);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (app, limiter, _) = test_app();

        let response = app
            .oneshot(admit_request(r#"{"ident":"1.2.3.4"}"#))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(limiter.tracked_identifiers(), 0);
    }

    #[tokio::test]
    async fn test_count_endpoint() {
        let (app, limiter, clock) = test_app();

        limiter.admit("1.2.3.4");
        clock.set(30_000);
        limiter.admit("1.2.3.4");
        clock.set(70_000);

        let response = app
            .clone()
            .oneshot(Request::get("/v1/count/1.2.3.4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: CountResponse = read_json(response).await;
        assert_eq!(body.identifier, "1.2.3.4");
        assert_eq!(body.count, 1);
        assert_eq!(body.window_ms, 60_000);

        let response = app
            .oneshot(
                Request::get("/v1/count/1.2.3.4?window_ms=120000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: CountResponse = read_json(response).await;
        assert_eq!(body.count, 2);
    }
}
