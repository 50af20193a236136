//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use forecast_core::clock::Clock;
use forecast_core::generator::NarrativeGenerator;
use forecast_core::rng::DeterministicRng;
use forecast_generation::application::poller::PollPolicy;
use forecast_snapshot_store::pg_snapshot_store::PgSnapshotStore;
use forecast_test_support::{FixedClock, ScriptedGenerator, SequenceRng};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use forecast_api::routes;
use forecast_api::state::AppState;

/// A complete turn: one news item and a two-topic vote.
pub const TURN_WITH_VOTE: &str = r#"{"events":[{"type":"news","date":{"year":2026,"month":4},"headline":"Lab announces frontier model"}],"vote":{"topics":[{"id":"compute","title":"Compute","options":[{"id":"cap","title":"Cap"},{"id":"defer","title":"Defer"}]},{"id":"treaty","title":"Treaty","options":[{"id":"sign","title":"Sign"},{"id":"stall","title":"Stall"}]}]},"phase":"Early Warning"}"#;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Build the full app router with a real `PgSnapshotStore`, deterministic
/// Clock/RNG and a generator that streams [`TURN_WITH_VOTE`].
///
/// The RNG counts upward, so clone the returned router rather than building a
/// second one against the same pool.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_generator(
        pool,
        Arc::new(ScriptedGenerator::from_lines(&[
            r#"{"events":[]}"#,
            TURN_WITH_VOTE,
        ])),
    )
}

/// Build the full app router around a custom generator.
pub fn build_test_app_with_generator(
    pool: PgPool,
    generator: Arc<dyn NarrativeGenerator>,
) -> Router {
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> =
        Arc::new(Mutex::new(SequenceRng::counting()));
    let poll_policy = PollPolicy {
        attempts: 3,
        interval: Duration::from_millis(10),
    };
    let app_state = AppState::new(
        fixed_clock(),
        rng,
        Arc::new(PgSnapshotStore::new(pool)),
        generator,
        16,
        poll_policy,
    );

    routes::router(app_state)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a POST to a generate endpoint and return the status, the
/// `x-snapshot-id` header and every NDJSON line of the body.
pub async fn post_ndjson(
    app: Router,
    uri: &str,
) -> (StatusCode, Option<String>, Vec<serde_json::Value>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let snapshot_id = response
        .headers()
        .get("x-snapshot-id")
        .map(|value| value.to_str().unwrap().to_owned());
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let lines = String::from_utf8(body_bytes.to_vec())
        .unwrap()
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).unwrap_or(serde_json::Value::Null))
        .collect();

    (status, snapshot_id, lines)
}
