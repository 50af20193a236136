//! Routes for creating games, answering votes and streaming generations.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, instrument};
use uuid::Uuid;

use forecast_core::error::DomainError;
use forecast_core::game::VoteChoices;
use forecast_core::snapshot::SnapshotId;
use forecast_generation::application::poller::poll_until_terminal;
use forecast_turns::application::command_handlers;
use forecast_turns::application::query_handlers::{
    SnapshotReadiness, SnapshotView, get_snapshot_by_id,
};
use forecast_turns::domain::commands;
use forecast_turns::domain::turn::{TurnOwner, turn_owner};

use crate::error::ApiError;
use crate::state::AppState;

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Header carrying the id of the snapshot a generation is filling.
pub const SNAPSHOT_ID_HEADER: &str = "x-snapshot-id";

/// Request body for POST /.
#[derive(Debug, Default, Deserialize)]
pub struct CreateGameRequest {
    /// Preset to play; omitted picks one at random.
    #[serde(default)]
    pub preset: Option<String>,
}

/// Request body for POST /{id}/choices.
#[derive(Debug, Deserialize)]
pub struct SubmitChoicesRequest {
    /// Topic id to option id.
    pub choices: VoteChoices,
}

/// Query string for GET /{id}.
#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    /// Poll until the snapshot leaves `generating` before answering.
    #[serde(default)]
    pub wait: bool,
}

/// Response body returned after a player command is handled.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// The snapshot written by the command.
    pub snapshot_id: SnapshotId,
    /// Who acts next on that snapshot.
    pub turn_owner: TurnOwner,
}

/// POST /
#[instrument(skip(state, request), fields(preset = ?request.preset))]
async fn create_game(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let command = commands::CreateGame {
        correlation_id: Uuid::new_v4(),
        preset_id: request.preset,
    };

    info!(correlation_id = %command.correlation_id, "handling create_game command");

    let result =
        command_handlers::handle_create_game(&command, &state.rng, &*state.snapshot_store).await?;

    Ok(Json(TurnResponse {
        turn_owner: turn_owner(&result.state),
        snapshot_id: result.snapshot_id,
    }))
}

/// GET /{id}
#[instrument(skip(state), fields(snapshot_id = %id))]
async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LookupParams>,
) -> Result<(StatusCode, Json<SnapshotView>), ApiError> {
    let snapshot_id = SnapshotId::new(id);

    if params.wait {
        let outcome =
            poll_until_terminal(&*state.snapshot_store, &snapshot_id, state.poll_policy).await?;
        info!(?outcome, "wait finished");
    }

    let view = get_snapshot_by_id(&snapshot_id, &*state.snapshot_store).await?;
    match view.status {
        SnapshotReadiness::Ready => Ok((StatusCode::OK, Json(view))),
        SnapshotReadiness::Generating => Ok((StatusCode::ACCEPTED, Json(view))),
        SnapshotReadiness::Failed => Err(ApiError(DomainError::GenerationFailed {
            snapshot_id,
            reason: "generation for this snapshot failed".to_owned(),
        })),
    }
}

/// POST /{id}/choices
#[instrument(skip(state, request), fields(snapshot_id = %id))]
async fn submit_choices(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SubmitChoicesRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let command = commands::SubmitPlayerChoices {
        correlation_id: Uuid::new_v4(),
        snapshot_id: SnapshotId::new(id),
        choices: request.choices,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_player_choices command");

    let result = command_handlers::handle_submit_player_choices(
        &command,
        &state.rng,
        &*state.snapshot_store,
    )
    .await?;

    Ok(Json(TurnResponse {
        turn_owner: turn_owner(&result.state),
        snapshot_id: result.snapshot_id,
    }))
}

/// POST /{id}/generate
///
/// Streams fragments as NDJSON while the generation runs. The last line is
/// the final object, or `{"error": ...}` if the generation failed. Closing
/// the connection early does not stop the generation.
#[instrument(skip(state), fields(source_id = %id))]
async fn generate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "handling generate request");

    let handle = state
        .coordinator
        .start_generation(&SnapshotId::new(id), correlation_id)
        .await?;

    let lines = ReceiverStream::new(handle.messages)
        .map(|message| Ok::<_, Infallible>(message.to_ndjson_line()));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE.as_str(), NDJSON_CONTENT_TYPE.to_owned()),
            (SNAPSHOT_ID_HEADER, handle.snapshot_id.to_string()),
        ],
        Body::from_stream(lines),
    )
        .into_response())
}

/// Returns the router for the games context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_game))
        .route("/{id}", get(get_game))
        .route("/{id}/choices", post(submit_choices))
        .route("/{id}/generate", post(generate))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use forecast_core::clock::Clock;
    use forecast_core::game::{GameEvent, GameState, Topic, TopicOption, VoteEvent};
    use forecast_core::generator::NarrativeGenerator;
    use forecast_core::rng::DeterministicRng;
    use forecast_core::snapshot::SnapshotStatus;
    use forecast_core::store::SnapshotStore;
    use forecast_generation::application::poller::PollPolicy;
    use forecast_test_support::{
        FailingSnapshotStore, FixedClock, InMemorySnapshotStore, ScriptedGenerator, SequenceRng,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const TURN_COMPLETE: &str = r#"{"events":[{"type":"news","date":{"year":2026,"month":3},"headline":"Compute caps proposed"}],"vote":{"topics":[{"id":"compute","title":"Compute","options":[{"id":"cap","title":"Cap"},{"id":"defer","title":"Defer"}]},{"id":"treaty","title":"Treaty","options":[{"id":"sign","title":"Sign"},{"id":"stall","title":"Stall"}]}]},"phase":"Early Warning"}"#;

    fn app_state_with(
        store: Arc<dyn SnapshotStore>,
        generator: Arc<dyn NarrativeGenerator>,
    ) -> AppState {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let rng: Arc<Mutex<dyn DeterministicRng + Send>> =
            Arc::new(Mutex::new(SequenceRng::counting()));
        let poll_policy = PollPolicy {
            attempts: 2,
            interval: Duration::from_millis(5),
        };
        AppState::new(clock, rng, store, generator, 8, poll_policy)
    }

    fn test_app_state(store: Arc<InMemorySnapshotStore>) -> AppState {
        app_state_with(
            store,
            Arc::new(ScriptedGenerator::from_lines(&[TURN_COMPLETE])),
        )
    }

    fn vote_state() -> GameState {
        let option = |id: &str| TopicOption {
            id: id.to_owned(),
            title: id.to_owned(),
            description: None,
        };
        let topic = |id: &str, a: &str, b: &str| Topic {
            id: id.to_owned(),
            title: id.to_owned(),
            description: None,
            options: vec![option(a), option(b)],
        };
        let mut state = GameState::new("slowTakeoff");
        state.events.push(GameEvent::Vote(VoteEvent {
            topics: vec![
                topic("compute", "cap", "defer"),
                topic("treaty", "sign", "stall"),
            ],
        }));
        state
    }

    fn post_request(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_game_returns_200_with_snapshot_id() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app
            .oneshot(post_request("/", &json!({ "preset": "slowTakeoff" })))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["snapshot_id"], "ABCDEF");
        assert_eq!(json["turn_owner"], "generator");
        let stored = store.get(&SnapshotId::new("ABCDEF")).unwrap();
        assert_eq!(stored.status, SnapshotStatus::Exists);
        assert_eq!(stored.preset_id, "slowTakeoff");
    }

    #[tokio::test]
    async fn test_create_game_without_preset_picks_one() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app.oneshot(post_request("/", &json!({}))).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_game_returns_400_for_unknown_preset() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app
            .oneshot(post_request("/", &json!({ "preset": "noSuchPreset" })))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "validation_error");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_create_game_returns_422_for_malformed_body() {
        // Arrange
        let app = router().with_state(test_app_state(Arc::new(InMemorySnapshotStore::new())));

        // Act
        let response = app
            .oneshot(post_request("/", &json!({ "preset": 5 })))
            .await
            .unwrap();

        // Assert: axum returns 422 for deserialization failures.
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_create_game_returns_500_when_store_fails() {
        // Arrange
        let app = router().with_state(app_state_with(
            Arc::new(FailingSnapshotStore),
            Arc::new(ScriptedGenerator::from_lines(&[])),
        ));

        // Act
        let response = app
            .oneshot(post_request("/", &json!({ "preset": "slowTakeoff" })))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "infrastructure_error");
    }

    #[tokio::test]
    async fn test_get_game_returns_200_for_ready_snapshot() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        let id = SnapshotId::new("vote01");
        store.create_ready(&id, &vote_state()).await.unwrap();
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app.oneshot(get_request("/vote01")).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ready");
        assert_eq!(json["turn_owner"], "player");
        assert_eq!(json["pending_vote"]["topics"][0]["id"], "compute");
        assert_eq!(json["state"]["presetId"], "slowTakeoff");
    }

    #[tokio::test]
    async fn test_get_game_returns_202_while_generating() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        store
            .create_reserved(&SnapshotId::new("pend01"), "slowTakeoff")
            .await
            .unwrap();
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app.oneshot(get_request("/pend01")).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        assert_eq!(json["status"], "generating");
        assert!(json.get("state").is_none());
    }

    #[tokio::test]
    async fn test_get_game_with_wait_returns_202_when_polling_times_out() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        store
            .create_reserved(&SnapshotId::new("pend02"), "slowTakeoff")
            .await
            .unwrap();
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app.oneshot(get_request("/pend02?wait=true")).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_get_game_returns_410_for_failed_snapshot() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        let id = SnapshotId::new("fail01");
        store.create_reserved(&id, "slowTakeoff").await.unwrap();
        store.mark_failed(&id).await.unwrap();
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app.oneshot(get_request("/fail01")).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(body_json(response).await["error"], "generation_failed");
    }

    #[tokio::test]
    async fn test_get_game_returns_404_for_unknown_snapshot() {
        // Arrange
        let app = router().with_state(test_app_state(Arc::new(InMemorySnapshotStore::new())));

        // Act
        let response = app.oneshot(get_request("/ghost1")).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "snapshot_not_found");
    }

    #[tokio::test]
    async fn test_submit_choices_returns_200_with_new_snapshot() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        store
            .create_ready(&SnapshotId::new("vote01"), &vote_state())
            .await
            .unwrap();
        let app = router().with_state(test_app_state(Arc::clone(&store)));
        let body = json!({ "choices": { "compute": "cap", "treaty": "sign" } });

        // Act
        let response = app
            .oneshot(post_request("/vote01/choices", &body))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["snapshot_id"], "ABCDEF");
        assert_eq!(json["turn_owner"], "generator");
        let stored = store.get(&SnapshotId::new("ABCDEF")).unwrap();
        let state = stored.state.unwrap();
        assert!(matches!(
            state.events.last(),
            Some(GameEvent::VoteChoices(answer)) if answer.choices["treaty"] == "sign"
        ));
    }

    #[tokio::test]
    async fn test_submit_choices_returns_409_when_not_players_turn() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        store
            .create_ready(&SnapshotId::new("new001"), &GameState::new("slowTakeoff"))
            .await
            .unwrap();
        let app = router().with_state(test_app_state(Arc::clone(&store)));
        let body = json!({ "choices": { "compute": "cap" } });

        // Act
        let response = app
            .oneshot(post_request("/new001/choices", &body))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "precondition_failed");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_streams_ndjson_and_finalizes_snapshot() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        store
            .create_ready(&SnapshotId::new("new001"), &GameState::new("slowTakeoff"))
            .await
            .unwrap();
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app
            .oneshot(post_request("/new001/generate", &json!({})))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            NDJSON_CONTENT_TYPE
        );
        assert_eq!(response.headers()[SNAPSHOT_ID_HEADER], "ABCDEF");

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body_bytes.to_vec()).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert!(!lines.is_empty());
        let last = lines.last().unwrap();
        assert_eq!(last["phase"], "Early Warning");
        assert!(last.get("error").is_none());

        let child = store.get(&SnapshotId::new("ABCDEF")).unwrap();
        assert_eq!(child.status, SnapshotStatus::Exists);
        assert_eq!(child.state.unwrap().phase, "Early Warning");
    }

    #[tokio::test]
    async fn test_generate_streams_error_line_when_no_valid_response() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        store
            .create_ready(&SnapshotId::new("new001"), &GameState::new("slowTakeoff"))
            .await
            .unwrap();
        let app = router().with_state(app_state_with(
            Arc::clone(&store) as Arc<dyn SnapshotStore>,
            Arc::new(ScriptedGenerator::from_lines(&["not json", r#"{"events":5}"#])),
        ));

        // Act
        let response = app
            .oneshot(post_request("/new001/generate", &json!({})))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body_bytes.to_vec()).unwrap();
        let last: Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
        assert!(last["error"].as_str().unwrap().contains("no valid response"));
        assert_eq!(
            store.get(&SnapshotId::new("ABCDEF")).unwrap().status,
            SnapshotStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_generate_returns_409_on_players_turn() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        store
            .create_ready(&SnapshotId::new("vote01"), &vote_state())
            .await
            .unwrap();
        let app = router().with_state(test_app_state(Arc::clone(&store)));

        // Act
        let response = app
            .oneshot(post_request("/vote01/generate", &json!({})))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(store.len(), 1);
    }
}
