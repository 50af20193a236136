//! Integration tests for `PgSnapshotStore`.

use chrono::{TimeZone, Utc};
use forecast_core::error::DomainError;
use forecast_core::game::{
    CURRENT_VERSION, GameDate, GameEvent, GameOverEvent, GameState, NewsEvent, Outcome,
};
use forecast_core::snapshot::{GameEnding, SnapshotId, SnapshotStatus};
use forecast_core::store::SnapshotStore;
use forecast_snapshot_store::pg_snapshot_store::PgSnapshotStore;
use sqlx::PgPool;

/// Helper to build a state with one news headline.
fn make_state(headline: &str) -> GameState {
    let mut state = GameState::new("slowTakeoff");
    state.events.push(GameEvent::News(NewsEvent {
        date: GameDate {
            year: 2026,
            month: 6,
        },
        headline: headline.to_owned(),
        description: Some("details".to_owned()),
        hidden: None,
    }));
    state
}

// --- create_ready + load ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_ready_and_load_round_trip(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("abc123");
    let state = make_state("Compute caps announced");

    store.create_ready(&id, &state).await.unwrap();

    let loaded = store.load(&id).await.unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.version, CURRENT_VERSION);
    assert_eq!(loaded.preset_id, "slowTakeoff");
    assert_eq!(loaded.status, SnapshotStatus::Exists);
    assert_eq!(loaded.state, Some(state));
    assert!(loaded.ended_at.is_none());
    assert!(loaded.outcome.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_load_returns_not_found_for_unknown_id(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("nope00");

    let result = store.load(&id).await;

    match result.unwrap_err() {
        DomainError::NotFound(missing) => assert_eq!(missing, id),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

// --- create_reserved ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_reserved_has_no_state(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("res001");

    store.create_reserved(&id, "fastTakeoff").await.unwrap();

    let loaded = store.load(&id).await.unwrap();
    assert_eq!(loaded.status, SnapshotStatus::Reserved);
    assert_eq!(loaded.preset_id, "fastTakeoff");
    assert!(loaded.state.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_reserved_conflicts_on_duplicate_id(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("dup001");
    store.create_reserved(&id, "slowTakeoff").await.unwrap();

    let result = store.create_reserved(&id, "slowTakeoff").await;

    assert!(matches!(result, Err(DomainError::Conflict { .. })));
}

// --- finalize ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_finalize_moves_reserved_to_exists_with_ending(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("fin001");
    let mut state = make_state("Treaty signed");
    state.events.push(GameEvent::GameOver(GameOverEvent {
        outcome: Outcome::Utopia,
    }));
    state.is_game_over = true;
    let ended_at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    store.create_reserved(&id, "slowTakeoff").await.unwrap();

    store
        .finalize(
            &id,
            &state,
            Some(GameEnding {
                ended_at,
                outcome: Outcome::Utopia,
            }),
        )
        .await
        .unwrap();

    let loaded = store.load(&id).await.unwrap();
    assert_eq!(loaded.status, SnapshotStatus::Exists);
    assert_eq!(loaded.state, Some(state));
    assert_eq!(loaded.ended_at, Some(ended_at));
    assert_eq!(loaded.outcome, Some(Outcome::Utopia));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_finalize_is_idempotent_for_identical_state(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("fin002");
    let state = make_state("Same payload");
    store.create_reserved(&id, "slowTakeoff").await.unwrap();
    store.finalize(&id, &state, None).await.unwrap();

    let result = store.finalize(&id, &state, None).await;

    assert!(result.is_ok());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_finalize_conflicts_for_different_state(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("fin003");
    store.create_reserved(&id, "slowTakeoff").await.unwrap();
    store
        .finalize(&id, &make_state("first"), None)
        .await
        .unwrap();

    let result = store.finalize(&id, &make_state("second"), None).await;

    assert!(matches!(result, Err(DomainError::Conflict { .. })));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_finalize_after_failure_conflicts(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("fin004");
    store.create_reserved(&id, "slowTakeoff").await.unwrap();
    store.mark_failed(&id).await.unwrap();

    let result = store.finalize(&id, &make_state("late"), None).await;

    assert!(matches!(result, Err(DomainError::Conflict { .. })));
    let loaded = store.load(&id).await.unwrap();
    assert_eq!(loaded.status, SnapshotStatus::Failed);
}

// --- mark_failed ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_mark_failed_is_terminal_and_repeatable(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("fail01");
    store.create_reserved(&id, "slowTakeoff").await.unwrap();

    store.mark_failed(&id).await.unwrap();
    store.mark_failed(&id).await.unwrap();

    let loaded = store.load(&id).await.unwrap();
    assert_eq!(loaded.status, SnapshotStatus::Failed);
    assert!(loaded.state.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_mark_failed_on_ready_snapshot_conflicts(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let id = SnapshotId::new("fail02");
    store.create_ready(&id, &make_state("done")).await.unwrap();

    let result = store.mark_failed(&id).await;

    assert!(matches!(result, Err(DomainError::Conflict { .. })));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_mark_failed_unknown_id_is_not_found(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);

    let result = store.mark_failed(&SnapshotId::new("ghost1")).await;

    assert!(matches!(result, Err(DomainError::NotFound(_))));
}

// --- versioning ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_load_skips_state_decoding_for_other_versions(pool: PgPool) {
    sqlx::query(
        "INSERT INTO snapshots (id, version, preset_id, status, state) \
         VALUES ('old001', 0, 'slowTakeoff', 'exists', '{\"legacy\": true}')",
    )
    .execute(&pool)
    .await
    .unwrap();
    let store = PgSnapshotStore::new(pool);

    let loaded = store.load(&SnapshotId::new("old001")).await.unwrap();

    assert_eq!(loaded.version, 0);
    assert!(loaded.state.is_none());
}
