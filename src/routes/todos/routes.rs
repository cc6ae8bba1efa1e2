use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};

use super::decode::decode_todo;
use crate::error::ApiError;
use crate::routes::{extract::RecordId, fields};
use crate::state::AppState;

/// Todos whose notification falls within this window of "now" are surfaced.
pub const NOTIFY_LOOKAHEAD_MINUTES: i64 = 1;

/// List all todos
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let todos = state.store.list_todos().await?;
    Ok(Json(todos))
}

/// Create a new todo
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let draft = decode_todo(&fields::parse_object(&body)?)?;

    let todo = state.store.insert_todo(draft).await?;
    tracing::info!(id = todo.id, "todo created");

    Ok((StatusCode::CREATED, Json(todo)))
}

/// Get a single todo by ID
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<impl IntoResponse, ApiError> {
    let todo = state.store.get_todo(id).await?;
    Ok(Json(todo))
}

/// Replace every writable field of a todo
#[tracing::instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // An absent todo is reported before any problem with the body.
    state.store.get_todo(id).await?;

    let draft = decode_todo(&fields::parse_object(&body)?)?;
    let todo = state.store.update_todo(id, draft).await?;

    Ok(Json(todo))
}

/// Delete a todo (this will cascade delete its time entries)
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_todo(id).await?;
    tracing::info!(id, "todo deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Surface todos whose notification is due and mark them delivered.
///
/// Each todo is returned by at most one poll.
#[tracing::instrument(skip(state))]
pub async fn notify(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let threshold = Utc::now() + Duration::minutes(NOTIFY_LOOKAHEAD_MINUTES);

    let due = state.store.claim_due_notifications(threshold).await?;
    if !due.is_empty() {
        tracing::debug!(count = due.len(), %threshold, "notifications delivered");
    }

    Ok(Json(due))
}
