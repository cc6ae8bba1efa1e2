use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};

use super::decode::decode_time_entry;
use crate::error::ApiError;
use crate::routes::{extract::RecordId, fields};
use crate::state::AppState;

/// List all time entries
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let entries = state.store.list_time_entries().await?;
    Ok(Json(entries))
}

/// Log time against a todo
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let draft = decode_time_entry(&fields::parse_object(&body)?)?;

    let entry = state.store.insert_time_entry(draft).await?;
    tracing::info!(id = entry.id, todo = entry.todo, "time entry created");

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Get a single time entry by ID
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.store.get_time_entry(id).await?;
    Ok(Json(entry))
}

/// Replace a time entry
#[tracing::instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    state.store.get_time_entry(id).await?;

    let draft = decode_time_entry(&fields::parse_object(&body)?)?;
    let entry = state.store.update_time_entry(id, draft).await?;

    Ok(Json(entry))
}

/// Delete a time entry
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_time_entry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the time entries logged against a todo
#[tracing::instrument(skip(state))]
pub async fn list_by_todo(
    State(state): State<AppState>,
    RecordId(todo_id): RecordId,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.store.time_entries_for_todo(todo_id).await?;
    Ok(Json(entries))
}

/// Delete every time entry logged against a todo
#[tracing::instrument(skip(state))]
pub async fn delete_by_todo(
    State(state): State<AppState>,
    RecordId(todo_id): RecordId,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.store.delete_time_entries_for_todo(todo_id).await?;
    tracing::info!(todo_id, removed, "time entries deleted");

    Ok(StatusCode::NO_CONTENT)
}
