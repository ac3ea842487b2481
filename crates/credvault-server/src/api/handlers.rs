//! Route handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use credvault_core::{
    ActivityEntry, Credential, CredentialDraft, CredentialUpdate, UsageStats, ValidationResult,
    VaultError, VaultState,
};

use super::actor::RequestActor;
use super::error::ApiError;
use super::AppState;

/// Default page size for `/logs`
pub const DEFAULT_LOG_LIMIT: usize = 50;

type ApiResult<T> = Result<T, ApiError>;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let vault = match state.vault.state().await {
        VaultState::Open => "open",
        VaultState::Closed => "closed",
    };
    Json(json!({ "status": "ok", "vault": vault }))
}

pub async fn list_credentials(State(state): State<AppState>) -> ApiResult<Json<Vec<Credential>>> {
    let store = state.vault.store().await?;
    Ok(Json(store.list().await))
}

pub async fn create_credential(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(draft): Json<CredentialDraft>,
) -> ApiResult<(StatusCode, Json<Credential>)> {
    let store = state.vault.store().await?;
    let credential = store.create(draft, &actor).await?;
    Ok((StatusCode::CREATED, Json(credential)))
}

pub async fn get_credential(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Credential>> {
    let store = state.vault.store().await?;
    store
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| VaultError::NotFound(id.to_string()).into())
}

pub async fn update_credential(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
    Json(changes): Json<CredentialUpdate>,
) -> ApiResult<Json<Credential>> {
    let store = state.vault.store().await?;
    Ok(Json(store.update(id, changes, &actor).await?))
}

pub async fn delete_credential(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let store = state.vault.store().await?;
    store.delete(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct RevealResponse {
    pub id: Uuid,
    pub secret: String,
}

pub async fn reveal_credential(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RevealResponse>> {
    let store = state.vault.store().await?;
    match store.reveal(id, &actor).await? {
        Some(secret) => {
            debug!("Secret of {} revealed to {}", id, actor.user);
            Ok(Json(RevealResponse {
                id,
                secret: secret.expose().to_string(),
            }))
        }
        None => Err(ApiError::Unavailable),
    }
}

pub async fn validate_credential(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ValidationResult>> {
    let store = state.vault.store().await?;
    Ok(Json(store.validate(id, &actor).await?))
}

pub async fn test_credential(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let store = state.vault.store().await?;
    let connected = store.test_connection(id, &actor).await?;
    Ok(Json(json!({ "id": id, "connected": connected })))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub credential_id: Option<Uuid>,
    pub limit: Option<usize>,
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<ActivityEntry>>> {
    let store = state.vault.store().await?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Ok(Json(store.logs(query.credential_id, limit)))
}

pub async fn usage_stats(State(state): State<AppState>) -> ApiResult<Json<UsageStats>> {
    let store = state.vault.store().await?;
    Ok(Json(store.usage_stats().await))
}
