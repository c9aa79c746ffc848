//! Sync endpoints: push/pull on the server, status and manual trigger on devices

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::domain::DomainError;
use crate::infrastructure::AppState;
use crate::models::sync_state::LAST_PULLED_AT;
use crate::sync::{
    OperationStatus, PushRequest, PushResponse, SyncStatus, count_operations, get_state,
    processor,
};

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    pub since: Option<String>,
}

fn server_only(state: &AppState) -> Option<axum::response::Response> {
    if state.is_client() {
        return Some(
            DomainError::InvalidState("This instance is not a sync server".to_string())
                .into_response(),
        );
    }
    None
}

#[utoipa::path(
    post,
    path = "/api/sync/push",
    responses(
        (status = 200, description = "Per-operation results"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn push_operations(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<PushRequest>,
) -> impl IntoResponse {
    if let Some(response) = server_only(&state) {
        return response;
    }

    tracing::info!(
        "📥 {} pushed {} operation(s)",
        claims.sub,
        request.operations.len()
    );

    let ids: Vec<String> = request.operations.iter().map(|op| op.id.clone()).collect();
    let result = async {
        processor::store_operations(state.db(), &request.operations).await?;
        // Stored ops that could not be applied yet stay pending for the processor
        if let Err(e) = processor::drain(state.db()).await {
            tracing::warn!("Drain interrupted, leaving operations pending: {}", e);
        }
        processor::operation_results(state.db(), &ids).await
    }
    .await;

    match result {
        Ok(results) => Json(PushResponse { results }).into_response(),
        Err(e) => DomainError::from(e).into_response(),
    }
}

pub async fn pull_changes(
    State(state): State<AppState>,
    _claims: Claims,
    Query(query): Query<PullQuery>,
) -> impl IntoResponse {
    if let Some(response) = server_only(&state) {
        return response;
    }

    match processor::collect_changes(state.db(), query.since.as_deref()).await {
        Ok(changes) => Json(changes).into_response(),
        Err(e) => DomainError::from(e).into_response(),
    }
}

pub async fn sync_status(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(service) = &state.sync_service {
        return match service.status().await {
            Ok(status) => Json(status).into_response(),
            Err(e) => e.into_response(),
        };
    }

    let db = state.db();
    let status = async {
        Ok::<_, DomainError>(SyncStatus {
            role: state.config.sync_role.as_str().to_string(),
            pending_operations: count_operations(db, OperationStatus::Pending).await?,
            failed_operations: count_operations(db, OperationStatus::Failed).await?,
            last_pulled_at: get_state(db, LAST_PULLED_AT).await?,
            remote_url: None,
        })
    }
    .await;

    match status {
        Ok(status) => Json(status).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Run a push + pull right away (client role)
pub async fn run_sync(State(state): State<AppState>, _claims: Claims) -> impl IntoResponse {
    let Some(service) = state.sync_service.clone() else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "No remote server configured for this instance" })),
        )
            .into_response();
    };

    match service.sync().await {
        Ok(report) => Json(json!({ "report": report })).into_response(),
        Err(e) => e.into_response(),
    }
}
