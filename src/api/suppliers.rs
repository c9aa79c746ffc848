//! Supplier API handlers using repository pattern

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::auth::Claims;
use crate::domain::{CreatePartyInput, DomainError, PartyFilter, UpdatePartyInput};
use crate::infrastructure::AppState;
use crate::sync::{entity, ops};

pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(filter): Query<PartyFilter>,
) -> impl IntoResponse {
    match state.supplier_repo.find_all(filter).await {
        Ok(suppliers) => Json(json!({
            "total": suppliers.len(),
            "suppliers": suppliers
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_supplier(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.supplier_repo.find_by_id(&id).await {
        Ok(Some(supplier)) => Json(json!({ "supplier": supplier })).into_response(),
        Ok(None) => DomainError::not_found("Supplier", &id).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(post, path = "/api/suppliers", responses((status = 201, description = "Supplier created")))]
pub async fn create_supplier(
    State(state): State<AppState>,
    _claims: Claims,
    Json(input): Json<CreatePartyInput>,
) -> impl IntoResponse {
    match state.supplier_repo.create(input).await {
        Ok(supplier) => {
            state
                .journal(entity::SUPPLIER, &supplier.id, ops::UPSERT, &supplier)
                .await;
            (StatusCode::CREATED, Json(json!({ "supplier": supplier }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_supplier(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
    Json(input): Json<UpdatePartyInput>,
) -> impl IntoResponse {
    match state.supplier_repo.update(&id, input).await {
        Ok(supplier) => {
            state
                .journal(entity::SUPPLIER, &supplier.id, ops::UPSERT, &supplier)
                .await;
            Json(json!({ "supplier": supplier })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.supplier_repo.delete(&id).await {
        Ok(tombstone) => {
            state
                .journal(entity::SUPPLIER, &tombstone.id, ops::DELETE, &tombstone)
                .await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}
