//! Customer API handlers using repository pattern

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

pub async fn list_customers(
    State(state): State<AppState>,
    Query(filter): Query<PartyFilter>,
) -> impl IntoResponse {
    match state.customer_repo.find_all(filter).await {
        Ok(customers) => Json(json!({
            "total": customers.len(),
            "customers": customers
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_customer(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.customer_repo.find_by_id(&id).await {
        Ok(Some(customer)) => Json(json!({ "customer": customer })).into_response(),
        Ok(None) => DomainError::not_found("Customer", &id).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(post, path = "/api/customers", responses((status = 201, description = "Customer created")))]
pub async fn create_customer(
    State(state): State<AppState>,
    _claims: Claims,
    Json(input): Json<CreatePartyInput>,
) -> impl IntoResponse {
    match state.customer_repo.create(input).await {
        Ok(customer) => {
            state
                .journal(entity::CUSTOMER, &customer.id, ops::UPSERT, &customer)
                .await;
            (StatusCode::CREATED, Json(json!({ "customer": customer }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_customer(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
    Json(input): Json<UpdatePartyInput>,
) -> impl IntoResponse {
    match state.customer_repo.update(&id, input).await {
        Ok(customer) => {
            state
                .journal(entity::CUSTOMER, &customer.id, ops::UPSERT, &customer)
                .await;
            Json(json!({ "customer": customer })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn delete_customer(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.customer_repo.delete(&id).await {
        Ok(tombstone) => {
            state
                .journal(entity::CUSTOMER, &tombstone.id, ops::DELETE, &tombstone)
                .await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}
