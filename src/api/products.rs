//! Product API handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::product_service::{
    self, CreateProductInput, ProductChange, ProductFilter, UpdateProductInput,
};
use crate::sync::{entity, ops};

async fn journal_change(state: &AppState, change: &ProductChange) {
    state
        .journal(entity::PRODUCT, &change.product.id, ops::UPSERT, &change.product)
        .await;
    if let Some(adjustment) = &change.adjustment {
        state
            .journal(entity::STOCK_ADJUSTMENT, &adjustment.id, ops::UPSERT, adjustment)
            .await;
    }
    if let Some(alert) = &change.alert {
        state
            .journal(entity::STOCK_ALERT, &alert.id, ops::UPSERT, alert)
            .await;
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> impl IntoResponse {
    match product_service::list_products(state.db(), filter).await {
        Ok(page) => Json(json!({
            "products": page.products,
            "total": page.total
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match product_service::get_product(state.db(), &id).await {
        Ok(product) => Json(json!({ "product": product })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/products",
    responses(
        (status = 201, description = "Product created"),
        (status = 409, description = "SKU already used")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    claims: Claims,
    Json(input): Json<CreateProductInput>,
) -> impl IntoResponse {
    match product_service::create_product(state.db(), input, Some(claims.sub)).await {
        Ok(change) => {
            journal_change(&state, &change).await;
            (StatusCode::CREATED, Json(json!(change))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_product(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
    Json(input): Json<UpdateProductInput>,
) -> impl IntoResponse {
    match product_service::update_product(state.db(), &id, input).await {
        Ok(change) => {
            journal_change(&state, &change).await;
            Json(json!(change)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn delete_product(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match product_service::delete_product(state.db(), &id).await {
        Ok(tombstone) => {
            state
                .journal(entity::PRODUCT, &tombstone.id, ops::DELETE, &tombstone)
                .await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}
