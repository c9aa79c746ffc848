//! Delivery API handlers
//!
//! Thin wrappers over `delivery_service`; in the client role each successful
//! call is journaled so the server replays the same workflow.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};

use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::delivery_service::{
    self, CreateDeliveryInput, DeliveryFilter, DeliveryItemInput, UpdateDeliveryInput,
    UpdateItemInput,
};
use crate::sync::{entity, ops};

pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(filter): Query<DeliveryFilter>,
) -> impl IntoResponse {
    match delivery_service::list_deliveries(state.db(), filter).await {
        Ok(deliveries) => Json(json!({
            "total": deliveries.len(),
            "deliveries": deliveries
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/deliveries/{id}",
    params(("id" = String, Path, description = "Delivery id")),
    responses(
        (status = 200, description = "Delivery with items"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_delivery(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match delivery_service::get_delivery(state.db(), &id).await {
        Ok(delivery) => Json(json!({ "delivery": delivery })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/deliveries",
    responses(
        (status = 201, description = "Delivery created"),
        (status = 400, description = "Invalid parties or items")
    )
)]
pub async fn create_delivery(
    State(state): State<AppState>,
    _claims: Claims,
    Json(input): Json<CreateDeliveryInput>,
) -> impl IntoResponse {
    match delivery_service::create_delivery(state.db(), input).await {
        Ok(created) => {
            state
                .journal(
                    entity::DELIVERY,
                    &created.delivery.id,
                    ops::UPSERT,
                    &created.delivery,
                )
                .await;
            for details in &created.items {
                state
                    .journal(
                        entity::DELIVERY_ITEM,
                        &details.item.id,
                        ops::UPSERT,
                        &details.item,
                    )
                    .await;
            }
            (StatusCode::CREATED, Json(json!({ "delivery": created }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_delivery(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
    Json(input): Json<UpdateDeliveryInput>,
) -> impl IntoResponse {
    match delivery_service::update_delivery(state.db(), &id, input).await {
        Ok(delivery) => {
            state
                .journal(entity::DELIVERY, &delivery.id, ops::UPSERT, &delivery)
                .await;
            Json(json!({ "delivery": delivery })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn delete_delivery(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match delivery_service::delete_delivery(state.db(), &id).await {
        Ok(tombstone) => {
            state
                .journal(entity::DELIVERY, &tombstone.id, ops::DELETE, &tombstone)
                .await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn add_item(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
    Json(input): Json<DeliveryItemInput>,
) -> impl IntoResponse {
    match delivery_service::add_item(state.db(), &id, input).await {
        Ok(item) => {
            state
                .journal(entity::DELIVERY_ITEM, &item.id, ops::UPSERT, &item)
                .await;
            (StatusCode::CREATED, Json(json!({ "item": item }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_item(
    State(state): State<AppState>,
    _claims: Claims,
    Path((id, item_id)): Path<(String, String)>,
    Json(input): Json<UpdateItemInput>,
) -> impl IntoResponse {
    match delivery_service::update_item(state.db(), &id, &item_id, input).await {
        Ok(item) => {
            state
                .journal(entity::DELIVERY_ITEM, &item.id, ops::UPSERT, &item)
                .await;
            Json(json!({ "item": item })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn remove_item(
    State(state): State<AppState>,
    _claims: Claims,
    Path((id, item_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match delivery_service::remove_item(state.db(), &id, &item_id).await {
        Ok(tombstone) => {
            state
                .journal(entity::DELIVERY_ITEM, &tombstone.id, ops::DELETE, &tombstone)
                .await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn dispatch_delivery(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match delivery_service::dispatch_delivery(state.db(), &id).await {
        Ok(delivery) => {
            state
                .journal(entity::DELIVERY, &delivery.id, ops::DISPATCH, &Value::Null)
                .await;
            Json(json!({ "delivery": delivery })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn cancel_delivery(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match delivery_service::cancel_delivery(state.db(), &id).await {
        Ok(delivery) => {
            state
                .journal(entity::DELIVERY, &delivery.id, ops::CANCEL, &Value::Null)
                .await;
            Json(json!({ "delivery": delivery })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Receive or ship the delivery and move stock
#[utoipa::path(
    post,
    path = "/api/deliveries/{id}/process",
    params(("id" = String, Path, description = "Delivery id")),
    responses(
        (status = 200, description = "Delivery completed, adjustments and alerts returned"),
        (status = 409, description = "Already processed or cancelled"),
        (status = 422, description = "Insufficient stock for an outgoing delivery")
    )
)]
pub async fn process_delivery(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match delivery_service::process_delivery(state.db(), &id, Some(claims.sub.clone())).await {
        Ok(processed) => {
            state
                .journal(
                    entity::DELIVERY,
                    &processed.delivery.id,
                    ops::PROCESS,
                    &json!({ "processed_by": claims.sub }),
                )
                .await;
            Json(json!(processed)).into_response()
        }
        Err(e) => e.into_response(),
    }
}
