use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};

use crate::auth::Claims;
use crate::infrastructure::AppState;
use crate::services::stock_service::{self, AdjustStockInput, AdjustmentFilter, AlertFilter};
use crate::sync::{entity, ops};

#[utoipa::path(
    post,
    path = "/api/stock/adjustments",
    responses(
        (status = 201, description = "Stock adjusted"),
        (status = 200, description = "Adjustment id already recorded, nothing moved"),
        (status = 422, description = "Stock would go negative")
    )
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    claims: Claims,
    Json(mut input): Json<AdjustStockInput>,
) -> impl IntoResponse {
    if input.adjusted_by.is_none() {
        input.adjusted_by = Some(claims.sub);
    }

    match stock_service::adjust_stock(state.db(), input.clone()).await {
        Ok(movement) => {
            if !movement.applied {
                return (StatusCode::OK, Json(json!(movement))).into_response();
            }
            input.id = Some(movement.adjustment.id.clone());
            state
                .journal(
                    entity::STOCK_ADJUSTMENT,
                    &movement.adjustment.id,
                    ops::ADJUST,
                    &input,
                )
                .await;
            (StatusCode::CREATED, Json(json!(movement))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn list_adjustments(
    State(state): State<AppState>,
    Query(filter): Query<AdjustmentFilter>,
) -> impl IntoResponse {
    match stock_service::list_adjustments(state.db(), filter).await {
        Ok(adjustments) => Json(json!({
            "total": adjustments.len(),
            "adjustments": adjustments
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(filter): Query<AlertFilter>,
) -> impl IntoResponse {
    match stock_service::list_alerts(state.db(), filter).await {
        Ok(alerts) => Json(json!({
            "total": alerts.len(),
            "alerts": alerts
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match stock_service::resolve_alert(state.db(), &id).await {
        Ok(alert) => {
            state
                .journal(entity::STOCK_ALERT, &alert.id, ops::RESOLVE, &Value::Null)
                .await;
            Json(json!({ "alert": alert })).into_response()
        }
        Err(e) => e.into_response(),
    }
}
