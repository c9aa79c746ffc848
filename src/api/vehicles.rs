use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::auth::Claims;
use crate::domain::{CreateVehicleInput, DomainError, UpdateVehicleInput, VehicleFilter};
use crate::infrastructure::AppState;
use crate::sync::{entity, ops};

pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(filter): Query<VehicleFilter>,
) -> impl IntoResponse {
    match state.vehicle_repo.find_all(filter).await {
        Ok(vehicles) => Json(json!({
            "total": vehicles.len(),
            "vehicles": vehicles
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_vehicle(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.vehicle_repo.find_by_id(&id).await {
        Ok(Some(vehicle)) => Json(json!({ "vehicle": vehicle })).into_response(),
        Ok(None) => DomainError::not_found("Vehicle", &id).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    _claims: Claims,
    Json(input): Json<CreateVehicleInput>,
) -> impl IntoResponse {
    match state.vehicle_repo.create(input).await {
        Ok(vehicle) => {
            state
                .journal(entity::VEHICLE, &vehicle.id, ops::UPSERT, &vehicle)
                .await;
            (StatusCode::CREATED, Json(json!({ "vehicle": vehicle }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
    Json(input): Json<UpdateVehicleInput>,
) -> impl IntoResponse {
    match state.vehicle_repo.update(&id, input).await {
        Ok(vehicle) => {
            state
                .journal(entity::VEHICLE, &vehicle.id, ops::UPSERT, &vehicle)
                .await;
            Json(json!({ "vehicle": vehicle })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

// Soft delete; deliveries already assigned keep their reference
pub async fn delete_vehicle(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.vehicle_repo.delete(&id).await {
        Ok(tombstone) => {
            state
                .journal(entity::VEHICLE, &tombstone.id, ops::DELETE, &tombstone)
                .await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}
