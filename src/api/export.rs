use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;

use crate::services::report_service;

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename)
}

pub async fn inventory_summary(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match report_service::inventory_summary(&db).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Full JSON backup, served as a download
pub async fn export_data(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match report_service::export_backup(&db).await {
        Ok(backup) => {
            let filename = format!(
                "stockroute_backup_{}.json",
                chrono::Utc::now().format("%Y-%m-%d")
            );
            (
                StatusCode::OK,
                [(header::CONTENT_DISPOSITION, attachment(&filename))],
                Json(backup),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn export_stock_csv(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match report_service::export_stock_csv(&db).await {
        Ok(csv) => {
            let filename = format!("stock_{}.csv", chrono::Utc::now().format("%Y-%m-%d"));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, attachment(&filename)),
                ],
                csv,
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
