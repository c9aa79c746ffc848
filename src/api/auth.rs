use crate::auth::{Claims, create_jwt, hash_password, verify_password};
use crate::models::user::{self, Entity as User};
use crate::utils::now_timestamp;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

fn invalid_credentials() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Invalid credentials" })),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "JWT issued"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    tracing::info!("Login attempt for user: {}", payload.username);

    let user = match User::find()
        .filter(user::Column::Username.eq(&payload.username))
        .one(&db)
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            tracing::warn!("User not found: {}", payload.username);
            return invalid_credentials();
        }
        Err(e) => {
            tracing::error!("Login lookup failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response();
        }
    };

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => match create_jwt(&user.username, &user.role) {
            Ok(token) => {
                tracing::info!("Password verified successfully for user: {}", user.username);
                (
                    StatusCode::OK,
                    Json(json!({ "token": token, "role": user.role })),
                )
                    .into_response()
            }
            Err(e) => {
                tracing::error!("Cannot issue token: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Cannot issue token" })),
                )
                    .into_response()
            }
        },
        _ => {
            tracing::warn!("Password verification failed for user: {}", user.username);
            invalid_credentials()
        }
    }
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    username: String,
    password: String,
}

/// Create the first administrator. Refused once any user exists.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    responses(
        (status = 201, description = "Admin created"),
        (status = 409, description = "Users already exist")
    )
)]
pub async fn create_admin(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateUserRequest>,
) -> impl IntoResponse {
    let username = payload.username.trim().to_string();
    if username.is_empty() || payload.password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!(
                    "Username is required and the password needs at least {} characters",
                    MIN_PASSWORD_LEN
                )
            })),
        )
            .into_response();
    }

    match User::find().count(&db).await {
        Ok(0) => {}
        Ok(_) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "An administrator already exists" })),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("User count failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response();
        }
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Password hashing failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response();
        }
    };

    let now = now_timestamp();
    let user = user::ActiveModel {
        username: Set(username.clone()),
        password_hash: Set(password_hash),
        role: Set("admin".to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match user.insert(&db).await {
        Ok(_) => {
            tracing::info!("Administrator {} created", username);
            (
                StatusCode::CREATED,
                Json(json!({ "message": "Admin created" })),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_me(claims: Claims) -> impl IntoResponse {
    Json(json!({
        "username": claims.sub,
        "role": claims.role,
        "is_admin": claims.is_admin()
    }))
}
