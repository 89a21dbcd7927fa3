//! Account endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Role, User, UserId};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::auth::CurrentCaller;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::parse_id;

/// Provisioning request from the authentication collaborator.
///
/// The credential is hashed before it reaches this service.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// POST /users
#[tracing::instrument(skip(state, payload))]
pub async fn register<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let Json(req) = payload?;
    let user = state
        .accounts
        .register(&req.name, &req.email, &req.password_hash)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User registered successfully", user.into())),
    ))
}

/// GET /users/me
pub async fn me<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.accounts.get_user(&caller, caller.user_id).await?;
    Ok(Json(ApiResponse::ok(
        "User retrieved successfully",
        user.into(),
    )))
}

/// GET /users (admin)
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let users = state.accounts.list_users(&caller).await?;
    Ok(Json(ApiResponse::ok(
        "Users retrieved successfully",
        users.into_iter().map(UserResponse::from).collect(),
    )))
}

/// GET /users/{id} (admin, or the account owner)
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user_id: UserId = parse_id("user", &id)?;
    let user = state.accounts.get_user(&caller, user_id).await?;
    Ok(Json(ApiResponse::ok(
        "User retrieved successfully",
        user.into(),
    )))
}

/// PUT /users/{id}/promote (admin)
#[tracing::instrument(skip(state, caller))]
pub async fn promote<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user_id: UserId = parse_id("user", &id)?;
    let user = state.accounts.promote_to_admin(&caller, user_id).await?;
    Ok(Json(ApiResponse::ok(
        "User promoted to admin successfully",
        user.into(),
    )))
}
