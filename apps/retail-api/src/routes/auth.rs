//! Registration, login and session routes.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use retail_core::validation::{validate_email, validate_password, validate_person_name};
use retail_core::{Role, User};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::auth::{cleared_cookie, hash_password, session_cookie, verify_password, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// POST /auth/register - new customer account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    validate_person_name(&req.name)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    let hash = hash_password(&req.password)?;
    let user = state
        .db
        .users()
        .create(&req.name, &req.email, &hash, Role::Customer)
        .await
        .map_err(|e| {
            if e.is_unique_violation_on("email") {
                ApiError::conflict("Email is already registered")
            } else {
                e.into()
            }
        })?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login - token in the body and the session cookie.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let creds = state.db.users().find_credentials(&email).await?;

    let Some(creds) = creds.filter(|c| verify_password(&req.password, &c.password_hash)) else {
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    let token = state.jwt.generate(&creds.user)?;
    let cookie = session_cookie(
        &token,
        state.jwt.lifetime_secs(),
        state.config.is_production(),
    );

    info!(user_id = %creds.user.id, role = %creds.user.role, "User logged in");
    Ok((
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            token,
            user: creds.user,
        }),
    ))
}

/// POST /auth/logout - clears the session cookie.
async fn logout() -> impl IntoResponse {
    (
        [(SET_COOKIE, cleared_cookie())],
        Json(json!({ "message": "Logged out" })),
    )
}

/// GET /auth/me
async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<User>> {
    let profile = state
        .db
        .users()
        .get_by_id(&user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &user.id))?;
    Ok(Json(profile))
}
