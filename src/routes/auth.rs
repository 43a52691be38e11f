use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::AppendHeaders,
    routing::{get, post},
};

use crate::{
    dto::auth::{LoginRequest, LoginResponse, RegisterRequest, SessionInfo},
    error::AppResult,
    middleware::auth::{MaybeAuthUser, clear_session_cookie, session_cookie},
    models::User,
    response::ApiResponse,
    services::auth_service::{login_user, register_user, session_info},
    state::AppState,
};

type SetCookie = AppendHeaders<[(HeaderName, String); 1]>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register user", body = ApiResponse<User>),
        (status = 400, description = "Missing fields, invalid email or email taken")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user; also sets the session cookie", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(SetCookie, Json<ApiResponse<LoginResponse>>)> {
    let resp = login_user(&state, payload).await?;
    let cookie = resp
        .data
        .as_ref()
        .map(|login| session_cookie(&state.config, &login.token))
        .unwrap_or_else(|| clear_session_cookie(&state.config));
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Clears the session cookie")
    ),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
) -> (SetCookie, Json<ApiResponse<serde_json::Value>>) {
    (
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(&state.config))]),
        Json(ApiResponse::ok("Logged out", serde_json::json!({}))),
    )
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current session, `authenticated: false` for guests", body = ApiResponse<SessionInfo>)
    ),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
) -> AppResult<Json<ApiResponse<SessionInfo>>> {
    let resp = session_info(&state, &caller).await?;
    Ok(Json(resp))
}
