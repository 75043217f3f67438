use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::{
    auth::{
        accounts::RegisterInput,
        dto::{
            EmailRequest, LoginRequest, LoginResponse, MessageResponse, ProfileResponse,
            RegisterRequest, ResetPasswordRequest, TokenRequest, TokenStatusResponse,
            UpdateProfileRequest,
        },
        extractors::{cleared_session_cookie, session_cookie, session_token, CurrentUser},
        repo_types::Identity,
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset/:token", get(check_reset_token))
        .route("/auth/password/reset", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/users/me", get(get_profile).patch(update_profile))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Identity>)> {
    let identity = state
        .accounts
        .register(RegisterInput {
            email: payload.email,
            username: payload.username,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> AppResult<Json<Identity>> {
    let identity = state.accounts.verify_email(&payload.token).await?;
    Ok(Json(identity))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let message = state.accounts.resend_verification(&payload.email).await?;
    Ok(Json(MessageResponse { message }))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let out = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;
    let cookie = session_cookie(
        out.token,
        state.sessions.session_ttl(),
        state.config.auth.cookie_secure,
    );
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user: out.identity,
            expires_at: out.expires_at,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    let token = session_token(&headers);
    state.sessions.logout(token.as_deref()).await;
    (jar.remove(cleared_session_cookie()), StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let message = state.accounts.request_password_reset(&payload.email).await?;
    Ok(Json(MessageResponse { message }))
}

#[instrument(skip_all)]
pub async fn check_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<TokenStatusResponse>> {
    state.accounts.verify_reset_token(&token).await?;
    Ok(Json(TokenStatusResponse { valid: true }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .accounts
        .reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset. Please sign in again.",
    }))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn get_me(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> AppResult<Json<ProfileResponse>> {
    let user = state.accounts.profile(identity.id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let user = state
        .accounts
        .update_profile(identity.id, payload.first_name, payload.last_name)
        .await?;
    Ok(Json(user.into()))
}
