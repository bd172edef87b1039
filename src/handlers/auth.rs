use axum::{
    Json,
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use super::header_token;
use crate::error::AppError;
use crate::metrics::{ACTIVE_SESSIONS, LOGIN_FAILURES};
use crate::models::{LoginRequest, LoginResponse, LogoutRequest, LogoutResponse};
use crate::session::fingerprint;
use crate::state::AppState;

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<LoginResponse>, AppError> {
    let payload = LoginRequest::from_body(&body);
    let accepted = payload
        .password
        .as_deref()
        .is_some_and(|password| state.verify_password(password));
    if !accepted {
        LOGIN_FAILURES.inc();
        warn!(ip = %addr.ip(), "login rejected: incorrect password");
        return Err(AppError::InvalidPassword);
    }

    let token = state.sessions.issue();
    ACTIVE_SESSIONS.set(state.sessions.len() as f64);
    info!(ip = %addr.ip(), session = %fingerprint(&token), "login succeeded");

    Ok(Json(LoginResponse {
        success: true,
        token,
    }))
}

// Token comes from the header, or from an optional JSON body
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LogoutResponse>, AppError> {
    let token = header_token(&headers)
        .or(LogoutRequest::from_body(&body).token)
        .ok_or(AppError::InvalidSession)?;

    if !state.sessions.invalidate(&token) {
        return Err(AppError::InvalidSession);
    }
    ACTIVE_SESSIONS.set(state.sessions.len() as f64);
    info!(session = %fingerprint(&token), "logged out");

    Ok(Json(LogoutResponse { success: true }))
}
