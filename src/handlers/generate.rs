use axum::{
    Json,
    body::Bytes,
    extract::{ConnectInfo, State},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::AppError;
use crate::metrics::REQUEST_TOTAL;
use crate::models::{GenerateRequest, GenerateResponse};
use crate::state::AppState;

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, AppError> {
    REQUEST_TOTAL.inc();

    // missing or non-string prompt ends up as MISSING_PROMPT in the gate
    let payload = GenerateRequest::from_body(&body);
    let prompt = payload.prompt.unwrap_or_default();
    let generation = state
        .gate
        .generate(addr.ip().to_canonical(), payload.token.as_deref(), &prompt)
        .await?;

    Ok(Json(GenerateResponse {
        success: true,
        count: generation.phrases.len(),
        phrases: generation.phrases,
        usage: generation.usage,
    }))
}
