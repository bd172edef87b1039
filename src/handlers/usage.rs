use axum::{
    Json,
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
};
use std::net::SocketAddr;
use std::sync::Arc;

use super::header_token;
use crate::models::UsageQuery;
use crate::quota::QuotaRecord;
use crate::state::AppState;

// Always 200; callers without a valid token see their IP's free usage
pub async fn usage_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<UsageQuery>,
) -> Json<QuotaRecord> {
    let token = header_token(&headers).or(query.token);
    Json(state.gate.usage(addr.ip().to_canonical(), token.as_deref()))
}
