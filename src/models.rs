use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::quota::QuotaRecord;

// Request bodies are read leniently: a missing body, a non-JSON body or a
// field of the wrong type all read as "field absent", so the handler answers
// with its own error code instead of a framework rejection.
fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn str_field(body: &Value, name: &str) -> Option<String> {
    body.get(name).and_then(Value::as_str).map(str::to_string)
}

// POST /api/login
pub struct LoginRequest {
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn from_body(body: &[u8]) -> Self {
        Self {
            password: str_field(&body_json(body), "password"),
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
}

// POST /api/logout - token may also come from the header
pub struct LogoutRequest {
    pub token: Option<String>,
}

impl LogoutRequest {
    pub fn from_body(body: &[u8]) -> Self {
        Self {
            token: str_field(&body_json(body), "token"),
        }
    }
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

// GET /api/usage?token=...
#[derive(Deserialize)]
pub struct UsageQuery {
    #[serde(default)]
    pub token: Option<String>,
}

// POST /api/generate-phrases
// a non-string token reads as no token, so the caller lands on the free tier
pub struct GenerateRequest {
    pub prompt: Option<String>,
    pub token: Option<String>,
}

impl GenerateRequest {
    pub fn from_body(body: &[u8]) -> Self {
        let json = body_json(body);
        Self {
            prompt: str_field(&json, "prompt"),
            token: str_field(&json, "token"),
        }
    }
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub phrases: Vec<String>,
    pub count: usize,
    pub usage: QuotaRecord,
}
