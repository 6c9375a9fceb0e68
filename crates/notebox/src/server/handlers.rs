use axum::Json;
use serde_json::{Value, json};

use crate::error::AppError;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Not found")
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed("Method not allowed")
}
