//! API route groups

pub mod logs;
pub mod monitor;
pub mod nas;
pub mod vpn;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::server::{ApiError, ApiResult};

/// Path ids are positive integers
pub(crate) fn parse_id(raw: &str) -> ApiResult<i32> {
    match raw.trim().parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest("Invalid ID".to_string())),
    }
}

/// Unwrap a JSON body, turning axum's rejection into our error shape
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
