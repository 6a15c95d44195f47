//! Unified application error model and its HTTP mapping.
//! Handlers return `AppResult<T>`; the error renders as `{"code": .., "message": ..}`
//! with the status from `http_status()`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt::{Display, Formatter};

use crate::storage::StoreError;

#[derive(Debug, Clone)]
pub enum AppError {
    UserInput { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Store { code: String, message: String },
    Config { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Store { code, .. }
            | AppError::Config { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Store { message, .. }
            | AppError::Config { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn store<S: Into<String>>(code: S, msg: S) -> Self { AppError::Store { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Store { .. } => 503,
            AppError::Config { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Encode(e) => AppError::user("invalid_document", e.to_string().as_str()),
            StoreError::Seed(msg) => AppError::config("invalid_seed", msg.as_str()),
            other => {
                tracing::error!(error = %other, "document store call failed");
                AppError::store("store_unavailable", "document store unavailable")
            }
        }
    }
}

/// Body rejections (bad JSON, wrong shape, missing content type) share the JSON error shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::user("invalid_body", rejection.body_text().as_str())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = self.code_str(), "request failed: {}", self.message());
        }
        (status, Json(serde_json::json!({ "code": self.code_str(), "message": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::auth("unauthorized", "no").http_status(), 401);
        assert_eq!(AppError::forbidden("forbidden", "not yours").http_status(), 403);
        assert_eq!(AppError::store("store_unavailable", "down").http_status(), 503);
        assert_eq!(AppError::config("missing_env", "no secret").http_status(), 500);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn display_joins_code_and_message() {
        assert_eq!(AppError::user("invalid_id", "bad id").to_string(), "invalid_id: bad id");
    }

    #[test]
    fn store_errors_map_by_kind() {
        let seed: AppError = StoreError::Seed("not an array".into()).into();
        assert_eq!(seed.http_status(), 500);
        assert_eq!(seed.code_str(), "invalid_seed");
        let other: AppError = StoreError::Unexpected("boom".into()).into();
        assert_eq!(other.http_status(), 503);
        assert_eq!(other.code_str(), "store_unavailable");
    }

    #[test]
    fn store_failure_message_hides_driver_detail() {
        let err: AppError = StoreError::Unexpected("server selection timeout: cluster0.abcde.mongodb.net:27017".into()).into();
        assert_eq!(err.message(), "document store unavailable");
        assert!(!err.to_string().contains("mongodb.net"));
    }

    #[tokio::test]
    async fn renders_json_body_with_status() {
        let resp = AppError::auth("unauthorized", "Unauthorized user").into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Unauthorized user");
        assert_eq!(body["code"], "unauthorized");
    }
}
