//! HTTP error mapping
//!
//! Caller-facing workflow errors keep their message. Collaborator failures
//! are logged in full and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use confrarias_common::Error;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Shown to the user for any failure they cannot act on
pub const GENERIC_ERROR_MESSAGE: &str = "Ocorreu um erro inesperado. Tenta novamente.";

/// Where unauthenticated callers are sent
pub const LOGIN_PATH: &str = "/login";

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Workflow error
    #[error(transparent)]
    Common(#[from] Error),

    /// Malformed request the workflows never see (400)
    #[error("Pedido inválido: {0}")]
    BadRequest(String),

    /// Extractor rejection that is not a payload error, e.g. a missing
    /// `Content-Type` or an oversized body
    #[error("Pedido rejeitado: {message}")]
    Rejected { status: StatusCode, message: String },
}

fn message(status: StatusCode, code: &str, message: String) -> Response {
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message,
        }
    }));
    (status, body).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(msg) => {
                return message(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg);
            }
            ApiError::Rejected { status, message: text } => {
                return message(status, "REJECTED", text);
            }
            ApiError::Common(err) => err,
        };

        if err.is_upstream() {
            error!(error = %err, "Request failed");
            return message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                GENERIC_ERROR_MESSAGE.to_string(),
            );
        }

        let text = err.to_string();
        match err {
            Error::NotAuthenticated => Redirect::to(LOGIN_PATH).into_response(),
            Error::NotAuthorized(_) => {
                warn!(error = %text, "Forbidden");
                message(StatusCode::FORBIDDEN, "NOT_AUTHORIZED", text)
            }
            Error::Validation(fields) => {
                let body = Json(json!({
                    "error": {
                        "code": "VALIDATION_ERROR",
                        "message": text,
                        "fields": fields,
                    }
                }));
                (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
            }
            Error::NotFound(_) => message(StatusCode::NOT_FOUND, "NOT_FOUND", text),
            Error::Conflict(_) => message(StatusCode::CONFLICT, "CONFLICT", text),
            Error::InUse { .. } => message(StatusCode::CONFLICT, "IN_USE", text),
            Error::InvalidTransition(_) => message(StatusCode::CONFLICT, "INVALID_TRANSITION", text),
            _ => message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                GENERIC_ERROR_MESSAGE.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::NotAuthorized("x".into()), StatusCode::FORBIDDEN),
            (Error::validation("name", "curto"), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("x".into()), StatusCode::CONFLICT),
            (Error::InvalidTransition("x".into()), StatusCode::CONFLICT),
            (Error::Upstream("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_not_authenticated_redirects_to_login() {
        let response = ApiError::from(Error::NotAuthenticated).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], LOGIN_PATH);
    }
}
