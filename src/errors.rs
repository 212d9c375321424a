// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The closed error taxonomy from `spec.md` §7, and its mapping onto HTTP
//! status codes / WebSocket close codes at the boundary.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

/// Errors raised by the [`crate::storage::PersistenceGateway`]. Every
/// operation returns this same closed set; no operation invents its own
/// variant.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("entity not found")]
    NotFound,
    #[error("entity already exists")]
    AlreadyExists,
    #[error("conflicting state")]
    Conflict,
    #[error("permission denied")]
    PermissionDenied,
    #[error("storage failure: {0}")]
    Storage(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => GatewayError::NotFound,
            other => GatewayError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Storage(e.to_string())
    }
}

/// Outcome of [`crate::auth::AuthVerifier::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid,
    Invalid,
    Suspended,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth service unreachable: {0}")]
    TransportError(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::TransportError(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push gateway unreachable: {0}")]
    TransportError(String),
}

impl From<reqwest::Error> for PushError {
    fn from(e: reqwest::Error) -> Self {
        PushError::TransportError(e.to_string())
    }
}

/// The top-level boundary error every HTTP handler returns. Maps 1:1 onto
/// the taxonomy in `spec.md` §7.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotFound => ApiError::NotFound,
            GatewayError::AlreadyExists => ApiError::Conflict,
            GatewayError::Conflict => ApiError::Conflict,
            GatewayError::PermissionDenied => ApiError::Forbidden,
            GatewayError::Storage(msg) => ApiError::Storage(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::TransportError(msg) => ApiError::TransportError(msg),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::TransportError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "message": self.to_string(),
        }))
    }
}
