// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Error taxonomy shared by every bootstrap path.
//!
//! Each variant maps to a stable kind string and an HTTP status. Messages are
//! fixed texts so that no credential, secret payload or connection string can
//! ever reach a response body. The underlying library errors are logged at the
//! point where they are classified.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("unable to read certificate bundle")]
    Io,
    #[error("certificate bundle contains no usable certificates")]
    TrustParse,
    #[error("secret not found")]
    SecretNotFound,
    #[error("access to secret denied")]
    AccessDenied,
    #[error("secret is not valid connection credentials")]
    MalformedSecret,
    #[error("connection timed out")]
    ConnectTimeout,
    #[error("authentication rejected by backend")]
    AuthenticationFailure,
    #[error("TLS verification failed")]
    TlsVerificationFailure,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("liveness probe rejected")]
    ProbeRejected,
    #[error("secret store unavailable")]
    SecretStoreUnavailable,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal server error")]
    InternalServerError,
}

impl AppError {
    /// Stable identifier reported to callers in the `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io => "IOError",
            Self::TrustParse => "TrustParseError",
            Self::SecretNotFound => "SecretNotFound",
            Self::AccessDenied => "AccessDenied",
            Self::MalformedSecret => "MalformedSecret",
            Self::ConnectTimeout => "ConnectTimeout",
            Self::AuthenticationFailure => "AuthenticationFailure",
            Self::TlsVerificationFailure => "TLSVerificationFailure",
            Self::ConnectionRefused => "ConnectionRefused",
            Self::ProbeRejected => "ProbeRejected",
            Self::SecretStoreUnavailable => "SecretStoreUnavailable",
            Self::Configuration(_) => "ConfigurationError",
            Self::InternalServerError => "InternalServerError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Io | Self::TrustParse | Self::Configuration(_) | Self::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ConnectTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::SecretNotFound
            | Self::AccessDenied
            | Self::MalformedSecret
            | Self::AuthenticationFailure
            | Self::TlsVerificationFailure
            | Self::ConnectionRefused
            | Self::ProbeRejected
            | Self::SecretStoreUnavailable => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        tracing::warn!("[bootstrap] request failed: {} ({})", self.kind(), self);

        let body = Json(json!({
            "code": status.as_u16(),
            "kind": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_source: tokio::time::error::Elapsed) -> Self {
        AppError::ConnectTimeout
    }
}
