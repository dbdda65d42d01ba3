// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::AppError;

/// Raw secret string as returned by the secret store.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretPayload(String);

impl SecretPayload {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretPayload").field(&"[REDACTED]").finish()
    }
}

/// Database connection credentials stored in the secret.
///
/// Produced fresh for every bootstrap invocation and never mutated after
/// deserialization.
#[derive(Clone, Deserialize, ZeroizeOnDrop)]
pub struct ConnectionCredentials {
    username: String,

    password: String,

    #[serde(default)]
    engine: Option<String>,

    host: String,

    port: u16,

    #[serde(rename = "ssl", default)]
    tls_enabled: Option<bool>,

    #[serde(rename = "dbClusterIdentifier", default)]
    cluster_identifier: Option<String>,
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCredentials")
            .field("username", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls_enabled", &self.tls_enabled)
            .field("cluster_identifier", &self.cluster_identifier)
            .finish()
    }
}

impl ConnectionCredentials {
    /// Parses and validates the secret payload.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::MalformedSecret`] if the payload is not JSON, a
    /// required field is missing or has the wrong type, or `username`,
    /// `password` or `host` is blank, or `port` is zero.
    pub fn from_secret(payload: &SecretPayload) -> Result<Self, AppError> {
        let credentials: Self = serde_json::from_str(payload.expose()).map_err(|e| {
            // serde messages can quote the offending value, so only the
            // category and position are logged.
            tracing::error!(
                "[bootstrap] secret payload rejected: {:?} error at line {} column {}",
                e.classify(),
                e.line(),
                e.column()
            );
            AppError::MalformedSecret
        })?;

        credentials.validate()?;

        Ok(credentials)
    }

    fn validate(&self) -> Result<(), AppError> {
        let blank = [
            ("username", self.username.trim().is_empty()),
            ("password", self.password.is_empty()),
            ("host", self.host.trim().is_empty()),
        ];
        if let Some((field, _)) = blank.iter().find(|(_, is_blank)| *is_blank) {
            tracing::error!("[bootstrap] secret field {} is empty", field);
            return Err(AppError::MalformedSecret);
        }
        if self.port == 0 {
            tracing::error!("[bootstrap] secret field port is zero");
            return Err(AppError::MalformedSecret);
        }
        Ok(())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn host(&self) -> &str {
        self.host.trim()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the secret declares that the backend requires TLS.
    ///
    /// `None` when the secret does not say.
    pub fn tls_enabled(&self) -> Option<bool> {
        self.tls_enabled
    }

    pub fn cluster_identifier(&self) -> Option<&str> {
        self.cluster_identifier.as_deref()
    }
}
