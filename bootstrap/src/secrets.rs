// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Secret resolution.
//!
//! [`SecretResolver`] fetches the current version of a named secret from a
//! [`SecretStore`] and turns it into [`ConnectionCredentials`]. The payload is
//! validated before anything is returned, so partial credentials never reach a
//! connector.
//!
//! [`AwsSecretsManager`] is the production store. It builds a fresh client for
//! every call, pinned to the requested region, and always asks for the
//! `AWSCURRENT` version stage so that rotated credentials are picked up on the
//! next invocation. No retries are attempted here.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;

use crate::configuration::BootstrapOptions;
use crate::constants::SECRET_VERSION_STAGE;
use crate::errors::AppError;
use crate::models::{ConnectionCredentials, SecretPayload};

/// Error codes Secrets Manager returns when the caller's identity is not
/// allowed to read the secret or its encryption key.
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
];

/// Remote service holding versioned secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the string value of the version currently tagged `AWSCURRENT`.
    async fn current_secret(&self, name: &str, region: &str) -> Result<SecretPayload, AppError>;
}

/// Secrets Manager backed [`SecretStore`].
#[derive(Debug, Clone, Default)]
pub struct AwsSecretsManager {
    timeout: Option<Duration>,
}

impl AwsSecretsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies connect and operation timeouts to the SDK client.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Takes the SDK timeout from `options`. An unusable value leaves the
    /// client on SDK defaults; requests then fail on the same setting.
    pub fn from_options(options: &BootstrapOptions) -> Self {
        match options.secret_timeout() {
            Ok(timeout) => Self::with_timeout(timeout),
            Err(e) => {
                tracing::warn!(
                    "[bootstrap] {}, secret store client falls back to SDK timeouts",
                    e
                );
                Self::new()
            }
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn client(&self, region: &str) -> Client {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_owned()));
        if let Some(timeout) = self.timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(timeout)
                    .operation_timeout(timeout)
                    .build(),
            );
        }
        Client::new(&loader.load().await)
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    #[tracing::instrument(skip(self))]
    async fn current_secret(&self, name: &str, region: &str) -> Result<SecretPayload, AppError> {
        let client = self.client(region).await;

        let output = client
            .get_secret_value()
            .secret_id(name)
            .version_stage(SECRET_VERSION_STAGE)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        tracing::debug!(
            "[bootstrap] fetched secret version {:?}",
            output.version_id()
        );

        match output.secret_string() {
            Some(value) => Ok(SecretPayload::new(value)),
            None => {
                tracing::error!("[bootstrap] secret has no string value");
                Err(AppError::MalformedSecret)
            }
        }
    }
}

fn classify_sdk_error<R: std::fmt::Debug>(err: SdkError<GetSecretValueError, R>) -> AppError {
    match &err {
        SdkError::TimeoutError(_) => {
            tracing::error!("[bootstrap] secret fetch timed out");
            AppError::ConnectTimeout
        }
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            tracing::error!("[bootstrap] secret fetch timed out: {:?}", failure);
            AppError::ConnectTimeout
        }
        SdkError::DispatchFailure(failure) if failure.is_io() => {
            tracing::error!("[bootstrap] secret store unreachable: {:?}", failure);
            AppError::ConnectionRefused
        }
        SdkError::ServiceError(context) => classify_service_error(context.err()),
        other => {
            tracing::error!("[bootstrap] secret fetch failed: {:?}", other);
            AppError::SecretStoreUnavailable
        }
    }
}

fn classify_service_error(err: &GetSecretValueError) -> AppError {
    tracing::error!(
        "[bootstrap] secret store returned {:?}: {:?}",
        err.code(),
        err.message()
    );

    if err.is_resource_not_found_exception() {
        return AppError::SecretNotFound;
    }
    // KMS refused to decrypt the secret for this identity.
    if err.is_decryption_failure() {
        return AppError::AccessDenied;
    }
    match err.code() {
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => AppError::AccessDenied,
        _ => AppError::SecretStoreUnavailable,
    }
}

/// Resolves a named secret into connection credentials.
pub struct SecretResolver<'a> {
    store: &'a dyn SecretStore,
    deadline: Duration,
}

impl<'a> SecretResolver<'a> {
    pub fn new(store: &'a dyn SecretStore, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// Fetches the current secret value and deserializes it.
    ///
    /// # Errors
    ///
    /// - [`AppError::SecretNotFound`] - the name does not resolve
    /// - [`AppError::AccessDenied`] - the caller may not read the secret
    /// - [`AppError::MalformedSecret`] - the payload is not valid credentials
    /// - [`AppError::ConnectTimeout`] - the store did not answer within the deadline
    #[tracing::instrument(skip(self))]
    pub async fn resolve(
        &self,
        name: &str,
        region: &str,
    ) -> Result<ConnectionCredentials, AppError> {
        let payload =
            tokio::time::timeout(self.deadline, self.store.current_secret(name, region)).await??;

        let credentials = ConnectionCredentials::from_secret(&payload)?;

        tracing::debug!("[bootstrap] resolved credentials: {:?}", credentials);

        Ok(credentials)
    }
}
