// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers.
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | `/` | [`bootstrap`] | Authenticate to the document store |
//! | GET | `/redis` | [`cache`] | Ping the cache over TLS |
//! | GET | `/healthz` | [`healthz`] | Static liveness response |
//!
//! Every invocation starts from scratch: it builds its own trust context,
//! resolves its own credentials and opens its own connection. A failure at
//! any step ends the invocation with that step's [`AppError`], which is
//! rendered as an error response; it never takes the process down.

use std::sync::Arc;

use axum::extract::State;

use crate::application::AppState;
use crate::cache::{CacheConnector, CacheEndpoint};
use crate::constants::{BOOTSTRAP_SUCCESS_BODY, CACHE_SUCCESS_BODY, HEALTH_BODY};
use crate::datastore::DataStoreConnector;
use crate::errors::AppError;
use crate::secrets::SecretResolver;
use crate::trust::TrustContext;

/// Liveness endpoint. Does not touch any dependency.
pub async fn healthz() -> &'static str {
    HEALTH_BODY
}

/// Proves the service can authenticate to the document store.
///
/// # Request Flow
///
/// 1. Read the required settings
/// 2. Build the trust context from the CA bundle
/// 3. Resolve the current credentials from the secret store
/// 4. Connect over verified TLS and ping within the deadline
///
/// # Errors
///
/// Any [`AppError`] raised by the steps above.
#[tracing::instrument(skip(state))]
pub async fn bootstrap(State(state): State<Arc<AppState>>) -> Result<&'static str, AppError> {
    // 1. Settings are checked before any I/O happens
    let options = &state.options;
    let secret_name = options.secret_name()?;
    let region = options.region()?;
    let secret_timeout = options.secret_timeout()?;
    let connect_timeout = options.connect_timeout()?;

    // 2. Trust anchors are re-read on every call
    let trust = TrustContext::from_pem_file(options.ca_bundle()).await?;

    // 3. Fresh credentials, so a rotation is picked up on the next call
    let credentials = SecretResolver::new(state.secrets.as_ref(), secret_timeout)
        .resolve(secret_name, region)
        .await?;

    // 4. Connect and ping under a single deadline
    DataStoreConnector::new(state.documents.as_ref(), &options.replica_set, connect_timeout)
        .connect_and_ping(&credentials, &trust)
        .await?;

    tracing::info!("[bootstrap] document store authentication succeeded");

    Ok(BOOTSTRAP_SUCCESS_BODY)
}

/// Proves the service can reach the cache over TLS.
///
/// # Errors
///
/// - [`AppError::Configuration`] - the endpoint is missing or invalid
/// - any error from [`CacheConnector::ping`]
#[tracing::instrument(skip(state))]
pub async fn cache(State(state): State<Arc<AppState>>) -> Result<&'static str, AppError> {
    let options = &state.options;
    let endpoint: CacheEndpoint = options.cache_endpoint()?.parse()?;
    let connect_timeout = options.connect_timeout()?;

    let trust = match &options.cache_ca_bundle {
        Some(path) => TrustContext::from_pem_file(path).await?,
        None => TrustContext::webpki_roots(),
    };

    CacheConnector::new(trust, options.cache_min_tls, connect_timeout)
        .ping(&endpoint)
        .await?;

    Ok(CACHE_SUCCESS_BODY)
}
