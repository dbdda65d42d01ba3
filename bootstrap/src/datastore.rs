// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Document store connection and liveness check.
//!
//! [`DataStoreConnector`] turns resolved [`ConnectionCredentials`] into a
//! [`ConnectionUri`] and asks a [`DocumentStore`] to open a verified session
//! and ping it. The whole connect-and-ping sequence runs under one deadline.
//!
//! # Connection string
//!
//! ```text
//! mongodb://<user>:<password>@<host>:<port>/?tls=true&replicaSet=rs0&readPreference=secondaryPreferred
//! ```
//!
//! User name and password are percent-encoded so that reserved characters
//! (`@`, `:`, `/`, `%`, ...) survive a round trip through a URI parser.

use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Tls, TlsOptions};
use mongodb::Client;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{
    APP_NAME, DOCUMENT_DB_PING_DATABASE, DOCUMENT_DB_READ_PREFERENCE, DOCUMENT_DB_SCHEME,
    DRIVER_TIMEOUT_MARGIN_DIVISOR,
};
use crate::errors::AppError;
use crate::models::ConnectionCredentials;
use crate::tls;
use crate::trust::TrustContext;

/// Everything except RFC 3986 unreserved characters is escaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// MongoDB server error code for a failed SASL conversation.
const AUTHENTICATION_FAILED_CODE: i32 = 18;

const REDACTED_PASSWORD: &str = "****";

/// Connection string carrying credentials.
///
/// The raw string is only reachable through [`expose`](Self::expose);
/// `Debug` and `Display` print a copy with the password masked.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ConnectionUri {
    raw: String,
    redacted: String,
}

impl ConnectionUri {
    /// Builds the replica-set connection string for `credentials`.
    pub fn build(credentials: &ConnectionCredentials, replica_set: &str) -> Self {
        let user = utf8_percent_encode(credentials.username(), URI_COMPONENT).to_string();
        let password = utf8_percent_encode(credentials.password(), URI_COMPONENT).to_string();
        let host = format_host(credentials.host());
        let query = format!(
            "tls=true&replicaSet={}&readPreference={}",
            utf8_percent_encode(replica_set, URI_COMPONENT),
            DOCUMENT_DB_READ_PREFERENCE
        );
        let port = credentials.port();

        Self {
            raw: format!("{DOCUMENT_DB_SCHEME}://{user}:{password}@{host}:{port}/?{query}"),
            redacted: format!(
                "{DOCUMENT_DB_SCHEME}://{user}:{REDACTED_PASSWORD}@{host}:{port}/?{query}"
            ),
        }
    }

    pub fn expose(&self) -> &str {
        &self.raw
    }

    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

impl fmt::Debug for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionUri").field(&self.redacted).finish()
    }
}

impl fmt::Display for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

// IPv6 literals need brackets in the authority section.
fn format_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// Document database reachable through a connection string.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a TLS session verified against `trust`, authenticates, and issues
    /// a single ping. No connection may outlive the call.
    async fn ping(
        &self,
        uri: &ConnectionUri,
        trust: &TrustContext,
        deadline: Duration,
    ) -> Result<(), AppError>;
}

/// [`DocumentStore`] speaking the MongoDB wire protocol (Amazon DocumentDB).
#[derive(Debug, Clone, Default)]
pub struct MongoDocumentStore;

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    #[tracing::instrument(skip(self, trust))]
    async fn ping(
        &self,
        uri: &ConnectionUri,
        trust: &TrustContext,
        deadline: Duration,
    ) -> Result<(), AppError> {
        let mut options = ClientOptions::parse(uri.expose())
            .await
            .map_err(classify_mongo_error)?;

        let mut tls_options = TlsOptions::default();
        tls_options.ca_file_path = trust.source().map(Path::to_path_buf);
        options.tls = Some(Tls::Enabled(tls_options));
        // The driver only reports why a server was unusable once server
        // selection gives up, so it has to give up before `deadline` does.
        let driver_timeout = driver_timeout(deadline);
        options.connect_timeout = Some(driver_timeout);
        options.server_selection_timeout = Some(driver_timeout);
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options).map_err(classify_mongo_error)?;

        let result = client
            .database(DOCUMENT_DB_PING_DATABASE)
            .run_command(doc! { "ping": 1 })
            .await;

        client.shutdown().await;

        result.map(|_| ()).map_err(classify_mongo_error)
    }
}

/// Share of the caller's deadline the driver may spend selecting a server.
fn driver_timeout(deadline: Duration) -> Duration {
    deadline.saturating_sub(deadline / DRIVER_TIMEOUT_MARGIN_DIVISOR)
}

fn classify_mongo_error(err: mongodb::error::Error) -> AppError {
    match err.kind.as_ref() {
        ErrorKind::Authentication { .. } => {
            tracing::error!("[bootstrap] document store rejected credentials");
            AppError::AuthenticationFailure
        }
        ErrorKind::Command(command) if command.code == AUTHENTICATION_FAILED_CODE => {
            tracing::error!("[bootstrap] document store rejected credentials");
            AppError::AuthenticationFailure
        }
        ErrorKind::Io(io) => {
            tracing::error!("[bootstrap] document store i/o error: {}", io);
            classify_io_error(io)
        }
        ErrorKind::ServerSelection { message, .. } => {
            tracing::error!("[bootstrap] document store server selection failed: {}", message);
            classify_selection_message(message)
        }
        ErrorKind::DnsResolve { message, .. } => {
            tracing::error!("[bootstrap] document store host did not resolve: {}", message);
            AppError::ConnectionRefused
        }
        // Parse errors may quote the connection string.
        ErrorKind::InvalidArgument { .. } => {
            tracing::error!("[bootstrap] connection string rejected by driver");
            AppError::MalformedSecret
        }
        _ => {
            tracing::error!("[bootstrap] document store error: {}", err);
            AppError::ProbeRejected
        }
    }
}

fn classify_io_error(err: &io::Error) -> AppError {
    if tls::rustls_error(err).is_some() {
        return AppError::TlsVerificationFailure;
    }
    match err.kind() {
        io::ErrorKind::TimedOut => AppError::ConnectTimeout,
        _ => AppError::ConnectionRefused,
    }
}

/// Server selection failures wrap the last error seen for each server in
/// their message; the driver only exposes it as text.
fn classify_selection_message(message: &str) -> AppError {
    let errors = server_errors(message);
    if errors.contains("connection refused") {
        AppError::ConnectionRefused
    } else if errors.contains("timed out") {
        AppError::ConnectTimeout
    } else if errors.contains("authentication") {
        AppError::AuthenticationFailure
    } else if ["certificate", "tls", "handshake", "unknownissuer"]
        .iter()
        .any(|needle| errors.contains(needle))
    {
        AppError::TlsVerificationFailure
    } else {
        AppError::ConnectTimeout
    }
}

/// Collects the `Error:` entries of a topology description, leaving out the
/// server addresses so host names cannot match an error needle.
fn server_errors(message: &str) -> String {
    message
        .split("Error:")
        .skip(1)
        .map(|tail| {
            let end = [tail.find("labels:"), tail.find('}')]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(tail.len());
            tail[..end].to_ascii_lowercase()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Validates document store connectivity for one set of credentials.
pub struct DataStoreConnector<'a> {
    store: &'a dyn DocumentStore,
    replica_set: &'a str,
    deadline: Duration,
}

impl<'a> DataStoreConnector<'a> {
    pub fn new(store: &'a dyn DocumentStore, replica_set: &'a str, deadline: Duration) -> Self {
        Self {
            store,
            replica_set,
            deadline,
        }
    }

    /// Builds the connection string, then connects and pings within the deadline.
    ///
    /// # Errors
    ///
    /// - [`AppError::ConnectTimeout`] - the sequence did not finish in time
    /// - [`AppError::AuthenticationFailure`] - the backend rejected the credentials
    /// - [`AppError::TlsVerificationFailure`] - the server failed verification
    /// - [`AppError::ConnectionRefused`] - the host could not be reached
    #[tracing::instrument(skip(self, credentials, trust))]
    pub async fn connect_and_ping(
        &self,
        credentials: &ConnectionCredentials,
        trust: &TrustContext,
    ) -> Result<(), AppError> {
        if credentials.tls_enabled() == Some(false) {
            tracing::warn!("[bootstrap] secret declares ssl=false, requesting TLS anyway");
        }

        let uri = ConnectionUri::build(credentials, self.replica_set);

        tracing::info!("[bootstrap] connecting to document store at {}", uri);

        tokio::time::timeout(self.deadline, self.store.ping(&uri, trust, self.deadline)).await??;

        tracing::info!(
            "[bootstrap] document store {}:{} answered ping",
            credentials.host(),
            credentials.port()
        );

        Ok(())
    }
}
