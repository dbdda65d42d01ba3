// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Deadline-bound TLS dialing and failure classification.
//!
//! The TCP connect and the TLS handshake share one deadline. Failures are
//! reported as one of:
//!
//! | Failure | Error |
//! |---------|-------|
//! | deadline elapsed | [`AppError::ConnectTimeout`] |
//! | TCP connect refused / host unreachable | [`AppError::ConnectionRefused`] |
//! | certificate, protocol or alert failure during handshake | [`AppError::TlsVerificationFailure`] |

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::errors::AppError;

/// Opens a TCP connection to `host:port` and completes a verified TLS handshake.
///
/// # Arguments
///
/// * `host` - DNS name or IP address; also used as the expected server name
/// * `port` - TCP port
/// * `config` - client configuration carrying the trust anchors and TLS floor
/// * `deadline` - upper bound for connect and handshake together
#[tracing::instrument(skip(config))]
pub async fn connect(
    host: &str,
    port: u16,
    config: Arc<ClientConfig>,
    deadline: Duration,
) -> Result<TlsStream<TcpStream>, AppError> {
    let server_name = ServerName::try_from(host.to_owned()).map_err(|e| {
        tracing::error!("[bootstrap] invalid server name {:?}: {}", host, e);
        AppError::Configuration(format!("invalid server name: {host}"))
    })?;

    let dial = async {
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(classify_connect_error)?;
        tracing::debug!("[bootstrap] tcp connected to {}:{}", host, port);

        TlsConnector::from(config)
            .connect(server_name, tcp)
            .await
            .map_err(classify_handshake_error)
    };

    let stream = tokio::time::timeout(deadline, dial).await??;

    tracing::debug!("[bootstrap] tls established with {}:{}", host, port);

    Ok(stream)
}

/// Maps a failure to establish the TCP connection.
pub fn classify_connect_error(err: io::Error) -> AppError {
    tracing::error!("[bootstrap] tcp connect failed: {}", err);
    match err.kind() {
        io::ErrorKind::TimedOut => AppError::ConnectTimeout,
        _ => AppError::ConnectionRefused,
    }
}

/// Maps a failure raised while the TLS handshake was in progress.
///
/// Anything other than a timeout means the peer and this client could not
/// agree on a verified session: rustls rejected the certificate or protocol,
/// the peer sent an alert, or the peer hung up mid-handshake.
pub fn classify_handshake_error(err: io::Error) -> AppError {
    if let Some(tls) = rustls_error(&err) {
        tracing::error!("[bootstrap] tls handshake rejected: {}", tls);
        return AppError::TlsVerificationFailure;
    }

    tracing::error!("[bootstrap] tls handshake failed: {}", err);
    match err.kind() {
        io::ErrorKind::TimedOut => AppError::ConnectTimeout,
        _ => AppError::TlsVerificationFailure,
    }
}

/// The rustls error carried by an I/O error, if the failure came from the TLS layer.
pub fn rustls_error(err: &io::Error) -> Option<&rustls::Error> {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::trust::{TlsFloor, TrustContext};

    #[test]
    fn test_refused_connect_maps_to_connection_refused() {
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_connect_error(err), AppError::ConnectionRefused);
    }

    #[test]
    fn test_timed_out_connect_maps_to_timeout() {
        let err = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_connect_error(err), AppError::ConnectTimeout);
    }

    #[test]
    fn test_rustls_error_maps_to_tls_failure() {
        let err = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer),
        );
        assert_eq!(classify_handshake_error(err), AppError::TlsVerificationFailure);
    }

    #[test]
    fn test_peer_hangup_during_handshake_maps_to_tls_failure() {
        let err = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert_eq!(classify_handshake_error(err), AppError::TlsVerificationFailure);
    }

    #[tokio::test]
    async fn test_closed_port_is_connection_refused() {
        // Bind then drop to obtain a port with no listener.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = TrustContext::webpki_roots()
            .client_config(TlsFloor::Tls12)
            .unwrap();
        let err = connect("127.0.0.1", port, config, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_silent_listener_hits_deadline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accepts the TCP connection but never answers the ClientHello.
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let config = TrustContext::webpki_roots()
            .client_config(TlsFloor::Tls12)
            .unwrap();
        let started = std::time::Instant::now();
        let err = connect("127.0.0.1", port, config, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::ConnectTimeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
