// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Test doubles and loopback TLS listeners shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, SupportedProtocolVersion};
use secure_bootstrap::datastore::{ConnectionUri, DocumentStore};
use secure_bootstrap::errors::AppError;
use secure_bootstrap::models::SecretPayload;
use secure_bootstrap::secrets::SecretStore;
use secure_bootstrap::tls;
use secure_bootstrap::trust::{TlsFloor, TrustContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const STUB_SECRET: &str =
    r#"{"username":"u","password":"p","host":"db.local","port":27017}"#;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Secret store answering every lookup with the same result.
pub struct StubSecretStore {
    result: Result<String, AppError>,
    calls: AtomicUsize,
}

impl StubSecretStore {
    pub fn returning(payload: &str) -> Self {
        Self {
            result: Ok(payload.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: AppError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for StubSecretStore {
    async fn current_secret(&self, _name: &str, _region: &str) -> Result<SecretPayload, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map(SecretPayload::new)
    }
}

/// Document store double that dials a loopback TLS listener instead of the
/// host named in the connection string, sends `ping` and expects `ok`.
pub struct LoopbackDocumentStore {
    addr: SocketAddr,
    calls: AtomicUsize,
}

impl LoopbackDocumentStore {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for LoopbackDocumentStore {
    async fn ping(
        &self,
        uri: &ConnectionUri,
        trust: &TrustContext,
        deadline: Duration,
    ) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(uri.expose().contains("@db.local:27017/"));

        let config = trust.client_config(TlsFloor::Tls12)?;
        let mut stream = tls::connect("localhost", self.addr.port(), config, deadline).await?;

        stream.write_all(b"ping").await.unwrap();
        let mut reply = [0u8; 2];
        stream
            .read_exact(&mut reply)
            .await
            .map_err(|_| AppError::ProbeRejected)?;
        if &reply == b"ok" {
            Ok(())
        } else {
            Err(AppError::ProbeRejected)
        }
    }
}

/// Document store double that fails without touching the network.
pub struct FailingDocumentStore(pub AppError);

#[async_trait]
impl DocumentStore for FailingDocumentStore {
    async fn ping(
        &self,
        _uri: &ConnectionUri,
        _trust: &TrustContext,
        _deadline: Duration,
    ) -> Result<(), AppError> {
        Err(self.0.clone())
    }
}

fn server_config(
    cert: &str,
    key: &str,
    versions: &[&'static SupportedProtocolVersion],
) -> Arc<ServerConfig> {
    let certs = CertificateDer::pem_file_iter(fixture(cert))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = PrivateKeyDer::from_pem_file(fixture(key)).unwrap();
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(versions)
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();

    Arc::new(config)
}

/// Which certificate the loopback listener presents.
#[derive(Clone, Copy)]
pub enum ServerIdentity {
    /// Leaf signed by `ca.pem`.
    Trusted,
    /// Leaf signed by `rogue-ca.pem`, which no client trusts.
    Rogue,
}

/// Starts a TLS listener on 127.0.0.1 that answers the first read of every
/// connection with `reply`.
pub async fn spawn_tls_server(
    identity: ServerIdentity,
    versions: &[&'static SupportedProtocolVersion],
    reply: &'static [u8],
) -> SocketAddr {
    let (cert, key) = match identity {
        ServerIdentity::Trusted => ("server.pem", "server-key.pem"),
        ServerIdentity::Rogue => ("rogue-server.pem", "rogue-server-key.pem"),
    };
    let acceptor = TlsAcceptor::from(server_config(cert, key, versions));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // Handshake failures are the client's to report.
                let Ok(mut stream) = acceptor.accept(socket).await else {
                    return;
                };
                let mut request = [0u8; 256];
                if stream.read(&mut request).await.is_ok() {
                    let _ = stream.write_all(reply).await;
                    let _ = stream.flush().await;
                }
            });
        }
    });

    addr
}

/// Starts a listener that accepts TCP connections and never says a word.
pub async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let _socket = socket;
                std::future::pending::<()>().await;
            });
        }
    });

    addr
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
