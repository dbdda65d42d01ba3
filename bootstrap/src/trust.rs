// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Trust store construction.
//!
//! A [`TrustContext`] is the set of certificate authorities a TLS client will
//! accept, built once per invocation from a PEM bundle on disk and shared
//! read-only by every handshake made during that invocation.
//!
//! # Failure modes
//!
//! - [`AppError::Io`] when the bundle cannot be read
//! - [`AppError::TrustParse`] when the content is not PEM, a certificate
//!   section is corrupt, or no certificate could be used as a trust anchor

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::pki_types::pem::PemObject;
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};

use crate::errors::AppError;

static TLS12_AND_LATER: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Minimum TLS protocol version a client will offer.
///
/// The floor is enforced by only offering the allowed versions in the
/// ClientHello, so a server that cannot meet it fails the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsFloor {
    #[default]
    Tls12,
    Tls13,
}

impl TlsFloor {
    pub fn protocol_versions(&self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            Self::Tls12 => TLS12_AND_LATER,
            Self::Tls13 => TLS13_ONLY,
        }
    }
}

impl FromStr for TlsFloor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1.2" | "tls1.2" | "tls12" => Ok(Self::Tls12),
            "1.3" | "tls1.3" | "tls13" => Ok(Self::Tls13),
            other => Err(format!("unsupported minimum TLS version: {other}")),
        }
    }
}

impl fmt::Display for TlsFloor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls12 => write!(f, "1.2"),
            Self::Tls13 => write!(f, "1.3"),
        }
    }
}

/// Immutable set of trust anchors.
#[derive(Clone)]
pub struct TrustContext {
    roots: Arc<RootCertStore>,
    source: Option<PathBuf>,
}

impl fmt::Debug for TrustContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustContext")
            .field("anchors", &self.anchor_count())
            .field("source", &self.source)
            .finish()
    }
}

impl TrustContext {
    /// Reads a PEM bundle and builds a trust context from every certificate in it.
    ///
    /// # Errors
    ///
    /// - [`AppError::Io`] if the file cannot be read
    /// - [`AppError::TrustParse`] if the file holds zero usable certificates
    #[tracing::instrument]
    pub async fn from_pem_file(path: &Path) -> Result<Self, AppError> {
        let pem = tokio::fs::read(path).await.map_err(|e| {
            tracing::error!("[bootstrap] failed to read CA bundle {:?}: {}", path, e);
            AppError::Io
        })?;

        let roots = parse_bundle(&pem)?;

        tracing::debug!(
            "[bootstrap] loaded {} trust anchors from {:?}",
            roots.len(),
            path
        );

        Ok(Self {
            roots: Arc::new(roots),
            source: Some(path.to_path_buf()),
        })
    }

    /// Trust context holding the Mozilla root program's anchors.
    pub fn webpki_roots() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        Self {
            roots: Arc::new(roots),
            source: None,
        }
    }

    pub fn anchor_count(&self) -> usize {
        self.roots.len()
    }

    /// Path of the bundle this context was read from, for clients that load
    /// their trust anchors themselves.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Builds a client configuration verifying servers against these anchors.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InternalServerError`] if the crypto provider does
    /// not support the requested protocol versions.
    pub fn client_config(&self, floor: TlsFloor) -> Result<Arc<ClientConfig>, AppError> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(floor.protocol_versions())
            .map_err(|e| {
                tracing::error!("[bootstrap] unsupported TLS protocol versions: {}", e);
                AppError::InternalServerError
            })?
            .with_root_certificates(self.roots.clone())
            .with_no_client_auth();

        Ok(Arc::new(config))
    }
}

fn parse_bundle(pem: &[u8]) -> Result<RootCertStore, AppError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            tracing::error!("[bootstrap] CA bundle is not valid PEM: {:?}", e);
            AppError::TrustParse
        })?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);

    if ignored > 0 {
        tracing::warn!("[bootstrap] ignored {} unparsable certificates", ignored);
    }
    if added == 0 {
        tracing::error!("[bootstrap] CA bundle contains no usable certificates");
        return Err(AppError::TrustParse);
    }

    Ok(roots)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[tokio::test]
    async fn test_single_certificate_bundle() {
        let trust = TrustContext::from_pem_file(&fixture("ca.pem")).await.unwrap();
        assert_eq!(trust.anchor_count(), 1);
        assert_eq!(trust.source(), Some(fixture("ca.pem").as_path()));
    }

    #[tokio::test]
    async fn test_multi_certificate_bundle() {
        let trust = TrustContext::from_pem_file(&fixture("bundle.pem"))
            .await
            .unwrap();
        assert_eq!(trust.anchor_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = TrustContext::from_pem_file(&fixture("does-not-exist.pem"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Io);
    }

    #[tokio::test]
    async fn test_empty_file_is_parse_error() {
        let err = TrustContext::from_pem_file(&fixture("empty.pem"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::TrustParse);
    }

    #[tokio::test]
    async fn test_non_pem_file_is_parse_error() {
        let err = TrustContext::from_pem_file(&fixture("not-pem.txt"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::TrustParse);
    }

    #[tokio::test]
    async fn test_bundle_without_certificates_is_parse_error() {
        let err = TrustContext::from_pem_file(&fixture("key-only.pem"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::TrustParse);
    }

    #[tokio::test]
    async fn test_corrupt_certificate_section_is_parse_error() {
        let err = TrustContext::from_pem_file(&fixture("corrupt.pem"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::TrustParse);
    }

    #[tokio::test]
    async fn test_bundle_written_at_runtime() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&std::fs::read(fixture("bundle.pem")).unwrap())
            .unwrap();
        file.flush().unwrap();

        let trust = TrustContext::from_pem_file(file.path()).await.unwrap();
        assert_eq!(trust.anchor_count(), 2);
    }

    #[test]
    fn test_webpki_roots_are_not_empty() {
        let trust = TrustContext::webpki_roots();
        assert!(trust.anchor_count() > 0);
        assert!(trust.source().is_none());
    }

    #[test]
    fn test_tls_floor_parsing() {
        assert_eq!("1.2".parse::<TlsFloor>().unwrap(), TlsFloor::Tls12);
        assert_eq!("TLS1.3".parse::<TlsFloor>().unwrap(), TlsFloor::Tls13);
        assert!("1.1".parse::<TlsFloor>().is_err());
        assert_eq!(TlsFloor::Tls13.to_string(), "1.3");
    }

    #[test]
    fn test_tls13_floor_offers_only_tls13() {
        let versions = TlsFloor::Tls13.protocol_versions();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, rustls::ProtocolVersion::TLSv1_3);
    }

    #[tokio::test]
    async fn test_client_config_builds_for_each_floor() {
        let trust = TrustContext::from_pem_file(&fixture("ca.pem")).await.unwrap();
        assert!(trust.client_config(TlsFloor::Tls12).is_ok());
        assert!(trust.client_config(TlsFloor::Tls13).is_ok());
    }
}
