// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Cache connection and liveness check.
//!
//! The cache endpoint comes from process configuration, never from the secret
//! store. [`CacheConnector`] opens a TLS session whose minimum protocol version
//! is enforced by the handshake, sends a RESP `PING` and expects `PONG`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::constants::{DEFAULT_CACHE_PORT, MAX_CACHE_REPLY_SIZE};
use crate::errors::AppError;
use crate::tls;
use crate::trust::{TlsFloor, TrustContext};

/// `host[:port]` address of the cache, with an optional `redis://` or
/// `rediss://` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEndpoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for CacheEndpoint {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Configuration(format!("invalid cache endpoint: {value}"));

        let address = value.trim();
        let address = address
            .strip_prefix("rediss://")
            .or_else(|| address.strip_prefix("redis://"))
            .unwrap_or(address)
            .trim_end_matches('/');

        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            // [v6]:port
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => return Err(invalid()),
            }
        } else {
            match address.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (address, None),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }
        let port = match port {
            Some(port) => port.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(invalid)?,
            None => DEFAULT_CACHE_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for CacheEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Validates cache connectivity over TLS.
pub struct CacheConnector {
    trust: TrustContext,
    floor: TlsFloor,
    deadline: Duration,
}

impl CacheConnector {
    pub fn new(trust: TrustContext, floor: TlsFloor, deadline: Duration) -> Self {
        Self {
            trust,
            floor,
            deadline,
        }
    }

    /// Connects, completes the handshake, and issues `PING` within the deadline.
    ///
    /// # Errors
    ///
    /// - [`AppError::ConnectTimeout`] - the sequence did not finish in time
    /// - [`AppError::ConnectionRefused`] - the endpoint is not listening
    /// - [`AppError::TlsVerificationFailure`] - verification failed or the
    ///   server could not meet the TLS floor
    /// - [`AppError::AuthenticationFailure`] - the cache requires credentials
    /// - [`AppError::ProbeRejected`] - the reply was not `PONG`
    #[tracing::instrument(skip(self))]
    pub async fn ping(&self, endpoint: &CacheEndpoint) -> Result<(), AppError> {
        let config = self.trust.client_config(self.floor)?;

        let probe = async {
            let mut stream =
                tls::connect(&endpoint.host, endpoint.port, config, self.deadline).await?;

            if let Some(version) = stream.get_ref().1.protocol_version() {
                tracing::debug!("[bootstrap] cache negotiated {:?}", version);
            }

            let command = redis::cmd("PING").get_packed_command();
            stream.write_all(&command).await.map_err(|e| {
                tracing::error!("[bootstrap] failed to send PING: {}", e);
                AppError::ProbeRejected
            })?;

            let reply = read_reply(&mut stream).await;
            // Best effort close_notify; the probe result is already known.
            let _ = stream.shutdown().await;
            reply
        };

        tokio::time::timeout(self.deadline, probe).await??;

        tracing::info!("[bootstrap] cache {} answered ping", endpoint);

        Ok(())
    }
}

async fn read_reply<S>(stream: &mut S) -> Result<(), AppError>
where
    S: AsyncRead + Unpin,
{
    let mut reply = Vec::with_capacity(64);
    let mut chunk = [0u8; 64];

    loop {
        let n = stream.read(&mut chunk).await.map_err(|e| {
            tracing::error!("[bootstrap] failed to read PING reply: {}", e);
            AppError::ProbeRejected
        })?;
        if n == 0 {
            tracing::error!("[bootstrap] cache closed the connection before replying");
            return Err(AppError::ProbeRejected);
        }
        reply.extend_from_slice(&chunk[..n]);

        if reply.ends_with(b"\r\n") {
            if let Some(result) = interpret_reply(&reply) {
                return result;
            }
        }
        if reply.len() > MAX_CACHE_REPLY_SIZE {
            tracing::error!("[bootstrap] PING reply exceeds {} bytes", MAX_CACHE_REPLY_SIZE);
            return Err(AppError::ProbeRejected);
        }
    }
}

/// Interprets a complete-looking RESP frame.
///
/// Returns `None` while the frame is still truncated, which happens when a
/// bulk string arrives across several reads.
fn interpret_reply(reply: &[u8]) -> Option<Result<(), AppError>> {
    if let Some(error) = reply.strip_prefix(b"-") {
        let error = String::from_utf8_lossy(error);
        let code = error.split_whitespace().next().unwrap_or_default();
        tracing::error!("[bootstrap] cache rejected PING: {}", error.trim_end());
        return Some(Err(match code {
            "NOAUTH" | "WRONGPASS" => AppError::AuthenticationFailure,
            _ => AppError::ProbeRejected,
        }));
    }

    let value = match redis::parse_redis_value(reply) {
        Ok(value) => value,
        Err(err) if err.is_io_error() || err.kind() == redis::ErrorKind::ParseError => {
            return None;
        }
        Err(err) => {
            tracing::error!("[bootstrap] unreadable PING reply: {}", err);
            return Some(Err(AppError::ProbeRejected));
        }
    };

    match redis::from_redis_value::<String>(&value) {
        Ok(text) if text.eq_ignore_ascii_case("PONG") => Some(Ok(())),
        other => {
            tracing::error!("[bootstrap] unexpected PING reply: {:?}", other);
            Some(Err(AppError::ProbeRejected))
        }
    }
}
