// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::constants;
use crate::errors::AppError;
use crate::trust::TlsFloor;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct BootstrapOptions {
    #[arg(long, default_value = "0.0.0.0", env("BOOTSTRAP_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value = "80", env("BOOTSTRAP_HTTP_PORT"))]
    pub port: u16,
    #[arg(long, env("SECRET_NAME"))]
    pub secret_name: Option<String>,
    #[arg(long, env("AWS_REGION"))]
    pub region: Option<String>,
    #[arg(long, env("REDIS_ENDPOINT"))]
    pub cache_endpoint: Option<String>,
    #[arg(long, default_value = constants::DEFAULT_CA_BUNDLE_PATH, env("CA_BUNDLE_PATH"))]
    pub ca_bundle: PathBuf,
    #[arg(long, env("CACHE_CA_BUNDLE_PATH"))]
    pub cache_ca_bundle: Option<PathBuf>,
    #[arg(long, default_value = constants::DEFAULT_REPLICA_SET, env("DOCDB_REPLICA_SET"))]
    pub replica_set: String,
    #[arg(long, default_value = "5", env("BOOTSTRAP_CONNECT_TIMEOUT_SECS"))]
    pub connect_timeout_secs: u64,
    #[arg(long, default_value = "5", env("BOOTSTRAP_SECRET_TIMEOUT_SECS"))]
    pub secret_timeout_secs: u64,
    #[arg(long, default_value = "1.2", env("CACHE_MIN_TLS_VERSION"))]
    pub cache_min_tls: TlsFloor,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        BootstrapOptions {
            host: "127.0.0.1".to_string(),
            port: 8080,
            secret_name: None,
            region: None,
            cache_endpoint: None,
            ca_bundle: PathBuf::from(constants::DEFAULT_CA_BUNDLE_PATH),
            cache_ca_bundle: None,
            replica_set: constants::DEFAULT_REPLICA_SET.to_string(),
            connect_timeout_secs: constants::DEFAULT_CONNECT_TIMEOUT.as_secs(),
            secret_timeout_secs: constants::DEFAULT_SECRET_TIMEOUT.as_secs(),
            cache_min_tls: TlsFloor::default(),
        }
    }
}

impl BootstrapOptions {
    pub fn secret_name(&self) -> Result<&str, AppError> {
        required(self.secret_name.as_deref(), "SECRET_NAME")
    }

    pub fn region(&self) -> Result<&str, AppError> {
        required(self.region.as_deref(), "AWS_REGION")
    }

    pub fn cache_endpoint(&self) -> Result<&str, AppError> {
        required(self.cache_endpoint.as_deref(), "REDIS_ENDPOINT")
    }

    pub fn ca_bundle(&self) -> &Path {
        &self.ca_bundle
    }

    /// Deadline for the whole connect-and-ping sequence of either backend.
    pub fn connect_timeout(&self) -> Result<Duration, AppError> {
        non_zero(self.connect_timeout_secs, "BOOTSTRAP_CONNECT_TIMEOUT_SECS")
    }

    pub fn secret_timeout(&self) -> Result<Duration, AppError> {
        non_zero(self.secret_timeout_secs, "BOOTSTRAP_SECRET_TIMEOUT_SECS")
    }

    /// Names of required settings that are absent, for the startup warning.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        [
            ("SECRET_NAME", self.secret_name()),
            ("AWS_REGION", self.region()),
            ("REDIS_ENDPOINT", self.cache_endpoint()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.is_err().then_some(name))
        .collect()
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AppError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Configuration(format!("{name} is not set"))),
    }
}

fn non_zero(secs: u64, name: &str) -> Result<Duration, AppError> {
    if secs == 0 {
        return Err(AppError::Configuration(format!(
            "{name} must be greater than zero"
        )));
    }
    Ok(Duration::from_secs(secs))
}
