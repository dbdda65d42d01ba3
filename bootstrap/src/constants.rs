// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

pub const APP_NAME: &str = "secure-bootstrap";

/// Secrets Manager staging label for the live version of a secret.
pub const SECRET_VERSION_STAGE: &str = "AWSCURRENT";

pub const DEFAULT_CA_BUNDLE_PATH: &str = "global-bundle.pem";
pub const DEFAULT_REPLICA_SET: &str = "rs0";
pub const DOCUMENT_DB_READ_PREFERENCE: &str = "secondaryPreferred";
pub const DOCUMENT_DB_SCHEME: &str = "mongodb";
pub const DOCUMENT_DB_PING_DATABASE: &str = "admin";

pub const DEFAULT_CACHE_PORT: u16 = 6379;
/// RESP replies longer than this are not a valid answer to `PING`.
pub const MAX_CACHE_REPLY_SIZE: usize = 512;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SECRET_TIMEOUT: Duration = Duration::from_secs(5);
/// The driver gives up on server selection after all but `1/N` of the deadline.
pub const DRIVER_TIMEOUT_MARGIN_DIVISOR: u32 = 5;

// Response bodies
pub const BOOTSTRAP_SUCCESS_BODY: &str = "Authentication succeed";
pub const CACHE_SUCCESS_BODY: &str = "cached";
pub const HEALTH_BODY: &str = "ok";
