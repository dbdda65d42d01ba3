// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # Secure Bootstrap
//!
//! A small HTTP service that proves it can authenticate to an Amazon
//! DocumentDB cluster and an ElastiCache (Redis) endpoint over verified TLS,
//! using credentials held in AWS Secrets Manager.
//!
//! ## Architecture
//!
//! ```text
//! GET /        -> TrustContext (CA bundle) -> SecretResolver -> DataStoreConnector -> ping
//! GET /redis   -> CacheConnector (TLS floor) -> PING
//! GET /healthz -> "ok"
//! ```
//!
//! Each request runs its path from scratch. Nothing is cached between calls,
//! so rotated credentials and replaced CA bundles are picked up immediately.
//!
//! ## Modules
//!
//! - [`application`]: HTTP server setup with Axum
//! - [`cache`]: cache endpoint parsing and TLS `PING`
//! - [`configuration`]: CLI argument and environment parsing with clap
//! - [`constants`]: Configuration constants for the application
//! - [`datastore`]: connection string construction and document store ping
//! - [`errors`]: Error taxonomy with HTTP response mapping
//! - [`models`]: Secret payload and connection credentials
//! - [`routes`]: HTTP route handlers
//! - [`secrets`]: Secrets Manager access and credential resolution
//! - [`tls`]: Deadline-bound TLS dialing and failure classification
//! - [`trust`]: CA bundle loading and TLS client configuration
//!
//! ## Usage
//!
//! ```bash
//! SECRET_NAME=docdb/app AWS_REGION=ap-northeast-2 REDIS_ENDPOINT=master.cache:6379 \
//!     secure-bootstrap --port 8080 --ca-bundle global-bundle.pem
//! ```
//!
//! ## Security Considerations
//!
//! - Credentials, secret payloads and connection strings are zeroized on drop
//!   and redacted in `Debug` output
//! - Error responses carry a fixed message per error kind, never backend text
//! - Every network step is bounded by a deadline

pub mod application;
pub mod cache;
pub mod configuration;
pub mod constants;
pub mod datastore;
pub mod errors;
pub mod models;
pub mod routes;
pub mod secrets;
pub mod tls;
pub mod trust;
