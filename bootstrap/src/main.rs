// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use clap::Parser;
use secure_bootstrap::application::Application;
use secure_bootstrap::configuration::BootstrapOptions;
use secure_bootstrap::datastore::MongoDocumentStore;
use secure_bootstrap::secrets::AwsSecretsManager;
use std::{io::Error, sync::Arc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    println!("[bootstrap] init");

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        // this needs to be set to false, otherwise ANSI color codes will
        // show up in a confusing manner in CloudWatch logs.
        .with_ansi(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .init();

    // rustls is compiled with more than one crypto backend through the
    // drivers, so the process default has to be chosen explicitly.
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::warn!("[bootstrap] rustls crypto provider already installed");
    }

    // get configuration options from environment variables
    let options = BootstrapOptions::parse();

    tracing::info!("[bootstrap] {:?}", &options);

    for setting in options.missing_settings() {
        tracing::warn!(
            "[bootstrap] {} is not set, requests that need it will fail",
            setting
        );
    }

    let secrets = AwsSecretsManager::from_options(&options);

    let application =
        Application::build(options, Arc::new(secrets), Arc::new(MongoDocumentStore)).await?;

    application.run_until_stopped().await
}
