//! LocalStack endpoint discovery.

use anyhow::{Context, Result};
use clap::Parser;
use http::Uri;
use std::ffi::OsString;
use std::iter::empty;
use std::str::FromStr;

/// Environment variables which point the S3 client at LocalStack.
///
/// Ref: https://docs.localstack.cloud/localstack/configuration/
#[derive(Debug, Parser)]
struct LocalStackEnv {
    #[arg(long, env)]
    localstack_hostname: Option<String>,
    #[arg(long, env, default_value = "4566")]
    edge_port: String,
}

/// Construct a LocalStack endpoint URI if the `LOCALSTACK_HOSTNAME` env var
/// has been set. `EDGE_PORT` overrides the default port of `4566`.
pub(crate) fn get_endpoint_uri() -> Result<Option<Uri>> {
    // Only the environment is consulted, never the command line of the process.
    let env = LocalStackEnv::try_parse_from(empty::<OsString>())
        .context("An error occurred while reading the LocalStack environment variables.")?;
    env.localstack_hostname
        .map(|host| {
            let uri = format!("http://{}:{}", host, env.edge_port);
            Uri::from_str(&uri).context(format!("Failed to parse LocalStack URI: {}", uri))
        })
        .transpose()
}
