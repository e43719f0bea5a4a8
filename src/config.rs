//! Loading of the shared [aws_types::SdkConfig](https://docs.rs/aws-types/latest/aws_types/sdk_config/struct.SdkConfig.html)
//! and construction of S3 clients from it.

use anyhow::Result;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::Client;
use aws_types::SdkConfig;

use crate::localstack;

/// Create a shared `SdkConfig` with LocalStack support.
///
/// When `region` is given it overrides the region found in the environment.
///
/// # Example
///
/// ```
/// use cobalt_s3cp::config::load_from_env;
/// use cobalt_s3cp::s3::Client;
///
/// # tokio_test::block_on(async {
/// let shared_config = load_from_env(Some("ap-southeast-2".into())).await.unwrap();
/// let client = Client::new(&shared_config);
/// # })
/// ```
///
/// ## LocalStack
///
/// If the environment variable `LOCALSTACK_HOSTNAME` is set, the endpoint of
/// every client created from this config points at LocalStack:
///
/// ```shell
/// $ export LOCALSTACK_HOSTNAME=localhost
/// ```
///
/// `EDGE_PORT` can be set when something other than the default of `4566` is needed.
///
/// ## Errors
///
/// An error will be returned if `LOCALSTACK_HOSTNAME` is set and a valid URI cannot be constructed.
pub async fn load_from_env(region: Option<String>) -> Result<SdkConfig> {
    let mut shared_config = aws_config::from_env();
    if let Some(region) = region.filter(|region| !region.is_empty()) {
        shared_config = shared_config.region(Region::new(region));
    }
    if let Some(uri) = localstack::get_endpoint_uri()? {
        shared_config = shared_config.endpoint_url(uri.to_string());
    }
    Ok(shared_config.load().await)
}

/// Create an S3 `Client` from a shared config, optionally bound to another region.
///
/// LocalStack only serves path-style bucket addressing, so it is forced
/// whenever `LOCALSTACK_HOSTNAME` is set.
pub fn s3_client(shared_config: &SdkConfig, region: Option<&str>) -> Result<Client> {
    let mut builder = Builder::from(shared_config);
    if let Some(region) = region {
        builder = builder.region(Region::new(region.to_owned()));
    }
    if localstack::get_endpoint_uri()?.is_some() {
        builder = builder.force_path_style(true);
    }
    Ok(Client::from_conf(builder.build()))
}
