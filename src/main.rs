//! `s3cp`: copy one S3 object, optionally deleting the source afterwards.

use anyhow::{Context, Result};
use aws_sdk_s3::types::MetadataDirective;
use bytesize::ByteSize;
use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::filter::EnvFilter;

use cobalt_s3cp::config::{load_from_env, s3_client};
use cobalt_s3cp::s3::part::{MAX_PART_SIZE, MIN_PART_SIZE};
use cobalt_s3cp::s3::{
    CopyAttributes, CopyRequest, Copier, PartSize, RequestOptions, S3Object, SdkRegionClients,
    DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT,
};

#[derive(Debug, Parser)]
#[command(name = "s3cp", version, about = "Copy an S3 object, in one request or in concurrent parts")]
struct Args {
    /// The object to copy, as `bucket/key` or `s3://bucket/key`.
    #[arg(long)]
    source: S3Object,
    /// Where to copy the object to, as `bucket/key` or `s3://bucket/key`.
    #[arg(long = "dest")]
    destination: S3Object,
    /// The region of the destination bucket.
    #[arg(long, env = "AWS_DEFAULT_REGION")]
    region: Option<String>,
    /// The region of the source bucket, if different from the destination region.
    #[arg(long)]
    src_region: Option<String>,
    /// The content type of the copy.
    #[arg(long, default_value = "application/octet-stream")]
    content_type: String,
    /// The size of the source in bytes. Looked up when not positive.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    size: i64,
    /// Delete the source after a successful copy.
    #[arg(long = "move")]
    move_source: bool,
    /// The sha1 hash of the object, stored in the `sha1` metadata of the copy.
    #[arg(long)]
    sha1: Option<String>,
    /// The size of each part of a multipart copy, e.g. `100MiB`.
    #[arg(long, default_value = "25MiB", value_parser = parse_part_size)]
    part_size: PartSize,
    /// How many parts to copy at once.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// Give up on the copy after this many seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
    /// Keep the copied parts of a failed multipart copy instead of aborting it.
    #[arg(long)]
    leave_parts_on_error: bool,
    /// An extra header for every request, as `name:value`. May be repeated.
    #[arg(long = "request-header", value_parser = parse_header)]
    request_headers: Vec<(String, String)>,
}

fn parse_part_size(value: &str) -> Result<PartSize, String> {
    let size: ByteSize = value.parse()?;
    let size = i64::try_from(size.as_u64()).map_err(|e| e.to_string())?;
    if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&size) {
        return Err(format!(
            "part size must be between {} and {}",
            ByteSize::b(MIN_PART_SIZE as u64),
            ByteSize::b(MAX_PART_SIZE as u64)
        ));
    }
    PartSize::try_from(size).map_err(|e| e.to_string())
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    let (name, value) = value
        .split_once(':')
        .ok_or_else(|| format!("header {value:?} must be of the form name:value"))?;
    Ok((name.trim().to_owned(), value.trim().to_owned()))
}

impl Args {
    fn attributes(&self) -> CopyAttributes {
        let mut attributes = CopyAttributes::builder()
            .content_type(self.content_type.clone())
            .build();
        if let Some(sha1) = self.sha1.as_ref().filter(|sha1| !sha1.is_empty()) {
            attributes.metadata = Some(HashMap::from([("sha1".to_string(), sha1.clone())]));
            attributes.metadata_directive = Some(MetadataDirective::Replace);
        }
        attributes
    }

    fn request_options(&self) -> Result<RequestOptions> {
        self.request_headers
            .iter()
            .try_fold(RequestOptions::default(), |options, (name, value)| {
                options
                    .header(name, value)
                    .with_context(|| format!("Invalid request header {name}"))
            })
    }

    fn request(&self) -> CopyRequest {
        CopyRequest {
            source: Some(self.source.copy_source()),
            destination: self.destination.clone(),
            size: Some(self.size),
            source_region: self.src_region.clone(),
            delete_source: self.move_source,
            attributes: self.attributes(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let args = Args::parse();
    tracing::info!("Args: {:?}", args);

    let shared_config = load_from_env(args.region.clone()).await?;
    let client = s3_client(&shared_config, None)?;
    let region_clients = SdkRegionClients::new(shared_config)?;

    let copier = Copier::builder()
        .client(Arc::new(client))
        .region_clients(Arc::new(region_clients))
        .part_size(args.part_size)
        .concurrency(args.concurrency)
        .timeout(Duration::from_secs(args.timeout_secs))
        .leave_parts_on_error(args.leave_parts_on_error)
        .request_options(args.request_options()?)
        .build();

    let outcome = copier
        .copy(args.request())
        .await
        .with_context(|| format!("Failed to copy {} to {}", args.source, args.destination))?;
    tracing::info!(
        strategy = %outcome.strategy,
        content_length = outcome.content_length,
        part_count = outcome.part_count,
        source_deleted = outcome.source_deleted,
        "Copy completed"
    );
    Ok(())
}
