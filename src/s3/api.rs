//! The S3 operations a copy depends on.

use async_trait::async_trait;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use aws_smithy_runtime_api::client::orchestrator::HttpRequest;
use aws_types::SdkConfig;
use http::header::{HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use typed_builder::TypedBuilder;

use super::attributes::CopyAttributes;
use super::part::ByteRange;
use super::S3Object;
use crate::localstack;
use crate::types::BoxError;

/// Errors raised when adding a header to [RequestOptions].
#[derive(Debug, Error)]
pub enum RequestOptionError {
    #[error(transparent)]
    Name(#[from] InvalidHeaderName),
    #[error(transparent)]
    Value(#[from] InvalidHeaderValue),
}

/// Extra headers added to every S3 request of a copy.
///
/// Header names and values are validated when they are added.
///
/// ```
/// use cobalt_s3cp::s3::RequestOptions;
///
/// let options = RequestOptions::default()
///     .header("x-amz-expected-bucket-owner", "111122223333")
///     .unwrap();
/// assert_eq!(options.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, RequestOptionError> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        HeaderValue::from_str(value)?;
        self.headers.push((name.as_str().to_owned(), value.to_owned()));
        Ok(self)
    }

    /// Append the headers of `other`, keeping the existing ones first.
    pub fn extend(&mut self, other: RequestOptions) {
        self.headers.extend(other.headers);
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// A request interceptor which adds the headers.
    fn mutator(&self) -> impl Fn(&mut HttpRequest) + Send + Sync + 'static {
        let headers = self.headers.clone();
        move |request: &mut HttpRequest| {
            for (name, value) in &headers {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }
    }
}

/// The parameters of a single `UploadPartCopy` request.
#[derive(Debug, TypedBuilder)]
pub struct CopyUploadPart<'a> {
    pub source: &'a S3Object,
    pub destination: &'a S3Object,
    pub upload_id: &'a str,
    pub part_number: i32,
    pub byte_range: ByteRange,
    pub attributes: &'a CopyAttributes,
}

/// The S3 operations used to copy an object.
///
/// [Client] implements this trait, tests substitute their own implementation.
/// Every remote error is returned boxed, the caller decides which stage of the
/// copy it belongs to.
#[async_trait]
pub trait S3Api: Debug + Send + Sync {
    /// `HeadObject`, returning the content length of the object.
    async fn head_object(
        &self,
        object: &S3Object,
        options: &RequestOptions,
    ) -> Result<Option<i64>, BoxError>;

    /// `CopyObject`, returning the entity tag of the new object.
    async fn copy_object(
        &self,
        source: &S3Object,
        destination: &S3Object,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<Option<String>, BoxError>;

    /// `CreateMultipartUpload`, returning the upload id.
    async fn create_multipart_upload(
        &self,
        destination: &S3Object,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<Option<String>, BoxError>;

    /// `UploadPartCopy`, returning the entity tag of the part.
    async fn upload_part_copy(
        &self,
        part: CopyUploadPart<'_>,
        options: &RequestOptions,
    ) -> Result<Option<String>, BoxError>;

    /// `CompleteMultipartUpload` with parts ordered by part number.
    async fn complete_multipart_upload(
        &self,
        destination: &S3Object,
        upload_id: &str,
        parts: Vec<CompletedPart>,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<(), BoxError>;

    /// `AbortMultipartUpload`, discarding any copied parts.
    async fn abort_multipart_upload(
        &self,
        destination: &S3Object,
        upload_id: &str,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<(), BoxError>;

    /// `DeleteObject`.
    async fn delete_object(
        &self,
        object: &S3Object,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<(), BoxError>;
}

#[async_trait]
impl S3Api for Client {
    #[instrument(skip(self, options))]
    async fn head_object(
        &self,
        object: &S3Object,
        options: &RequestOptions,
    ) -> Result<Option<i64>, BoxError> {
        let output = self
            .head_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .customize()
            .mutate_request(options.mutator())
            .send()
            .await?;
        Ok(output.content_length())
    }

    #[instrument(skip(self, attributes, options))]
    async fn copy_object(
        &self,
        source: &S3Object,
        destination: &S3Object,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<Option<String>, BoxError> {
        let attributes = attributes.clone();
        let output = self
            .copy_object()
            .copy_source(source.copy_source())
            .bucket(&destination.bucket)
            .key(&destination.key)
            .set_acl(attributes.acl)
            .set_cache_control(attributes.cache_control)
            .set_content_disposition(attributes.content_disposition)
            .set_content_encoding(attributes.content_encoding)
            .set_content_language(attributes.content_language)
            .set_content_type(attributes.content_type)
            .set_metadata(attributes.metadata)
            .set_metadata_directive(attributes.metadata_directive)
            .set_storage_class(attributes.storage_class)
            .set_server_side_encryption(attributes.server_side_encryption)
            .set_ssekms_key_id(attributes.ssekms_key_id)
            .set_sse_customer_algorithm(attributes.sse_customer_algorithm)
            .set_sse_customer_key(attributes.sse_customer_key)
            .set_sse_customer_key_md5(attributes.sse_customer_key_md5)
            .set_copy_source_sse_customer_algorithm(attributes.copy_source_sse_customer_algorithm)
            .set_copy_source_sse_customer_key(attributes.copy_source_sse_customer_key)
            .set_copy_source_sse_customer_key_md5(attributes.copy_source_sse_customer_key_md5)
            .set_copy_source_if_match(attributes.copy_source_if_match)
            .set_copy_source_if_none_match(attributes.copy_source_if_none_match)
            .set_request_payer(attributes.request_payer)
            .customize()
            .mutate_request(options.mutator())
            .send()
            .await?;
        Ok(output
            .copy_object_result()
            .and_then(|result| result.e_tag())
            .map(str::to_owned))
    }

    #[instrument(skip(self, attributes, options))]
    async fn create_multipart_upload(
        &self,
        destination: &S3Object,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<Option<String>, BoxError> {
        let attributes = attributes.clone();
        let output = self
            .create_multipart_upload()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .set_acl(attributes.acl)
            .set_cache_control(attributes.cache_control)
            .set_content_disposition(attributes.content_disposition)
            .set_content_encoding(attributes.content_encoding)
            .set_content_language(attributes.content_language)
            .set_content_type(attributes.content_type)
            .set_metadata(attributes.metadata)
            .set_storage_class(attributes.storage_class)
            .set_server_side_encryption(attributes.server_side_encryption)
            .set_ssekms_key_id(attributes.ssekms_key_id)
            .set_sse_customer_algorithm(attributes.sse_customer_algorithm)
            .set_sse_customer_key(attributes.sse_customer_key)
            .set_sse_customer_key_md5(attributes.sse_customer_key_md5)
            .set_request_payer(attributes.request_payer)
            .customize()
            .mutate_request(options.mutator())
            .send()
            .await?;
        Ok(output.upload_id().map(str::to_owned))
    }

    #[instrument(skip(self, options), fields(part_number = part.part_number))]
    async fn upload_part_copy(
        &self,
        part: CopyUploadPart<'_>,
        options: &RequestOptions,
    ) -> Result<Option<String>, BoxError> {
        let attributes = part.attributes.clone();
        let output = self
            .upload_part_copy()
            .bucket(&part.destination.bucket)
            .key(&part.destination.key)
            .upload_id(part.upload_id)
            .part_number(part.part_number)
            .copy_source(part.source.copy_source())
            .copy_source_range(part.byte_range.to_string())
            .set_copy_source_if_match(attributes.copy_source_if_match)
            .set_copy_source_if_none_match(attributes.copy_source_if_none_match)
            .set_copy_source_sse_customer_algorithm(attributes.copy_source_sse_customer_algorithm)
            .set_copy_source_sse_customer_key(attributes.copy_source_sse_customer_key)
            .set_copy_source_sse_customer_key_md5(attributes.copy_source_sse_customer_key_md5)
            .set_sse_customer_algorithm(attributes.sse_customer_algorithm)
            .set_sse_customer_key(attributes.sse_customer_key)
            .set_sse_customer_key_md5(attributes.sse_customer_key_md5)
            .set_request_payer(attributes.request_payer)
            .customize()
            .mutate_request(options.mutator())
            .send()
            .await?;
        Ok(output
            .copy_part_result()
            .and_then(|result| result.e_tag())
            .map(str::to_owned))
    }

    #[instrument(skip(self, parts, attributes, options), fields(parts = parts.len()))]
    async fn complete_multipart_upload(
        &self,
        destination: &S3Object,
        upload_id: &str,
        parts: Vec<CompletedPart>,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<(), BoxError> {
        let attributes = attributes.clone();
        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();
        self.complete_multipart_upload()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .set_sse_customer_algorithm(attributes.sse_customer_algorithm)
            .set_sse_customer_key(attributes.sse_customer_key)
            .set_sse_customer_key_md5(attributes.sse_customer_key_md5)
            .set_request_payer(attributes.request_payer)
            .customize()
            .mutate_request(options.mutator())
            .send()
            .await?;
        Ok(())
    }

    #[instrument(skip(self, attributes, options))]
    async fn abort_multipart_upload(
        &self,
        destination: &S3Object,
        upload_id: &str,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<(), BoxError> {
        self.abort_multipart_upload()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .upload_id(upload_id)
            .set_request_payer(attributes.request_payer.clone())
            .customize()
            .mutate_request(options.mutator())
            .send()
            .await?;
        Ok(())
    }

    #[instrument(skip(self, attributes, options))]
    async fn delete_object(
        &self,
        object: &S3Object,
        attributes: &CopyAttributes,
        options: &RequestOptions,
    ) -> Result<(), BoxError> {
        self.delete_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .set_request_payer(attributes.request_payer.clone())
            .customize()
            .mutate_request(options.mutator())
            .send()
            .await?;
        Ok(())
    }
}

/// Provides an [S3Api] bound to an arbitrary region, used to reach a source
/// bucket living outside of the destination's region.
pub trait RegionClients: Debug + Send + Sync {
    fn client_for_region(&self, region: &str) -> Arc<dyn S3Api>;
}

/// [RegionClients] creating SDK [Client]s from a shared config.
#[derive(Debug, Clone)]
pub struct SdkRegionClients {
    shared_config: SdkConfig,
    force_path_style: bool,
}

impl SdkRegionClients {
    /// ## Errors
    ///
    /// An error will be returned if `LOCALSTACK_HOSTNAME` is set and a valid URI cannot be constructed.
    pub fn new(shared_config: SdkConfig) -> anyhow::Result<Self> {
        Ok(Self {
            shared_config,
            force_path_style: localstack::get_endpoint_uri()?.is_some(),
        })
    }
}

impl RegionClients for SdkRegionClients {
    fn client_for_region(&self, region: &str) -> Arc<dyn S3Api> {
        let config = Builder::from(&self.shared_config)
            .region(Region::new(region.to_owned()))
            .force_path_style(self.force_path_style)
            .build();
        Arc::new(Client::from_conf(config))
    }
}
