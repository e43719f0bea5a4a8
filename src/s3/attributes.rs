use aws_sdk_s3::types::{
    MetadataDirective, ObjectCannedAcl, RequestPayer, ServerSideEncryption, StorageClass,
};
use derive_more::Debug;
use std::collections::HashMap;
use typed_builder::TypedBuilder;

/// Request attributes forwarded verbatim to the S3 calls of a copy.
///
/// Object attributes (ACL, content headers, metadata, storage class and
/// encryption) are sent with `CopyObject` and `CreateMultipartUpload`.
/// Source conditions and copy source SSE-C keys are sent with `CopyObject`
/// and every `UploadPartCopy`. SSE-C keys and the request payer go to every
/// call on the destination which needs them.
///
/// ```
/// use cobalt_s3cp::s3::CopyAttributes;
/// use aws_sdk_s3::types::MetadataDirective;
///
/// let attributes = CopyAttributes::builder()
///     .content_type("application/pdf")
///     .metadata([("sha1".to_string(), "abc".to_string())])
///     .metadata_directive(MetadataDirective::Replace)
///     .build();
/// ```
#[derive(Debug, Clone, Default, PartialEq, TypedBuilder)]
#[builder(field_defaults(default, setter(strip_option, into)))]
pub struct CopyAttributes {
    pub acl: Option<ObjectCannedAcl>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_type: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub metadata_directive: Option<MetadataDirective>,
    pub storage_class: Option<StorageClass>,
    pub server_side_encryption: Option<ServerSideEncryption>,
    pub ssekms_key_id: Option<String>,
    pub sse_customer_algorithm: Option<String>,
    #[debug(skip)]
    pub sse_customer_key: Option<String>,
    pub sse_customer_key_md5: Option<String>,
    pub copy_source_sse_customer_algorithm: Option<String>,
    #[debug(skip)]
    pub copy_source_sse_customer_key: Option<String>,
    pub copy_source_sse_customer_key_md5: Option<String>,
    pub copy_source_if_match: Option<String>,
    pub copy_source_if_none_match: Option<String>,
    pub request_payer: Option<RequestPayer>,
}
