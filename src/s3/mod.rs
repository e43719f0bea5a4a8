//! Server side copies of S3 objects, built on the
//! [aws_sdk_s3](https://docs.rs/aws-sdk-s3/latest/aws_sdk_s3/) crate.
//!
//! A [Copier] copies an object with a single `CopyObject` request when it is
//! smaller than the part size, and otherwise with a multipart upload whose
//! byte ranges are copied concurrently with `UploadPartCopy`.
//!
//! A multipart copy that fails is aborted, unless the copier is set to leave
//! the parts in place. The source is deleted on request, and only after the
//! copy succeeded.

/// Re-export of [aws_sdk_s3::client::Client](https://docs.rs/aws-sdk-s3/latest/aws_sdk_s3/client/struct.Client.html).
///
pub use aws_sdk_s3::Client;

mod aggregate;
mod api;
mod attributes;
mod copier;
mod dispatch;
mod error;
mod events;
pub mod part;
mod s3_object;
mod session;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use api::{
    CopyUploadPart, RegionClients, RequestOptionError, RequestOptions, S3Api, SdkRegionClients,
};
pub use attributes::CopyAttributes;
pub use copier::{
    CopyHandle, CopyOutcome, CopyRequest, Copier, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT,
};
pub use error::{CopyError, DeleteError};
pub use events::{CopyEvent, EventSink, TracingSink};
pub use part::{ByteRange, CopyStrategy, PartSize, PartSizeError};
pub use s3_object::{LocatorError, S3Object};
