use std::num::TryFromIntError;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;

use super::s3_object::{LocatorError, S3Object};
use crate::types::BoxError;

/// Errors returned by a copy.
///
/// Only the first error of a copy is returned, later ones are reported to the
/// [EventSink](super::EventSink) as [CopyEvent::ErrorSuppressed](super::CopyEvent::ErrorSuppressed).
#[derive(Debug, Error)]
pub enum CopyError {
    #[error(transparent)]
    Locator(#[from] LocatorError),
    #[error("no client available for source region {0}")]
    NoRegionClient(String),
    #[error("error getting object info: {0}")]
    SizeResolution(#[source] BoxError),
    #[error("object info for {0} has no content length")]
    MissingContentLength(S3Object),
    #[error("too many parts: {0}")]
    PartCount(#[from] TryFromIntError),
    #[error("error copying object: {0}")]
    Copy(#[source] BoxError),
    #[error("error creating multipart upload: {0}")]
    MultipartCreate(#[source] BoxError),
    #[error("Missing multipart upload id")]
    MissingUploadId,
    #[error("error copying part {part_number}: {source}")]
    PartCopy {
        part_number: i32,
        #[source]
        source: BoxError,
    },
    #[error("Missing copy part result for part {0}")]
    MissingEntityTag(i32),
    #[error("expected {expected} part results, received {received}")]
    MissingParts { expected: usize, received: usize },
    #[error("error completing multipart upload: {0}")]
    Finalize(#[source] BoxError),
    #[error("copy task failed: {0}")]
    Task(#[from] JoinError),
    #[error("copy cancelled")]
    Cancelled,
    #[error("copy did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

/// Deleting the source after a successful copy failed.
///
/// The copy itself succeeded, so this is reported on the
/// [CopyOutcome](super::CopyOutcome) rather than returned as an error.
#[derive(Debug, Error)]
#[error("failed to delete {object}: {source}")]
pub struct DeleteError {
    pub object: S3Object,
    #[source]
    pub source: BoxError,
}
