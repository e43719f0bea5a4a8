//! Part sizing, byte-range partitioning and copy strategy selection.

use bytesize::{GIB, MIB, TIB};
use derive_more::{AsRef, Display, Into};
use std::num::TryFromIntError;
use std::sync::Arc;
use thiserror::Error;

use super::error::CopyError;

/// The minimum part size S3 accepts for every part but the last, 5 MiB.
pub const MIN_PART_SIZE: i64 = 5 * MIB as i64;

/// The smallest part size worth using for copies, 25 MiB.
///
/// Smaller parts are accepted by S3 but multiply the number of requests
/// without speeding up a server side copy.
pub const MIN_COPY_PART_SIZE: i64 = 25 * MIB as i64;

/// The maximum part size S3 accepts, 5 GiB.
pub const MAX_PART_SIZE: i64 = 5 * GIB as i64;

/// The maximum number of parts in a single multipart upload.
pub const MAX_UPLOAD_PARTS: i64 = 10_000;

/// The largest object S3 can store, 5 TiB.
pub const MAX_SOURCE_SIZE: i64 = 5 * TIB as i64;

/// The default part size for copies, 500 MiB.
///
/// With [MAX_UPLOAD_PARTS] parts this covers objects of almost 5 TiB.
pub const DEFAULT_COPY_PART_SIZE: i64 = 500 * MIB as i64;

/// Errors that can occur when creating a `PartSize`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartSizeError {
    #[error("part_size must be positive, part_size was {0}")]
    NotPositive(i64),
}

/// The size of each part of a multipart copy, in bytes.
///
/// Only positive sizes are representable. Sizes outside of the limits S3
/// enforces ([MIN_PART_SIZE] to [MAX_PART_SIZE]) are accepted and rejected
/// by the service itself, as those limits are the service's to change.
#[derive(Debug, Display, Into, AsRef, Clone, Copy, PartialEq, Eq)]
#[into(owned, ref, ref_mut)]
pub struct PartSize(i64);

impl Default for PartSize {
    fn default() -> Self {
        Self(DEFAULT_COPY_PART_SIZE)
    }
}

impl TryFrom<i64> for PartSize {
    type Error = PartSizeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            Err(PartSizeError::NotPositive(value))
        } else {
            Ok(PartSize(value))
        }
    }
}

/// An inclusive range of bytes, rendered as `bytes=start-end` for the
/// `CopySourceRange` of an `UploadPartCopy` request.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display("bytes={_0}-{_1}")]
pub struct ByteRange(i64, i64);

impl ByteRange {
    pub fn start(&self) -> i64 {
        self.0
    }

    pub fn end(&self) -> i64 {
        self.1
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> i64 {
        self.1 - self.0 + 1
    }
}

/// The identifier S3 assigns to a multipart upload.
#[derive(Debug, Display, AsRef, Clone, PartialEq, Eq)]
#[as_ref(str)]
pub struct UploadId(Arc<str>);

impl From<&str> for UploadId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

/// One unit of work for the part copy workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTask {
    /// 1-based part number.
    pub part_number: i32,
    pub range: ByteRange,
    pub upload_id: UploadId,
}

/// What a worker reports back for a [PartTask].
#[derive(Debug)]
pub struct PartResult {
    pub part_number: i32,
    /// The entity tag of the copied part.
    pub outcome: Result<String, CopyError>,
}

/// How an object gets copied.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum CopyStrategy {
    /// A single `CopyObject` request.
    #[display("single-shot")]
    Single,
    /// Create a multipart upload and copy it range by range.
    #[display("multipart")]
    Multipart,
}

impl CopyStrategy {
    /// Objects strictly smaller than a part are copied in one request, anything
    /// else (including an object of exactly one part) goes through a multipart upload.
    pub fn select(content_length: i64, part_size: &PartSize) -> Self {
        if content_length < part_size.0 {
            CopyStrategy::Single
        } else {
            CopyStrategy::Multipart
        }
    }
}

/// The number of parts needed to cover `content_length` bytes, `ceil(length / part_size)`.
///
/// Fails when the count does not fit a part number. The service limit of
/// [MAX_UPLOAD_PARTS] is not checked here.
pub fn part_count(content_length: i64, part_size: &PartSize) -> Result<i32, TryFromIntError> {
    if content_length <= 0 {
        return Ok(0);
    }
    i32::try_from((content_length - 1) / part_size.0 + 1)
}

/// Split `content_length` bytes into contiguous, non-overlapping part tasks.
///
/// Part `k` (1-based) covers `[(k - 1) * part_size, min(k * part_size, content_length) - 1]`,
/// so the last part ends exactly at `content_length - 1`.
pub fn partition(
    content_length: i64,
    part_size: PartSize,
    upload_id: UploadId,
) -> Result<impl Iterator<Item = PartTask> + Send + 'static, CopyError> {
    let count = part_count(content_length, &part_size)?;
    Ok((1..=count).map(move |part_number| {
        let start = i64::from(part_number - 1) * part_size.0;
        let end = start.saturating_add(part_size.0).min(content_length) - 1;
        PartTask {
            part_number,
            range: ByteRange(start, end),
            upload_id: upload_id.clone(),
        }
    }))
}

#[cfg(any(test, feature = "test-utils"))]
pub mod arbitrary {
    use derive_more::{AsRef, From, Into};
    use proptest::prelude::*;

    use super::{PartSize, MAX_PART_SIZE, MIN_PART_SIZE};

    impl Arbitrary for PartSize {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            (MIN_PART_SIZE..=MAX_PART_SIZE)
                .prop_map(PartSize)
                .boxed()
        }
    }

    /// A part size small enough that partitioning arbitrary lengths stays cheap.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, AsRef, Into, From)]
    pub struct SmallPartSize(PartSize);

    impl Arbitrary for SmallPartSize {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            (1_i64..=4096)
                .prop_map(|size| SmallPartSize(PartSize(size)))
                .boxed()
        }
    }
}
