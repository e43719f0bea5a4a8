//! Diagnostics reported while a copy runs.
//!
//! The engine never logs directly. Every noteworthy step is sent to the
//! [EventSink] configured on the [Copier](super::Copier), which defaults to
//! [TracingSink].

use derive_more::Display;
use std::fmt::Debug;

use super::part::CopyStrategy;

/// Something that happened during a copy.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum CopyEvent {
    #[display("content length of {source} is {content_length} bytes (declared: {declared})")]
    SizeResolved {
        source: String,
        content_length: i64,
        declared: bool,
    },
    #[display("copying {source} to {destination} using a {strategy} copy")]
    StrategySelected {
        source: String,
        destination: String,
        strategy: CopyStrategy,
    },
    #[display("copied {source} to {destination}")]
    ObjectCopied { source: String, destination: String },
    #[display("created multipart upload {upload_id} with {part_count} parts")]
    MultipartCreated { upload_id: String, part_count: i32 },
    #[display("Part: {part_number} copying {range}")]
    PartStarted { part_number: i32, range: String },
    #[display("Part: {part_number} copied, etag {e_tag}")]
    PartCompleted { part_number: i32, e_tag: String },
    #[display("Part: {part_number} failed: {error}")]
    PartFailed { part_number: i32, error: String },
    #[display("ignoring error after the first failure: {error}")]
    ErrorSuppressed { error: String },
    #[display("completed multipart upload {upload_id}")]
    MultipartCompleted { upload_id: String },
    #[display("aborted multipart upload {upload_id}")]
    MultipartAborted { upload_id: String },
    #[display("failed to abort multipart upload {upload_id}: {error}")]
    AbortFailed { upload_id: String, error: String },
    #[display("leaving the parts of multipart upload {upload_id} for manual recovery")]
    PartsLeftOnError { upload_id: String },
    #[display("deleted {source}")]
    SourceDeleted { source: String },
    #[display("failed to delete {source:?}: {error:?}")]
    DeleteFailed { source: String, error: String },
}

/// Receives the [CopyEvent]s of every copy made with a [Copier](super::Copier).
///
/// Events of parts copied concurrently arrive from several tasks at once.
pub trait EventSink: Debug + Send + Sync {
    fn emit(&self, event: CopyEvent);
}

/// Forwards every event to `tracing`.
///
/// Failures are logged at `WARN`, per-part progress at `DEBUG` and
/// everything else at `INFO`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: CopyEvent) {
        match event {
            CopyEvent::PartFailed { .. }
            | CopyEvent::ErrorSuppressed { .. }
            | CopyEvent::AbortFailed { .. }
            | CopyEvent::PartsLeftOnError { .. }
            | CopyEvent::DeleteFailed { .. } => tracing::warn!("{event}"),
            CopyEvent::PartStarted { .. } | CopyEvent::PartCompleted { .. } => {
                tracing::debug!("{event}")
            }
            _ => tracing::info!("{event}"),
        }
    }
}
