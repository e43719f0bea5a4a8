//! Collection of part results into the ordered list a multipart upload is
//! completed with.

use aws_sdk_s3::types::CompletedPart;
use std::sync::{Arc, OnceLock};

use super::error::CopyError;
use super::events::{CopyEvent, EventSink};
use super::part::PartResult;

/// Holds the first error of a copy. Later errors never replace it.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot(OnceLock<CopyError>);

impl ErrorSlot {
    /// Record `error` if the slot is still empty, otherwise hand it back.
    pub(crate) fn set(&self, error: CopyError) -> Result<(), CopyError> {
        self.0.set(error)
    }

    pub(crate) fn take(&mut self) -> Option<CopyError> {
        self.0.take()
    }
}

/// Drains [PartResult]s, placing every entity tag at the position of its part.
///
/// The container is sized for every part up front, so parts may finish in
/// any order while the completed list always comes out ordered by part number.
#[derive(Debug)]
pub(crate) struct PartAggregator {
    parts: Vec<Option<CompletedPart>>,
    received: usize,
    error: ErrorSlot,
    events: Arc<dyn EventSink>,
}

impl PartAggregator {
    pub(crate) fn new(part_count: usize, events: Arc<dyn EventSink>) -> Self {
        Self {
            parts: vec![None; part_count],
            received: 0,
            error: ErrorSlot::default(),
            events,
        }
    }

    /// Results still to be received.
    pub(crate) fn outstanding(&self) -> usize {
        self.parts.len().saturating_sub(self.received)
    }

    pub(crate) fn record(&mut self, result: PartResult) {
        self.received += 1;
        let PartResult {
            part_number,
            outcome,
        } = result;
        match outcome {
            Ok(e_tag) => {
                let slot = usize::try_from(part_number - 1)
                    .ok()
                    .and_then(|index| self.parts.get_mut(index));
                match slot {
                    Some(slot) => {
                        *slot = Some(
                            CompletedPart::builder()
                                .e_tag(e_tag)
                                .part_number(part_number)
                                .build(),
                        )
                    }
                    None => self.fail(CopyError::MissingParts {
                        expected: self.parts.len(),
                        received: self.received,
                    }),
                }
            }
            Err(error) => self.fail(error),
        }
    }

    /// Record a failure, keeping the first one.
    pub(crate) fn fail(&mut self, error: CopyError) {
        if let Err(error) = self.error.set(error) {
            self.events.emit(CopyEvent::ErrorSuppressed {
                error: error.to_string(),
            });
        }
    }

    /// The completed parts in part number order, or the first error recorded.
    pub(crate) fn finish(mut self) -> Result<Vec<CompletedPart>, CopyError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let expected = self.parts.len();
        let parts: Vec<_> = self.parts.into_iter().flatten().collect();
        if parts.len() == expected {
            Ok(parts)
        } else {
            Err(CopyError::MissingParts {
                expected,
                received: parts.len(),
            })
        }
    }
}
