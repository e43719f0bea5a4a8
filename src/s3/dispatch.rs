//! The producer and the bounded pool of workers copying parts.
//!
//! ```text
//!  producer ──(tasks, bounded)──> worker 1..=n ──(results, bounded)──> collector
//! ```
//!
//! The producer enqueues every [PartTask] and closes the work queue. Each
//! worker copies one part per task and always publishes a [PartResult], failed
//! or not. The collector is the [CopySession](super::session::CopySession),
//! which drains the result queue while the producer and workers run.

use async_channel::Receiver;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;

use super::api::{CopyUploadPart, RequestOptions, S3Api};
use super::attributes::CopyAttributes;
use super::error::CopyError;
use super::events::{CopyEvent, EventSink};
use super::part::{PartResult, PartTask};
use super::session::CallGuard;
use super::S3Object;

/// Everything a worker needs to copy a part.
#[derive(Debug)]
pub(crate) struct PartCopier {
    pub(crate) client: Arc<dyn S3Api>,
    pub(crate) source: S3Object,
    pub(crate) destination: S3Object,
    pub(crate) attributes: CopyAttributes,
    pub(crate) options: RequestOptions,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) guard: CallGuard,
}

impl PartCopier {
    /// Copy the range of `task`. Never retries, retries are left to the SDK.
    pub(crate) async fn copy_part(&self, task: PartTask) -> PartResult {
        let PartTask {
            part_number,
            range,
            upload_id,
        } = task;
        self.events.emit(CopyEvent::PartStarted {
            part_number,
            range: range.to_string(),
        });

        let part = CopyUploadPart::builder()
            .source(&self.source)
            .destination(&self.destination)
            .upload_id(upload_id.as_ref())
            .part_number(part_number)
            .byte_range(range)
            .attributes(&self.attributes)
            .build();
        let outcome = self
            .guard
            .call(self.client.upload_part_copy(part, &self.options), |source| {
                CopyError::PartCopy {
                    part_number,
                    source,
                }
            })
            .await
            .and_then(|e_tag| e_tag.ok_or(CopyError::MissingEntityTag(part_number)));

        match &outcome {
            Ok(e_tag) => self.events.emit(CopyEvent::PartCompleted {
                part_number,
                e_tag: e_tag.clone(),
            }),
            Err(error) => self.events.emit(CopyEvent::PartFailed {
                part_number,
                error: error.to_string(),
            }),
        }
        PartResult {
            part_number,
            outcome,
        }
    }
}

/// The running producer and workers of one multipart copy.
#[derive(Debug)]
pub(crate) struct Dispatch {
    /// Closed once every worker has exited.
    pub(crate) results: Receiver<PartResult>,
    producer: JoinHandle<()>,
    workers: JoinSet<()>,
}

impl Dispatch {
    /// Start `workers` workers (at least one) copying `tasks`.
    pub(crate) fn start<I>(copier: Arc<PartCopier>, tasks: I, workers: usize) -> Self
    where
        I: Iterator<Item = PartTask> + Send + 'static,
    {
        let workers = workers.max(1);
        let (task_tx, task_rx) = async_channel::bounded::<PartTask>(workers);
        let (result_tx, results) = async_channel::bounded(workers);

        let producer = tokio::spawn(
            async move {
                for task in tasks {
                    // Every worker is gone, nobody is left to copy the rest.
                    if task_tx.send(task).await.is_err() {
                        break;
                    }
                }
            }
            .in_current_span(),
        );

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let copier = copier.clone();
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            pool.spawn(
                async move {
                    while let Ok(task) = task_rx.recv().await {
                        let result = copier.copy_part(task).await;
                        if result_tx.send(result).await.is_err() {
                            break;
                        }
                    }
                }
                .in_current_span(),
            );
        }

        Self {
            results,
            producer,
            workers: pool,
        }
    }

    /// Wait for the producer and every worker to exit.
    pub(crate) async fn join(self) -> Result<(), CopyError> {
        let Self {
            results,
            producer,
            mut workers,
        } = self;
        // Unblock workers still trying to publish.
        results.close();
        let drain_workers = async move {
            while let Some(worker) = workers.join_next().await {
                worker?;
            }
            Ok::<_, CopyError>(())
        };
        let producer = async move { producer.await.map_err(CopyError::from) };
        futures::future::try_join(producer, drain_workers).await?;
        Ok(())
    }
}
