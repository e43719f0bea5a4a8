//! One copy, from parsing the source locator to deleting the source.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::instrument;

use super::aggregate::PartAggregator;
use super::api::S3Api;
use super::copier::{CopyOutcome, CopyRequest, Copier};
use super::dispatch::{Dispatch, PartCopier};
use super::error::{CopyError, DeleteError};
use super::events::CopyEvent;
use super::part::{part_count, partition, CopyStrategy, UploadId};
use super::s3_object::{LocatorError, S3Object};
use crate::types::BoxError;

/// Bounds every remote call of a session by its cancellation scope and deadline.
#[derive(Debug, Clone)]
pub(crate) struct CallGuard {
    token: CancellationToken,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl CallGuard {
    /// The deadline is `timeout` from now. A timeout too large to represent never expires.
    pub(crate) fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now().checked_add(timeout),
            timeout,
        }
    }

    /// Run `call`, unless the session is cancelled or out of time first.
    ///
    /// The outer error reports the interruption, the inner result is the call's own.
    pub(crate) async fn run<T, F>(&self, call: F) -> Result<Result<T, BoxError>, CopyError>
    where
        F: Future<Output = Result<T, BoxError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CopyError::Cancelled),
            _ = deadline => Err(CopyError::DeadlineExceeded(self.timeout)),
            result = call => Ok(result),
        }
    }

    /// Run `call`, wrapping its error with `stage`.
    pub(crate) async fn call<T, F>(
        &self,
        call: F,
        stage: impl FnOnce(BoxError) -> CopyError,
    ) -> Result<T, CopyError>
    where
        F: Future<Output = Result<T, BoxError>>,
    {
        self.run(call).await?.map_err(stage)
    }
}

/// The state of a single copy.
///
/// The session owns a child of the caller's cancellation token. Dropping the
/// session cancels it, so remote calls still running in spawned workers stop
/// when the copy future is dropped.
#[derive(Debug)]
pub(crate) struct CopySession<'a> {
    copier: &'a Copier,
    request: CopyRequest,
    guard: CallGuard,
    _cancel_on_exit: DropGuard,
}

impl<'a> CopySession<'a> {
    pub(crate) fn new(copier: &'a Copier, request: CopyRequest, token: CancellationToken) -> Self {
        Self {
            copier,
            request,
            guard: CallGuard::new(token.clone(), copier.timeout),
            _cancel_on_exit: token.drop_guard(),
        }
    }

    #[instrument(skip(self), fields(source = ?self.request.source, destination = %self.request.destination))]
    pub(crate) async fn run(self) -> Result<CopyOutcome, CopyError> {
        let locator = self
            .request
            .source
            .as_deref()
            .ok_or(LocatorError::MissingSource)?;
        let source = S3Object::from_locator(locator)?;
        self.request.destination.validate_destination()?;
        let source_client = self.source_client()?;

        let content_length = self.resolve_size(source_client.as_ref(), &source).await?;
        let strategy = CopyStrategy::select(content_length, &self.copier.part_size);
        self.copier.events.emit(CopyEvent::StrategySelected {
            source: source.copy_source(),
            destination: self.request.destination.copy_source(),
            strategy,
        });

        let part_count = match strategy {
            CopyStrategy::Single => {
                self.copy_single(&source).await?;
                0
            }
            CopyStrategy::Multipart => self.copy_multipart(&source, content_length).await?,
        };

        let mut outcome = CopyOutcome {
            strategy,
            content_length,
            part_count,
            source_deleted: false,
            delete_error: None,
        };
        if self.request.delete_source {
            match self.delete_source(source_client.as_ref(), source).await {
                Ok(()) => outcome.source_deleted = true,
                Err(error) => outcome.delete_error = Some(error),
            }
        }
        Ok(outcome)
    }

    /// The client reaching the source, which differs from the destination
    /// client only when a source region is requested.
    fn source_client(&self) -> Result<Arc<dyn S3Api>, CopyError> {
        match self.request.source_region.as_deref() {
            Some(region) if !region.is_empty() => self
                .copier
                .region_clients
                .as_ref()
                .map(|clients| clients.client_for_region(region))
                .ok_or_else(|| CopyError::NoRegionClient(region.to_owned())),
            _ => Ok(self.copier.client.clone()),
        }
    }

    /// A positive declared size is trusted, anything else is looked up.
    async fn resolve_size(&self, client: &dyn S3Api, source: &S3Object) -> Result<i64, CopyError> {
        let declared = self.request.declared_size();
        let content_length = match declared {
            Some(size) => size,
            None => self
                .guard
                .call(
                    client.head_object(source, &self.copier.request_options),
                    CopyError::SizeResolution,
                )
                .await?
                .ok_or_else(|| CopyError::MissingContentLength(source.clone()))?,
        };
        self.copier.events.emit(CopyEvent::SizeResolved {
            source: source.copy_source(),
            content_length,
            declared: declared.is_some(),
        });
        Ok(content_length)
    }

    async fn copy_single(&self, source: &S3Object) -> Result<(), CopyError> {
        let destination = &self.request.destination;
        self.guard
            .call(
                self.copier.client.copy_object(
                    source,
                    destination,
                    &self.request.attributes,
                    &self.copier.request_options,
                ),
                CopyError::Copy,
            )
            .await?;
        self.copier.events.emit(CopyEvent::ObjectCopied {
            source: source.copy_source(),
            destination: destination.copy_source(),
        });
        Ok(())
    }

    /// Returns the number of parts copied.
    async fn copy_multipart(&self, source: &S3Object, content_length: i64) -> Result<i32, CopyError> {
        let part_count = part_count(content_length, &self.copier.part_size)?;
        let upload_id = self
            .guard
            .call(
                self.copier.client.create_multipart_upload(
                    &self.request.destination,
                    &self.request.attributes,
                    &self.copier.request_options,
                ),
                CopyError::MultipartCreate,
            )
            .await?
            .ok_or(CopyError::MissingUploadId)?;
        let upload_id = UploadId::from(upload_id.as_str());
        self.copier.events.emit(CopyEvent::MultipartCreated {
            upload_id: upload_id.to_string(),
            part_count,
        });

        match self.copy_parts(source, content_length, part_count, &upload_id).await {
            Ok(()) => {
                self.copier.events.emit(CopyEvent::MultipartCompleted {
                    upload_id: upload_id.to_string(),
                });
                Ok(part_count)
            }
            Err(error) => {
                self.abandon(&upload_id).await;
                Err(error)
            }
        }
    }

    /// Copy every part and complete the upload.
    async fn copy_parts(
        &self,
        source: &S3Object,
        content_length: i64,
        part_count: i32,
        upload_id: &UploadId,
    ) -> Result<(), CopyError> {
        let expected = usize::try_from(part_count)?;
        let tasks = partition(content_length, self.copier.part_size, upload_id.clone())?;
        let part_copier = Arc::new(PartCopier {
            client: self.copier.client.clone(),
            source: source.clone(),
            destination: self.request.destination.clone(),
            attributes: self.request.attributes.clone(),
            options: self.copier.request_options.clone(),
            events: self.copier.events.clone(),
            guard: self.guard.clone(),
        });

        let mut aggregator = PartAggregator::new(expected, self.copier.events.clone());
        let dispatch = Dispatch::start(part_copier, tasks, self.copier.concurrency().min(expected));
        while aggregator.outstanding() > 0 {
            match dispatch.results.recv().await {
                Ok(result) => aggregator.record(result),
                // Every worker exited, the shortfall is reported by `finish`.
                Err(_) => break,
            }
        }
        if let Err(error) = dispatch.join().await {
            aggregator.fail(error);
        }
        let parts = aggregator.finish()?;

        self.guard
            .call(
                self.copier.client.complete_multipart_upload(
                    &self.request.destination,
                    upload_id.as_ref(),
                    parts,
                    &self.request.attributes,
                    &self.copier.request_options,
                ),
                CopyError::Finalize,
            )
            .await
    }

    /// Abort the upload after a failure, unless its parts are to be kept.
    ///
    /// Runs outside of the cancellation scope so that a cancelled copy still
    /// cleans up after itself.
    async fn abandon(&self, upload_id: &UploadId) {
        let upload_id = upload_id.to_string();
        if self.copier.leave_parts_on_error {
            self.copier
                .events
                .emit(CopyEvent::PartsLeftOnError { upload_id });
            return;
        }
        let aborted = self
            .copier
            .client
            .abort_multipart_upload(
                &self.request.destination,
                &upload_id,
                &self.request.attributes,
                &self.copier.request_options,
            )
            .await;
        match aborted {
            Ok(()) => self
                .copier
                .events
                .emit(CopyEvent::MultipartAborted { upload_id }),
            Err(error) => self.copier.events.emit(CopyEvent::AbortFailed {
                upload_id,
                error: error.to_string(),
            }),
        }
    }

    async fn delete_source(&self, client: &dyn S3Api, source: S3Object) -> Result<(), DeleteError> {
        let deleted = match self
            .guard
            .run(client.delete_object(
                &source,
                &self.request.attributes,
                &self.copier.request_options,
            ))
            .await
        {
            Ok(result) => result,
            Err(interrupted) => Err(interrupted.into()),
        };
        match deleted {
            Ok(()) => {
                self.copier.events.emit(CopyEvent::SourceDeleted {
                    source: source.copy_source(),
                });
                Ok(())
            }
            Err(error) => {
                self.copier.events.emit(CopyEvent::DeleteFailed {
                    source: source.copy_source(),
                    error: error.to_string(),
                });
                Err(DeleteError {
                    object: source,
                    source: error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::part::PartSize;
    use crate::s3::test_utils::{MockS3Api, RecordingSink, StaticRegionClients};
    use assert_matches::assert_matches;
    use proptest::prop_assert_eq;
    use std::collections::HashMap;
    use test_strategy::proptest;

    const PART: i64 = 10;

    fn destination() -> S3Object {
        S3Object::new("dst-bucket", "dst-key")
    }

    fn copier(client: &Arc<MockS3Api>, events: &Arc<RecordingSink>) -> Copier {
        Copier::builder()
            .client(client.clone())
            .part_size(PartSize::try_from(PART).unwrap())
            .concurrency(2)
            .events(events.clone())
            .build()
    }

    #[tokio::test]
    async fn test_call_guard_passes_results_through() {
        let guard = CallGuard::new(CancellationToken::new(), Duration::from_secs(1));
        let ok = guard.call(async { Ok::<_, BoxError>(1) }, CopyError::Copy).await;
        assert_matches!(ok, Ok(1));
        let failed = guard
            .call(async { Err::<(), _>(BoxError::from("boom")) }, CopyError::Copy)
            .await;
        assert_eq!(failed.unwrap_err().to_string(), "error copying object: boom");
    }

    #[tokio::test]
    async fn test_call_guard_cancelled() {
        let token = CancellationToken::new();
        let guard = CallGuard::new(token.clone(), Duration::from_secs(1));
        token.cancel();
        let result = guard.call(async { Ok::<_, BoxError>(1) }, CopyError::Copy).await;
        assert_matches!(result, Err(CopyError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_guard_deadline() {
        let guard = CallGuard::new(CancellationToken::new(), Duration::from_secs(1));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BoxError>(())
        };
        let result = guard.call(slow, CopyError::Copy).await;
        assert_matches!(result, Err(CopyError::DeadlineExceeded(timeout)) if timeout == Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_call_guard_unbounded_timeout() {
        let guard = CallGuard::new(CancellationToken::new(), Duration::MAX);
        let result = guard.call(async { Ok::<_, BoxError>(()) }, CopyError::Copy).await;
        assert!(result.is_ok());
    }

    #[proptest(async = "tokio")]
    async fn test_declared_size_skips_lookup(#[strategy(1..=i64::MAX)] size: i64) {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(size)
            .build();

        // Every declared size but the largest fits in one part.
        let outcome = copier(&client, &events)
            .with_part_size(PartSize::try_from(i64::MAX)?)
            .copy(request)
            .await?;
        prop_assert_eq!(outcome.content_length, size);
        prop_assert_eq!(client.head_object_calls(), 0);
        prop_assert_eq!(client.copy_object_calls() + client.upload_part_copy_calls(), 1);
    }

    #[tokio::test]
    async fn test_declared_size_copied_in_one_request() {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(5)
            .build();

        let outcome = copier(&client, &events).copy(request).await.unwrap();
        assert_eq!(outcome.strategy, CopyStrategy::Single);
        assert_eq!(outcome.content_length, 5);
        assert_eq!(client.head_object_calls(), 0);
        assert_eq!(client.copy_object_calls(), 1);
        assert_eq!(client.create_multipart_upload_calls(), 0);
        assert!(events.contains("copied src-bucket/src-key to dst-bucket/dst-key"));
    }

    #[tokio::test]
    async fn test_size_looked_up_when_not_declared() {
        let client = Arc::new(MockS3Api::builder().content_length(25).build());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(-1)
            .build();

        let outcome = copier(&client, &events).copy(request).await.unwrap();
        assert_eq!(outcome.strategy, CopyStrategy::Multipart);
        assert_eq!(outcome.part_count, 3);
        assert_eq!(client.head_object_calls(), 1);
        assert_eq!(client.upload_part_copy_calls(), 3);
        assert_eq!(client.complete_multipart_upload_calls(), 1);
        assert_eq!(client.abort_multipart_upload_calls(), 0);
    }

    #[tokio::test]
    async fn test_size_lookup_failure() {
        let client = Arc::new(MockS3Api::builder().head_error("boom").build());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .build();

        let error = copier(&client, &events).copy(request).await.unwrap_err();
        assert_eq!(error.to_string(), "error getting object info: boom");
        assert_eq!(client.copy_object_calls(), 0);
        assert_eq!(client.create_multipart_upload_calls(), 0);
    }

    #[tokio::test]
    async fn test_size_lookup_without_length() {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .build();

        let result = copier(&client, &events).copy(request).await;
        assert_matches!(result, Err(CopyError::MissingContentLength(object)) if object == S3Object::new("src-bucket", "src-key"));
    }

    #[tokio::test]
    async fn test_missing_source_never_deletes() {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .destination(destination())
            .size(5)
            .delete_source(true)
            .build();

        let result = copier(&client, &events).copy(request).await;
        assert_matches!(result, Err(CopyError::Locator(LocatorError::MissingSource)));
        assert_eq!(client.copy_object_calls(), 0);
        assert_eq!(client.delete_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_locators() {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let copier = copier(&client, &events);

        let request = CopyRequest::builder()
            .source("no-key")
            .destination(destination())
            .size(5)
            .build();
        assert_matches!(
            copier.copy(request).await,
            Err(CopyError::Locator(LocatorError::Malformed(_)))
        );

        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(S3Object::new("dst-bucket", ""))
            .size(5)
            .build();
        assert_matches!(
            copier.copy(request).await,
            Err(CopyError::Locator(LocatorError::EmptyDestination(_)))
        );
        assert_eq!(client.copy_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_copies_no_parts() {
        let client = Arc::new(MockS3Api::builder().create_error("denied").build());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(3 * PART)
            .delete_source(true)
            .build();

        let error = copier(&client, &events).copy(request).await.unwrap_err();
        assert_eq!(error.to_string(), "error creating multipart upload: denied");
        assert_eq!(client.create_multipart_upload_calls(), 1);
        assert_eq!(client.upload_part_copy_calls(), 0);
        assert_eq!(client.abort_multipart_upload_calls(), 0);
        assert_eq!(client.delete_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_upload_id() {
        let client = Arc::new(MockS3Api::builder().upload_id(None).build());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(3 * PART)
            .build();

        let result = copier(&client, &events).copy(request).await;
        assert_matches!(result, Err(CopyError::MissingUploadId));
        assert_eq!(client.upload_part_copy_calls(), 0);
    }

    #[tokio::test]
    async fn test_part_failure_aborts_upload() {
        let client = Arc::new(MockS3Api::builder().failing_parts([1]).build());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(2 * PART - 1)
            .delete_source(true)
            .build();

        let error = copier(&client, &events)
            .with_concurrency(1)
            .copy(request)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "error copying part 1: part 1 failed");
        assert_eq!(client.create_multipart_upload_calls(), 1);
        assert_eq!(client.upload_part_copy_calls(), 2);
        assert!(events.contains("Part: 1 copying bytes=0-9"));
        assert!(events.contains("Part: 2 copying bytes=10-18"));
        assert_eq!(client.complete_multipart_upload_calls(), 0);
        assert_eq!(client.abort_multipart_upload_calls(), 1);
        assert_eq!(client.delete_object_calls(), 0);
        assert!(events.contains("aborted multipart upload an-id"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parts_completed_in_part_order() {
        let client = Arc::new(
            MockS3Api::builder()
                .part_delays(HashMap::from([(1, Duration::from_millis(50))]))
                .build(),
        );
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(2 * PART)
            .build();

        copier(&client, &events).copy(request).await.unwrap();

        let finished: Vec<_> = events
            .events()
            .into_iter()
            .filter_map(|event| match event {
                CopyEvent::PartCompleted { part_number, .. } => Some(part_number),
                _ => None,
            })
            .collect();
        assert_eq!(finished, [2, 1]);
        assert_eq!(
            client.completed_parts(),
            vec![vec!["etag-1".to_string(), "etag-2".to_string()]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_error_wins() {
        let client = Arc::new(
            MockS3Api::builder()
                .failing_parts([1, 2])
                .part_delays(HashMap::from([(1, Duration::from_millis(50))]))
                .build(),
        );
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(2 * PART)
            .build();

        let error = copier(&client, &events).copy(request).await.unwrap_err();
        assert_eq!(error.to_string(), "error copying part 2: part 2 failed");
        assert!(events.contains(
            "ignoring error after the first failure: error copying part 1: part 1 failed"
        ));
        assert_eq!(client.complete_multipart_upload_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_gating() {
        let events = Arc::new(RecordingSink::default());

        let client = Arc::new(MockS3Api::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(3 * PART)
            .delete_source(true)
            .build();
        let outcome = copier(&client, &events).copy(request).await.unwrap();
        assert!(outcome.source_deleted);
        assert_eq!(client.delete_object_calls(), 1);
        assert_eq!(client.deleted(), vec![S3Object::new("src-bucket", "src-key")]);

        let client = Arc::new(MockS3Api::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(3 * PART)
            .build();
        let outcome = copier(&client, &events).copy(request).await.unwrap();
        assert!(!outcome.source_deleted);
        assert_eq!(client.delete_object_calls(), 0);

        let client = Arc::new(MockS3Api::builder().copy_error("denied").build());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(5)
            .delete_source(true)
            .build();
        let error = copier(&client, &events).copy(request).await.unwrap_err();
        assert_eq!(error.to_string(), "error copying object: denied");
        assert_eq!(client.delete_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_copy() {
        let client = Arc::new(MockS3Api::builder().delete_error("denied").build());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(5)
            .delete_source(true)
            .build();

        let outcome = copier(&client, &events).copy(request).await.unwrap();
        assert!(!outcome.source_deleted);
        let delete_error = outcome.delete_error.unwrap();
        assert_eq!(delete_error.object, S3Object::new("src-bucket", "src-key"));
        assert_eq!(
            delete_error.to_string(),
            "failed to delete s3://src-bucket/src-key: denied"
        );
        assert!(events.contains(r#"failed to delete "src-bucket/src-key": "denied""#));
    }

    #[tokio::test]
    async fn test_leave_parts_on_error() {
        let client = Arc::new(MockS3Api::builder().failing_parts([2]).build());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(3 * PART)
            .build();

        let result = copier(&client, &events)
            .with_leave_parts_on_error(true)
            .copy(request)
            .await;
        assert_matches!(result, Err(CopyError::PartCopy { part_number: 2, .. }));
        assert_eq!(client.abort_multipart_upload_calls(), 0);
        assert!(events.contains("leaving the parts of multipart upload an-id for manual recovery"));
    }

    #[tokio::test]
    async fn test_finalize_failure_aborts() {
        let client = Arc::new(MockS3Api::builder().complete_error("too small").build());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(3 * PART)
            .delete_source(true)
            .build();

        let error = copier(&client, &events).copy(request).await.unwrap_err();
        assert_eq!(error.to_string(), "error completing multipart upload: too small");
        assert_eq!(client.abort_multipart_upload_calls(), 1);
        assert_eq!(client.delete_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_abort_failure_is_reported() {
        let client = Arc::new(
            MockS3Api::builder()
                .failing_parts([1])
                .abort_error("gone")
                .build(),
        );
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(PART)
            .build();

        let result = copier(&client, &events).copy(request).await;
        assert_matches!(result, Err(CopyError::PartCopy { part_number: 1, .. }));
        assert!(events.contains("failed to abort multipart upload an-id: gone"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_upload() {
        let client = Arc::new(
            MockS3Api::builder()
                .part_delays(HashMap::from([(2, Duration::from_secs(120))]))
                .build(),
        );
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(2 * PART)
            .build();

        let result = copier(&client, &events)
            .with_timeout(Duration::from_secs(60))
            .copy(request)
            .await;
        assert_matches!(result, Err(CopyError::DeadlineExceeded(_)));
        assert_eq!(client.complete_multipart_upload_calls(), 0);
        assert_eq!(client.abort_multipart_upload_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_copy_aborts_upload() {
        let client = Arc::new(
            MockS3Api::builder()
                .part_delays(HashMap::from([(1, Duration::from_secs(120))]))
                .build(),
        );
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(2 * PART)
            .delete_source(true)
            .build();

        let handle = copier(&client, &events).spawn(request);
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();

        assert_matches!(handle.wait().await, Err(CopyError::Cancelled));
        assert_eq!(client.abort_multipart_upload_calls(), 1);
        assert_eq!(client.delete_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_source_region_client() {
        let source_client = Arc::new(MockS3Api::builder().content_length(5).build());
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let region_clients = StaticRegionClients::default().with_client("us-west-2", source_client.clone());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .source_region("us-west-2")
            .delete_source(true)
            .build();

        let copier = Copier::builder()
            .client(client.clone())
            .region_clients(Arc::new(region_clients))
            .events(events.clone())
            .build();
        copier.copy(request).await.unwrap();

        assert_eq!(source_client.head_object_calls(), 1);
        assert_eq!(source_client.delete_object_calls(), 1);
        assert_eq!(source_client.copy_object_calls(), 0);
        assert_eq!(client.head_object_calls(), 0);
        assert_eq!(client.copy_object_calls(), 1);
        assert_eq!(client.delete_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_source_region_without_factory() {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .source_region("us-west-2")
            .size(5)
            .build();

        let result = copier(&client, &events).copy(request).await;
        assert_matches!(result, Err(CopyError::NoRegionClient(region)) if region == "us-west-2");
        assert_eq!(client.copy_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_source_region_uses_default_client() {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .source_region("")
            .size(5)
            .build();

        copier(&client, &events).copy(request).await.unwrap();
        assert_eq!(client.copy_object_calls(), 1);
    }

    #[tokio::test]
    async fn test_repeated_copies_are_independent() {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let copier = copier(&client, &events);
        for _ in 0..2 {
            let request = CopyRequest::builder()
                .source("src-bucket/src-key")
                .destination(destination())
                .size(5)
                .build();
            copier.copy(request).await.unwrap();
        }
        assert_eq!(client.copy_object_calls(), 2);
        assert_eq!(client.create_multipart_upload_calls(), 0);
    }

    #[tokio::test]
    async fn test_object_of_exactly_one_part_is_multipart() {
        let client = Arc::new(MockS3Api::default());
        let events = Arc::new(RecordingSink::default());
        let request = CopyRequest::builder()
            .source("src-bucket/src-key")
            .destination(destination())
            .size(PART)
            .build();

        let outcome = copier(&client, &events).copy(request).await.unwrap();
        assert_eq!(outcome.strategy, CopyStrategy::Multipart);
        assert_eq!(outcome.part_count, 1);
        assert_eq!(client.part_calls(), vec![(1, "bytes=0-9".to_string())]);
    }
}
