use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use typed_builder::TypedBuilder;

use super::api::{RegionClients, RequestOptions, S3Api};
use super::attributes::CopyAttributes;
use super::error::{CopyError, DeleteError};
use super::events::{EventSink, TracingSink};
use super::part::{CopyStrategy, PartSize};
use super::session::CopySession;
use super::S3Object;

/// The default number of parts copied at once.
pub const DEFAULT_CONCURRENCY: usize = 64;

/// The default deadline of a copy, 18 hours.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(18 * 60 * 60);

/// Copies objects between S3 locations.
///
/// A `Copier` holds the settings shared by many copies. It is cheap to clone
/// and is never changed by a copy, so it can be shared between tasks. Settings
/// for a single copy are layered onto a clone with the `with_*` methods.
///
/// Objects strictly smaller than the part size are copied with one
/// `CopyObject` request, anything else with a multipart upload whose parts
/// are copied concurrently with `UploadPartCopy`.
///
/// # Example
///
/// ```no_run
/// use cobalt_s3cp::config::load_from_env;
/// use cobalt_s3cp::s3::{Client, Copier, CopyRequest, S3Object};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let shared_config = load_from_env(None).await.unwrap();
/// let copier = Copier::builder()
///     .client(Arc::new(Client::new(&shared_config)))
///     .build();
///
/// let request = CopyRequest::builder()
///     .source("source-bucket/path/to/object")
///     .destination(S3Object::new("destination-bucket", "path/to/copy"))
///     .build();
/// let outcome = copier.copy(request).await.unwrap();
/// println!("copied {} bytes", outcome.content_length);
/// # })
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct Copier {
    /// The client used for the destination, and for the source when no
    /// source region is requested.
    pub(crate) client: Arc<dyn S3Api>,
    /// Creates clients for sources in other regions.
    #[builder(default, setter(strip_option))]
    pub(crate) region_clients: Option<Arc<dyn RegionClients>>,
    #[builder(default)]
    pub(crate) part_size: PartSize,
    /// The number of parts copied at once. Zero is treated as one.
    #[builder(default = DEFAULT_CONCURRENCY)]
    pub(crate) concurrency: usize,
    /// The deadline of each copy, measured from its start.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub(crate) timeout: Duration,
    /// Keep the parts of a failed multipart copy instead of aborting the upload.
    #[builder(default)]
    pub(crate) leave_parts_on_error: bool,
    #[builder(default)]
    pub(crate) request_options: RequestOptions,
    #[builder(default = Arc::new(TracingSink) as Arc<dyn EventSink>)]
    pub(crate) events: Arc<dyn EventSink>,
}

impl Copier {
    pub fn with_part_size(mut self, part_size: PartSize) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_leave_parts_on_error(mut self, leave_parts_on_error: bool) -> Self {
        self.leave_parts_on_error = leave_parts_on_error;
        self
    }

    /// Add request headers after the ones already configured.
    pub fn with_request_options(mut self, request_options: RequestOptions) -> Self {
        self.request_options.extend(request_options);
        self
    }

    pub fn part_size(&self) -> PartSize {
        self.part_size
    }

    /// The number of workers used for a copy, never zero.
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn leave_parts_on_error(&self) -> bool {
        self.leave_parts_on_error
    }

    pub fn request_options(&self) -> &RequestOptions {
        &self.request_options
    }

    /// Copy an object, resolving once the copy has finished.
    ///
    /// ## Errors
    ///
    /// The first error of the copy. A failure to delete the source is not an
    /// error, it is reported in [CopyOutcome::delete_error].
    pub async fn copy(&self, request: CopyRequest) -> Result<CopyOutcome, CopyError> {
        self.copy_with_cancellation(request, &CancellationToken::new())
            .await
    }

    /// Copy an object, stopping early when `token` is cancelled.
    ///
    /// A cancelled multipart copy is aborted unless it is set to leave its
    /// parts on error, and returns [CopyError::Cancelled].
    pub async fn copy_with_cancellation(
        &self,
        request: CopyRequest,
        token: &CancellationToken,
    ) -> Result<CopyOutcome, CopyError> {
        CopySession::new(self, request, token.child_token())
            .run()
            .await
    }

    /// Run a copy in the background.
    pub fn spawn(&self, request: CopyRequest) -> CopyHandle {
        let token = CancellationToken::new();
        let copier = self.clone();
        let session_token = token.clone();
        let handle = tokio::spawn(
            async move {
                copier
                    .copy_with_cancellation(request, &session_token)
                    .await
            }
            .in_current_span(),
        );
        CopyHandle { token, handle }
    }
}

/// A copy running in the background, see [Copier::spawn].
#[derive(Debug)]
pub struct CopyHandle {
    token: CancellationToken,
    handle: JoinHandle<Result<CopyOutcome, CopyError>>,
}

impl CopyHandle {
    /// Ask the copy to stop. Use [CopyHandle::wait] to find out how it ended.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the copy to end.
    pub async fn wait(self) -> Result<CopyOutcome, CopyError> {
        self.handle.await?
    }
}

/// What to copy, and where to.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CopyRequest {
    /// The `bucket/key` locator of the object to copy.
    #[builder(default, setter(strip_option, into))]
    pub source: Option<String>,
    pub destination: S3Object,
    /// The size of the source in bytes, looked up when absent or not positive.
    #[builder(default, setter(strip_option))]
    pub size: Option<i64>,
    /// The region of the source bucket when it differs from the destination's.
    #[builder(default, setter(strip_option, into))]
    pub source_region: Option<String>,
    /// Delete the source once the copy succeeded.
    #[builder(default)]
    pub delete_source: bool,
    #[builder(default)]
    pub attributes: CopyAttributes,
}

impl CopyRequest {
    /// The declared size, when it can be trusted.
    pub fn declared_size(&self) -> Option<i64> {
        self.size.filter(|size| *size > 0)
    }
}

/// The result of a successful copy.
#[derive(Debug)]
pub struct CopyOutcome {
    pub strategy: CopyStrategy,
    pub content_length: i64,
    /// The number of parts of a multipart copy, 0 for a single request copy.
    pub part_count: i32,
    pub source_deleted: bool,
    /// Set when the source should have been deleted but could not be.
    pub delete_error: Option<DeleteError>,
}
