//! In-memory stand-ins for S3 and for the event sink.

use async_trait::async_trait;
use aws_sdk_s3::types::CompletedPart;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use typed_builder::TypedBuilder;

use super::api::{CopyUploadPart, RegionClients, RequestOptions, S3Api};
use super::attributes::CopyAttributes;
use super::events::{CopyEvent, EventSink};
use super::S3Object;
use crate::types::BoxError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fail_with(message: &Option<String>) -> Result<(), BoxError> {
    match message {
        Some(message) => Err(message.clone().into()),
        None => Ok(()),
    }
}

/// An [S3Api] which counts its calls and fails on demand.
///
/// Parts are given the entity tag `etag-{part_number}`.
#[derive(Debug, TypedBuilder)]
pub struct MockS3Api {
    /// Content length returned by `HeadObject`.
    #[builder(default, setter(strip_option))]
    content_length: Option<i64>,
    #[builder(default = Some("an-id".to_string()))]
    upload_id: Option<String>,
    #[builder(default, setter(strip_option, into))]
    head_error: Option<String>,
    #[builder(default, setter(strip_option, into))]
    copy_error: Option<String>,
    #[builder(default, setter(strip_option, into))]
    create_error: Option<String>,
    #[builder(default, setter(strip_option, into))]
    complete_error: Option<String>,
    #[builder(default, setter(strip_option, into))]
    abort_error: Option<String>,
    #[builder(default, setter(strip_option, into))]
    delete_error: Option<String>,
    /// Parts whose copy fails with `part {part_number} failed`.
    #[builder(default, setter(into))]
    failing_parts: HashSet<i32>,
    /// How long the copy of a part takes.
    #[builder(default, setter(into))]
    part_delays: HashMap<i32, Duration>,

    #[builder(default, setter(skip))]
    head_object_calls: AtomicUsize,
    #[builder(default, setter(skip))]
    copy_object_calls: AtomicUsize,
    #[builder(default, setter(skip))]
    create_multipart_upload_calls: AtomicUsize,
    #[builder(default, setter(skip))]
    complete_multipart_upload_calls: AtomicUsize,
    #[builder(default, setter(skip))]
    abort_multipart_upload_calls: AtomicUsize,
    #[builder(default, setter(skip))]
    delete_object_calls: AtomicUsize,
    #[builder(default, setter(skip))]
    part_calls: Mutex<Vec<(i32, String)>>,
    #[builder(default, setter(skip))]
    completed_parts: Mutex<Vec<Vec<String>>>,
    #[builder(default, setter(skip))]
    deleted: Mutex<Vec<S3Object>>,
}

impl Default for MockS3Api {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MockS3Api {
    pub fn head_object_calls(&self) -> usize {
        self.head_object_calls.load(Ordering::SeqCst)
    }

    pub fn copy_object_calls(&self) -> usize {
        self.copy_object_calls.load(Ordering::SeqCst)
    }

    pub fn create_multipart_upload_calls(&self) -> usize {
        self.create_multipart_upload_calls.load(Ordering::SeqCst)
    }

    pub fn upload_part_copy_calls(&self) -> usize {
        lock(&self.part_calls).len()
    }

    pub fn complete_multipart_upload_calls(&self) -> usize {
        self.complete_multipart_upload_calls.load(Ordering::SeqCst)
    }

    pub fn abort_multipart_upload_calls(&self) -> usize {
        self.abort_multipart_upload_calls.load(Ordering::SeqCst)
    }

    pub fn delete_object_calls(&self) -> usize {
        self.delete_object_calls.load(Ordering::SeqCst)
    }

    /// Part numbers and ranges, in the order the copies started.
    pub fn part_calls(&self) -> Vec<(i32, String)> {
        lock(&self.part_calls).clone()
    }

    /// The entity tags sent with each `CompleteMultipartUpload`.
    pub fn completed_parts(&self) -> Vec<Vec<String>> {
        lock(&self.completed_parts).clone()
    }

    pub fn deleted(&self) -> Vec<S3Object> {
        lock(&self.deleted).clone()
    }
}

#[async_trait]
impl S3Api for MockS3Api {
    async fn head_object(
        &self,
        _object: &S3Object,
        _options: &RequestOptions,
    ) -> Result<Option<i64>, BoxError> {
        self.head_object_calls.fetch_add(1, Ordering::SeqCst);
        fail_with(&self.head_error)?;
        Ok(self.content_length)
    }

    async fn copy_object(
        &self,
        _source: &S3Object,
        _destination: &S3Object,
        _attributes: &CopyAttributes,
        _options: &RequestOptions,
    ) -> Result<Option<String>, BoxError> {
        self.copy_object_calls.fetch_add(1, Ordering::SeqCst);
        fail_with(&self.copy_error)?;
        Ok(Some("etag".to_string()))
    }

    async fn create_multipart_upload(
        &self,
        _destination: &S3Object,
        _attributes: &CopyAttributes,
        _options: &RequestOptions,
    ) -> Result<Option<String>, BoxError> {
        self.create_multipart_upload_calls
            .fetch_add(1, Ordering::SeqCst);
        fail_with(&self.create_error)?;
        Ok(self.upload_id.clone())
    }

    async fn upload_part_copy(
        &self,
        part: CopyUploadPart<'_>,
        _options: &RequestOptions,
    ) -> Result<Option<String>, BoxError> {
        let part_number = part.part_number;
        lock(&self.part_calls).push((part_number, part.byte_range.to_string()));
        if let Some(delay) = self.part_delays.get(&part_number) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_parts.contains(&part_number) {
            return Err(format!("part {part_number} failed").into());
        }
        Ok(Some(format!("etag-{part_number}")))
    }

    async fn complete_multipart_upload(
        &self,
        _destination: &S3Object,
        _upload_id: &str,
        parts: Vec<CompletedPart>,
        _attributes: &CopyAttributes,
        _options: &RequestOptions,
    ) -> Result<(), BoxError> {
        self.complete_multipart_upload_calls
            .fetch_add(1, Ordering::SeqCst);
        lock(&self.completed_parts).push(
            parts
                .iter()
                .filter_map(|part| part.e_tag().map(str::to_owned))
                .collect(),
        );
        fail_with(&self.complete_error)
    }

    async fn abort_multipart_upload(
        &self,
        _destination: &S3Object,
        _upload_id: &str,
        _attributes: &CopyAttributes,
        _options: &RequestOptions,
    ) -> Result<(), BoxError> {
        self.abort_multipart_upload_calls
            .fetch_add(1, Ordering::SeqCst);
        fail_with(&self.abort_error)
    }

    async fn delete_object(
        &self,
        object: &S3Object,
        _attributes: &CopyAttributes,
        _options: &RequestOptions,
    ) -> Result<(), BoxError> {
        self.delete_object_calls.fetch_add(1, Ordering::SeqCst);
        fail_with(&self.delete_error)?;
        lock(&self.deleted).push(object.clone());
        Ok(())
    }
}

/// [RegionClients] handing out fixed clients, or a default [MockS3Api] for
/// regions without one.
#[derive(Debug, Default)]
pub struct StaticRegionClients {
    clients: HashMap<String, Arc<dyn S3Api>>,
}

impl StaticRegionClients {
    pub fn with_client(mut self, region: impl Into<String>, client: Arc<dyn S3Api>) -> Self {
        self.clients.insert(region.into(), client);
        self
    }
}

impl RegionClients for StaticRegionClients {
    fn client_for_region(&self, region: &str) -> Arc<dyn S3Api> {
        self.clients
            .get(region)
            .cloned()
            .unwrap_or_else(|| Arc::new(MockS3Api::default()))
    }
}

/// An [EventSink] keeping every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CopyEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CopyEvent> {
        lock(&self.events).clone()
    }

    /// Whether an event rendered exactly as `message` was emitted.
    pub fn contains(&self, message: &str) -> bool {
        lock(&self.events)
            .iter()
            .any(|event| event.to_string() == message)
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: CopyEvent) {
        lock(&self.events).push(event);
    }
}
