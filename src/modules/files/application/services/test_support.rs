//! In-memory fakes of the outgoing ports, shared by the service tests.
//! They mirror the real adapters' semantics closely enough to exercise the
//! lifecycle logic: the file store simulates the partial unique index and
//! compare-and-set transitions, the blob store the batch-delete bookkeeping.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Utc};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::files::application::domain::entities::{
    FileRecord, FileStatus, FileTags, OptimizationStatus, ThumbnailRecord,
};
use crate::files::application::ports::outgoing::blob_storage::{
    BatchDeleteFailure, BatchDeleteOutcome, BlobByteStream, BlobHead, BlobObject, BlobStore,
    BlobStoreError, ByteRange,
};
use crate::files::application::ports::outgoing::db::{
    BulkDeleteOutcome, CompleteOptimization, FileListPage, FileRepository, FileRepositoryError,
    FileSortBy, ListFilesQuery, NewFileRecord, NewThumbnail, PromoteToReady, SoftDeleteOutcome,
    SortOrder, ThumbnailRepository, ThumbnailRepositoryError,
};
use crate::files::application::ports::outgoing::image_processor::{
    ImageProcessor, ImageProcessorError, ProcessParams, ProcessedImage, ProcessorHealth,
};

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

// ============================================================================
// File repository
// ============================================================================

#[derive(Default, Clone)]
pub struct InMemoryFileRepository {
    records: Arc<Mutex<HashMap<Uuid, FileRecord>>>,
}

impl InMemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn single_record(&self) -> FileRecord {
        let records = self.records.lock().unwrap();
        assert_eq!(records.len(), 1, "expected exactly one record");
        records.values().next().unwrap().clone()
    }

    pub fn put_record(&self, record: FileRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    fn has_ready_sibling(
        records: &HashMap<Uuid, FileRecord>,
        checksum: &str,
        mime_type: &str,
        exclude: Uuid,
    ) -> bool {
        records.values().any(|r| {
            r.id != exclude
                && r.status == FileStatus::Ready
                && r.deleted_at.is_none()
                && r.checksum.as_deref() == Some(checksum)
                && r.mime_type == mime_type
        })
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn create(&self, data: NewFileRecord) -> Result<FileRecord, FileRepositoryError> {
        let record = FileRecord {
            id: Uuid::new_v4(),
            filename: data.filename,
            tags: data.tags,
            mime_type: data.mime_type,
            size: None,
            checksum: None,
            s3_key: data.s3_key,
            s3_bucket: data.s3_bucket,
            original_mime_type: data.original_mime_type,
            original_size: None,
            original_checksum: None,
            original_s3_key: data.original_s3_key,
            status: FileStatus::Uploading,
            optimization_status: data.optimization_status,
            optimization_params: data.optimization_params,
            optimization_error: None,
            optimization_started_at: None,
            optimization_completed_at: None,
            metadata: data.metadata,
            exif: None,
            created_at: now(),
            status_changed_at: now(),
            uploaded_at: None,
            deleted_at: None,
        };
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, FileRepositoryError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn find_ready_sibling(
        &self,
        checksum: &str,
        mime_type: &str,
    ) -> Result<Option<FileRecord>, FileRepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .values()
            .find(|r| {
                r.status == FileStatus::Ready
                    && r.deleted_at.is_none()
                    && r.checksum.as_deref() == Some(checksum)
                    && r.mime_type == mime_type
            })
            .cloned())
    }

    async fn promote_to_ready(
        &self,
        data: PromoteToReady,
    ) -> Result<FileRecord, FileRepositoryError> {
        let mut records = self.records.lock().unwrap();

        let mime_type = records
            .get(&data.id)
            .ok_or(FileRepositoryError::NotFound)?
            .mime_type
            .clone();
        if Self::has_ready_sibling(&records, &data.checksum, &mime_type, data.id) {
            return Err(FileRepositoryError::DuplicateContent);
        }

        let record = records.get_mut(&data.id).ok_or(FileRepositoryError::NotFound)?;
        if record.status != FileStatus::Uploading {
            return Err(FileRepositoryError::NotFound);
        }
        record.checksum = Some(data.checksum);
        record.size = Some(data.size);
        record.s3_key = data.s3_key;
        record.status = FileStatus::Ready;
        record.uploaded_at = Some(now());
        record.status_changed_at = now();
        Ok(record.clone())
    }

    async fn promote_original_ready(
        &self,
        id: Uuid,
        original_checksum: &str,
        original_size: i64,
    ) -> Result<FileRecord, FileRepositoryError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(FileRepositoryError::NotFound)?;
        if record.status != FileStatus::Uploading {
            return Err(FileRepositoryError::NotFound);
        }
        record.original_checksum = Some(original_checksum.to_string());
        record.original_size = Some(original_size);
        record.status = FileStatus::Ready;
        record.uploaded_at = Some(now());
        record.status_changed_at = now();
        Ok(record.clone())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), FileRepositoryError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = FileStatus::Failed;
            record.status_changed_at = now();
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<SoftDeleteOutcome, FileRepositoryError> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(FileRepositoryError::NotFound)?;
        if record.deleted_at.is_some() {
            return Ok(SoftDeleteOutcome::AlreadyDeleted);
        }
        record.deleted_at = Some(now());
        Ok(SoftDeleteOutcome::Deleted)
    }

    async fn bulk_soft_delete(
        &self,
        tags: &FileTags,
        limit: u64,
        dry_run: bool,
    ) -> Result<BulkDeleteOutcome, FileRepositoryError> {
        let mut records = self.records.lock().unwrap();
        let matches = |r: &FileRecord| {
            r.status == FileStatus::Ready
                && r.deleted_at.is_none()
                && tags
                    .app_id
                    .as_deref()
                    .map(|v| r.tags.app_id.as_deref() == Some(v))
                    .unwrap_or(true)
                && tags
                    .user_id
                    .as_deref()
                    .map(|v| r.tags.user_id.as_deref() == Some(v))
                    .unwrap_or(true)
                && tags
                    .purpose
                    .as_deref()
                    .map(|v| r.tags.purpose.as_deref() == Some(v))
                    .unwrap_or(true)
        };

        let mut candidates: Vec<Uuid> = records
            .values()
            .filter(|r| matches(r))
            .map(|r| r.id)
            .collect();
        candidates.truncate(limit as usize);
        let matched = candidates.len() as u64;

        if dry_run {
            return Ok(BulkDeleteOutcome {
                matched,
                deleted: 0,
            });
        }

        let mut deleted = 0;
        for id in candidates {
            if let Some(record) = records.get_mut(&id) {
                if record.deleted_at.is_none() {
                    record.deleted_at = Some(now());
                    deleted += 1;
                }
            }
        }
        Ok(BulkDeleteOutcome { matched, deleted })
    }

    async fn list(&self, query: &ListFilesQuery) -> Result<FileListPage, FileRepositoryError> {
        let records = self.records.lock().unwrap();
        let mut items: Vec<FileRecord> = records
            .values()
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| {
                query
                    .q
                    .as_deref()
                    .map(|q| r.filename.contains(q))
                    .unwrap_or(true)
            })
            .filter(|r| {
                query
                    .mime_type
                    .as_deref()
                    .map(|m| r.mime_type.starts_with(m))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        match (query.sort_by, query.order) {
            (FileSortBy::CreatedAt, SortOrder::Asc) => {
                items.sort_by_key(|r| r.created_at);
            }
            (FileSortBy::CreatedAt, SortOrder::Desc) => {
                items.sort_by_key(|r| std::cmp::Reverse(r.created_at));
            }
            (FileSortBy::Size, SortOrder::Asc) => items.sort_by_key(|r| r.size),
            (FileSortBy::Size, SortOrder::Desc) => {
                items.sort_by_key(|r| std::cmp::Reverse(r.size));
            }
            (FileSortBy::Filename, SortOrder::Asc) => {
                items.sort_by(|a, b| a.filename.cmp(&b.filename));
            }
            (FileSortBy::Filename, SortOrder::Desc) => {
                items.sort_by(|a, b| b.filename.cmp(&a.filename));
            }
        }

        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(FileListPage { items, total })
    }

    async fn set_exif(
        &self,
        id: Uuid,
        exif: serde_json::Value,
    ) -> Result<(), FileRepositoryError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.exif = Some(exif);
        }
        Ok(())
    }

    async fn claim_optimization(
        &self,
        id: Uuid,
        from: OptimizationStatus,
        to: OptimizationStatus,
    ) -> Result<bool, FileRepositoryError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&id) {
            Some(record) if record.optimization_status == Some(from) => {
                record.optimization_status = Some(to);
                if to == OptimizationStatus::Processing {
                    record.optimization_started_at = Some(now());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_optimization(
        &self,
        data: CompleteOptimization,
    ) -> Result<FileRecord, FileRepositoryError> {
        let mut records = self.records.lock().unwrap();

        if Self::has_ready_sibling(&records, &data.checksum, &data.mime_type, data.id) {
            return Err(FileRepositoryError::DuplicateContent);
        }

        let record = records.get_mut(&data.id).ok_or(FileRepositoryError::NotFound)?;
        if record.optimization_status != Some(OptimizationStatus::Processing) {
            return Err(FileRepositoryError::NotFound);
        }
        record.s3_key = data.s3_key;
        record.mime_type = data.mime_type;
        record.size = Some(data.size);
        record.checksum = Some(data.checksum);
        record.optimization_status = Some(OptimizationStatus::Ready);
        record.optimization_completed_at = Some(now());
        Ok(record.clone())
    }

    async fn fail_optimization(&self, id: Uuid, error: &str) -> Result<(), FileRepositoryError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = FileStatus::Failed;
            record.optimization_status = Some(OptimizationStatus::Failed);
            record.optimization_error = Some(error.to_string());
            record.status_changed_at = now();
        }
        Ok(())
    }

    async fn hard_delete(&self, id: Uuid) -> Result<(), FileRepositoryError> {
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn hard_delete_with_thumbnails(
        &self,
        id: Uuid,
        _thumbnail_ids: &[Uuid],
        delete_file_row: bool,
    ) -> Result<(), FileRepositoryError> {
        if delete_file_row {
            self.records.lock().unwrap().remove(&id);
        }
        Ok(())
    }

    async fn count_other_live_refs(
        &self,
        checksum: &str,
        mime_type: &str,
        exclude_id: Uuid,
    ) -> Result<u64, FileRepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .values()
            .filter(|r| {
                r.id != exclude_id
                    && r.deleted_at.is_none()
                    && r.checksum.as_deref() == Some(checksum)
                    && r.mime_type == mime_type
            })
            .count() as u64)
    }

    async fn select_soft_deleted(
        &self,
        retry_cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError> {
        let records = self.records.lock().unwrap();
        let mut selected: Vec<FileRecord> = records
            .values()
            .filter(|r| r.deleted_at.map(|d| d < retry_cutoff).unwrap_or(false))
            .cloned()
            .collect();
        selected.sort_by_key(|r| r.deleted_at);
        selected.truncate(batch as usize);
        Ok(selected)
    }

    async fn select_corrupted(&self, batch: u64) -> Result<Vec<FileRecord>, FileRepositoryError> {
        let records = self.records.lock().unwrap();
        let mut selected: Vec<FileRecord> = records
            .values()
            .filter(|r| {
                (r.status == FileStatus::Deleting && r.deleted_at.is_none())
                    || (r.status == FileStatus::Ready
                        && (r.s3_key.is_empty() || r.mime_type.is_empty())
                        && !r.optimization_in_flight())
            })
            .cloned()
            .collect();
        selected.truncate(batch as usize);
        Ok(selected)
    }

    async fn select_stale_status(
        &self,
        statuses: &[FileStatus],
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError> {
        let records = self.records.lock().unwrap();
        let mut selected: Vec<FileRecord> = records
            .values()
            .filter(|r| statuses.contains(&r.status) && r.status_changed_at < cutoff)
            .cloned()
            .collect();
        selected.sort_by_key(|r| r.status_changed_at);
        selected.truncate(batch as usize);
        Ok(selected)
    }

    async fn select_stuck_optimizations(
        &self,
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError> {
        let records = self.records.lock().unwrap();
        let mut selected: Vec<FileRecord> = records
            .values()
            .filter(|r| {
                r.optimization_in_flight()
                    && r.optimization_started_at.unwrap_or(r.created_at) < cutoff
            })
            .cloned()
            .collect();
        selected.sort_by_key(|r| r.created_at);
        selected.truncate(batch as usize);
        Ok(selected)
    }

    async fn select_orphaned_uploads(
        &self,
        cutoff: DateTime<FixedOffset>,
        batch: u64,
    ) -> Result<Vec<FileRecord>, FileRepositoryError> {
        let records = self.records.lock().unwrap();
        let mut selected: Vec<FileRecord> = records
            .values()
            .filter(|r| {
                (r.status == FileStatus::Uploading && r.created_at < cutoff)
                    || (r.status == FileStatus::Failed
                        && (r.s3_key.starts_with("tmp/")
                            || r.s3_key.starts_with("originals/")
                            || r.original_s3_key
                                .as_deref()
                                .map(|k| k.starts_with("originals/"))
                                .unwrap_or(false)))
            })
            .cloned()
            .collect();
        selected.sort_by_key(|r| r.created_at);
        selected.truncate(batch as usize);
        Ok(selected)
    }

    async fn claim_for_deletion(
        &self,
        id: Uuid,
        expected: &[FileStatus],
    ) -> Result<bool, FileRepositoryError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&id) {
            Some(record) if expected.contains(&record.status) => {
                record.status = FileStatus::Deleting;
                if record.deleted_at.is_none() {
                    record.deleted_at = Some(now());
                }
                record.status_changed_at = now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_deleted(&self, id: Uuid) -> Result<(), FileRepositoryError> {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = FileStatus::Deleted;
            record.status_changed_at = now();
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), FileRepositoryError> {
        Ok(())
    }
}

// ============================================================================
// Thumbnail repository
// ============================================================================

#[derive(Default, Clone)]
pub struct InMemoryThumbnailRepository {
    thumbnails: Arc<Mutex<HashMap<Uuid, ThumbnailRecord>>>,
}

impl InMemoryThumbnailRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thumbnail_count(&self) -> usize {
        self.thumbnails.lock().unwrap().len()
    }

    pub fn seed(&self, record: ThumbnailRecord) {
        self.thumbnails.lock().unwrap().insert(record.id, record);
    }
}

#[async_trait]
impl ThumbnailRepository for InMemoryThumbnailRepository {
    async fn find_by_params(
        &self,
        file_id: Uuid,
        params_hash: &str,
    ) -> Result<Option<ThumbnailRecord>, ThumbnailRepositoryError> {
        Ok(self
            .thumbnails
            .lock()
            .unwrap()
            .values()
            .find(|t| t.file_id == file_id && t.params_hash == params_hash)
            .cloned())
    }

    async fn insert(
        &self,
        data: NewThumbnail,
    ) -> Result<ThumbnailRecord, ThumbnailRepositoryError> {
        let mut thumbnails = self.thumbnails.lock().unwrap();
        if let Some(existing) = thumbnails
            .values()
            .find(|t| t.file_id == data.file_id && t.params_hash == data.params_hash)
        {
            return Ok(existing.clone());
        }
        let record = ThumbnailRecord {
            id: Uuid::new_v4(),
            file_id: data.file_id,
            width: data.width,
            height: data.height,
            quality: data.quality,
            params_hash: data.params_hash,
            s3_key: data.s3_key,
            s3_bucket: data.s3_bucket,
            size: data.size,
            mime_type: data.mime_type,
            last_accessed_at: now(),
            created_at: now(),
        };
        thumbnails.insert(record.id, record.clone());
        Ok(record)
    }

    async fn touch_last_accessed(&self, id: Uuid) -> Result<(), ThumbnailRepositoryError> {
        if let Some(thumbnail) = self.thumbnails.lock().unwrap().get_mut(&id) {
            thumbnail.last_accessed_at = now();
        }
        Ok(())
    }

    async fn list_by_file(
        &self,
        file_id: Uuid,
    ) -> Result<Vec<ThumbnailRecord>, ThumbnailRepositoryError> {
        Ok(self
            .thumbnails
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn select_stale(
        &self,
        cutoff: DateTime<FixedOffset>,
        limit: u64,
    ) -> Result<Vec<ThumbnailRecord>, ThumbnailRepositoryError> {
        let thumbnails = self.thumbnails.lock().unwrap();
        let mut selected: Vec<ThumbnailRecord> = thumbnails
            .values()
            .filter(|t| t.last_accessed_at < cutoff)
            .cloned()
            .collect();
        selected.sort_by_key(|t| t.last_accessed_at);
        selected.truncate(limit as usize);
        Ok(selected)
    }

    async fn delete_if_still_stale(
        &self,
        id: Uuid,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<bool, ThumbnailRepositoryError> {
        let mut thumbnails = self.thumbnails.lock().unwrap();
        match thumbnails.get(&id) {
            Some(thumbnail) if thumbnail.last_accessed_at < cutoff => {
                thumbnails.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Blob store
// ============================================================================

#[derive(Default, Clone)]
pub struct InMemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing_deletes: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn key_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Make batch deletes of `key` fail, as a storage outage would.
    pub fn fail_deletes_for(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_stream(
        &self,
        key: &str,
        _mime_type: &str,
        mut stream: BlobByteStream,
    ) -> Result<(), BlobStoreError> {
        let mut bytes = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(e) => return Err(BlobStoreError::SourceAborted(e.to_string())),
            }
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<BlobObject, BlobStoreError> {
        let objects = self.objects.lock().unwrap();
        let bytes = objects.get(key).ok_or(BlobStoreError::NotFound)?.clone();
        let total_size = bytes.len() as i64;

        let body = match range {
            Some(range) => {
                let end = (range.end as usize + 1).min(bytes.len());
                let start = (range.start as usize).min(end);
                bytes[start..end].to_vec()
            }
            None => bytes,
        };
        let content_length = body.len() as i64;

        Ok(BlobObject {
            stream: futures::stream::once(async move { Ok(Bytes::from(body)) }).boxed(),
            content_length,
            total_size,
        })
    }

    async fn get_bytes(&self, key: &str, max_bytes: u64) -> Result<Vec<u8>, BlobStoreError> {
        let objects = self.objects.lock().unwrap();
        let bytes = objects.get(key).ok_or(BlobStoreError::NotFound)?;
        if bytes.len() as u64 > max_bytes {
            return Err(BlobStoreError::TooLarge(max_bytes));
        }
        Ok(bytes.clone())
    }

    async fn head(&self, key: &str) -> Result<BlobHead, BlobStoreError> {
        let objects = self.objects.lock().unwrap();
        let bytes = objects.get(key).ok_or(BlobStoreError::NotFound)?;
        Ok(BlobHead {
            size: bytes.len() as i64,
            mime_type: None,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<BatchDeleteOutcome, BlobStoreError> {
        let mut outcome = BatchDeleteOutcome::default();
        let failing = self.failing_deletes.lock().unwrap().clone();
        let mut objects = self.objects.lock().unwrap();

        for key in keys {
            if failing.contains(key) {
                outcome.errors.push(BatchDeleteFailure {
                    key: key.clone(),
                    message: "injected failure".to_string(),
                });
            } else {
                objects.remove(key);
                outcome.deleted_keys.push(key.clone());
            }
        }
        Ok(outcome)
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> Result<(), BlobStoreError> {
        let mut objects = self.objects.lock().unwrap();
        let bytes = objects
            .get(from_key)
            .ok_or(BlobStoreError::NotFound)?
            .clone();
        objects.insert(to_key.to_string(), bytes);
        Ok(())
    }

    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<String>, BlobStoreError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .take(max_keys as usize)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), BlobStoreError> {
        Ok(())
    }
}

// ============================================================================
// Image processor
// ============================================================================

#[derive(Clone)]
enum ProcessBehavior {
    /// Deterministic re-encode: output derives from input, MIME image/webp.
    ConvertToWebp,
    Fail(String),
}

#[derive(Clone)]
pub struct MockImageProcessor {
    healthy: bool,
    behavior: ProcessBehavior,
    process_calls: Arc<AtomicUsize>,
}

impl MockImageProcessor {
    pub fn converting_to_webp() -> Self {
        Self {
            healthy: true,
            behavior: ProcessBehavior::ConvertToWebp,
            process_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            healthy: true,
            behavior: ProcessBehavior::Fail(message.to_string()),
            process_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            behavior: ProcessBehavior::Fail("unreachable".to_string()),
            process_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProcessor for MockImageProcessor {
    async fn process(
        &self,
        bytes: Vec<u8>,
        _filename: &str,
        _mime_type: &str,
        _params: &ProcessParams,
    ) -> Result<ProcessedImage, ImageProcessorError> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ProcessBehavior::ConvertToWebp => {
                let mut output = b"webp:".to_vec();
                output.extend_from_slice(&bytes);
                Ok(ProcessedImage {
                    bytes: output,
                    mime_type: "image/webp".to_string(),
                })
            }
            ProcessBehavior::Fail(message) => {
                Err(ImageProcessorError::Rejected(message.clone()))
            }
        }
    }

    async fn exif(
        &self,
        _bytes: Vec<u8>,
        _filename: &str,
        _mime_type: &str,
    ) -> Result<Option<serde_json::Value>, ImageProcessorError> {
        Ok(Some(serde_json::json!({ "Make": "TestCam" })))
    }

    async fn health(&self) -> Result<ProcessorHealth, ImageProcessorError> {
        if self.healthy {
            Ok(ProcessorHealth {
                status: "ok".to_string(),
                queue_size: 0,
                queue_pending: 0,
            })
        } else {
            Err(ImageProcessorError::Unavailable)
        }
    }
}

/// A processor whose `process` is never expected to run; only health matters.
pub fn processor_with_health(healthy: bool) -> Arc<MockImageProcessor> {
    if healthy {
        Arc::new(MockImageProcessor::failing("process not configured"))
    } else {
        Arc::new(MockImageProcessor::unhealthy())
    }
}
