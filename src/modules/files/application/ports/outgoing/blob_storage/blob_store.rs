use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// Chunked byte flow in and out of blob storage. `std::io::Error` is the
/// stream error currency so the same stream type plugs into the HTTP layer
/// and lets the upload pipeline fail the stream mid-flight (the put aborts
/// and the error surfaces from `put_stream`).
pub type BlobByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

#[derive(Debug, Clone, Error)]
pub enum BlobStoreError {
    #[error("object not found")]
    NotFound,

    #[error("access to storage denied")]
    AccessDenied,

    #[error("storage request timed out")]
    Timeout,

    #[error("source stream aborted: {0}")]
    SourceAborted(String),

    #[error("object exceeds the {0} byte read ceiling")]
    TooLarge(u64),

    #[error("storage error: {0}")]
    Other(String),
}

/// Inclusive byte range, as in `Range: bytes=start-end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// A downloaded object (possibly a range of one).
pub struct BlobObject {
    pub stream: BlobByteStream,
    /// Bytes this response body carries.
    pub content_length: i64,
    /// Full size of the stored object.
    pub total_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHead {
    pub size: i64,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDeleteFailure {
    pub key: String,
    pub message: String,
}

/// Per-key outcome of a batch delete. Keys that were already absent count as
/// deleted; only real failures land in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteOutcome {
    pub deleted_keys: Vec<String>,
    pub errors: Vec<BatchDeleteFailure>,
}

impl BatchDeleteOutcome {
    pub fn all_deleted<'a, I: IntoIterator<Item = &'a String>>(&self, keys: I) -> bool {
        keys.into_iter()
            .all(|key| self.deleted_keys.iter().any(|deleted| deleted == key))
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Streaming put. The implementation must not buffer the whole body and
    /// must clean up any partial upload when the stream yields an error.
    async fn put_stream(
        &self,
        key: &str,
        mime_type: &str,
        stream: BlobByteStream,
    ) -> Result<(), BlobStoreError>;

    /// Download, optionally a single byte range.
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<BlobObject, BlobStoreError>;

    /// Bounded whole-object read into memory, for handing blobs to the image
    /// processor. Fails with `TooLarge` instead of buffering past `max_bytes`.
    async fn get_bytes(&self, key: &str, max_bytes: u64) -> Result<Vec<u8>, BlobStoreError>;

    async fn head(&self, key: &str) -> Result<BlobHead, BlobStoreError>;

    /// Single delete. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobStoreError>;

    async fn delete_batch(&self, keys: &[String]) -> Result<BatchDeleteOutcome, BlobStoreError>;

    /// Server-side copy within the bucket.
    async fn copy(&self, from_key: &str, to_key: &str) -> Result<(), BlobStoreError>;

    /// First page of keys under a prefix, up to `max_keys`.
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<String>, BlobStoreError>;

    async fn health_check(&self) -> Result<(), BlobStoreError>;
}
