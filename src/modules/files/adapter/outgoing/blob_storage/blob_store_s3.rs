//! Blob store adapter for S3-compatible backends, built on [`aws_sdk_s3`].
//!
//! Streaming puts go through the multipart-upload API so the body never has
//! to be buffered whole; a failed source stream aborts the multipart upload
//! so no orphaned parts accrue charges on the backend.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::files::application::ports::outgoing::blob_storage::{
    BatchDeleteFailure, BatchDeleteOutcome, BlobByteStream, BlobHead, BlobObject, BlobStore,
    BlobStoreError, ByteRange,
};
use crate::shared::config::StorageConfig;

/// Part size for multipart puts. 8 MiB keeps memory bounded while staying
/// well above the backend's 5 MiB minimum for non-final parts.
const PART_SIZE: usize = 8 * 1024 * 1024;

/// DeleteObjects accepts at most 1000 keys per request.
const DELETE_BATCH_MAX: usize = 1000;

#[derive(Clone)]
pub struct BlobStoreS3 {
    client: Client,
    bucket: String,
}

impl BlobStoreS3 {
    pub fn new(config: &StorageConfig) -> Self {
        let sdk_config = aws_sdk_s3::config::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(Credentials::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
                None,
                None,
                "media_store",
            ))
            .force_path_style(config.force_path_style)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn map_sdk_err<E, R>(err: SdkError<E, R>) -> BlobStoreError
    where
        E: ProvideErrorMetadata + std::fmt::Debug,
        R: std::fmt::Debug,
    {
        match &err {
            SdkError::TimeoutError(_) => BlobStoreError::Timeout,
            SdkError::ServiceError(service_err) => {
                match service_err.err().code().unwrap_or_default() {
                    "NoSuchKey" | "NotFound" | "NoSuchBucket" => BlobStoreError::NotFound,
                    "AccessDenied" => BlobStoreError::AccessDenied,
                    "RequestTimeout" => BlobStoreError::Timeout,
                    _ => BlobStoreError::Other(format!("{err:?}")),
                }
            }
            _ => BlobStoreError::Other(format!("{err:?}")),
        }
    }

    fn range_header(range: ByteRange) -> String {
        format!("bytes={}-{}", range.start, range.end)
    }

    /// Total object size from `Content-Range: bytes start-end/total`.
    fn total_from_content_range(header: &str) -> Option<i64> {
        header.rsplit('/').next()?.parse().ok()
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(key, error = ?e, "failed to abort multipart upload");
        }
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart, BlobStoreError> {
        let part = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(body.into())
            .send()
            .await
            .map_err(Self::map_sdk_err)?;

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(part.e_tag().map(str::to_string))
            .build())
    }
}

#[async_trait]
impl BlobStore for BlobStoreS3 {
    async fn put_stream(
        &self,
        key: &str,
        mime_type: &str,
        mut stream: BlobByteStream,
    ) -> Result<(), BlobStoreError> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(mime_type)
            .send()
            .await
            .map_err(Self::map_sdk_err)?;

        let upload_id = create
            .upload_id()
            .ok_or_else(|| BlobStoreError::Other("multipart upload id missing".to_string()))?
            .to_string();

        let mut buffer = BytesMut::with_capacity(PART_SIZE);
        let mut completed_parts: Vec<CompletedPart> = Vec::new();
        let mut part_number: i32 = 1;

        loop {
            match stream.next().await {
                Some(Ok(chunk)) => {
                    buffer.extend_from_slice(&chunk);
                    while buffer.len() >= PART_SIZE {
                        let body = buffer.split_to(PART_SIZE).freeze();
                        match self.upload_part(key, &upload_id, part_number, body).await {
                            Ok(part) => {
                                completed_parts.push(part);
                                part_number += 1;
                            }
                            Err(e) => {
                                self.abort_multipart(key, &upload_id).await;
                                return Err(e);
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    self.abort_multipart(key, &upload_id).await;
                    return Err(BlobStoreError::SourceAborted(e.to_string()));
                }
                None => break,
            }
        }

        // Final (possibly empty) part; a zero-byte object still needs one.
        if !buffer.is_empty() || completed_parts.is_empty() {
            match self
                .upload_part(key, &upload_id, part_number, buffer.freeze())
                .await
            {
                Ok(part) => completed_parts.push(part),
                Err(e) => {
                    self.abort_multipart(key, &upload_id).await;
                    return Err(e);
                }
            }
        }

        let result = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await;

        if let Err(e) = result {
            self.abort_multipart(key, &upload_id).await;
            return Err(Self::map_sdk_err(e));
        }

        Ok(())
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<BlobObject, BlobStoreError> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(range) = range {
            request = request.range(Self::range_header(range));
        }

        let response = request.send().await.map_err(Self::map_sdk_err)?;

        let content_length = response.content_length().unwrap_or(0);
        let total_size = match response.content_range() {
            Some(content_range) => {
                Self::total_from_content_range(content_range).unwrap_or(content_length)
            }
            None => content_length,
        };

        let stream: BlobByteStream =
            Box::pin(ReaderStream::new(response.body.into_async_read()));

        Ok(BlobObject {
            stream,
            content_length,
            total_size,
        })
    }

    async fn get_bytes(&self, key: &str, max_bytes: u64) -> Result<Vec<u8>, BlobStoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_sdk_err)?;

        if response.content_length().unwrap_or(0) as u64 > max_bytes {
            return Err(BlobStoreError::TooLarge(max_bytes));
        }

        let mut body = response.body;
        let mut bytes = Vec::new();
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| BlobStoreError::Other(e.to_string()))?
        {
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(BlobStoreError::TooLarge(max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }

    async fn head(&self, key: &str) -> Result<BlobHead, BlobStoreError> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                // HeadObject reports absence through its own NotFound variant
                if matches!(&e, SdkError::ServiceError(se) if se.err().is_not_found()) {
                    BlobStoreError::NotFound
                } else {
                    Self::map_sdk_err(e)
                }
            })?;

        Ok(BlobHead {
            size: response.content_length().unwrap_or(0),
            mime_type: response.content_type().map(str::to_string),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_sdk_err)?;
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<BatchDeleteOutcome, BlobStoreError> {
        let mut outcome = BatchDeleteOutcome::default();

        for chunk in keys.chunks(DELETE_BATCH_MAX) {
            let objects: Vec<ObjectIdentifier> = chunk
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| BlobStoreError::Other(e.to_string()))
                })
                .collect::<Result<_, _>>()?;

            let response = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(
                    Delete::builder()
                        .set_objects(Some(objects))
                        .build()
                        .map_err(|e| BlobStoreError::Other(e.to_string()))?,
                )
                .send()
                .await
                .map_err(Self::map_sdk_err)?;

            for deleted in response.deleted() {
                if let Some(key) = deleted.key() {
                    outcome.deleted_keys.push(key.to_string());
                }
            }

            for error in response.errors() {
                let key = error.key().unwrap_or_default().to_string();
                // an already-absent key counts as reclaimed
                if error.code() == Some("NoSuchKey") {
                    outcome.deleted_keys.push(key);
                } else {
                    outcome.errors.push(BatchDeleteFailure {
                        key,
                        message: error.message().unwrap_or_default().to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> Result<(), BlobStoreError> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, from_key))
            .key(to_key)
            .send()
            .await
            .map_err(Self::map_sdk_err)?;
        Ok(())
    }

    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<String>, BlobStoreError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(Self::map_sdk_err)?;

        Ok(response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn health_check(&self) -> Result<(), BlobStoreError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| BlobStoreError::Other(format!("{e:?}")))?;
        Ok(())
    }
}
