mod blob_store;

pub use blob_store::{
    BatchDeleteFailure, BatchDeleteOutcome, BlobByteStream, BlobHead, BlobObject, BlobStore,
    BlobStoreError, ByteRange,
};
