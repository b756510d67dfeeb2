pub mod blob_store_s3;

pub use blob_store_s3::BlobStoreS3;
