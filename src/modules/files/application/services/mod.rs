pub mod cleanup_service;
pub mod optimization_engine;
pub mod upload_pipeline;
pub mod url_fetcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use cleanup_service::{CleanupService, CleanupStats};
pub use optimization_engine::{OptimizationEngine, OptimizationWaitError};
pub use upload_pipeline::{UploadError, UploadPipeline, UploadRequest};
pub use url_fetcher::{FetchedBody, UrlFetchError, UrlFetcher};
