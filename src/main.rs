pub mod health;
pub mod modules;
pub mod shared;

pub use modules::files;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use sea_orm::{ConnectOptions, Database};
use tokio_cron_scheduler::{Job, JobScheduler};

// Logging
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::files::adapter::incoming::web::routes;
use crate::files::adapter::outgoing::blob_storage::BlobStoreS3;
use crate::files::adapter::outgoing::db::{FileRepositoryPostgres, ThumbnailRepositoryPostgres};
use crate::files::adapter::outgoing::image_processor::ImageProcessorHttp;
use crate::files::application::ports::outgoing::blob_storage::BlobStore;
use crate::files::application::ports::outgoing::db::{FileRepository, ThumbnailRepository};
use crate::files::application::ports::outgoing::image_processor::ImageProcessor;
use crate::files::application::services::{
    CleanupService, OptimizationEngine, UploadPipeline, UrlFetcher,
};
use crate::files::application::use_cases::{
    BulkDeleteFilesUseCase, DeleteFileUseCase, DownloadFileUseCase, GetExifUseCase,
    GetFileUseCase, GetThumbnailUseCase, IBulkDeleteFilesUseCase, IDeleteFileUseCase,
    IDownloadFileUseCase, IGetExifUseCase, IGetFileUseCase, IGetThumbnailUseCase,
    IListFilesUseCase, IListProblemsUseCase, IUploadFileUseCase, IUploadFromUrlUseCase,
    ListFilesUseCase, ListProblemsUseCase, UploadFileUseCase, UploadFromUrlUseCase,
};
use crate::shared::api::custom_json_config;
use crate::shared::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub upload_file: Arc<dyn IUploadFileUseCase>,
    pub upload_from_url: Arc<dyn IUploadFromUrlUseCase>,
    pub get_file: Arc<dyn IGetFileUseCase>,
    pub download_file: Arc<dyn IDownloadFileUseCase>,
    pub get_exif: Arc<dyn IGetExifUseCase>,
    pub get_thumbnail: Arc<dyn IGetThumbnailUseCase>,
    pub delete_file: Arc<dyn IDeleteFileUseCase>,
    pub bulk_delete: Arc<dyn IBulkDeleteFilesUseCase>,
    pub list_files: Arc<dyn IListFilesUseCase>,
    pub list_problems: Arc<dyn IListProblemsUseCase>,

    pub thumbnail_cache_max_age_seconds: u64,

    // health probes go straight to the ports
    pub health_files: Arc<dyn FileRepository>,
    pub health_blobs: Arc<dyn BlobStore>,
    pub health_processor: Arc<dyn ImageProcessor>,
}

#[actix_web::main]
#[cfg(not(tarpaulin_include))]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting media store...");

    // get env vars
    dotenvy::dotenv().ok();

    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set in .env file");
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let server_url = format!("{host}:{port}");

    let config = AppConfig::from_env();

    // 1. establish connection to database
    let mut opt = ConnectOptions::new(db_url);
    opt
        // Core pool sizing
        .max_connections(50)
        .min_connections(10)
        // Timeouts (fail fast instead of piling up)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        // Hygiene
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        // Noise reduction
        .sqlx_logging(false);

    let conn = Database::connect(opt)
        .await
        .expect("Failed to connect to database");
    let db = Arc::new(conn);

    // 2. outgoing adapters
    let file_repo = FileRepositoryPostgres::new(Arc::clone(&db));
    let thumbnail_repo = ThumbnailRepositoryPostgres::new(Arc::clone(&db));
    let blob_store = BlobStoreS3::new(&config.storage);
    let image_processor = ImageProcessorHttp::new(&config.image_processing);

    let files: Arc<dyn FileRepository> = Arc::new(file_repo.clone());
    let thumbnails: Arc<dyn ThumbnailRepository> = Arc::new(thumbnail_repo.clone());
    let blobs: Arc<dyn BlobStore> = Arc::new(blob_store.clone());
    let processor: Arc<dyn ImageProcessor> = Arc::new(image_processor.clone());

    let upload_policy = config.upload_limits.to_policy();
    let bucket = config.storage.bucket.clone();

    // 3. lifecycle services
    let engine = Arc::new(OptimizationEngine::new(
        Arc::clone(&files),
        Arc::clone(&blobs),
        Arc::clone(&processor),
        config.compression.clone(),
        upload_policy.clone(),
        Duration::from_millis(config.image_processing.optimization_wait_timeout_ms),
    ));
    let pipeline = Arc::new(UploadPipeline::new(
        Arc::clone(&files),
        Arc::clone(&blobs),
        Arc::clone(&processor),
        Arc::clone(&engine),
        upload_policy.clone(),
        config.compression.clone(),
        bucket.clone(),
    ));
    let url_fetcher = Arc::new(UrlFetcher::new(config.url_upload.clone()));

    // 4. cleanup job on its cron schedule
    if config.cleanup.enabled {
        let cleanup = Arc::new(CleanupService::new(
            Arc::clone(&files),
            Arc::clone(&thumbnails),
            Arc::clone(&blobs),
            config.cleanup.clone(),
        ));

        let scheduler = JobScheduler::new()
            .await
            .expect("Failed to create the cleanup scheduler");
        let job = Job::new_async(config.cleanup.cron.as_str(), move |_uuid, _lock| {
            let cleanup = Arc::clone(&cleanup);
            Box::pin(async move {
                cleanup.run_cycle().await;
            })
        })
        .expect("CLEANUP_CRON is not a valid cron expression");
        scheduler
            .add(job)
            .await
            .expect("Failed to schedule the cleanup job");
        scheduler
            .start()
            .await
            .expect("Failed to start the cleanup scheduler");
        info!(cron = %config.cleanup.cron, "cleanup scheduled");
    }

    // 5. use cases
    let state = AppState {
        upload_file: Arc::new(UploadFileUseCase::new(Arc::clone(&pipeline))),
        upload_from_url: Arc::new(UploadFromUrlUseCase::new(
            Arc::clone(&url_fetcher),
            Arc::clone(&pipeline),
        )),
        get_file: Arc::new(GetFileUseCase::new(file_repo.clone())),
        download_file: Arc::new(DownloadFileUseCase::new(
            Arc::clone(&files),
            Arc::clone(&blobs),
            Arc::clone(&engine),
        )),
        get_exif: Arc::new(GetExifUseCase::new(file_repo.clone())),
        get_thumbnail: Arc::new(GetThumbnailUseCase::new(
            Arc::clone(&files),
            Arc::clone(&thumbnails),
            Arc::clone(&blobs),
            Arc::clone(&processor),
            config.thumbnail.clone(),
            bucket.clone(),
            upload_policy.image_max_bytes,
        )),
        delete_file: Arc::new(DeleteFileUseCase::new(file_repo.clone())),
        bulk_delete: Arc::new(BulkDeleteFilesUseCase::new(file_repo.clone())),
        list_files: Arc::new(ListFilesUseCase::new(file_repo.clone())),
        list_problems: Arc::new(ListProblemsUseCase::new(
            file_repo.clone(),
            config.cleanup.clone(),
        )),
        thumbnail_cache_max_age_seconds: config.thumbnail.cache_max_age_seconds,
        health_files: files,
        health_blobs: blobs,
        health_processor: processor,
    };

    info!("Server running on {server_url}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(custom_json_config())
            .service(health::liveness)
            .service(health::health)
            .configure(routes::configure)
    })
    .bind(server_url)?
    .run()
    .await
}
