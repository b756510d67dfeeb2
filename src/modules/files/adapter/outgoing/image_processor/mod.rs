pub mod image_processor_http;

pub use image_processor_http::ImageProcessorHttp;
