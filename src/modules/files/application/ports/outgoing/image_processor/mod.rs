mod image_processor;

pub use image_processor::{
    ImageProcessor, ImageProcessorError, ProcessParams, ProcessedImage, ProcessorHealth,
};
