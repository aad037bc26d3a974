use crate::service::{CompressionService, ProgressReporter};
use crate::types::*;
use futures_util::future::BoxFuture;
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;

const QUALITY_STEP: f32 = 0.95;
const SCALE_STEP: f32 = 0.95;
const MIN_QUALITY: f32 = 0.01;

/// Default compression service: re-encodes images as JPEG with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Compress an image towards `options.max_size_mb`, never returning more bytes
    /// than the source. Blocking; run it off the async runtime.
    ///
    /// The first encode uses `options.initial_quality`. While the output is above
    /// the size ceiling or larger than the source, quality drops by 5% per
    /// iteration, and dimensions shrink by 5% if the first encode exceeded the
    /// ceiling. If nothing beats the source, the source is returned untouched.
    pub fn compress_to_size(
        &self,
        file: &OriginalFile,
        options: &CompressionOptions,
        progress: &ProgressReporter,
    ) -> Result<CompressedFile, CompressionError> {
        if file.content.is_empty() {
            return Err(CompressionError::InvalidContent {
                message: format!("{} is empty", file.name),
            });
        }

        progress.report(0.0);
        let img = image::load_from_memory(&file.content)?;
        let current = DynamicImage::ImageRgb8(img.to_rgb8());
        progress.report(10.0);

        let max_size = options.max_size_bytes();
        let source_size = file.size;
        let (encoded, kept, iterations) = self.shrink_jpeg(current, source_size, options, progress)?;

        if encoded.len() as u64 > source_size {
            log::info!(
                "{}: re-encoded output ({} bytes) is larger than source ({} bytes), keeping source",
                file.name,
                encoded.len(),
                source_size
            );
            progress.report(100.0);
            return Ok(CompressedFile::new(file.content.clone(), file.mime_type.clone()));
        }

        if encoded.len() as u64 > max_size {
            log::warn!(
                "{}: still {} bytes after {} iterations (limit {})",
                file.name,
                encoded.len(),
                iterations,
                max_size
            );
        }

        log::info!(
            "{}: compressed {} -> {} bytes at {}% quality, {}x{}",
            file.name,
            source_size,
            encoded.len(),
            kept.quality,
            kept.width,
            kept.height
        );
        progress.report(100.0);
        Ok(CompressedFile::new(encoded, "image/jpeg"))
    }

    /// Re-encode loop. Returns the smallest JPEG seen, the settings that produced
    /// it and the number of iterations run.
    fn shrink_jpeg(
        &self,
        mut current: DynamicImage,
        source_size: u64,
        options: &CompressionOptions,
        progress: &ProgressReporter,
    ) -> Result<(Vec<u8>, Encoding, u32), CompressionError> {
        let max_size = options.max_size_bytes();
        let mut quality = options.initial_quality.clamp(MIN_QUALITY, 1.0);
        let mut encoded = self.encode_jpeg(&current, jpeg_quality(quality))?;
        let exceeds_max = encoded.len() as u64 > max_size;
        let mut kept = Encoding::of(&current, quality);

        let total = options.max_iterations.max(1);
        let mut iterations = 0;
        while iterations < options.max_iterations
            && (encoded.len() as u64 > max_size || encoded.len() as u64 > source_size)
        {
            if exceeds_max {
                let new_width = std::cmp::max(1, (current.width() as f32 * SCALE_STEP) as u32);
                let new_height = std::cmp::max(1, (current.height() as f32 * SCALE_STEP) as u32);
                current = current.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3);
            }
            quality = (quality * QUALITY_STEP).max(MIN_QUALITY);

            let candidate = self.encode_jpeg(&current, jpeg_quality(quality))?;
            if candidate.len() <= encoded.len() {
                encoded = candidate;
                kept = Encoding::of(&current, quality);
            }

            iterations += 1;
            progress.report(10.0 + 89.0 * iterations as f64 / total as f64);
        }

        Ok((encoded, kept, iterations))
    }

    /// Encode image as JPEG with specified quality
    fn encode_jpeg(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
        let mut output = Vec::new();
        let mut cursor = Cursor::new(&mut output);

        img.write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))?;
        Ok(output)
    }
}

impl CompressionService for ImageProcessor {
    fn compress<'a>(
        &'a self,
        file: &'a OriginalFile,
        options: &'a CompressionOptions,
        progress: ProgressReporter,
    ) -> BoxFuture<'a, Result<CompressedFile, CompressionError>> {
        let processor = *self;
        let file = file.clone();
        let options = options.clone();

        Box::pin(async move {
            log::info!(
                "Compressing {} ({} bytes, {}) at initial quality {:.2}",
                file.name,
                file.size,
                file.mime_type,
                options.initial_quality
            );
            tokio::task::spawn_blocking(move || processor.compress_to_size(&file, &options, &progress))
                .await
                .map_err(|e| CompressionError::Task(format!("Task panicked: {e}")))?
        })
    }
}

/// Settings behind the smallest encode seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Encoding {
    quality: u8,
    width: u32,
    height: u32,
}

impl Encoding {
    fn of(img: &DynamicImage, quality: f32) -> Self {
        Self {
            quality: jpeg_quality(quality),
            width: img.width(),
            height: img.height(),
        }
    }
}

fn jpeg_quality(fraction: f32) -> u8 {
    ((fraction * 100.0).round() as u8).clamp(1, 100)
}
