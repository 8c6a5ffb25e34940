//! Image transform service and visual equivalence checker.
//!
//! Pixelation flattens square blocks to their average color without changing
//! the image dimensions. Comparison normalizes both inputs to a fixed small
//! RGB raster before computing a mean-absolute-difference distance, since the
//! two covers may arrive in different native formats and sizes.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::errors::AppError;

/// Sources smaller than this on either side are passed through unchanged.
pub const MIN_PIXELATE_SIZE: u32 = 8;

/// Edge length both images are resized to before comparison.
const NORMALIZED_EDGE: u32 = 64;

/// Result of a perceptual comparison.
#[derive(Debug, Clone, Copy)]
pub struct Comparison {
    pub equal: bool,
    /// Mean absolute channel difference on a 0-100 scale
    pub distance: f64,
}

/// Download a cover image.
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, AppError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::ImageFetch(format!("Failed to fetch image {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(AppError::ImageFetch(format!(
            "Image fetch for {} returned {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::ImageFetch(format!("Failed to read image body: {}", e)))?;

    Ok(bytes.to_vec())
}

/// Pixelate an image by averaging square blocks of side `cell_size`.
///
/// Output dimensions equal input dimensions; the result is PNG-encoded.
pub fn pixelate(bytes: &[u8], cell_size: u32) -> Result<Vec<u8>, AppError> {
    let decoded = image::load_from_memory(bytes)?;
    let mut raster = decoded.to_rgba8();
    let (width, height) = raster.dimensions();

    if width >= MIN_PIXELATE_SIZE && height >= MIN_PIXELATE_SIZE {
        let cell = cell_size.max(1);
        for block_y in (0..height).step_by(cell as usize) {
            for block_x in (0..width).step_by(cell as usize) {
                flatten_block(&mut raster, block_x, block_y, cell);
            }
        }
    }

    encode_png(&raster)
}

/// Replace one block with its average color.
fn flatten_block(raster: &mut RgbaImage, block_x: u32, block_y: u32, cell: u32) {
    let (width, height) = raster.dimensions();
    let x_end = (block_x + cell).min(width);
    let y_end = (block_y + cell).min(height);

    let mut sums = [0u64; 4];
    let mut count = 0u64;
    for y in block_y..y_end {
        for x in block_x..x_end {
            let pixel = raster.get_pixel(x, y);
            for (sum, channel) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += u64::from(*channel);
            }
            count += 1;
        }
    }
    if count == 0 {
        return;
    }

    let average = Rgba([
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
        (sums[3] / count) as u8,
    ]);
    for y in block_y..y_end {
        for x in block_x..x_end {
            raster.put_pixel(x, y, average);
        }
    }
}

fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, AppError> {
    let mut out = Cursor::new(Vec::new());
    raster
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to encode PNG: {}", e)))?;
    Ok(out.into_inner())
}

/// Encode PNG bytes as a data URL for the JSON response.
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Compare two encoded images for perceptual equivalence.
///
/// Deterministic for identical inputs; `equal` iff `distance <= tolerance`.
pub fn compare(a: &[u8], b: &[u8], tolerance: f64) -> Result<Comparison, AppError> {
    let a = normalize(a)?;
    let b = normalize(b)?;

    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();

    let samples = (NORMALIZED_EDGE * NORMALIZED_EDGE * 3) as f64;
    let distance = total as f64 / samples / 255.0 * 100.0;

    Ok(Comparison {
        equal: distance <= tolerance,
        distance,
    })
}

/// Decode and resize to the fixed comparison raster.
fn normalize(bytes: &[u8]) -> Result<image::RgbImage, AppError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(image::imageops::resize(
        &decoded.to_rgb8(),
        NORMALIZED_EDGE,
        NORMALIZED_EDGE,
        FilterType::Triangle,
    ))
}
