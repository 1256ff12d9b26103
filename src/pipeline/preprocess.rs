//! Image preprocessing: normalise a newspaper photo before OCR.
//!
//! ## Why spawn_blocking?
//!
//! Decoding a 12-megapixel phone photo, resampling it and running an unsharp
//! mask is several hundred milliseconds of pure CPU. `spawn_blocking` keeps
//! that off the Tokio worker threads so concurrent requests stay responsive.
//!
//! ## Steps (in order)
//!
//! 1. Resize to at most `max_width` pixels wide (never upscale)
//! 2. Stretch levels: map the 1st–99th luminance percentile to 0–255
//! 3. Gamma correction
//! 4. Brightness offset
//! 5. Contrast
//! 6. Unsharp-mask sharpen
//! 7. Encode as JPEG at `jpeg_quality`
//!
//! The derived file is written next to the original as
//! `<stem>-processed.jpg`; the original is left untouched.

use crate::config::PipelineConfig;
use crate::error::DigestError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Luminance percentile clipped at each end when stretching levels.
const LEVELS_CLIP_PERCENT: f64 = 1.0;

/// Threshold below which the unsharp mask leaves a pixel alone.
const SHARPEN_THRESHOLD: i32 = 2;

/// The subset of [`PipelineConfig`] the blocking worker needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
    pub max_width: u32,
    pub gamma: f32,
    pub brightness: i32,
    pub contrast: f32,
    pub sharpen_sigma: f32,
    pub jpeg_quality: u8,
}

impl From<&PipelineConfig> for PreprocessParams {
    fn from(c: &PipelineConfig) -> Self {
        Self {
            max_width: c.max_width,
            gamma: c.gamma,
            brightness: c.brightness,
            contrast: c.contrast,
            sharpen_sigma: c.sharpen_sigma,
            jpeg_quality: c.jpeg_quality,
        }
    }
}

/// Path of the processed derivative for `original`.
pub fn processed_path_for(original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    original.with_file_name(format!("{stem}-processed.jpg"))
}

/// Normalise the image at `input` and return the path of the processed JPEG.
pub async fn preprocess_image(
    input: &Path,
    config: &PipelineConfig,
) -> Result<PathBuf, DigestError> {
    let input = input.to_path_buf();
    let output = processed_path_for(&input);
    let params = PreprocessParams::from(config);

    let written = output.clone();
    tokio::task::spawn_blocking(move || preprocess_blocking(&input, &written, params))
        .await
        .map_err(|e| DigestError::Internal(format!("Preprocess task panicked: {}", e)))??;

    Ok(output)
}

/// Blocking implementation of [`preprocess_image`].
fn preprocess_blocking(
    input: &Path,
    output: &Path,
    params: PreprocessParams,
) -> Result<(), DigestError> {
    let fail = |detail: String| DigestError::Preprocess {
        path: input.to_path_buf(),
        detail,
    };

    let img = image::open(input).map_err(|e| fail(e.to_string()))?;
    let (w, h) = (img.width(), img.height());
    debug!("Decoded {} → {}x{} px", input.display(), w, h);

    let img = resize_to_width(img, params.max_width);
    let mut rgb = img.to_rgb8();

    apply_levels_and_gamma(&mut rgb, params.gamma);
    let rgb = imageops::brighten(&rgb, params.brightness);
    let rgb = imageops::contrast(&rgb, params.contrast);
    let rgb = if params.sharpen_sigma > 0.0 {
        imageops::unsharpen(&rgb, params.sharpen_sigma, SHARPEN_THRESHOLD)
    } else {
        rgb
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, params.jpeg_quality)
        .encode_image(&rgb)
        .map_err(|e| fail(format!("JPEG encoding failed: {}", e)))?;
    std::fs::write(output, &jpeg).map_err(|e| DigestError::Io {
        path: output.to_path_buf(),
        source: e,
    })?;
    debug!("Wrote {} bytes of JPEG", jpeg.len());

    info!(
        "Preprocessed {} ({}x{}) → {} ({}x{})",
        input.display(),
        w,
        h,
        output.display(),
        rgb.width(),
        rgb.height()
    );
    Ok(())
}

/// Downscale so the width is at most `max_width`, preserving aspect ratio.
fn resize_to_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w <= max_width {
        return img;
    }
    let new_h = ((h as u64 * max_width as u64) / w as u64).max(1) as u32;
    img.resize_exact(max_width, new_h, FilterType::Lanczos3)
}

/// Stretch the luminance range to 0–255 and apply gamma, in one lookup pass.
pub fn apply_levels_and_gamma(img: &mut RgbImage, gamma: f32) {
    let (lo, hi) = luminance_bounds(img);
    let range = if hi > lo { (hi - lo) as f32 } else { 255.0 };
    let lo = if hi > lo { lo as f32 } else { 0.0 };
    let inv_gamma = 1.0 / gamma;

    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        let stretched = ((v as f32 - lo) / range).clamp(0.0, 1.0);
        *slot = (stretched.powf(inv_gamma) * 255.0).round() as u8;
    }

    for px in img.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = lut[*c as usize];
        }
    }
}

/// 1st and 99th percentile of Rec.601 luma.
fn luminance_bounds(img: &RgbImage) -> (u8, u8) {
    let mut histogram = [0u64; 256];
    for px in img.pixels() {
        let [r, g, b] = px.0;
        let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as usize;
        histogram[luma.min(255)] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return (0, 255);
    }
    let clip = ((total as f64) * LEVELS_CLIP_PERCENT / 100.0) as u64;

    let mut seen = 0u64;
    let mut lo = 0u8;
    for (v, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen > clip {
            lo = v as u8;
            break;
        }
    }

    seen = 0;
    let mut hi = 255u8;
    for (v, &count) in histogram.iter().enumerate().rev() {
        seen += count;
        if seen > clip {
            hi = v as u8;
            break;
        }
    }
    (lo, hi)
}
