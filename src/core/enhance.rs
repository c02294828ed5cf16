//! Scan enhancement: upscale small text, denoise, deskew and binarize pages.

use crate::core::morphology::{invert, median, outer_regions, rect_mask, threshold_inverted};
use crate::domain::model::EnhanceSummary;
use crate::domain::ports::PageRasterizer;
use crate::utils::error::Result;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::filter::{box_filter, median_filter};
use imageproc::geometric_transformations::{warp_into_with, Interpolation, Projection};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use imageproc::morphology::{grayscale_close, grayscale_open};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENHANCE_DPI: u32 = 400;
pub const TARGET_CHAR_PX: f64 = 28.0;
pub const MAX_UPSCALE: f64 = 4.0;
/// Skew below this many degrees is left alone.
const MIN_DESKEW_DEGREES: f32 = 0.2;
const ADAPTIVE_OFFSET: i16 = 10;
/// Replicated border around the source so bicubic taps stay in bounds.
const ROTATE_PAD: u32 = 3;

pub fn upscale_if_small_text(rgb: &RgbImage, target_char_px: f64, max_scale: f64) -> RgbImage {
    let gray = imageops::grayscale(rgb);
    let ink = grayscale_open(&threshold_inverted(&gray, otsu_level(&gray)), &rect_mask(3, 3));

    let max_width = f64::from(rgb.width()) * 0.8;
    let heights: Vec<f64> = outer_regions(&ink)
        .into_iter()
        .filter(|r| r.width > 5 && f64::from(r.width) < max_width)
        .map(|r| f64::from(r.height))
        .collect();

    let Some(median_height) = median(&heights) else {
        return rgb.clone();
    };
    if median_height >= target_char_px {
        return rgb.clone();
    }

    let scale = (target_char_px / (median_height + 1e-6)).max(1.0).min(max_scale);
    let width = (f64::from(rgb.width()) * scale) as u32;
    let height = (f64::from(rgb.height()) * scale) as u32;
    tracing::debug!("Upscaling page x{:.2} (median glyph height {:.1}px)", scale, median_height);
    imageops::resize(rgb, width, height, FilterType::CatmullRom)
}

pub fn denoise(rgb: &RgbImage) -> RgbImage {
    median_filter(rgb, 1, 1)
}

/// Median angle of near-horizontal lines, in degrees. Positive means the text
/// runs downhill to the right.
pub fn estimate_skew_angle(gray: &GrayImage) -> f32 {
    let edges = canny(gray, 50.0, 150.0);
    let min_side = gray.width().min(gray.height());
    let options = LineDetectionOptions {
        vote_threshold: (min_side / 4).max(80),
        suppression_radius: 8,
    };

    let angles: Vec<f64> = detect_lines(&edges, options)
        .into_iter()
        .map(|line| line.angle_in_degrees as f64 - 90.0)
        .filter(|angle| angle.abs() < 45.0)
        .collect();

    median(&angles).unwrap_or(0.0) as f32
}

/// Rotates counter-clockwise by `angle` degrees about the centre. Corners
/// uncovered by the rotation repeat the nearest edge pixel.
pub fn rotate_image(rgb: &RgbImage, angle: f32) -> RgbImage {
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return rgb.clone();
    }

    let padded = RgbImage::from_fn(width + 2 * ROTATE_PAD, height + 2 * ROTATE_PAD, |x, y| {
        *rgb.get_pixel(
            x.saturating_sub(ROTATE_PAD).min(width - 1),
            y.saturating_sub(ROTATE_PAD).min(height - 1),
        )
    });

    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let to_source = (Projection::translate(cx, cy)
        * Projection::rotate(-angle.to_radians())
        * Projection::translate(-cx, -cy))
    .invert();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let pad = ROTATE_PAD as f32;

    let mut rotated = RgbImage::new(width, height);
    warp_into_with(
        &padded,
        |x, y| {
            let (sx, sy) = &to_source * &(x, y);
            (sx.clamp(0.0, max_x) + pad, sy.clamp(0.0, max_y) + pad)
        },
        Interpolation::Bicubic,
        Rgb([255, 255, 255]),
        &mut rotated,
    );
    rotated
}

/// Local-mean threshold; the result is dark text on a white background.
pub fn adaptive_binarize(gray: &GrayImage) -> GrayImage {
    let blurred = median_filter(gray, 1, 1);
    let block_size: u32 = if gray.width().max(gray.height()) >= 1000 { 31 } else { 21 };
    let local_mean = box_filter(&blurred, block_size / 2, block_size / 2);

    let binary = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = i16::from(blurred.get_pixel(x, y)[0]);
        let threshold = i16::from(local_mean.get_pixel(x, y)[0]) - ADAPTIVE_OFFSET;
        Luma([if value > threshold { 255 } else { 0 }])
    });

    let pixel_count = u64::from(binary.width()) * u64::from(binary.height());
    let total: u64 = binary.pixels().map(|p| u64::from(p[0])).sum();
    if pixel_count > 0 && total / pixel_count < 127 {
        invert(&binary)
    } else {
        binary
    }
}

pub fn post_cleanup(binary: &GrayImage) -> GrayImage {
    let mask = rect_mask(2, 2);
    grayscale_close(&grayscale_open(binary, &mask), &mask)
}

/// Returns the cleaned binary page and the detected skew angle.
pub fn process_page_image(page: &DynamicImage) -> (GrayImage, f32) {
    let upscaled = upscale_if_small_text(&page.to_rgb8(), TARGET_CHAR_PX, MAX_UPSCALE);
    let mut denoised = denoise(&upscaled);
    let mut gray = imageops::grayscale(&denoised);

    let angle = estimate_skew_angle(&gray);
    if angle.abs() > MIN_DESKEW_DEGREES {
        denoised = rotate_image(&denoised, angle);
        gray = imageops::grayscale(&denoised);
    }

    (post_cleanup(&adaptive_binarize(&gray)), angle)
}

/// Enhances every page of `pdf_path` into `<out_root>/<stem>/page_NNN.png`.
pub fn process_pdf_file(
    rasterizer: &dyn PageRasterizer,
    pdf_path: &Path,
    out_root: &Path,
    dpi: u32,
) -> Result<Vec<(PathBuf, f32)>> {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let out_dir = out_root.join(stem);
    std::fs::create_dir_all(&out_dir)?;

    let pdf = std::fs::read(pdf_path)?;
    let pages = rasterizer.rasterize(&pdf, dpi)?;

    let mut results = Vec::with_capacity(pages.len());
    for (index, page) in pages.iter().enumerate() {
        let (processed, angle) = process_page_image(page);
        let out_path = out_dir.join(format!("page_{:03}.png", index + 1));
        processed.save(&out_path)?;
        results.push((out_path, angle));
    }
    Ok(results)
}

pub fn summarize(result: Result<Vec<(PathBuf, f32)>>) -> EnhanceSummary {
    match result {
        Ok(pages) => EnhanceSummary::Success {
            pages: pages.len(),
            angles: pages.iter().map(|(_, angle)| *angle).collect(),
        },
        Err(e) => EnhanceSummary::Failed {
            error: e.to_string(),
        },
    }
}

/// Enhances every `*.pdf` in `upload_dir`; one broken file does not stop the rest.
pub fn process_all_pdfs(
    rasterizer: &dyn PageRasterizer,
    upload_dir: &Path,
    processed_dir: &Path,
    dpi: u32,
) -> Result<BTreeMap<String, EnhanceSummary>> {
    let mut pdf_files: Vec<PathBuf> = std::fs::read_dir(upload_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "pdf"))
        .collect();
    pdf_files.sort();

    let mut summary = BTreeMap::new();
    for pdf in pdf_files {
        let name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let outcome = summarize(process_pdf_file(rasterizer, &pdf, processed_dir, dpi));
        if let EnhanceSummary::Failed { error } = &outcome {
            tracing::warn!("Enhancement failed for {}: {}", name, error);
        }
        summary.insert(name, outcome);
    }
    Ok(summary)
}
