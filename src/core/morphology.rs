//! Binary image helpers shared by page segmentation and scan enhancement.
//!
//! Images are `GrayImage`s where any non-zero pixel is "on".

use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::morphology::Mask;

/// Axis-aligned bounding box of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// `255` where `pixel <= level`, else `0`.
pub fn threshold_inverted(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([if gray.get_pixel(x, y)[0] <= level { 255 } else { 0 }])
    })
}

pub fn invert(binary: &GrayImage) -> GrayImage {
    GrayImage::from_fn(binary.width(), binary.height(), |x, y| {
        Luma([255 - binary.get_pixel(x, y)[0]])
    })
}

/// Rectangular structuring element anchored at `(width / 2, height / 2)`.
pub fn rect_mask(width: u8, height: u8) -> Mask {
    let kernel = GrayImage::from_pixel(
        u32::from(width.max(1)),
        u32::from(height.max(1)),
        Luma([255]),
    );
    Mask::from_image(&kernel, width / 2, height / 2)
}

/// Bounding boxes of the outermost "on" regions.
///
/// Regions nested inside the hole of another region are skipped, so text
/// inside a frame or table border belongs to the enclosing block.
pub fn outer_regions(binary: &GrayImage) -> Vec<Region> {
    // border following never starts an outer border in column 0
    let mut padded = GrayImage::new(binary.width() + 2, binary.height() + 2);
    imageops::replace(&mut padded, binary, 1, 1);

    find_contours::<u32>(&padded)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let x0 = contour.points.iter().map(|p| p.x).min()?;
            let y0 = contour.points.iter().map(|p| p.y).min()?;
            let x1 = contour.points.iter().map(|p| p.x).max()?;
            let y1 = contour.points.iter().map(|p| p.y).max()?;
            Some(Region {
                x: x0 - 1,
                y: y0 - 1,
                width: x1 - x0 + 1,
                height: y1 - y0 + 1,
            })
        })
        .collect()
}

/// Median with the even-length average, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}
