//! Paragraph and title segmentation of rendered PDF pages.

use crate::core::morphology::{median, outer_regions, rect_mask, threshold_inverted};
use crate::domain::model::BlockKind;
use image::DynamicImage;
use imageproc::contrast::otsu_level;
use imageproc::morphology::grayscale_dilate;

/// Joins words on a line.
const LINE_KERNEL: (u8, u8) = (50, 1);
/// Joins lines into paragraphs.
const PARAGRAPH_KERNEL: (u8, u8) = (1, 30);
const MIN_BLOCK_WIDTH: u32 = 50;
const MIN_BLOCK_HEIGHT: u32 = 30;
const MEDIAN_HEIGHT_FLOOR: u32 = 20;
const DEFAULT_MEDIAN_HEIGHT: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct PageBlock {
    /// Position in top-to-bottom order, counting skipped regions
    pub id: usize,
    pub kind: BlockKind,
    pub bbox: [u32; 4],
    pub crop: DynamicImage,
}

pub fn segment_page(page: &DynamicImage) -> Vec<PageBlock> {
    let gray = page.to_luma8();
    let ink = threshold_inverted(&gray, otsu_level(&gray));

    let lines = grayscale_dilate(&ink, &rect_mask(LINE_KERNEL.0, LINE_KERNEL.1));
    let paragraphs = grayscale_dilate(&lines, &rect_mask(PARAGRAPH_KERNEL.0, PARAGRAPH_KERNEL.1));

    let mut regions = outer_regions(&paragraphs);
    let heights: Vec<f64> = regions
        .iter()
        .filter(|r| r.height > MEDIAN_HEIGHT_FLOOR)
        .map(|r| f64::from(r.height))
        .collect();
    let median_height = median(&heights).unwrap_or(DEFAULT_MEDIAN_HEIGHT);

    regions.sort_by_key(|r| r.y);

    regions
        .into_iter()
        .enumerate()
        .filter(|(_, r)| r.width >= MIN_BLOCK_WIDTH && r.height >= MIN_BLOCK_HEIGHT)
        .map(|(id, r)| {
            let kind = if f64::from(r.height) > 2.0 * median_height {
                BlockKind::Title
            } else {
                BlockKind::Paragraph
            };
            PageBlock {
                id,
                kind,
                bbox: [r.x, r.y, r.width, r.height],
                crop: page.crop_imm(r.x, r.y, r.width, r.height),
            }
        })
        .collect()
}

/// File name used for a saved block crop.
pub fn block_file_name(base_name: &str, page_num: usize, block_id: usize) -> String {
    format!("{}_page{}_block{}.png", base_name, page_num, block_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn fill(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
        for px in x..x + w {
            for py in y..y + h {
                img.put_pixel(px, py, Rgb([0, 0, 0]));
            }
        }
    }

    fn sample_page() -> DynamicImage {
        let mut img = RgbImage::from_pixel(600, 800, Rgb([255, 255, 255]));
        // two "text lines" forming one paragraph
        fill(&mut img, 50, 100, 400, 12);
        fill(&mut img, 50, 120, 380, 12);
        // a tall heading-like block far below
        fill(&mut img, 50, 400, 300, 120);
        // speck in the corner, clipped below the minimum block size
        fill(&mut img, 598, 795, 2, 2);
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_segment_page_blocks() {
        let blocks = segment_page(&sample_page());
        assert_eq!(blocks.len(), 2);

        let paragraph = &blocks[0];
        assert_eq!(paragraph.kind, BlockKind::Paragraph);
        assert!(paragraph.bbox[1] < 100);
        assert_eq!(paragraph.crop.width(), paragraph.bbox[2]);

        let title = &blocks[1];
        assert!(title.id > paragraph.id);
        assert!(title.bbox[3] > 120);
    }

    #[test]
    fn test_framed_page_is_one_block() {
        let mut img = RgbImage::from_pixel(600, 800, Rgb([255, 255, 255]));
        fill(&mut img, 0, 0, 600, 3);
        fill(&mut img, 0, 797, 600, 3);
        fill(&mut img, 0, 0, 3, 800);
        fill(&mut img, 597, 0, 3, 800);
        fill(&mut img, 100, 300, 400, 12);

        let blocks = segment_page(&DynamicImage::ImageRgb8(img));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id, 0);
        assert_eq!(blocks[0].bbox, [0, 0, 600, 800]);
    }

    #[test]
    fn test_blank_page_has_no_blocks() {
        let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 200, Rgb([255, 255, 255])));
        assert!(segment_page(&page).is_empty());
    }

    #[test]
    fn test_block_file_name() {
        assert_eq!(block_file_name("8A16", 2, 5), "8A16_page2_block5.png");
    }
}
