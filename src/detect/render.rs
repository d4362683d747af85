use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{DetectError, LabeledDetection};

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const BOX_THICKNESS: i32 = 4;
pub const TEXT_SCALE: f32 = 30.0;

pub fn load_font(path: &Path) -> Result<FontVec, DetectError> {
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes).map_err(|_| DetectError::Font {
        path: path.to_path_buf(),
    })
}

/// Baseline of the label: above the box unless it would leave the top band.
pub fn text_baseline(y1: i32) -> i32 {
    if y1 - 40 > 40 { y1 - 10 } else { y1 + 40 }
}

/// Pixel box from float corners, truncated toward zero. Corners are held
/// within a thickness-wide band around the image so outline arithmetic
/// stays in range for arbitrarily large boxes.
pub fn pixel_box(bbox: &[f32; 4], width: u32, height: u32) -> [i32; 4] {
    let band = BOX_THICKNESS as f32;
    let limit = (i32::MAX / 4) as f32;
    let clamp = |v: f32, dim: u32| v.clamp(-band, (dim as f32 + band).min(limit)) as i32;
    [
        clamp(bbox[0], width),
        clamp(bbox[1], height),
        clamp(bbox[2], width),
        clamp(bbox[3], height),
    ]
}

pub fn draw_box(image: &mut RgbImage, corners: [i32; 4], color: Rgb<u8>) {
    let [x1, y1, x2, y2] = corners;
    let half = BOX_THICKNESS / 2;
    for d in -half..(BOX_THICKNESS - half) {
        let w = x2 - x1 + 1 - 2 * d;
        let h = y2 - y1 + 1 - 2 * d;
        if w <= 0 || h <= 0 {
            continue;
        }
        draw_hollow_rect_mut(
            image,
            Rect::at(x1 + d, y1 + d).of_size(w as u32, h as u32),
            color,
        );
    }
}

pub fn draw_detections(image: &mut RgbImage, detections: &[LabeledDetection], font: Option<&FontVec>) {
    let scale = PxScale::from(TEXT_SCALE);
    let (width, height) = image.dimensions();
    for det in detections {
        let corners = pixel_box(&det.detection.bbox, width, height);
        draw_box(image, corners, BOX_COLOR);
        if let Some(font) = font {
            let ascent = font.as_scaled(scale).ascent();
            let top = text_baseline(corners[1]) - ascent.round() as i32;
            draw_text_mut(image, BOX_COLOR, corners[0], top, scale, font, &det.text);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/detect/render.rs"]
mod tests;
