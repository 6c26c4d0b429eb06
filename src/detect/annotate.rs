//! Box and label rendering.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::model::{Detection, DetectionResult};
use crate::error::YoloKitError;

/// Fonts tried, in order, when no font path is configured.
const FALLBACK_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const PALETTE: [[u8; 3]; 20] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [146, 204, 23],
    [61, 219, 134],
    [26, 147, 52],
    [0, 212, 187],
    [44, 153, 168],
    [0, 194, 255],
    [52, 69, 147],
    [100, 115, 255],
    [0, 24, 236],
    [132, 56, 255],
    [82, 0, 133],
    [203, 56, 255],
    [255, 149, 200],
    [255, 55, 199],
];

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Box color for a class id.
pub fn class_color(class_id: u32) -> Rgb<u8> {
    Rgb(PALETTE[class_id as usize % PALETTE.len()])
}

/// `<class_name>: <confidence>%` with two decimals.
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{}: {:.2}%",
        detection.class_name,
        detection.confidence * 100.0
    )
}

/// Load a TrueType/OpenType font for labels.
///
/// An explicit `path` must load. Without one, the first readable system
/// fallback is used; `None` means labels will be skipped.
pub fn load_font(path: Option<&Path>) -> Result<Option<FontVec>, YoloKitError> {
    if let Some(path) = path {
        return read_font(path).map(Some);
    }

    let found = FALLBACK_FONTS
        .iter()
        .map(PathBuf::from)
        .filter(|candidate| candidate.is_file())
        .find_map(|candidate| read_font(&candidate).ok());

    if found.is_none() {
        log::warn!("no label font found; drawing boxes without text (set --font to fix)");
    }
    Ok(found)
}

fn read_font(path: &Path) -> Result<FontVec, YoloKitError> {
    let bytes = fs::read(path).map_err(|source| YoloKitError::FontLoad {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;
    FontVec::try_from_vec(bytes).map_err(|source| YoloKitError::FontLoad {
        path: path.to_path_buf(),
        message: source.to_string(),
    })
}

/// Draw every detection onto a copy of `image`.
///
/// Labels sit on a filled band above each box, or inside it when the box
/// touches the top edge.
pub fn annotate(image: &RgbImage, result: &DetectionResult, font: Option<&FontVec>) -> RgbImage {
    let mut canvas = image.clone();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return canvas;
    }

    let thickness = line_thickness(width, height);
    let scale = PxScale::from((thickness * 6).max(12) as f32);

    for detection in result.iter() {
        let color = class_color(detection.class_id);
        let x1 = detection.x1.round() as i32;
        let y1 = detection.y1.round() as i32;
        let box_w = detection.width().round().max(1.0) as u32;
        let box_h = detection.height().round().max(1.0) as u32;

        for inset in 0..thickness {
            let w = box_w.saturating_sub(2 * inset);
            let h = box_h.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(x1 + inset as i32, y1 + inset as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }

        let Some(font) = font else {
            continue;
        };

        let text = label_text(detection);
        let (text_w, text_h) = text_size(scale, font, &text);
        let band_h = text_h + 2 * thickness;
        let band_y = if y1 >= band_h as i32 {
            y1 - band_h as i32
        } else {
            y1
        };

        let band = Rect::at(x1, band_y).of_size(text_w.max(1) + 2 * thickness, band_h.max(1));
        draw_filled_rect_mut(&mut canvas, band, color);
        draw_text_mut(
            &mut canvas,
            TEXT_COLOR,
            x1 + thickness as i32,
            band_y + thickness as i32,
            scale,
            font,
            &text,
        );
    }

    canvas
}

fn line_thickness(width: u32, height: u32) -> u32 {
    (((width + height) as f32 / 2.0 * 0.003).round() as u32).max(2)
}
