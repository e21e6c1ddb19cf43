//! Overlay rendering: boxes, landmark dots and expression labels.
//!
//! [`draw_detections`] is the single draw routine; the live renderer
//! runs it against a display-sized canvas, and capture runs it against
//! the native-resolution frame before encoding.

use crate::font;
use facewatch_core::DetectionSet;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

const BOX_COLOR: Rgb<u8> = Rgb([0, 120, 255]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 60, 60]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Draw every detection onto `canvas`, rescaling coordinates from the
/// inference resolution (`src_w`, `src_h`) to the canvas size.
pub fn draw_detections(canvas: &mut RgbImage, set: &DetectionSet, src_w: u32, src_h: u32) {
    if src_w == 0 || src_h == 0 {
        return;
    }
    let sx = canvas.width() as f32 / src_w as f32;
    let sy = canvas.height() as f32 / src_h as f32;

    for detection in set {
        let bbox = detection.bbox.scaled(sx, sy);
        let w = bbox.width.max(1.0) as u32;
        let h = bbox.height.max(1.0) as u32;
        let rect = Rect::at(bbox.x as i32, bbox.y as i32).of_size(w, h);
        draw_hollow_rect_mut(canvas, rect, BOX_COLOR);

        for &(lx, ly) in detection.landmarks.points() {
            draw_filled_circle_mut(
                canvas,
                ((lx * sx) as i32, (ly * sy) as i32),
                1,
                LANDMARK_COLOR,
            );
        }

        let (label, score) = detection.expressions.top();
        let text = format!("{} {}%", label.as_str(), (score * 100.0).round() as u32);
        font::draw_text(
            canvas,
            bbox.x as i32,
            (bbox.y + bbox.height) as i32 + 3,
            &text,
            LABEL_COLOR,
        );
    }
}

/// Display-size overlay surface fed by the detection loop.
pub struct OverlayRenderer {
    canvas: RgbImage,
    src_w: u32,
    src_h: u32,
}

impl OverlayRenderer {
    /// `display` is the canvas size, `src` the resolution detections
    /// are reported at (the camera's native size).
    pub fn new(display: (u32, u32), src: (u32, u32)) -> Self {
        Self {
            canvas: RgbImage::new(display.0, display.1),
            src_w: src.0,
            src_h: src.1,
        }
    }

    /// Re-render for a new DetectionSet. An empty set draws nothing:
    /// the previous overlay stays visible until the next non-empty set
    /// (matching the observed behavior, not corrected here).
    pub fn render(&mut self, set: &DetectionSet) {
        if set.is_empty() {
            return;
        }
        // Clear before drawing so repeated renders never accumulate.
        self.canvas.fill(0);
        draw_detections(&mut self.canvas, set, self.src_w, self.src_h);
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }
}
