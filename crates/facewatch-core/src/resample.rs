//! Bilinear sampling helpers shared by the inference preprocessors.
//!
//! Frames are interleaved RGB8 (`width * height * 3` bytes). All
//! samplers clamp at the frame edges so crops that spill outside the
//! frame repeat the border pixel instead of failing.

/// Sample one RGB pixel at a fractional position with edge clamping.
pub fn bilinear_rgb(frame: &[u8], width: usize, height: usize, x: f32, y: f32) -> [f32; 3] {
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let tl = frame[(y0 * width + x0) * 3 + c] as f32;
        let tr = frame[(y0 * width + x1) * 3 + c] as f32;
        let bl = frame[(y1 * width + x0) * 3 + c] as f32;
        let br = frame[(y1 * width + x1) * 3 + c] as f32;
        let top = tl * (1.0 - fx) + tr * fx;
        let bot = bl * (1.0 - fx) + br * fx;
        out[c] = top * (1.0 - fy) + bot * fy;
    }
    out
}

/// Stretch-resize a whole RGB frame to `out_w x out_h`.
pub fn resize_rgb(frame: &[u8], width: usize, height: usize, out_w: usize, out_h: usize) -> Vec<u8> {
    let mut out = vec![0u8; out_w * out_h * 3];
    let sx = width as f32 / out_w as f32;
    let sy = height as f32 / out_h as f32;

    for oy in 0..out_h {
        let src_y = (oy as f32 + 0.5) * sy - 0.5;
        for ox in 0..out_w {
            let src_x = (ox as f32 + 0.5) * sx - 0.5;
            let px = bilinear_rgb(frame, width, height, src_x, src_y);
            let base = (oy * out_w + ox) * 3;
            for c in 0..3 {
                out[base + c] = px[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Crop an axis-aligned region and resize it to `out_w x out_h`.
/// The region may extend past the frame; border pixels repeat.
#[allow(clippy::too_many_arguments)]
pub fn crop_resize_rgb(
    frame: &[u8],
    width: usize,
    height: usize,
    crop_x: f32,
    crop_y: f32,
    crop_w: f32,
    crop_h: f32,
    out_w: usize,
    out_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; out_w * out_h * 3];
    let sx = crop_w / out_w as f32;
    let sy = crop_h / out_h as f32;

    for oy in 0..out_h {
        let src_y = crop_y + (oy as f32 + 0.5) * sy - 0.5;
        for ox in 0..out_w {
            let src_x = crop_x + (ox as f32 + 0.5) * sx - 0.5;
            let px = bilinear_rgb(frame, width, height, src_x, src_y);
            let base = (oy * out_w + ox) * 3;
            for c in 0..3 {
                out[base + c] = px[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// ITU-R BT.601 luma from an RGB pixel.
pub fn luma(rgb: &[f32; 3]) -> f32 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_frame(w: usize, h: usize, value: u8) -> Vec<u8> {
        vec![value; w * h * 3]
    }

    #[test]
    fn test_bilinear_uniform() {
        let frame = uniform_frame(8, 8, 100);
        let px = bilinear_rgb(&frame, 8, 8, 3.7, 2.2);
        for c in px {
            assert!((c - 100.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bilinear_clamps_outside() {
        let frame = uniform_frame(4, 4, 50);
        let px = bilinear_rgb(&frame, 4, 4, -5.0, 100.0);
        for c in px {
            assert!((c - 50.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let frame = uniform_frame(10, 10, 128);
        let out = resize_rgb(&frame, 10, 10, 23, 7);
        assert_eq!(out.len(), 23 * 7 * 3);
        assert!(out.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_crop_resize_extracts_region() {
        // Left half red-ish, right half dark.
        let w = 8usize;
        let h = 4usize;
        let mut frame = vec![0u8; w * h * 3];
        for y in 0..h {
            for x in 0..4 {
                frame[(y * w + x) * 3] = 200;
            }
        }
        let crop = crop_resize_rgb(&frame, w, h, 0.0, 0.0, 4.0, 4.0, 2, 2);
        // All sampled pixels fall in the bright half.
        assert!(crop.chunks(3).all(|px| px[0] > 150));
    }

    #[test]
    fn test_luma_weights() {
        assert!((luma(&[255.0, 255.0, 255.0]) - 255.0).abs() < 0.1);
        assert!(luma(&[0.0, 255.0, 0.0]) > luma(&[0.0, 0.0, 255.0]));
    }
}
