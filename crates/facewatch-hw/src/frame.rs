//! Frame type and pixel format conversion.

use thiserror::Error;

/// A captured RGB camera frame (interleaved RGB8, width * height * 3).
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Average luma brightness (0.0–255.0), used to spot a covered or
    /// failing sensor in diagnostics.
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .data
            .chunks_exact(3)
            .map(|px| 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
            .sum();
        sum / (self.data.len() / 3) as f32
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Convert packed YUYV (4:2:2) to interleaved RGB8 using BT.601
/// integer coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; U and V are
/// shared by the pixel pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let u = chunk[1] as i32 - 128;
        let v = chunk[3] as i32 - 128;
        for &y in &[chunk[0], chunk[2]] {
            let c = (y as i32 - 16).max(0) * 298;
            let r = (c + 409 * v + 128) >> 8;
            let g = (c - 100 * u - 208 * v + 128) >> 8;
            let b = (c + 516 * u + 128) >> 8;
            rgb.push(r.clamp(0, 255) as u8);
            rgb.push(g.clamp(0, 255) as u8);
            rgb.push(b.clamp(0, 255) as u8);
        }
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_length() {
        // 2x2 frame = 4 pixels = 8 YUYV bytes = 12 RGB bytes.
        let yuyv = vec![128u8; 8];
        let rgb = yuyv_to_rgb(&yuyv, 2, 2).unwrap();
        assert_eq!(rgb.len(), 12);
    }

    #[test]
    fn test_yuyv_to_rgb_gray_is_neutral() {
        // Y=128, U=V=128 → mid gray, R ≈ G ≈ B.
        let yuyv = vec![128, 128, 128, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        for px in rgb.chunks(3) {
            assert!((px[0] as i32 - px[1] as i32).abs() <= 2);
            assert!((px[1] as i32 - px[2] as i32).abs() <= 2);
        }
    }

    #[test]
    fn test_yuyv_to_rgb_white_and_black() {
        // [Y0=235 (white), Y1=16 (black)] with neutral chroma.
        let yuyv = vec![235, 128, 16, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > 250); // white pixel
        assert!(rgb[3] < 5); // black pixel
    }

    #[test]
    fn test_yuyv_short_buffer() {
        let yuyv = vec![0u8; 3];
        assert!(yuyv_to_rgb(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_avg_brightness() {
        let frame = Frame {
            data: vec![255u8; 4 * 4 * 3],
            width: 4,
            height: 4,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        };
        assert!((frame.avg_brightness() - 255.0).abs() < 0.5);
    }

    #[test]
    fn test_avg_brightness_empty() {
        let frame = Frame {
            data: vec![],
            width: 0,
            height: 0,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        };
        assert_eq!(frame.avg_brightness(), 0.0);
    }
}
