//! Captured frames and comparison utilities
//!
//! A captured frame is a plain RGBA8 buffer with pixel accessors and diff
//! helpers for visual regression tests. PNG export is available behind the
//! `png` feature.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "png")]
    #[error("png encoding failed: {0}")]
    Png(#[from] png::EncodingError),
}

/// One frame's pixels in RGBA8 row-major order.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Frame number the capture was taken at.
    pub frame: u64,
}

impl CapturedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        Self {
            data,
            width,
            height,
            frame: 0,
        }
    }

    pub fn with_frame(mut self, frame: u64) -> Self {
        self.frame = frame;
        self
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// RGBA channels of the pixel at (x, y), or None out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = ((y * self.width + x) * 4) as usize;
        let bytes = self.data.get(index..index + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Number of pixels that differ from `other`. Mismatched dimensions
    /// count as fully different.
    pub fn diff_count(&self, other: &CapturedFrame) -> usize {
        if self.width != other.width || self.height != other.height {
            return self.pixel_count().max(other.pixel_count());
        }
        self.data
            .chunks_exact(4)
            .zip(other.data.chunks_exact(4))
            .filter(|(a, b)| a != b)
            .count()
    }

    pub fn diff_percentage(&self, other: &CapturedFrame) -> f32 {
        self.diff_count(other) as f32 / self.pixel_count().max(1) as f32 * 100.0
    }

    pub fn is_identical_to(&self, other: &CapturedFrame) -> bool {
        self.width == other.width && self.height == other.height && self.data == other.data
    }

    /// Write the frame as an RGBA8 PNG.
    #[cfg(feature = "png")]
    pub fn save_png(&self, path: impl AsRef<std::path::Path>) -> Result<(), CaptureError> {
        use std::io::BufWriter;

        let file = std::fs::File::create(path)?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.data)?;
        Ok(())
    }
}

/// Outcome of comparing a capture against a reference image.
#[derive(Clone, Debug)]
pub struct RegressionResult {
    pub passed: bool,
    pub diff_pixels: usize,
    pub diff_percentage: f32,
    pub tolerance: f32,
}

/// Compare two frames, passing when at most `tolerance_percent` of pixels
/// differ.
pub fn compare_frames(
    actual: &CapturedFrame,
    expected: &CapturedFrame,
    tolerance_percent: f32,
) -> RegressionResult {
    let diff_pixels = actual.diff_count(expected);
    let diff_percentage = actual.diff_percentage(expected);
    RegressionResult {
        passed: diff_percentage <= tolerance_percent,
        diff_pixels,
        diff_percentage,
        tolerance: tolerance_percent,
    }
}

/// Bounded collection of captures for animation tests; pushes past the
/// capacity are dropped.
pub struct FrameSequence {
    frames: Vec<CapturedFrame>,
    capacity: usize,
}

impl FrameSequence {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, frame: CapturedFrame) {
        if self.frames.len() < self.capacity {
            self.frames.push(frame);
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CapturedFrame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapturedFrame> {
        self.frames.iter()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> CapturedFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        CapturedFrame::new(data, width, height)
    }

    #[test]
    fn pixel_accessor_bounds_check() {
        let frame = solid(4, 3, [10, 20, 30, 255]);
        assert_eq!(frame.pixel(3, 2), Some([10, 20, 30, 255]));
        assert_eq!(frame.pixel(4, 0), None);
        assert_eq!(frame.pixel(0, 3), None);
    }

    #[test]
    fn diff_counts_changed_pixels() {
        let a = solid(4, 4, [255, 0, 0, 255]);
        let mut b = a.clone();
        b.data[0] = 0;
        b.data[4 * 4] = 0;
        assert_eq!(a.diff_count(&b), 2);
        assert!(!a.is_identical_to(&b));
        assert!((a.diff_percentage(&b) - 12.5).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_differ_fully() {
        let a = solid(4, 4, [0, 0, 0, 255]);
        let b = solid(2, 2, [0, 0, 0, 255]);
        assert_eq!(a.diff_count(&b), 16);
    }

    #[test]
    fn comparison_respects_tolerance() {
        let a = solid(10, 10, [1, 2, 3, 255]);
        let mut b = a.clone();
        b.data[0] = 0;
        let strict = compare_frames(&a, &b, 0.0);
        assert!(!strict.passed);
        let loose = compare_frames(&a, &b, 5.0);
        assert!(loose.passed);
        assert_eq!(loose.diff_pixels, 1);
    }

    #[test]
    fn sequence_drops_pushes_past_capacity() {
        let mut seq = FrameSequence::new(2);
        for _ in 0..5 {
            seq.push(solid(1, 1, [0, 0, 0, 0]));
        }
        assert_eq!(seq.len(), 2);
    }
}
