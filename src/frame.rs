//! Captured video frames.

use crate::constants::{LUMA_SHIFT, LUMA_WEIGHTS_BGR_Q14};
use crate::{Error, Result};

/// Number of interleaved channels in a [`Frame`] (BGR)
pub const CHANNELS: usize = 3;

/// An 8-bit BGR image, row-major, `height * width * 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing BGR buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length does not match the dimensions
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(CHANNELS))
            .ok_or_else(|| Error::InvalidInput(format!("Frame {width}x{height} is too large")))?;
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "Frame {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with one BGR color
    #[must_use]
    pub fn filled(width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let data = bgr.iter().copied().cycle().take(width * height * CHANNELS).collect();
        Self {
            width,
            height,
            data,
        }
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Raw BGR bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Horizontally flipped copy
    #[must_use]
    pub fn mirrored(&self) -> Self {
        let row_len = self.width * CHANNELS;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len.max(1)) {
            for pixel in row.chunks_exact(CHANNELS).rev() {
                data.extend_from_slice(pixel);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// 8-bit grayscale intensities, one per pixel, rounded to the nearest level
    #[must_use]
    pub fn to_gray(&self) -> Vec<u8> {
        let half = 1 << (LUMA_SHIFT - 1);
        self.data
            .chunks_exact(CHANNELS)
            .map(|px| {
                let weighted: u32 = px
                    .iter()
                    .zip(LUMA_WEIGHTS_BGR_Q14)
                    .map(|(&c, w)| u32::from(c) * w)
                    .sum();
                // Weights sum to 1 << LUMA_SHIFT, so the level never exceeds 255
                u8::try_from((weighted + half) >> LUMA_SHIFT).unwrap_or(u8::MAX)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_length_validation() {
        assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
        assert!(Frame::new(2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn test_mirrored() {
        // Two pixels in one row: blue, then red
        let frame = Frame::new(2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let flipped = frame.mirrored();
        assert_eq!(flipped.data(), &[0, 0, 255, 255, 0, 0]);
        assert_eq!(flipped.mirrored(), frame);
    }

    #[test]
    fn test_to_gray() {
        let white = Frame::filled(3, 2, [255, 255, 255]);
        assert_eq!(white.to_gray(), vec![255; 6]);

        let green = Frame::filled(1, 1, [0, 255, 0]);
        assert_eq!(green.to_gray(), vec![150]);
    }

    #[test]
    fn test_to_gray_rounds_to_nearest_level() {
        // Red 1 weighs 0.299 of a level, red 2 weighs 0.598
        let frame = Frame::new(3, 1, vec![0, 0, 1, 0, 0, 2, 128, 128, 128]).unwrap();
        assert_eq!(frame.to_gray(), vec![0, 1, 128]);
    }
}
