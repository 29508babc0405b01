//! HSV frame buffers.
//!
//! A frame is `height x width x 3` bytes, row-major, already converted to
//! HSV. Frames are owned by the tick that pulled them and dropped once the
//! decision for that tick has been made; nothing in the core keeps one.

use anyhow::{anyhow, Result};

use crate::Hsv;

pub struct HsvFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl HsvFrame {
    /// Wrap a packed HSV buffer. The length must be exactly `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer holds {} bytes, expected {} for {}x{}x3",
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// A frame with every pixel set to `fill`.
    pub fn filled(width: u32, height: u32, fill: Hsv) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&[fill.h, fill.s, fill.v]);
        }
        Self {
            data,
            width,
            height,
        }
    }

    #[inline]
    pub fn pixel(&self, row: u32, col: u32) -> Hsv {
        let i = (row as usize * self.width as usize + col as usize) * 3;
        Hsv::new(self.data[i], self.data[i + 1], self.data[i + 2])
    }

    pub fn set_pixel(&mut self, row: u32, col: u32, px: Hsv) {
        let i = (row as usize * self.width as usize + col as usize) * 3;
        self.data[i] = px.h;
        self.data[i + 1] = px.s;
        self.data[i + 2] = px.v;
    }

    /// One row as packed HSV bytes.
    #[inline]
    pub fn row(&self, row: u32) -> &[u8] {
        let stride = self.width as usize * 3;
        let start = row as usize * stride;
        &self.data[start..start + stride]
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(HsvFrame::new(vec![0; 10], 2, 2).is_err());
        assert!(HsvFrame::new(vec![0; 12], 2, 2).is_ok());
    }

    #[test]
    fn pixel_addressing_is_row_major() {
        let mut frame = HsvFrame::filled(4, 3, Hsv::new(1, 2, 3));
        frame.set_pixel(2, 1, Hsv::new(9, 8, 7));
        assert_eq!(frame.pixel(2, 1), Hsv::new(9, 8, 7));
        assert_eq!(frame.pixel(1, 2), Hsv::new(1, 2, 3));
        assert_eq!(&frame.row(2)[3..6], &[9, 8, 7]);
        assert_eq!(frame.byte_len(), 36);
    }
}
