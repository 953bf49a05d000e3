use crate::gb::ppu::misc::ColoredPixel;
use crate::gb::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Holds one 160x144 frame of 4-shade pixels.
/// Mapping shades to host colors is left to the consumer.
#[derive(Clone)]
pub struct FrameBuffer {
    buffer: Vec<ColoredPixel>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            buffer: vec![ColoredPixel::White; SCREEN_WIDTH as usize * SCREEN_HEIGHT as usize],
        }
    }
}

impl FrameBuffer {
    /// Writes a pixel to the given coordinates.
    #[inline]
    pub fn write_pixel(&mut self, x: u8, y: u8, shade: ColoredPixel) {
        self.buffer[usize::from(y) * SCREEN_WIDTH as usize + usize::from(x)] = shade;
    }

    /// Returns the pixel at the given coordinates.
    #[inline]
    pub fn pixel(&self, x: u8, y: u8) -> ColoredPixel {
        self.buffer[usize::from(y) * SCREEN_WIDTH as usize + usize::from(x)]
    }

    /// Resets all pixels to white.
    pub fn clear(&mut self) {
        self.buffer.fill(ColoredPixel::White);
    }

    /// Row-major view of the whole frame.
    #[inline]
    pub fn as_slice(&self) -> &[ColoredPixel] {
        &self.buffer
    }
}
