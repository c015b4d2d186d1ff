use crate::{
    errors::PixelError,
    pixel::{PixelBuffer, Rgb, Rgbw},
};

/// The surface shared by all LED strip drivers.
pub trait LedStrip {
    /// The error of [`flush`](LedStrip::flush) and [`close`](LedStrip::close).
    type Error;

    /// Sends the pixels to the strip.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Shuts the driver down. Later flushes fail.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// The longest strip a single output can drive.
    fn max_leds_per_channel(&self) -> usize;

    /// The pixel buffer.
    fn pixels(&self) -> &PixelBuffer;

    /// The pixel buffer, for writing.
    fn pixels_mut(&mut self) -> &mut PixelBuffer;

    /// Reads pixel `index`.
    fn rgb_at(&self, index: usize) -> Result<Rgb, PixelError> {
        self.pixels().rgb_at(index)
    }

    /// Sets pixel `index`.
    fn set_rgb_at(&mut self, index: usize, pixel: Rgb) -> Result<(), PixelError> {
        self.pixels_mut().set_rgb_at(index, pixel)
    }

    /// Reads pixel `index`, with white.
    fn rgbw_at(&self, index: usize) -> Result<Rgbw, PixelError> {
        self.pixels().rgbw_at(index)
    }

    /// Sets pixel `index`, with white.
    fn set_rgbw_at(&mut self, index: usize, pixel: Rgbw) -> Result<(), PixelError> {
        self.pixels_mut().set_rgbw_at(index, pixel)
    }

    /// Sets every pixel of an RGB strip.
    fn set_rgbs(&mut self, pixels: &[Rgb]) -> Result<(), PixelError> {
        self.pixels_mut().set_rgbs(pixels)
    }

    /// Sets every pixel of an RGBW strip.
    fn set_rgbws(&mut self, pixels: &[Rgbw]) -> Result<(), PixelError> {
        self.pixels_mut().set_rgbws(pixels)
    }
}
