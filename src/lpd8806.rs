use std::{
    io::{self, Write},
    os::unix::io::AsRawFd,
};

use snafu::prelude::*;

use crate::{
    color::{ColorModel, ColorOrder},
    errors::{Lpd8806Error, SpiSpeedSnafu, StripClosedSnafu, WriteSnafu},
    pixel::PixelBuffer,
    rpi::spi::set_spi_speed,
    strip::LedStrip,
};

/// A byte sink whose clock speed can be configured, usually an SPI device
/// node such as `/dev/spidev0.0`.
pub trait Device: io::Write + AsRawFd {}

impl<T: io::Write + AsRawFd> Device for T {}

/// The usual SPI clock for LPD8806 strips.
pub const DEFAULT_SPI_SPEED: u32 = 12_000_000;

fn latch_len(num_pixels: usize) -> usize {
    (num_pixels + 31) / 32
}

/// Converts a stored 8-bit channel value to the wire format.
fn wire_byte(value: u8) -> u8 {
    0x80 | (value >> 1)
}

/// An LPD8806 LED strip.
///
/// Pixels hold full 8-bit channel values like every other strip; only the top
/// seven bits reach the LEDs, sent as `0x80 | value >> 1`. Code that already
/// works with 7-bit values (`0..=127`) must double them to keep the same
/// brightness.
pub struct Lpd8806<D: Device> {
    device: D,
    pixels: PixelBuffer,
    frame: Vec<u8>,
    closed: bool,
}

impl<D: Device> Lpd8806<D> {
    /// Sets up a strip on `device`.
    ///
    /// A non-zero `spi_speed` is applied to the device first. The strip is
    /// latched once so it starts listening for a fresh frame.
    pub fn new(
        mut device: D,
        num_pixels: usize,
        color_model: ColorModel,
        spi_speed: u32,
        order: ColorOrder,
    ) -> Result<Self, Lpd8806Error> {
        if spi_speed != 0 {
            set_spi_speed(device.as_raw_fd(), spi_speed).context(SpiSpeedSnafu { hz: spi_speed })?;
        }

        let latch = vec![0; latch_len(num_pixels)];
        device.write_all(&latch).context(WriteSnafu)?;

        log::debug!(
            "LPD8806 ready: {} {} pixels ({})",
            num_pixels,
            color_model,
            order
        );

        Ok(Self {
            device,
            pixels: PixelBuffer::new(num_pixels, order, color_model),
            frame: Vec::with_capacity(num_pixels * color_model.num_colors() + latch.len()),
            closed: false,
        })
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The pixel buffer.
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// The pixel buffer, for writing.
    pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixels
    }

    /// The longest strip a single output can drive.
    pub fn max_leds_per_channel(&self) -> usize {
        127
    }

    /// Writes the pixels, followed by the latch bytes.
    pub fn flush(&mut self) -> Result<(), Lpd8806Error> {
        ensure!(!self.closed, StripClosedSnafu);

        self.frame.clear();
        self.frame
            .extend(self.pixels.as_bytes().iter().copied().map(wire_byte));
        self.frame
            .resize(self.frame.len() + latch_len(self.pixels.len()), 0);

        self.device.write_all(&self.frame).context(WriteSnafu)?;
        self.device.flush().context(WriteSnafu)
    }

    /// Marks the strip closed. The device stays open until the strip is dropped.
    pub fn close(&mut self) -> Result<(), Lpd8806Error> {
        ensure!(!self.closed, StripClosedSnafu);
        self.closed = true;
        Ok(())
    }
}

impl<D: Device> LedStrip for Lpd8806<D> {
    type Error = Lpd8806Error;

    fn flush(&mut self) -> Result<(), Lpd8806Error> {
        Lpd8806::flush(self)
    }

    fn close(&mut self) -> Result<(), Lpd8806Error> {
        Lpd8806::close(self)
    }

    fn max_leds_per_channel(&self) -> usize {
        Lpd8806::max_leds_per_channel(self)
    }

    fn pixels(&self) -> &PixelBuffer {
        Lpd8806::pixels(self)
    }

    fn pixels_mut(&mut self) -> &mut PixelBuffer {
        Lpd8806::pixels_mut(self)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::pixel::Rgb;

    #[test]
    fn wire_format() {
        assert_eq!(wire_byte(0x00), 0x80);
        assert_eq!(wire_byte(0xff), 0xff);
        assert_eq!(wire_byte(0x80), 0xc0);
        assert_eq!(latch_len(0), 0);
        assert_eq!(latch_len(1), 1);
        assert_eq!(latch_len(32), 1);
        assert_eq!(latch_len(33), 2);
    }

    #[test]
    fn writes_latch_then_frames() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut strip = Lpd8806::new(
            file.reopen().unwrap(),
            2,
            ColorModel::Rgb,
            0,
            ColorOrder::Grb,
        )
        .unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), [0]);

        strip.set_rgb_at(0, Rgb::new(0xff, 0x00, 0x7f)).unwrap();
        strip.flush().unwrap();
        assert_eq!(
            fs::read(file.path()).unwrap(),
            [0, 0x80, 0xff, 0xbf, 0x80, 0x80, 0x80, 0]
        );
    }

    #[test]
    fn closed_strip_rejects_flush() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut strip =
            Lpd8806::new(file.reopen().unwrap(), 1, ColorModel::Rgb, 0, ColorOrder::Rgb).unwrap();
        strip.close().unwrap();
        assert!(matches!(strip.flush(), Err(Lpd8806Error::StripClosed)));
        assert!(matches!(strip.close(), Err(Lpd8806Error::StripClosed)));
        assert_eq!(strip.max_leds_per_channel(), 127);
    }

    #[test]
    fn spi_speed_needs_a_spi_device() {
        let file = tempfile::tempfile().unwrap();
        let result = Lpd8806::new(file, 1, ColorModel::Rgb, DEFAULT_SPI_SPEED, ColorOrder::Grb);
        assert!(matches!(
            result,
            Err(Lpd8806Error::SpiSpeed { hz: 12_000_000, .. })
        ));
    }
}
