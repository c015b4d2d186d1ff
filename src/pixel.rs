use std::{fmt, ops::Range};

use snafu::prelude::*;

use crate::{
    color::{ChannelOffsets, ColorModel, ColorOrder},
    errors::{ChannelMismatchSnafu, IndexOutOfRangeSnafu, LengthMismatchSnafu, PixelError},
};

/// A pixel that can be stored in a [`PixelBuffer`].
pub trait Pixel: Copy {
    /// The number of colour channels the pixel carries.
    const CHANNELS: usize;

    /// Reads the pixel from one pixel's worth of strip bytes.
    ///
    /// Channels the strip doesn't have read as zero.
    fn load(bytes: &[u8], offsets: &ChannelOffsets) -> Self;

    /// Writes the pixel into one pixel's worth of strip bytes.
    ///
    /// Channels the strip doesn't have are dropped.
    fn store(self, bytes: &mut [u8], offsets: &ChannelOffsets);
}

/// An 8-bit red, green and blue pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

/// An 8-bit red, green, blue and white pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgbw {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// White.
    pub w: u8,
}

impl Rgb {
    /// Creates a pixel.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The pixel as `0xrrggbb`.
    pub fn to_u32(self) -> u32 {
        u32::from(self.r) << 16 | u32::from(self.g) << 8 | u32::from(self.b)
    }
}

impl Rgbw {
    /// Creates a pixel.
    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    /// The pixel as `0xrrggbbww`.
    pub fn to_u32(self) -> u32 {
        u32::from(self.r) << 24 | u32::from(self.g) << 16 | u32::from(self.b) << 8 | u32::from(self.w)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgbw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.w)
    }
}

impl From<Rgb> for Rgbw {
    fn from(rgb: Rgb) -> Self {
        Self::new(rgb.r, rgb.g, rgb.b, 0)
    }
}

/// 8-bit Linear sRGB, which is the color space
/// most NeoPixel strips are in.
///
/// Be aware that this differs from normal,
/// gamma-corrected sRGB. A conversion has to take place.
///
/// More info can be found in the documentation of the
/// [palette] crate.
impl From<palette::LinSrgb<u8>> for Rgb {
    fn from(color: palette::LinSrgb<u8>) -> Self {
        Self::new(color.red, color.green, color.blue)
    }
}

impl From<Rgb> for palette::LinSrgb<u8> {
    fn from(rgb: Rgb) -> Self {
        palette::LinSrgb::new(rgb.r, rgb.g, rgb.b)
    }
}

impl Pixel for Rgb {
    const CHANNELS: usize = 3;

    fn load(bytes: &[u8], offsets: &ChannelOffsets) -> Self {
        Self::new(bytes[offsets.red], bytes[offsets.green], bytes[offsets.blue])
    }

    fn store(self, bytes: &mut [u8], offsets: &ChannelOffsets) {
        bytes[offsets.red] = self.r;
        bytes[offsets.green] = self.g;
        bytes[offsets.blue] = self.b;
    }
}

impl Pixel for Rgbw {
    const CHANNELS: usize = 4;

    fn load(bytes: &[u8], offsets: &ChannelOffsets) -> Self {
        let Rgb { r, g, b } = Rgb::load(bytes, offsets);
        Self::new(r, g, b, offsets.white.map_or(0, |o| bytes[o]))
    }

    fn store(self, bytes: &mut [u8], offsets: &ChannelOffsets) {
        Rgb::new(self.r, self.g, self.b).store(bytes, offsets);
        if let Some(o) = offsets.white {
            bytes[o] = self.w;
        }
    }
}

impl Pixel for palette::LinSrgb<u8> {
    const CHANNELS: usize = 3;

    fn load(bytes: &[u8], offsets: &ChannelOffsets) -> Self {
        Rgb::load(bytes, offsets).into()
    }

    fn store(self, bytes: &mut [u8], offsets: &ChannelOffsets) {
        Rgb::from(self).store(bytes, offsets);
    }
}

/// The pixels of a strip, stored in the strip's channel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    bytes: Vec<u8>,
    num_pixels: usize,
    order: ColorOrder,
    model: ColorModel,
    offsets: ChannelOffsets,
}

macro_rules! impl_accessors {
    ($($name:ident: $pixel:ident),* $(,)?) => {
        paste::paste! {
            $(
                #[doc = "Reads pixel `index` as [`" $pixel "`]."]
                pub fn [<$name _at>](&self, index: usize) -> Result<$pixel, PixelError> {
                    self.get(index)
                }

                #[doc = "Sets pixel `index` from an [`" $pixel "`]."]
                pub fn [<set_ $name _at>](&mut self, index: usize, pixel: $pixel) -> Result<(), PixelError> {
                    self.set(index, pixel)
                }

                #[doc = "Sets every pixel from a slice of [`" $pixel "`]s."]
                ///
                /// The strip must have exactly as many channels as the pixel type
                /// and the slice must hold one entry per pixel.
                pub fn [<set_ $name s>](&mut self, pixels: &[$pixel]) -> Result<(), PixelError> {
                    self.set_all(pixels)
                }
            )*
        }
    };
}

impl PixelBuffer {
    /// Creates a buffer of `num_pixels` dark pixels.
    pub fn new(num_pixels: usize, order: ColorOrder, model: ColorModel) -> Self {
        Self {
            bytes: vec![0; num_pixels * model.num_colors()],
            num_pixels,
            order,
            model,
            offsets: order.offsets(model),
        }
    }

    /// The number of pixels.
    pub fn len(&self) -> usize {
        self.num_pixels
    }

    /// Whether the buffer holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.num_pixels == 0
    }

    /// Bytes per pixel.
    pub fn num_colors(&self) -> usize {
        self.model.num_colors()
    }

    /// The channel order.
    pub fn color_order(&self) -> ColorOrder {
        self.order
    }

    /// The colour model.
    pub fn color_model(&self) -> ColorModel {
        self.model
    }

    /// The raw bytes, in the order the strip expects them.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Turns every pixel off.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn pixel_range(&self, index: usize) -> Result<Range<usize>, PixelError> {
        let len = self.num_pixels;
        ensure!(index < len, IndexOutOfRangeSnafu { index, len });
        let colors = self.num_colors();
        Ok(index * colors..(index + 1) * colors)
    }

    /// Reads pixel `index`.
    pub fn get<P: Pixel>(&self, index: usize) -> Result<P, PixelError> {
        let range = self.pixel_range(index)?;
        Ok(P::load(&self.bytes[range], &self.offsets))
    }

    /// Sets pixel `index`.
    pub fn set<P: Pixel>(&mut self, index: usize, pixel: P) -> Result<(), PixelError> {
        let range = self.pixel_range(index)?;
        pixel.store(&mut self.bytes[range], &self.offsets);
        Ok(())
    }

    /// Sets every pixel.
    ///
    /// Nothing is written unless the channel count and length both match.
    pub fn set_all<P: Pixel>(&mut self, pixels: &[P]) -> Result<(), PixelError> {
        ensure!(
            P::CHANNELS == self.num_colors(),
            ChannelMismatchSnafu {
                expected: P::CHANNELS,
                actual: self.num_colors(),
            }
        );
        ensure!(
            pixels.len() == self.num_pixels,
            LengthMismatchSnafu {
                expected: self.num_pixels,
                actual: pixels.len(),
            }
        );
        let colors = self.num_colors();
        for (bytes, pixel) in self.bytes.chunks_exact_mut(colors).zip(pixels) {
            pixel.store(bytes, &self.offsets);
        }
        Ok(())
    }

    impl_accessors!(rgb: Rgb, rgbw: Rgbw);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting() {
        let rgb = Rgb::new(0x12, 0xab, 0x00);
        assert_eq!(rgb.to_string(), "#12ab00");
        assert_eq!(rgb.to_u32(), 0x12ab00);

        let rgbw = Rgbw::new(1, 2, 3, 0xff);
        assert_eq!(rgbw.to_string(), "#010203ff");
        assert_eq!(rgbw.to_u32(), 0x010203ff);
    }

    #[test]
    fn stores_in_channel_order() {
        let mut pixels = PixelBuffer::new(2, ColorOrder::Grb, ColorModel::Rgb);
        pixels.set_rgb_at(1, Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(pixels.as_bytes(), &[0, 0, 0, 2, 1, 3]);
        assert_eq!(pixels.rgb_at(1), Ok(Rgb::new(1, 2, 3)));

        let mut pixels = PixelBuffer::new(1, ColorOrder::Bgr, ColorModel::Rgb);
        pixels.set_rgb_at(0, Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(pixels.as_bytes(), &[3, 2, 1]);
    }

    #[test]
    fn white_channel() {
        let mut pixels = PixelBuffer::new(1, ColorOrder::Grbw, ColorModel::Rgbw);
        pixels.set_rgbw_at(0, Rgbw::new(1, 2, 3, 4)).unwrap();
        assert_eq!(pixels.as_bytes(), &[2, 1, 3, 4]);

        // A three channel strip has no white: reads as zero, writes are dropped.
        let mut pixels = PixelBuffer::new(1, ColorOrder::Rgb, ColorModel::Rgb);
        pixels.set_rgbw_at(0, Rgbw::new(1, 2, 3, 4)).unwrap();
        assert_eq!(pixels.as_bytes(), &[1, 2, 3]);
        assert_eq!(pixels.rgbw_at(0), Ok(Rgbw::new(1, 2, 3, 0)));
    }

    #[test]
    fn index_checks() {
        let mut pixels = PixelBuffer::new(3, ColorOrder::Grb, ColorModel::Rgb);
        assert_eq!(
            pixels.rgb_at(3),
            Err(PixelError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            pixels.set_rgbw_at(10, Rgbw::default()),
            Err(PixelError::IndexOutOfRange { index: 10, len: 3 })
        );
    }

    #[test]
    fn bulk_setters_check_before_writing() {
        let mut pixels = PixelBuffer::new(2, ColorOrder::Grb, ColorModel::Rgb);
        assert_eq!(
            pixels.set_rgbs(&[Rgb::new(9, 9, 9)]),
            Err(PixelError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            pixels.set_rgbws(&[Rgbw::default(); 2]),
            Err(PixelError::ChannelMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert!(pixels.as_bytes().iter().all(|&b| b == 0));

        pixels.set_rgbs(&[Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)]).unwrap();
        assert_eq!(pixels.as_bytes(), &[2, 1, 3, 5, 4, 6]);

        let mut pixels = PixelBuffer::new(2, ColorOrder::Grbw, ColorModel::Rgbw);
        pixels
            .set_rgbws(&[Rgbw::new(1, 2, 3, 4), Rgbw::new(5, 6, 7, 8)])
            .unwrap();
        assert_eq!(pixels.as_bytes(), &[2, 1, 3, 4, 6, 5, 7, 8]);
        assert!(pixels.set_rgbs(&[Rgb::default(); 2]).is_err());
    }

    #[test]
    fn palette_colors() {
        let mut pixels = PixelBuffer::new(1, ColorOrder::Grb, ColorModel::Rgb);
        pixels.set(0, palette::LinSrgb::new(10u8, 20, 30)).unwrap();
        assert_eq!(pixels.as_bytes(), &[20, 10, 30]);
        let color: palette::LinSrgb<u8> = pixels.get(0).unwrap();
        assert_eq!(color, palette::LinSrgb::new(10, 20, 30));
    }

    #[test]
    fn clear_turns_everything_off() {
        let mut pixels = PixelBuffer::new(2, ColorOrder::Grb, ColorModel::Rgb);
        pixels.set_rgbs(&[Rgb::new(1, 1, 1); 2]).unwrap();
        pixels.clear();
        assert_eq!(pixels.as_bytes(), &[0; 6]);
    }
}
