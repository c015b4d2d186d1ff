#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Colour orders and colour models
pub mod color;
/// Error types
pub mod errors;
/// LPD8806 strips on a spidev device.
///
/// The LPD8806 takes seven bits per channel with the top bit set, and latches
/// after one zero byte per 32 pixels.
pub mod lpd8806;
/// Pixel types and the pixel buffer
pub mod pixel;
/// Raspberry Pi hardware access.
///
/// [`RPi`] owns everything a streaming driver needs from the SoC: the detected
/// board, the firmware mailbox and the mapped DMA, PWM, clock and GPIO
/// registers. All of it requires root.
pub mod rpi;
/// The common LED strip interface
pub mod strip;
/// WS2811/WS2812/SK6812 strips on the PWM peripheral.
///
/// The pixel bytes are expanded into a PWM symbol stream in a DMA buffer;
/// the DMA engine then feeds it to the PWM FIFO while the CPU is free.
pub mod ws281x;

pub use color::{ColorModel, ColorOrder};
pub use lpd8806::Lpd8806;
pub use pixel::{Pixel, PixelBuffer, Rgb, Rgbw};
pub use rpi::RPi;
pub use strip::LedStrip;
pub use ws281x::{Ws281x, Ws281xConfig};
