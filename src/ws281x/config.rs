use snafu::prelude::*;

use crate::{
    color::{ColorModel, ColorOrder},
    errors::{InvalidConfigSnafu, Ws281xError},
};

/// The usual WS2812 data rate.
pub const DEFAULT_PWM_FREQUENCY: u32 = 800_000;

/// A DMA channel that is free on stock Raspberry Pi OS.
///
/// Choose with care: taking a channel the GPU uses can corrupt the SD card.
pub const DEFAULT_DMA_CHANNEL: u8 = 10;

/// GPIO 18, PWM channel 0 on the 40-pin header.
pub const DEFAULT_GPIO_PIN: u8 = 18;

/// Configuration of a [`Ws281x`](super::Ws281x) strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ws281xConfig {
    /// Number of pixels on the strip.
    pub num_pixels: usize,
    /// The channel order the strip expects.
    pub color_order: ColorOrder,
    /// Whether the pixels have a white channel.
    pub color_model: ColorModel,
    /// LED data rate in bits per second.
    pub pwm_frequency: u32,
    /// The DMA channel that feeds the PWM.
    pub dma_channel: u8,
    /// The pins to output the signal on.
    ///
    /// Usually just the one the strip is connected to.
    pub gpio_pins: Vec<u8>,
}

impl Ws281xConfig {
    /// A configuration for `num_pixels` pixels with the default settings.
    pub fn new(num_pixels: usize) -> Self {
        Self {
            num_pixels,
            color_order: ColorOrder::default(),
            color_model: ColorModel::default(),
            pwm_frequency: DEFAULT_PWM_FREQUENCY,
            dma_channel: DEFAULT_DMA_CHANNEL,
            gpio_pins: vec![DEFAULT_GPIO_PIN],
        }
    }

    /// Sets the channel order.
    pub fn color_order(mut self, color_order: ColorOrder) -> Self {
        self.color_order = color_order;
        self
    }

    /// Sets the colour model.
    pub fn color_model(mut self, color_model: ColorModel) -> Self {
        self.color_model = color_model;
        self
    }

    /// Sets the LED data rate.
    pub fn pwm_frequency(mut self, pwm_frequency: u32) -> Self {
        self.pwm_frequency = pwm_frequency;
        self
    }

    /// Sets the DMA channel.
    pub fn dma_channel(mut self, dma_channel: u8) -> Self {
        self.dma_channel = dma_channel;
        self
    }

    /// Sets the output pins.
    pub fn gpio_pins(mut self, gpio_pins: impl Into<Vec<u8>>) -> Self {
        self.gpio_pins = gpio_pins.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), Ws281xError> {
        ensure!(
            self.num_pixels > 0,
            InvalidConfigSnafu {
                reason: "the strip has no pixels"
            }
        );
        ensure!(
            !self.gpio_pins.is_empty(),
            InvalidConfigSnafu {
                reason: "no GPIO pins given"
            }
        );
        ensure!(
            self.pwm_frequency > 0,
            InvalidConfigSnafu {
                reason: "the PWM frequency is zero"
            }
        );
        Ok(())
    }
}

impl Default for Ws281xConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
