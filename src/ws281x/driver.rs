use snafu::prelude::*;

use super::{
    config::Ws281xConfig,
    encoder::{encode, pwm_byte_count},
};
use crate::{
    errors::{
        ClosedSnafu, DmaError, FreeDmaBufSnafu, GetDmaBufSnafu, InitDmaSnafu, InitGpioSnafu,
        InitPwmSnafu, InitSnafu, PeripheralError, StartSnafu, StopSnafu, WaitSnafu, Ws281xError,
    },
    pixel::PixelBuffer,
    rpi::{dma_buf::DmaBuffer, RPi},
    strip::LedStrip,
};

/// Memory the DMA engine streams the symbols from.
pub trait SymbolBuffer {
    /// The symbol words.
    fn words_mut(&mut self) -> &mut [u32];
}

impl SymbolBuffer for DmaBuffer {
    fn words_mut(&mut self) -> &mut [u32] {
        DmaBuffer::words_mut(self)
    }
}

/// The hardware a [`Ws281x`] streams through.
///
/// Implemented by [`RPi`]; the calls mirror its lifecycle.
pub trait StreamEngine {
    /// The buffer type handed out by [`get_dma_buf`](StreamEngine::get_dma_buf).
    type Buffer: SymbolBuffer;

    /// Allocates a buffer with room for `bytes` of symbols.
    fn get_dma_buf(&mut self, bytes: usize) -> Result<Self::Buffer, DmaError>;
    /// Releases a buffer.
    fn free_dma_buf(&mut self, buffer: Self::Buffer) -> Result<(), DmaError>;
    /// Prepares DMA `channel`.
    fn init_dma(&mut self, channel: u8) -> Result<(), PeripheralError>;
    /// Prepares the GPIO controller.
    fn init_gpio(&mut self) -> Result<(), PeripheralError>;
    /// Prepares PWM output of `byte_count` bytes of `buffer` on `pins`.
    fn init_pwm(
        &mut self,
        frequency: u32,
        buffer: &mut Self::Buffer,
        byte_count: usize,
        pins: &[u8],
    ) -> Result<(), PeripheralError>;
    /// Starts a transfer of `buffer`.
    fn start_dma(&mut self, buffer: &Self::Buffer) -> Result<(), PeripheralError>;
    /// Blocks until the running transfer is done.
    fn wait_for_dma_end(&mut self) -> Result<(), PeripheralError>;
    /// Stops all output.
    fn stop_pwm(&mut self) -> Result<(), PeripheralError>;
}

impl StreamEngine for RPi {
    type Buffer = DmaBuffer;

    fn get_dma_buf(&mut self, bytes: usize) -> Result<DmaBuffer, DmaError> {
        RPi::get_dma_buf(self, bytes)
    }

    fn free_dma_buf(&mut self, buffer: DmaBuffer) -> Result<(), DmaError> {
        RPi::free_dma_buf(self, buffer)
    }

    fn init_dma(&mut self, channel: u8) -> Result<(), PeripheralError> {
        RPi::init_dma(self, channel)
    }

    fn init_gpio(&mut self) -> Result<(), PeripheralError> {
        RPi::init_gpio(self)
    }

    fn init_pwm(
        &mut self,
        frequency: u32,
        buffer: &mut DmaBuffer,
        byte_count: usize,
        pins: &[u8],
    ) -> Result<(), PeripheralError> {
        RPi::init_pwm(self, frequency, buffer, byte_count, pins)
    }

    fn start_dma(&mut self, buffer: &DmaBuffer) -> Result<(), PeripheralError> {
        RPi::start_dma(self, buffer)
    }

    fn wait_for_dma_end(&mut self) -> Result<(), PeripheralError> {
        RPi::wait_for_dma_end(self)
    }

    fn stop_pwm(&mut self) -> Result<(), PeripheralError> {
        RPi::stop_pwm(self)
    }
}

/// A WS281x LED strip, driven by PWM fed through DMA.
///
/// Both PWM channels output the same data, so every configured pin shows
/// the same strip.
pub struct Ws281x<E: StreamEngine = RPi> {
    engine: E,
    buffer: Option<E::Buffer>,
    pixels: PixelBuffer,
}

impl Ws281x {
    /// Takes over the Raspberry Pi's PWM and DMA hardware.
    ///
    /// Requires root.
    pub fn new(config: Ws281xConfig) -> Result<Self, Ws281xError> {
        config.validate()?;
        let rpi = RPi::new().context(InitSnafu)?;
        Self::with_engine(config, rpi)
    }

    /// The hardware handle.
    pub fn rpi(&self) -> &RPi {
        &self.engine
    }
}

impl<E: StreamEngine> Ws281x<E> {
    /// Builds the driver on an arbitrary engine.
    ///
    /// On failure, the symbol buffer is released again.
    pub fn with_engine(config: Ws281xConfig, mut engine: E) -> Result<Self, Ws281xError> {
        config.validate()?;

        let num_colors = config.color_model.num_colors();
        let byte_count = pwm_byte_count(config.num_pixels, num_colors, config.pwm_frequency);

        let mut buffer = engine.get_dma_buf(byte_count).context(GetDmaBufSnafu)?;
        buffer.words_mut().fill(0);

        if let Err(e) = Self::init_engine(&mut engine, &config, &mut buffer, byte_count) {
            if let Err(free_err) = engine.free_dma_buf(buffer) {
                log::warn!("Couldn't free DMA buffer after failed init: {}", free_err);
            }
            return Err(e);
        }

        log::debug!(
            "WS281x ready: {} {} pixels ({}), {} symbol bytes, DMA channel {}, pins {:?}",
            config.num_pixels,
            config.color_model,
            config.color_order,
            byte_count,
            config.dma_channel,
            config.gpio_pins
        );

        Ok(Self {
            engine,
            buffer: Some(buffer),
            pixels: PixelBuffer::new(config.num_pixels, config.color_order, config.color_model),
        })
    }

    fn init_engine(
        engine: &mut E,
        config: &Ws281xConfig,
        buffer: &mut E::Buffer,
        byte_count: usize,
    ) -> Result<(), Ws281xError> {
        engine.init_dma(config.dma_channel).context(InitDmaSnafu)?;
        engine.init_gpio().context(InitGpioSnafu)?;
        engine
            .init_pwm(config.pwm_frequency, buffer, byte_count, &config.gpio_pins)
            .context(InitPwmSnafu)?;
        Ok(())
    }

    /// The engine the strip streams through.
    pub fn engine(&self) -> &E {
        &self.engine
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
        255
    }

    /// Sends the pixel buffer to the strip.
    ///
    /// Waits for the previous frame to finish, encodes the whole buffer and
    /// starts a new transfer.
    pub fn flush(&mut self) -> Result<(), Ws281xError> {
        let buffer = self.buffer.as_mut().context(ClosedSnafu)?;

        self.engine.wait_for_dma_end().context(WaitSnafu)?;
        encode(self.pixels.as_bytes(), buffer.words_mut());
        self.engine.start_dma(buffer).context(StartSnafu)?;

        Ok(())
    }

    /// Stops output and releases the symbol buffer.
    ///
    /// Both steps are attempted; the first failure is returned. Afterwards,
    /// [`flush`](Self::flush) and `close` itself fail with
    /// [`Closed`](Ws281xError::Closed).
    pub fn close(&mut self) -> Result<(), Ws281xError> {
        let buffer = self.buffer.take().context(ClosedSnafu)?;

        let stopped = self.engine.stop_pwm().context(StopSnafu);
        let freed = self.engine.free_dma_buf(buffer).context(FreeDmaBufSnafu);

        match (stopped, freed) {
            (Err(e), Err(free_err)) => {
                log::warn!("Couldn't free DMA buffer after failed stop: {}", free_err);
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => {
                log::debug!("WS281x closed");
                Ok(())
            }
        }
    }
}

impl<E: StreamEngine> Drop for Ws281x<E> {
    fn drop(&mut self) {
        if self.buffer.is_some() {
            if let Err(e) = self.close() {
                log::warn!("Couldn't close WS281x on drop: {}", e);
            }
        }
    }
}

impl<E: StreamEngine> LedStrip for Ws281x<E> {
    type Error = Ws281xError;

    fn flush(&mut self) -> Result<(), Ws281xError> {
        Ws281x::flush(self)
    }

    fn close(&mut self) -> Result<(), Ws281xError> {
        Ws281x::close(self)
    }

    fn max_leds_per_channel(&self) -> usize {
        Ws281x::max_leds_per_channel(self)
    }

    fn pixels(&self) -> &PixelBuffer {
        Ws281x::pixels(self)
    }

    fn pixels_mut(&mut self) -> &mut PixelBuffer {
        Ws281x::pixels_mut(self)
    }
}
