/// GPU memory the DMA engine can read.
pub mod dma_buf;
/// Raspberry Pi model detection.
///
/// The model is read from the device tree and matched against a catalog of
/// known boards, which resolves the physical base addresses of the peripheral
/// and VideoCore address spaces.
pub mod hardware;
/// The VideoCore mailbox property interface.
///
/// Requests are issued through the `/dev/vcio` character device. Each request is
/// a single property message carrying one tag:
///
/// ```text
/// [size][code][tag][buffer size][request size][payload...][end tag]
/// ```
///
/// The firmware writes its response into the same buffer.
pub mod mailbox;
mod mapping;
/// Typed wrappers around the register blocks.
///
/// Drivers never touch registers directly; each wrapper exposes the handful of
/// operations the streaming engine needs from its peripheral.
pub mod peripherals;
/// Register maps of the BCM283x/BCM2711 peripherals this crate drives.
///
/// Laid out like a register access layer: each block is a `#[repr(C)]`
/// `RegisterBlock`, and every register has a module of the same name holding
/// one module per bit field (`offset`, `mask` and value constants), so the
/// blocks work with the `read_reg!`/`write_reg!`/`modify_reg!` macros.
///
/// Register maps list every field, used or not.
pub(crate) mod regs;
/// SPI device configuration.
pub mod spi;

use std::{os::unix::io::RawFd, path::Path};

use snafu::prelude::*;

use crate::errors::{
    BufferTooSmallSnafu, DetectSnafu, DmaError, InvalidFrequencySnafu, InvalidPinSnafu,
    NoPinsSnafu, NotInitializedSnafu, OpenMailboxSnafu, PeripheralError, RpiError,
};
use dma_buf::{DmaBuffer, CONTROL_BLOCK_BYTES};
use hardware::HardwareVariant;
use mailbox::Mailbox;
use mapping::PAGE_SIZE;
use peripherals::{DmaChannel, Function, GpioController, PwmClock, PwmController};
use regs::dma::{self, ControlBlock};

/// Bit slots per transmitted bit; the PWM clock runs at three times the LED data rate.
pub const SYMBOLS_PER_BIT: u32 = 3;

/// Computes the PWM clock divisor for an LED data rate of `frequency`.
pub fn clock_divisor(oscillator: u32, frequency: u32) -> Result<u32, PeripheralError> {
    let slot_rate = u64::from(frequency) * u64::from(SYMBOLS_PER_BIT);
    ensure!(slot_rate != 0, InvalidFrequencySnafu { frequency });
    let divisor = u64::from(oscillator) / slot_rate;
    ensure!(
        (1..=u64::from(regs::clock::DIVI_MAX)).contains(&divisor),
        InvalidFrequencySnafu { frequency }
    );
    Ok(divisor as u32)
}

/// The allocation size for a DMA buffer holding `bytes` of payload.
pub fn dma_buf_size(bytes: usize) -> usize {
    (bytes + CONTROL_BLOCK_BYTES + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE
}

/// The control block streaming `len` bytes from `source` into the PWM FIFO,
/// paced by the PWM's data requests.
pub(crate) fn pwm_control_block(source: u32, destination: u32, len: u32) -> ControlBlock {
    use dma::TI;
    ControlBlock {
        ti: TI::NO_WIDE_BURSTS::mask
            | TI::WAIT_RESP::mask
            | TI::DEST_DREQ::mask
            | (dma::PERMAP_PWM << TI::PERMAP::offset)
            | TI::SRC_INC::mask,
        source_ad: source,
        dest_ad: destination,
        txfr_len: len,
        ..Default::default()
    }
}

// The DMA channel is reset before the only fallible step.
fn stop_output(
    pwm: Option<&PwmController>,
    dma: Option<&DmaChannel>,
    clock: Option<&PwmClock>,
) -> Result<(), PeripheralError> {
    if let Some(pwm) = pwm {
        pwm.stop();
    }
    if let Some(dma) = dma {
        dma.reset();
    }
    clock.map_or(Ok(()), PwmClock::stop)
}

/// A handle on the Raspberry Pi's peripherals.
///
/// Peripherals are mapped on demand by the `init_*` functions and stay mapped
/// until the handle is dropped.
pub struct RPi {
    hardware: &'static HardwareVariant,
    mailbox: Mailbox,
    dma: Option<DmaChannel>,
    gpio: Option<GpioController>,
    pwm: Option<PwmController>,
    clock: Option<PwmClock>,
}

impl RPi {
    /// Detects the hardware and opens the mailbox.
    pub fn new() -> Result<Self, RpiError> {
        Self::with_model_file(hardware::MODEL_PATH)
    }

    /// Like [`new`](Self::new), but reads the board model from `path`.
    pub fn with_model_file(path: impl AsRef<Path>) -> Result<Self, RpiError> {
        let hardware = hardware::detect_from(path).context(DetectSnafu)?;
        let mut mailbox = Mailbox::open().context(OpenMailboxSnafu)?;

        match mailbox.firmware_revision() {
            Ok(revision) => log::debug!("Firmware revision: {:#x}", revision),
            Err(e) => log::debug!("Couldn't query firmware revision: {}", e),
        }

        Ok(Self {
            hardware,
            mailbox,
            dma: None,
            gpio: None,
            pwm: None,
            clock: None,
        })
    }

    /// The detected board.
    pub fn hardware(&self) -> &'static HardwareVariant {
        self.hardware
    }

    /// The firmware mailbox.
    pub fn mailbox(&mut self) -> &mut Mailbox {
        &mut self.mailbox
    }

    /// Allocates a DMA buffer with room for `bytes` of payload after the
    /// control block.
    pub fn get_dma_buf(&mut self, bytes: usize) -> Result<DmaBuffer, DmaError> {
        let size = dma_buf_size(bytes);
        DmaBuffer::allocate(
            &mut self.mailbox,
            size,
            PAGE_SIZE as u32,
            self.hardware.mem_flags(),
        )
    }

    /// Releases a buffer obtained from [`get_dma_buf`](Self::get_dma_buf).
    pub fn free_dma_buf(&mut self, buffer: DmaBuffer) -> Result<(), DmaError> {
        buffer.release(&mut self.mailbox)
    }

    /// Maps and resets DMA `channel`.
    pub fn init_dma(&mut self, channel: u8) -> Result<(), PeripheralError> {
        let dma = DmaChannel::map(self.hardware.peripheral_base(), channel)?;
        dma.reset();
        log::debug!("DMA channel {} ready", channel);
        self.dma = Some(dma);
        Ok(())
    }

    /// Maps the GPIO controller.
    pub fn init_gpio(&mut self) -> Result<(), PeripheralError> {
        self.gpio = Some(GpioController::map(
            self.hardware.peripheral_base(),
            self.hardware.family(),
        )?);
        Ok(())
    }

    /// Sets up PWM to stream `byte_count` bytes from `buffer` at `frequency`
    /// LED bits per second, on the given pins.
    ///
    /// Requires [`init_dma`](Self::init_dma) and [`init_gpio`](Self::init_gpio).
    pub fn init_pwm(
        &mut self,
        frequency: u32,
        buffer: &mut DmaBuffer,
        byte_count: usize,
        pins: &[u8],
    ) -> Result<(), PeripheralError> {
        ensure!(self.dma.is_some(), NotInitializedSnafu { block: "DMA" });
        ensure!(self.gpio.is_some(), NotInitializedSnafu { block: "GPIO" });
        ensure!(!pins.is_empty(), NoPinsSnafu);
        ensure!(
            byte_count <= buffer.len(),
            BufferTooSmallSnafu {
                capacity: buffer.len(),
                required: byte_count,
            }
        );
        let routes = pins
            .iter()
            .map(|&pin| {
                regs::pwm::pwm_pin(pin)
                    .and_then(|route| Function::alt(route.alt).map(|f| (pin, f)))
                    .context(InvalidPinSnafu { pin })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let divisor = clock_divisor(self.hardware.oscillator_frequency(), frequency)?;

        let base = self.hardware.peripheral_base();
        if self.pwm.is_none() {
            self.pwm = Some(PwmController::map(base)?);
        }
        if self.clock.is_none() {
            self.clock = Some(PwmClock::map(base)?);
        }
        let (Some(dma), Some(gpio), Some(pwm), Some(clock)) =
            (&self.dma, &self.gpio, &self.pwm, &self.clock)
        else {
            return NotInitializedSnafu { block: "PWM" }.fail();
        };

        log::debug!(
            "Initializing PWM: {} Hz, clock divisor {}, {} bytes, pins {:?}",
            frequency,
            divisor,
            byte_count,
            pins
        );

        pwm.stop();
        clock.stop()?;
        clock.start(divisor)?;

        pwm.configure_serializer();
        pwm.enable_dma();
        pwm.enable();

        for (pin, function) in routes {
            gpio.set_function(pin, function)?;
        }

        buffer.write_control_block(pwm_control_block(
            buffer.payload_bus_address(),
            pwm.fifo_bus_address(),
            byte_count as u32,
        ));

        dma.clear();
        Ok(())
    }

    /// Starts streaming `buffer`, which must hold the control block written by
    /// [`init_pwm`](Self::init_pwm).
    pub fn start_dma(&mut self, buffer: &DmaBuffer) -> Result<(), PeripheralError> {
        let dma = self.dma.as_ref().context(NotInitializedSnafu { block: "DMA" })?;
        dma.reset();
        dma.set_control_block(buffer.bus_address());
        dma.start();
        log::trace!("DMA transfer started");
        Ok(())
    }

    /// Blocks until the current transfer, if any, has finished.
    pub fn wait_for_dma_end(&mut self) -> Result<(), PeripheralError> {
        self.dma
            .as_ref()
            .context(NotInitializedSnafu { block: "DMA" })?
            .wait()
    }

    /// Stops PWM output, the DMA channel and the PWM clock.
    ///
    /// Every mapped peripheral is stopped even if the clock fails to settle,
    /// so the DMA buffer can be released afterwards.
    pub fn stop_pwm(&mut self) -> Result<(), PeripheralError> {
        stop_output(self.pwm.as_ref(), self.dma.as_ref(), self.clock.as_ref())?;
        log::debug!("PWM stopped");
        Ok(())
    }

    /// Sets the clock speed of an SPI device.
    pub fn set_spi_speed(&self, fd: RawFd, hz: u32) -> std::io::Result<()> {
        spi::set_spi_speed(fd, hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_divisors() {
        assert_eq!(clock_divisor(19_200_000, 800_000).unwrap(), 8);
        assert_eq!(clock_divisor(19_200_000, 400_000).unwrap(), 16);
        assert_eq!(clock_divisor(54_000_000, 800_000).unwrap(), 22);
        assert!(matches!(
            clock_divisor(19_200_000, 0),
            Err(PeripheralError::InvalidFrequency { frequency: 0 })
        ));
        assert!(clock_divisor(19_200_000, 10_000_000).is_err());
        assert!(clock_divisor(19_200_000, 1_000).is_err());
    }

    #[test]
    fn stopping_resets_dma_and_kills_the_clock() {
        let pwm = PwmController::zeroed();
        let dma = DmaChannel::zeroed(10);
        let clock = PwmClock::zeroed();
        pwm.enable();
        dma.start();

        stop_output(Some(&pwm), Some(&dma), Some(&clock)).unwrap();
        assert_eq!(pwm.registers().CTL.read(), 0);
        assert_eq!(dma.registers().CS.read(), dma::CS::RESET::mask);
        assert_eq!(clock.registers().CTL.read(), 0x5a00_0020);
    }

    #[test]
    fn stopping_without_a_clock_still_resets_dma() {
        let dma = DmaChannel::zeroed(10);
        dma.start();

        stop_output(None, Some(&dma), None).unwrap();
        assert_eq!(dma.registers().CS.read(), dma::CS::RESET::mask);
    }

    #[test]
    fn dma_buffers_are_page_rounded() {
        assert_eq!(dma_buf_size(56), 4096);
        assert_eq!(dma_buf_size(4096 - 32), 4096);
        assert_eq!(dma_buf_size(4096 - 31), 8192);
    }

    #[test]
    fn pwm_control_block_fields() {
        let cb = pwm_control_block(0xc000_1020, 0x7e20_c018, 56);
        assert_eq!(cb.ti, 0x0405_0148);
        assert_eq!(cb.source_ad, 0xc000_1020);
        assert_eq!(cb.dest_ad, 0x7e20_c018);
        assert_eq!(cb.txfr_len, 56);
        assert_eq!(cb.stride, 0);
        assert_eq!(cb.nextconbk, 0);
    }

    #[test]
    fn missing_model_file() {
        assert!(matches!(
            RPi::with_model_file("/nonexistent/model"),
            Err(RpiError::Detect { .. })
        ));
    }
}
