use std::{thread, time::Duration};

use ral_registers as ral;
use snafu::prelude::*;

use super::{
    hardware::HardwareFamily,
    regs::{clock, dma, gpio, pwm, Instance},
};
use crate::errors::{
    ClockTimeoutSnafu, DmaTransferSnafu, InvalidDmaChannelSnafu, InvalidPinSnafu, PeripheralError,
};

/// Settle time after register writes that restart a peripheral.
pub(crate) const SETTLE: Duration = Duration::from_micros(10);

// 10ms at SETTLE intervals.
const CLOCK_POLLS: u32 = 1000;

fn settle() {
    thread::sleep(SETTLE);
}

/// One channel of the DMA controller.
pub struct DmaChannel {
    regs: Instance<dma::RegisterBlock>,
    channel: u8,
}

impl DmaChannel {
    /// Maps the registers of `channel` (`0..=15`).
    pub fn map(periph_base: u32, channel: u8) -> Result<Self, PeripheralError> {
        let offset = dma::channel_offset(channel).context(InvalidDmaChannelSnafu { channel })?;
        let regs = Instance::map(periph_base + offset)?;
        Ok(Self { regs, channel })
    }

    /// The channel number.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Aborts any transfer and resets the channel.
    pub fn reset(&self) {
        ral::write_reg!(dma, self.regs, CS, RESET: 1);
        settle();
    }

    /// Clears status and transfer length, leaving the channel idle.
    pub fn clear(&self) {
        ral::write_reg!(dma, self.regs, CS, 0);
        ral::write_reg!(dma, self.regs, TXFR_LEN, 0);
    }

    /// Acknowledges INT/END, points the channel at a control block and clears
    /// the debug error flags.
    pub fn set_control_block(&self, bus_address: u32) {
        ral::write_reg!(dma, self.regs, CS, INT: 1, END: 1);
        settle();
        ral::write_reg!(dma, self.regs, CONBLK_AD, bus_address);
        ral::write_reg!(
            dma,
            self.regs,
            DEBUG,
            READ_ERROR: 1,
            FIFO_ERROR: 1,
            READ_LAST_NOT_SET_ERROR: 1
        );
    }

    /// Starts executing the loaded control block.
    pub fn start(&self) {
        ral::write_reg!(
            dma,
            self.regs,
            CS,
            WAIT_FOR_OUTSTANDING_WRITES: 1,
            PANIC_PRIORITY: 15,
            PRIORITY: 15,
            ACTIVE: 1
        );
    }

    /// Whether a transfer is in progress.
    pub fn is_busy(&self) -> bool {
        ral::read_reg!(dma, self.regs, CS, ACTIVE == 1)
    }

    /// Whether the channel flagged an error.
    pub fn has_error(&self) -> bool {
        ral::read_reg!(dma, self.regs, CS, ERROR == 1)
    }

    /// The raw DEBUG register.
    pub fn debug_flags(&self) -> u32 {
        ral::read_reg!(dma, self.regs, DEBUG)
    }

    /// Polls until the channel is idle.
    ///
    /// There is no timeout; a stalled transfer blocks forever.
    pub fn wait(&self) -> Result<(), PeripheralError> {
        loop {
            if self.has_error() {
                return DmaTransferSnafu {
                    debug: self.debug_flags(),
                }
                .fail();
            }
            if !self.is_busy() {
                return Ok(());
            }
            settle();
        }
    }

    #[cfg(test)]
    pub(crate) fn registers(&self) -> &dma::RegisterBlock {
        &self.regs
    }
}

/// The PWM controller, driven as a two channel serializer fed from its FIFO.
pub struct PwmController {
    regs: Instance<pwm::RegisterBlock>,
}

impl PwmController {
    /// Maps the PWM registers.
    pub fn map(periph_base: u32) -> Result<Self, PeripheralError> {
        Ok(Self {
            regs: Instance::map(periph_base + pwm::PWM_OFFSET)?,
        })
    }

    /// Turns both channels off.
    pub fn stop(&self) {
        ral::write_reg!(pwm, self.regs, CTL, 0);
        settle();
    }

    /// Sets both channels to shift out 32-bit words and clears the FIFO.
    pub fn configure_serializer(&self) {
        ral::write_reg!(pwm, self.regs, RNG1, 32);
        settle();
        ral::write_reg!(pwm, self.regs, RNG2, 32);
        settle();
        ral::write_reg!(pwm, self.regs, CTL, CLRF1: 1);
        settle();
    }

    /// Lets the FIFO request data from the DMA engine.
    pub fn enable_dma(&self) {
        ral::write_reg!(pwm, self.regs, DMAC, ENAB: 1, PANIC: 7, DREQ: 3);
        settle();
    }

    /// Switches both channels to serializer mode fed from the FIFO, then
    /// enables them.
    pub fn enable(&self) {
        ral::write_reg!(
            pwm,
            self.regs,
            CTL,
            USEF1: 1,
            MODE1: SERIALISER,
            USEF2: 1,
            MODE2: SERIALISER
        );
        settle();
        ral::modify_reg!(pwm, self.regs, CTL, PWEN1: 1, PWEN2: 1);
        settle();
    }

    /// Bus address of the FIFO, the DMA destination.
    pub fn fifo_bus_address(&self) -> u32 {
        pwm::FIF1_BUS_ADDRESS
    }

    #[cfg(test)]
    pub(crate) fn registers(&self) -> &pwm::RegisterBlock {
        &self.regs
    }
}

/// The clock manager's PWM clock.
pub struct PwmClock {
    regs: Instance<clock::RegisterBlock>,
}

impl PwmClock {
    /// Maps the PWM clock registers.
    pub fn map(periph_base: u32) -> Result<Self, PeripheralError> {
        Ok(Self {
            regs: Instance::map(periph_base + clock::CM_PWM_OFFSET)?,
        })
    }

    /// Kills the clock and waits until it has stopped.
    pub fn stop(&self) -> Result<(), PeripheralError> {
        ral::write_reg!(clock, self.regs, CTL, PASSWD: clock::PASSWORD, KILL: 1);
        settle();
        self.wait_busy(false)
    }

    /// Runs the clock from the oscillator, divided by `divisor`.
    pub fn start(&self, divisor: u32) -> Result<(), PeripheralError> {
        ral::write_reg!(clock, self.regs, DIV, PASSWD: clock::PASSWORD, DIVI: divisor);
        ral::write_reg!(clock, self.regs, CTL, PASSWD: clock::PASSWORD, SRC: OSC);
        ral::write_reg!(clock, self.regs, CTL, PASSWD: clock::PASSWORD, SRC: OSC, ENAB: 1);
        settle();
        self.wait_busy(true)
    }

    fn wait_busy(&self, busy: bool) -> Result<(), PeripheralError> {
        for _ in 0..CLOCK_POLLS {
            if ral::read_reg!(clock, self.regs, CTL, BUSY == u32::from(busy)) {
                return Ok(());
            }
            settle();
        }
        ClockTimeoutSnafu { enabling: busy }.fail()
    }

    #[cfg(test)]
    pub(crate) fn registers(&self) -> &clock::RegisterBlock {
        &self.regs
    }
}

/// A GPIO pin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Input.
    Input,
    /// Output.
    Output,
    /// Alternate function 0.
    Alt0,
    /// Alternate function 1.
    Alt1,
    /// Alternate function 2.
    Alt2,
    /// Alternate function 3.
    Alt3,
    /// Alternate function 4.
    Alt4,
    /// Alternate function 5.
    Alt5,
}

impl Function {
    /// The `alt`th alternate function.
    pub fn alt(alt: u8) -> Option<Self> {
        Some(match alt {
            0 => Self::Alt0,
            1 => Self::Alt1,
            2 => Self::Alt2,
            3 => Self::Alt3,
            4 => Self::Alt4,
            5 => Self::Alt5,
            _ => return None,
        })
    }

    fn bits(self) -> u32 {
        match self {
            Self::Input => 0b000,
            Self::Output => 0b001,
            Self::Alt0 => 0b100,
            Self::Alt1 => 0b101,
            Self::Alt2 => 0b110,
            Self::Alt3 => 0b111,
            Self::Alt4 => 0b011,
            Self::Alt5 => 0b010,
        }
    }

    fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0b000 => Self::Input,
            0b001 => Self::Output,
            0b100 => Self::Alt0,
            0b101 => Self::Alt1,
            0b110 => Self::Alt2,
            0b111 => Self::Alt3,
            0b011 => Self::Alt4,
            _ => Self::Alt5,
        }
    }
}

/// A pin's pull resistor setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// Floating.
    None,
    /// Pulled low.
    Down,
    /// Pulled high.
    Up,
}

/// The GPIO controller.
pub struct GpioController {
    regs: Instance<gpio::RegisterBlock>,
    family: HardwareFamily,
}

impl GpioController {
    /// Maps the GPIO registers.
    pub fn map(periph_base: u32, family: HardwareFamily) -> Result<Self, PeripheralError> {
        Ok(Self {
            regs: Instance::map(periph_base + gpio::GPIO_OFFSET)?,
            family,
        })
    }

    fn check_pin(pin: u8) -> Result<(), PeripheralError> {
        ensure!(pin < gpio::GPIO_COUNT, InvalidPinSnafu { pin });
        Ok(())
    }

    fn fsel(&self, pin: u8) -> (&ral::RWRegister<u32>, u32) {
        let reg = &self.regs.GPFSEL[usize::from(pin / gpio::FSEL_PER_REG)];
        let shift = u32::from(pin % gpio::FSEL_PER_REG) * gpio::FSEL_WIDTH;
        (reg, shift)
    }

    /// Selects the function of `pin`.
    pub fn set_function(&self, pin: u8, function: Function) -> Result<(), PeripheralError> {
        Self::check_pin(pin)?;
        let (reg, shift) = self.fsel(pin);
        let value = reg.read() & !(0b111 << shift);
        reg.write(value | (function.bits() << shift));
        Ok(())
    }

    /// The current function of `pin`.
    pub fn function(&self, pin: u8) -> Result<Function, PeripheralError> {
        Self::check_pin(pin)?;
        let (reg, shift) = self.fsel(pin);
        Ok(Function::from_bits(reg.read() >> shift))
    }

    /// Configures the pull resistor of `pin`.
    pub fn set_pull(&self, pin: u8, pull: Pull) -> Result<(), PeripheralError> {
        Self::check_pin(pin)?;
        match self.family {
            HardwareFamily::Pi4 => {
                let reg = &self.regs.GPIO_PUP_PDN_CNTRL[usize::from(pin / 16)];
                let shift = u32::from(pin % 16) * 2;
                let bits = match pull {
                    Pull::None => 0b00,
                    Pull::Up => 0b01,
                    Pull::Down => 0b10,
                };
                let value = reg.read() & !(0b11 << shift);
                reg.write(value | (bits << shift));
            }
            HardwareFamily::Pi1 | HardwareFamily::Pi2 => {
                let clock = &self.regs.GPPUDCLK[usize::from(pin / 32)];
                match pull {
                    Pull::None => ral::write_reg!(gpio, self.regs, GPPUD, PUD: OFF),
                    Pull::Down => ral::write_reg!(gpio, self.regs, GPPUD, PUD: DOWN),
                    Pull::Up => ral::write_reg!(gpio, self.regs, GPPUD, PUD: UP),
                }
                settle();
                clock.write(1 << (pin % 32));
                settle();
                ral::write_reg!(gpio, self.regs, GPPUD, 0);
                clock.write(0);
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn registers(&self) -> &gpio::RegisterBlock {
        &self.regs
    }
}

#[cfg(test)]
impl DmaChannel {
    pub(crate) fn zeroed(channel: u8) -> Self {
        Self {
            regs: Instance::zeroed(),
            channel,
        }
    }
}

#[cfg(test)]
impl PwmController {
    pub(crate) fn zeroed() -> Self {
        Self {
            regs: Instance::zeroed(),
        }
    }
}

#[cfg(test)]
impl PwmClock {
    pub(crate) fn zeroed() -> Self {
        Self {
            regs: Instance::zeroed(),
        }
    }
}

#[cfg(test)]
impl GpioController {
    pub(crate) fn zeroed(family: HardwareFamily) -> Self {
        Self {
            regs: Instance::zeroed(),
            family,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpio_function_select() {
        let gpio = GpioController::zeroed(HardwareFamily::Pi2);
        gpio.set_function(18, Function::Alt5).unwrap();
        gpio.set_function(12, Function::Alt0).unwrap();
        gpio.set_function(19, Function::Output).unwrap();

        assert_eq!(gpio.registers().GPFSEL[1].read(), (0b010 << 24) | (0b100 << 6) | (0b001 << 27));
        assert_eq!(gpio.function(18).unwrap(), Function::Alt5);
        assert_eq!(gpio.function(12).unwrap(), Function::Alt0);
        assert_eq!(gpio.function(13).unwrap(), Function::Input);

        gpio.set_function(18, Function::Input).unwrap();
        assert_eq!(gpio.function(18).unwrap(), Function::Input);
        assert_eq!(gpio.function(19).unwrap(), Function::Output);
    }

    #[test]
    fn gpio_rejects_unknown_pins() {
        let gpio = GpioController::zeroed(HardwareFamily::Pi1);
        assert!(matches!(
            gpio.set_function(58, Function::Output),
            Err(PeripheralError::InvalidPin { pin: 58 })
        ));
        assert!(gpio.function(200).is_err());
    }

    #[test]
    fn alternate_functions() {
        assert_eq!(Function::alt(0), Some(Function::Alt0));
        assert_eq!(Function::alt(5), Some(Function::Alt5));
        assert_eq!(Function::alt(6), None);
        for f in [
            Function::Input,
            Function::Output,
            Function::Alt0,
            Function::Alt1,
            Function::Alt2,
            Function::Alt3,
            Function::Alt4,
            Function::Alt5,
        ] {
            assert_eq!(Function::from_bits(f.bits()), f);
        }
    }

    #[test]
    fn pi4_pull_control() {
        let gpio = GpioController::zeroed(HardwareFamily::Pi4);
        gpio.set_pull(18, Pull::Up).unwrap();
        gpio.set_pull(19, Pull::Down).unwrap();
        assert_eq!(gpio.registers().GPIO_PUP_PDN_CNTRL[1].read(), (0b01 << 4) | (0b10 << 6));
        gpio.set_pull(18, Pull::None).unwrap();
        assert_eq!(gpio.registers().GPIO_PUP_PDN_CNTRL[1].read(), 0b10 << 6);
    }

    #[test]
    fn legacy_pull_sequence_leaves_clock_released() {
        let gpio = GpioController::zeroed(HardwareFamily::Pi1);
        gpio.set_pull(40, Pull::Up).unwrap();
        assert_eq!(gpio.registers().GPPUD.read(), 0);
        assert_eq!(gpio.registers().GPPUDCLK[1].read(), 0);
    }

    #[test]
    fn pwm_serializer_setup() {
        let pwm = PwmController::zeroed();
        pwm.configure_serializer();
        assert_eq!(pwm.registers().CTL.read(), 0x40);
        pwm.enable_dma();
        pwm.enable();

        let regs = pwm.registers();
        assert_eq!(regs.RNG1.read(), 32);
        assert_eq!(regs.RNG2.read(), 32);
        // USEF2 | MODE2 | PWEN2 | USEF1 | MODE1 | PWEN1
        assert_eq!(regs.CTL.read(), 0x2323);
        assert_eq!(regs.DMAC.read(), 0x8000_0703);

        pwm.stop();
        assert_eq!(pwm.registers().CTL.read(), 0);
        assert_eq!(pwm.fifo_bus_address(), 0x7e20_c018);
    }

    #[test]
    fn dma_start_and_status() {
        let dma = DmaChannel::zeroed(10);
        assert_eq!(dma.channel(), 10);
        assert!(!dma.is_busy());
        assert!(dma.wait().is_ok());

        dma.set_control_block(0xc000_1000);
        assert_eq!(dma.registers().CONBLK_AD.read(), 0xc000_1000);
        assert_eq!(dma.registers().DEBUG.read(), 0b111);

        dma.start();
        assert_eq!(dma.registers().CS.read(), 0x10ff_0001);
        assert!(dma.is_busy());

        dma.clear();
        assert_eq!(dma.registers().CS.read(), 0);
        assert_eq!(dma.registers().TXFR_LEN.read(), 0);
    }

    #[test]
    fn dma_error_is_reported() {
        let dma = DmaChannel::zeroed(5);
        dma.registers().CS.write(dma::CS::ERROR::mask | dma::CS::ACTIVE::mask);
        dma.registers().DEBUG.write(0b010);
        assert!(matches!(
            dma.wait(),
            Err(PeripheralError::DmaTransfer { debug: 0b010 })
        ));
    }

    #[test]
    fn clock_wait_times_out_without_hardware() {
        let clock = PwmClock::zeroed();
        // BUSY never rises in plain memory.
        assert!(matches!(
            clock.start(8),
            Err(PeripheralError::ClockTimeout { enabling: true })
        ));
        assert_eq!(clock.registers().DIV.read(), 0x5a00_8000);
        assert_eq!(clock.registers().CTL.read(), 0x5a00_0011);
        assert!(clock.stop().is_ok());
        assert_eq!(clock.registers().CTL.read(), 0x5a00_0020);
    }
}
