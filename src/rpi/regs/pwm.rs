use ral_registers::RWRegister;

use super::{Block, PERIPH_BUS_BASE};

/// Offset of the PWM block from the peripheral base.
pub const PWM_OFFSET: u32 = 0x0020_c000;

/// Number of PWM output channels.
pub const PWM_CHANNELS: usize = 2;

/// Bus address of the channel 1 FIFO, the DMA destination.
pub const FIF1_BUS_ADDRESS: u32 = PERIPH_BUS_BASE + PWM_OFFSET + 0x18;

#[repr(C)]
pub struct RegisterBlock {
    pub CTL: RWRegister<u32>,
    pub STA: RWRegister<u32>,
    pub DMAC: RWRegister<u32>,
    _reserved0: u32,
    pub RNG1: RWRegister<u32>,
    pub DAT1: RWRegister<u32>,
    pub FIF1: RWRegister<u32>,
    _reserved1: u32,
    pub RNG2: RWRegister<u32>,
    pub DAT2: RWRegister<u32>,
}

impl Block for RegisterBlock {
    const NAME: &'static str = "PWM";
}

pub mod CTL {
    field!(MSEN2, 15, 1);
    field!(USEF2, 13, 1);
    field!(POLA2, 12, 1);
    field!(SBIT2, 11, 1);
    field!(RPTL2, 10, 1);
    field!(MODE2, 9, 1, PWM = 0, SERIALISER = 1);
    field!(PWEN2, 8, 1);
    field!(MSEN1, 7, 1);
    field!(CLRF1, 6, 1);
    field!(USEF1, 5, 1);
    field!(POLA1, 4, 1);
    field!(SBIT1, 3, 1);
    field!(RPTL1, 2, 1);
    field!(MODE1, 1, 1, PWM = 0, SERIALISER = 1);
    field!(PWEN1, 0, 1);
}

pub mod STA {
    field!(STA2, 10, 1);
    field!(STA1, 9, 1);
    field!(BERR, 8, 1);
    field!(GAPO2, 5, 1);
    field!(GAPO1, 4, 1);
    field!(RERR1, 3, 1);
    field!(WERR1, 2, 1);
    field!(EMPT1, 1, 1);
    field!(FULL1, 0, 1);
}

pub mod DMAC {
    field!(ENAB, 31, 1);
    field!(PANIC, 8, 8);
    field!(DREQ, 0, 8);
}

pub mod RNG1 {}
pub mod DAT1 {}
pub mod FIF1 {}
pub mod RNG2 {}
pub mod DAT2 {}

/// A GPIO pin's route to a PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmPin {
    /// The GPIO number.
    pub pin: u8,
    /// The PWM channel driving it.
    pub channel: u8,
    /// The alternate function selecting the PWM output.
    pub alt: u8,
}

const PWM_PINS: [PwmPin; 9] = [
    PwmPin { pin: 12, channel: 0, alt: 0 },
    PwmPin { pin: 18, channel: 0, alt: 5 },
    PwmPin { pin: 40, channel: 0, alt: 0 },
    PwmPin { pin: 52, channel: 0, alt: 1 },
    PwmPin { pin: 13, channel: 1, alt: 0 },
    PwmPin { pin: 19, channel: 1, alt: 5 },
    PwmPin { pin: 41, channel: 1, alt: 0 },
    PwmPin { pin: 45, channel: 1, alt: 0 },
    PwmPin { pin: 53, channel: 1, alt: 1 },
];

/// Looks up how `pin` connects to the PWM, if it does.
pub fn pwm_pin(pin: u8) -> Option<PwmPin> {
    PWM_PINS.iter().copied().find(|p| p.pin == pin)
}
