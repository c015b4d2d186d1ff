use ral_registers::RWRegister;

use super::Block;

/// Offset of the PWM clock control from the peripheral base.
pub const CM_PWM_OFFSET: u32 = 0x0010_10a0;

/// Every write to the clock manager must carry this password.
pub const PASSWORD: u32 = 0x5a;

#[repr(C)]
pub struct RegisterBlock {
    pub CTL: RWRegister<u32>,
    pub DIV: RWRegister<u32>,
}

impl Block for RegisterBlock {
    const NAME: &'static str = "PWM clock";
}

pub mod CTL {
    field!(PASSWD, 24, 8);
    field!(MASH, 9, 2);
    field!(FLIP, 8, 1);
    field!(BUSY, 7, 1);
    field!(KILL, 5, 1);
    field!(ENAB, 4, 1);
    field!(
        SRC, 0, 4,
        GND = 0,
        OSC = 1,
        TSTDBG0 = 2,
        TSTDBG1 = 3,
        PLLA = 4,
        PLLC = 5,
        PLLD = 6,
        HDMI = 7,
    );
}

pub mod DIV {
    field!(PASSWD, 24, 8);
    field!(DIVI, 12, 12);
    field!(DIVF, 0, 12);
}

/// Largest integer divisor the clock manager accepts.
pub const DIVI_MAX: u32 = 0xfff;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_layout() {
        assert_eq!(core::mem::size_of::<RegisterBlock>(), 8);
        assert_eq!(DIV::DIVI::mask, 0x00ff_f000);
        assert_eq!(CTL::PASSWD::mask, 0xff00_0000);
    }
}
