use ral_registers::RWRegister;

use super::Block;

/// Offset of the GPIO block from the peripheral base.
pub const GPIO_OFFSET: u32 = 0x0020_0000;

/// Number of GPIO lines.
pub const GPIO_COUNT: u8 = 58;

#[repr(C)]
pub struct RegisterBlock {
    pub GPFSEL: [RWRegister<u32>; 6],
    _reserved0: u32,
    pub GPSET: [RWRegister<u32>; 2],
    _reserved1: u32,
    pub GPCLR: [RWRegister<u32>; 2],
    _reserved2: u32,
    pub GPLEV: [RWRegister<u32>; 2],
    _reserved3: u32,
    pub GPEDS: [RWRegister<u32>; 2],
    _reserved4: u32,
    pub GPREN: [RWRegister<u32>; 2],
    _reserved5: u32,
    pub GPFEN: [RWRegister<u32>; 2],
    _reserved6: u32,
    pub GPHEN: [RWRegister<u32>; 2],
    _reserved7: u32,
    pub GPLEN: [RWRegister<u32>; 2],
    _reserved8: u32,
    pub GPAREN: [RWRegister<u32>; 2],
    _reserved9: u32,
    pub GPAFEN: [RWRegister<u32>; 2],
    _reserved10: u32,
    /// Pull-up/down control, BCM2835 to BCM2837 only.
    pub GPPUD: RWRegister<u32>,
    pub GPPUDCLK: [RWRegister<u32>; 2],
    _reserved11: [u32; 17],
    /// Pull-up/down control, BCM2711 only. Two bits per pin.
    pub GPIO_PUP_PDN_CNTRL: [RWRegister<u32>; 4],
}

impl Block for RegisterBlock {
    const NAME: &'static str = "GPIO";
}

/// Width of one pin's function-select field.
pub const FSEL_WIDTH: u32 = 3;
/// Pins per function-select register.
pub const FSEL_PER_REG: u8 = 10;

pub mod GPPUD {
    field!(PUD, 0, 2, OFF = 0, DOWN = 1, UP = 2);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_layout() {
        let block = core::mem::MaybeUninit::<RegisterBlock>::uninit();
        let base = block.as_ptr() as usize;
        let offset_of = |ptr: *const RWRegister<u32>| ptr as usize - base;
        // SAFETY: only addresses are computed, nothing is read.
        unsafe {
            let ptr = block.as_ptr();
            assert_eq!(offset_of(core::ptr::addr_of!((*ptr).GPSET).cast()), 0x1c);
            assert_eq!(offset_of(core::ptr::addr_of!((*ptr).GPCLR).cast()), 0x28);
            assert_eq!(offset_of(core::ptr::addr_of!((*ptr).GPPUD)), 0x94);
            assert_eq!(offset_of(core::ptr::addr_of!((*ptr).GPPUDCLK).cast()), 0x98);
            assert_eq!(
                offset_of(core::ptr::addr_of!((*ptr).GPIO_PUP_PDN_CNTRL).cast()),
                0xe4
            );
        }
    }
}
