use ral_registers::RWRegister;

use super::Block;

/// Offset of DMA channel 0 from the peripheral base; channels 0 to 14 follow
/// at [`CHANNEL_STRIDE`].
pub const DMA_OFFSET: u32 = 0x0000_7000;
/// Distance between two channels' windows.
pub const CHANNEL_STRIDE: u32 = 0x100;
/// Channel 15 sits apart from the others.
pub const DMA15_OFFSET: u32 = 0x00e0_5000;

/// Peripheral number of the PWM for DREQ pacing.
pub const PERMAP_PWM: u32 = 5;

/// Offset of a channel's window from the peripheral base.
pub fn channel_offset(channel: u8) -> Option<u32> {
    match channel {
        0..=14 => Some(DMA_OFFSET + u32::from(channel) * CHANNEL_STRIDE),
        15 => Some(DMA15_OFFSET),
        _ => None,
    }
}

#[repr(C)]
pub struct RegisterBlock {
    pub CS: RWRegister<u32>,
    pub CONBLK_AD: RWRegister<u32>,
    pub TI: RWRegister<u32>,
    pub SOURCE_AD: RWRegister<u32>,
    pub DEST_AD: RWRegister<u32>,
    pub TXFR_LEN: RWRegister<u32>,
    pub STRIDE: RWRegister<u32>,
    pub NEXTCONBK: RWRegister<u32>,
    pub DEBUG: RWRegister<u32>,
}

impl Block for RegisterBlock {
    const NAME: &'static str = "DMA";
}

pub mod CS {
    field!(RESET, 31, 1);
    field!(ABORT, 30, 1);
    field!(DISDEBUG, 29, 1);
    field!(WAIT_FOR_OUTSTANDING_WRITES, 28, 1);
    field!(PANIC_PRIORITY, 20, 4);
    field!(PRIORITY, 16, 4);
    field!(ERROR, 8, 1);
    field!(WAITING_FOR_OUTSTANDING_WRITES, 6, 1);
    field!(DREQ_STOPS_DMA, 5, 1);
    field!(PAUSED, 4, 1);
    field!(DREQ, 3, 1);
    field!(INT, 2, 1);
    field!(END, 1, 1);
    field!(ACTIVE, 0, 1);
}

pub mod CONBLK_AD {}
pub mod SOURCE_AD {}
pub mod DEST_AD {}
pub mod TXFR_LEN {}
pub mod STRIDE {}
pub mod NEXTCONBK {}

pub mod TI {
    field!(NO_WIDE_BURSTS, 26, 1);
    field!(WAITS, 21, 5);
    field!(PERMAP, 16, 5);
    field!(BURST_LENGTH, 12, 4);
    field!(SRC_IGNORE, 11, 1);
    field!(SRC_DREQ, 10, 1);
    field!(SRC_WIDTH, 9, 1);
    field!(SRC_INC, 8, 1);
    field!(DEST_IGNORE, 7, 1);
    field!(DEST_DREQ, 6, 1);
    field!(DEST_WIDTH, 5, 1);
    field!(DEST_INC, 4, 1);
    field!(WAIT_RESP, 3, 1);
    field!(TDMODE, 1, 1);
    field!(INTEN, 0, 1);
}

pub mod DEBUG {
    field!(LITE, 28, 1);
    field!(READ_ERROR, 2, 1);
    field!(FIFO_ERROR, 1, 1);
    field!(READ_LAST_NOT_SET_ERROR, 0, 1);
}

/// A DMA control block, as read by the engine from memory.
///
/// Must be 32-byte aligned in memory the GPU can see.
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlBlock {
    pub ti: u32,
    pub source_ad: u32,
    pub dest_ad: u32,
    pub txfr_len: u32,
    pub stride: u32,
    pub nextconbk: u32,
    pub _reserved: [u32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_layout() {
        assert_eq!(core::mem::size_of::<RegisterBlock>(), 0x24);
        assert_eq!(core::mem::size_of::<ControlBlock>(), 32);
        assert_eq!(core::mem::align_of::<ControlBlock>(), 32);
    }

    #[test]
    fn channel_offsets() {
        assert_eq!(channel_offset(0), Some(0x7000));
        assert_eq!(channel_offset(10), Some(0x7a00));
        assert_eq!(channel_offset(14), Some(0x7e00));
        assert_eq!(channel_offset(15), Some(0xe0_5000));
        assert_eq!(channel_offset(16), None);
    }

    #[test]
    fn field_masks() {
        assert_eq!(CS::PANIC_PRIORITY::mask, 0x00f0_0000);
        assert_eq!(TI::PERMAP::mask, 0x001f_0000);
        assert_eq!(CS::RESET::mask, 0x8000_0000);
    }
}
