#![allow(dead_code, missing_docs, non_snake_case, non_upper_case_globals)]

use std::{marker::PhantomData, mem, ops::Deref, ptr::NonNull};

use snafu::prelude::*;

use super::mapping::MemMapping;
use crate::errors::{MapRegistersSnafu, PeripheralError};

macro_rules! field {
    ($name:ident, $offset:literal, $width:literal $(, $value:ident = $v:literal)* $(,)?) => {
        pub mod $name {
            pub const offset: u32 = $offset;
            pub const mask: u32 = (u32::MAX >> (32 - $width)) << $offset;
            pub mod R {}
            pub mod W {}
            pub mod RW {
                $(pub const $value: u32 = $v;)*
            }
        }
    };
}

/// Clock manager, PWM clock registers.
pub mod clock;
/// DMA controller, one channel's register window.
pub mod dma;
/// GPIO controller.
pub mod gpio;
/// PWM controller.
pub mod pwm;

/// Bus address of the peripheral space as seen by the DMA engine.
pub const PERIPH_BUS_BASE: u32 = 0x7e00_0000;

/// A register block that lives at a fixed offset from the peripheral base.
pub trait Block {
    /// Human readable name, for errors and logs.
    const NAME: &'static str;
}

enum Backing {
    Mapped(MemMapping),
    #[cfg(test)]
    Heap(Box<[u32]>),
}

/// An owned, mapped instance of a register block.
pub struct Instance<RB> {
    ptr: NonNull<RB>,
    _backing: Backing,
    _block: PhantomData<RB>,
}

// SAFETY: the instance exclusively owns its window.
unsafe impl<RB> Send for Instance<RB> {}

impl<RB: Block> Instance<RB> {
    /// Maps the block located at the physical `address`.
    pub fn map(address: u32) -> Result<Self, PeripheralError> {
        let mapping = MemMapping::map(address, mem::size_of::<RB>()).context(MapRegistersSnafu {
            block: RB::NAME,
            address,
        })?;
        log::debug!("Mapped {} registers at {:#010x}", RB::NAME, address);

        let ptr = mapping.as_non_null().cast::<RB>();
        Ok(Self {
            ptr,
            _backing: Backing::Mapped(mapping),
            _block: PhantomData,
        })
    }

    /// A zero-initialized block in ordinary memory.
    #[cfg(test)]
    pub fn zeroed() -> Self {
        let words = (mem::size_of::<RB>() + 3) / 4;
        let mut heap = vec![0u32; words].into_boxed_slice();
        let ptr = NonNull::new(heap.as_mut_ptr().cast::<RB>()).unwrap();
        Self {
            ptr,
            _backing: Backing::Heap(heap),
            _block: PhantomData,
        }
    }
}

impl<RB> Deref for Instance<RB> {
    type Target = RB;

    fn deref(&self) -> &RB {
        // SAFETY: the pointer targets a live window of at least size_of::<RB>()
        // bytes; all registers are interior-mutable volatile cells.
        unsafe { self.ptr.as_ref() }
    }
}
