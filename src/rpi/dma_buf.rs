use std::{fmt, mem, ptr, slice};

use snafu::prelude::*;

use super::{
    mailbox::{Mailbox, PropertyTransport},
    mapping::MemMapping,
    regs::dma::ControlBlock,
};
use crate::errors::{
    AllocateSnafu, DmaError, ExhaustedSnafu, LockSnafu, MailboxError, MapSnafu, NullBusAddressSnafu,
    ReleaseSnafu, StatusSnafu, UnlockSnafu, UnmapSnafu,
};

/// Bytes reserved at the start of every buffer for the DMA control block.
pub const CONTROL_BLOCK_BYTES: usize = mem::size_of::<ControlBlock>();

// The bus address of SDRAM carries the cache alias in its two top bits.
const BUS_ALIAS_MASK: u32 = 0xc000_0000;

/// Converts a VideoCore bus address into an ARM physical address.
pub fn bus_to_phys(bus_address: u32) -> u32 {
    bus_address & !BUS_ALIAS_MASK
}

/// Physically contiguous, uncached memory shared with the GPU's DMA engine.
///
/// The buffer starts with a DMA control block, followed by the payload words.
/// It must be given back with [`release`](DmaBuffer::release); dropping it
/// only unmaps it and leaks the GPU allocation.
pub struct DmaBuffer {
    handle: u32,
    bus_address: u32,
    mapping: Option<MemMapping>,
}

impl fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("handle", &self.handle)
            .field("bus_address", &format_args!("{:#010x}", self.bus_address))
            .field("len", &self.len())
            .finish()
    }
}

impl DmaBuffer {
    /// Allocates, locks and maps `size` bytes of GPU memory.
    ///
    /// On failure, everything acquired so far is given back.
    pub fn allocate<T: PropertyTransport>(
        mailbox: &mut Mailbox<T>,
        size: usize,
        alignment: u32,
        flags: u32,
    ) -> Result<Self, DmaError> {
        let handle = mailbox
            .mem_alloc(size as u32, alignment, flags)
            .context(AllocateSnafu { size })?;
        ensure!(handle != 0, ExhaustedSnafu { size });

        let bus_address = match mailbox.mem_lock(handle) {
            Ok(0) => {
                discard_handle(mailbox, handle, false);
                return NullBusAddressSnafu { handle }.fail();
            }
            Ok(bus_address) => bus_address,
            Err(e) => {
                discard_handle(mailbox, handle, false);
                return Err(e).context(LockSnafu { handle });
            }
        };

        let address = bus_to_phys(bus_address);
        let mapping = match MemMapping::map(address, size) {
            Ok(mapping) => mapping,
            Err(e) => {
                discard_handle(mailbox, handle, true);
                return Err(e).context(MapSnafu { address, size });
            }
        };

        log::debug!(
            "Allocated {} bytes of DMA memory: handle {}, bus {:#010x}, phys {:#010x}",
            size,
            handle,
            bus_address,
            address
        );

        Ok(Self {
            handle,
            bus_address,
            mapping: Some(mapping),
        })
    }

    /// Unmaps, unlocks and frees the buffer.
    ///
    /// All three steps are attempted; the first failure is returned.
    pub fn release<T: PropertyTransport>(mut self, mailbox: &mut Mailbox<T>) -> Result<(), DmaError> {
        let handle = self.handle;

        let unmapped = match self.mapping.take() {
            Some(mapping) => mapping.unmap().context(UnmapSnafu),
            None => Ok(()),
        };
        let unlocked = mailbox
            .mem_unlock(handle)
            .and_then(|status| check_status(handle, status))
            .context(UnlockSnafu { handle });
        let freed = mailbox
            .mem_free(handle)
            .and_then(|status| check_status(handle, status))
            .context(ReleaseSnafu { handle });

        log::debug!("Released DMA memory handle {}", handle);

        first_error([unmapped, unlocked, freed])
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.mapping
            .as_ref()
            .map_or(0, |m| m.len().saturating_sub(CONTROL_BLOCK_BYTES))
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The GPU memory handle.
    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// Bus address of the buffer (and its control block), as the DMA engine sees it.
    pub fn bus_address(&self) -> u32 {
        self.bus_address
    }

    /// ARM physical address of the buffer.
    pub fn physical_address(&self) -> u32 {
        bus_to_phys(self.bus_address)
    }

    /// Bus address of the first payload word.
    pub fn payload_bus_address(&self) -> u32 {
        self.bus_address + CONTROL_BLOCK_BYTES as u32
    }

    fn payload_ptr(&self) -> *mut u32 {
        match &self.mapping {
            // SAFETY: the mapping is at least CONTROL_BLOCK_BYTES long, see `len`.
            Some(m) if m.len() >= CONTROL_BLOCK_BYTES => unsafe {
                m.as_ptr().add(CONTROL_BLOCK_BYTES).cast()
            },
            _ => ptr::NonNull::dangling().as_ptr(),
        }
    }

    /// The payload as words.
    pub fn words(&self) -> &[u32] {
        // SAFETY: the payload is mapped, word aligned and owned by self.
        unsafe { slice::from_raw_parts(self.payload_ptr(), self.len() / 4) }
    }

    /// The payload as mutable words.
    pub fn words_mut(&mut self) -> &mut [u32] {
        // SAFETY: as in `words`; `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.payload_ptr(), self.len() / 4) }
    }

    /// Stores the control block at the start of the buffer.
    pub(crate) fn write_control_block(&mut self, control_block: ControlBlock) {
        if let Some(mapping) = &self.mapping {
            // SAFETY: mappings start page aligned and hold at least one control block.
            unsafe { ptr::write_volatile(mapping.as_ptr().cast::<ControlBlock>(), control_block) };
        }
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        if self.mapping.is_some() {
            log::warn!(
                "DMA buffer (handle {}) dropped without release; GPU memory leaked",
                self.handle
            );
        }
    }
}

fn check_status(handle: u32, status: u32) -> Result<(), MailboxError> {
    ensure!(status == 0, StatusSnafu { handle, status });
    Ok(())
}

fn discard_handle<T: PropertyTransport>(mailbox: &mut Mailbox<T>, handle: u32, locked: bool) {
    if locked {
        if let Err(e) = mailbox
            .mem_unlock(handle)
            .and_then(|status| check_status(handle, status))
        {
            log::warn!("Couldn't unlock GPU memory handle {} during cleanup: {}", handle, e);
        }
    }
    if let Err(e) = mailbox
        .mem_free(handle)
        .and_then(|status| check_status(handle, status))
    {
        log::warn!("Couldn't free GPU memory handle {} during cleanup: {}", handle, e);
    }
}

fn first_error<const N: usize>(results: [Result<(), DmaError>; N]) -> Result<(), DmaError> {
    let mut first = None;
    for result in results {
        if let Err(e) = result {
            if first.is_none() {
                first = Some(e);
            } else {
                log::warn!("Additional error while releasing DMA memory: {}", e);
            }
        }
    }
    first.map_or(Ok(()), Err)
}
