use std::{
    fs::OpenOptions,
    io,
    mem::ManuallyDrop,
    os::unix::{fs::OpenOptionsExt, io::AsRawFd},
    ptr::NonNull,
};

/// The physical memory device.
pub const DEV_MEM: &str = "/dev/mem";

/// Size of a page as the kernel maps it.
pub const PAGE_SIZE: usize = 4096;

/// A window of physical memory mapped into the process.
#[derive(Debug)]
pub(crate) struct MemMapping {
    // Page-aligned start of the mapping, as returned by mmap.
    base: NonNull<u8>,
    map_len: usize,
    // Offset of the requested address into the first page.
    page_offset: usize,
    len: usize,
}

// SAFETY: the mapping is plain memory, owned by this struct alone.
unsafe impl Send for MemMapping {}

impl MemMapping {
    /// Maps `len` bytes of physical memory starting at `address`.
    pub fn map(address: u32, len: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(DEV_MEM)?;

        let page_offset = address as usize % PAGE_SIZE;
        let page_address = address as usize - page_offset;
        let map_len = len + page_offset;

        // SAFETY: we map a fresh shared region; nothing else aliases it yet.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                page_address as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let base = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable))?;

        // The file descriptor may be closed now; the mapping stays valid.
        Ok(Self {
            base,
            map_len,
            page_offset,
            len,
        })
    }

    /// Pointer to the requested address.
    pub fn as_ptr(&self) -> *mut u8 {
        // SAFETY: page_offset < map_len, so this stays inside the mapping.
        unsafe { self.base.as_ptr().add(self.page_offset) }
    }

    /// Same as [`as_ptr`](Self::as_ptr).
    pub fn as_non_null(&self) -> NonNull<u8> {
        // SAFETY: offset from a non-null mapping, see `as_ptr`.
        unsafe { NonNull::new_unchecked(self.as_ptr()) }
    }

    /// Length of the requested window.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Unmaps the window, reporting failures.
    pub fn unmap(self) -> io::Result<()> {
        let this = ManuallyDrop::new(self);
        this.munmap()
    }

    fn munmap(&self) -> io::Result<()> {
        // SAFETY: base/map_len describe exactly the region returned by mmap.
        let ret = unsafe { libc::munmap(self.base.as_ptr().cast(), self.map_len) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for MemMapping {
    fn drop(&mut self) {
        if let Err(e) = self.munmap() {
            log::warn!("Couldn't unmap {} bytes of physical memory: {}", self.map_len, e);
        }
    }
}
