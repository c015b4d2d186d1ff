use std::{io, os::unix::io::RawFd};

// _IOW(SPI_IOC_MAGIC, 4, __u32)
const SPI_IOC_WR_MAX_SPEED_HZ: libc::c_ulong = 0x4004_6b04;

/// Sets the maximum clock speed of the spidev device behind `fd`.
pub fn set_spi_speed(fd: RawFd, hz: u32) -> io::Result<()> {
    // SAFETY: the kernel only reads a u32 through the pointer.
    let ret = unsafe { libc::ioctl(fd, SPI_IOC_WR_MAX_SPEED_HZ as _, &hz as *const u32) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    log::debug!("Set SPI speed of fd {} to {} Hz", fd, hz);
    Ok(())
}
