use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::io::AsRawFd,
    path::PathBuf,
};

use snafu::prelude::*;

use crate::errors::{IoctlSnafu, MailboxError, MessageTooLargeSnafu, OpenSnafu, RejectedSnafu};

/// The mailbox device node.
pub const MAILBOX_PATH: &str = "/dev/vcio";

const MAJOR_NUM: libc::c_ulong = 100;

// _IOWR(MAJOR_NUM, 0, char *)
const IOCTL_MBOX_PROPERTY: libc::c_ulong = (3 << 30)
    | ((std::mem::size_of::<*mut libc::c_char>() as libc::c_ulong) << 16)
    | (MAJOR_NUM << 8);

const MESSAGE_WORDS: usize = 32;
// size, code, tag, buffer size, request size ... end tag
const FRAME_WORDS: usize = 6;

const PROCESS_REQUEST: u32 = 0x0000_0000;
const RESPONSE_SUCCESS: u32 = 0x8000_0000;
const TAG_RESPONSE: u32 = 0x8000_0000;

/// Property tags understood by the firmware.
pub mod tags {
    /// Get firmware revision.
    pub const GET_FIRMWARE_REVISION: u32 = 0x0000_0001;
    /// Allocate GPU memory.
    pub const ALLOCATE_MEMORY: u32 = 0x0003_000c;
    /// Lock GPU memory, returning its bus address.
    pub const LOCK_MEMORY: u32 = 0x0003_000d;
    /// Unlock GPU memory.
    pub const UNLOCK_MEMORY: u32 = 0x0003_000e;
    /// Release GPU memory.
    pub const RELEASE_MEMORY: u32 = 0x0003_000f;
}

/// Carries a property message to the firmware and back.
pub trait PropertyTransport {
    /// Hands the message to the firmware; the response overwrites `message`.
    fn exchange(&mut self, message: &mut [u32]) -> io::Result<()>;
}

/// The `/dev/vcio` mailbox device.
#[derive(Debug)]
pub struct VcioDevice {
    file: File,
}

impl VcioDevice {
    /// Opens the mailbox device.
    pub fn open() -> Result<Self, MailboxError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(MAILBOX_PATH)
            .context(OpenSnafu {
                path: PathBuf::from(MAILBOX_PATH),
            })?;
        Ok(Self { file })
    }
}

impl PropertyTransport for VcioDevice {
    fn exchange(&mut self, message: &mut [u32]) -> io::Result<()> {
        // SAFETY: the buffer is valid for the whole call and its first word
        // holds its size in bytes, which is all the driver will touch.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                IOCTL_MBOX_PROPERTY as _,
                message.as_mut_ptr(),
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// A channel to the GPU firmware.
///
/// Only one request can be outstanding; `&mut self` serializes them.
#[derive(Debug)]
pub struct Mailbox<T = VcioDevice> {
    transport: T,
}

impl Mailbox {
    /// Opens the mailbox device.
    pub fn open() -> Result<Self, MailboxError> {
        Ok(Self::with_transport(VcioDevice::open()?))
    }
}

impl<T: PropertyTransport> Mailbox<T> {
    /// Creates a mailbox on top of an arbitrary transport.
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    /// Sends a single-tag property request and returns the first
    /// `response_len` words of the response payload.
    pub fn property(
        &mut self,
        tag: u32,
        request: &[u32],
        response_len: usize,
    ) -> Result<Vec<u32>, MailboxError> {
        let payload_len = request.len().max(response_len);
        let words = FRAME_WORDS + payload_len;
        ensure!(words <= MESSAGE_WORDS, MessageTooLargeSnafu { tag, words });

        let mut message = [0u32; MESSAGE_WORDS];
        message[0] = (words * 4) as u32;
        message[1] = PROCESS_REQUEST;
        message[2] = tag;
        message[3] = (payload_len * 4) as u32;
        message[4] = (request.len() * 4) as u32;
        message[5..5 + request.len()].copy_from_slice(request);
        // message[words - 1] is the end tag, already zero.

        self.transport
            .exchange(&mut message[..words])
            .context(IoctlSnafu { tag })?;

        let code = message[1];
        ensure!(code == RESPONSE_SUCCESS, RejectedSnafu { tag, code });
        ensure!(
            message[4] & TAG_RESPONSE != 0,
            RejectedSnafu {
                tag,
                code: message[4]
            }
        );

        Ok(message[5..5 + response_len].to_vec())
    }

    fn property_word(&mut self, tag: u32, request: &[u32]) -> Result<u32, MailboxError> {
        let response = self.property(tag, request, 1)?;
        Ok(response[0])
    }

    /// Queries the firmware revision.
    pub fn firmware_revision(&mut self) -> Result<u32, MailboxError> {
        self.property_word(tags::GET_FIRMWARE_REVISION, &[])
    }

    /// Allocates GPU memory, returning its handle. A zero handle means the
    /// firmware is out of memory.
    pub fn mem_alloc(&mut self, size: u32, align: u32, flags: u32) -> Result<u32, MailboxError> {
        self.property_word(tags::ALLOCATE_MEMORY, &[size, align, flags])
    }

    /// Releases GPU memory. Returns the firmware's status word (zero on success).
    pub fn mem_free(&mut self, handle: u32) -> Result<u32, MailboxError> {
        self.property_word(tags::RELEASE_MEMORY, &[handle])
    }

    /// Locks GPU memory in place, returning its bus address.
    pub fn mem_lock(&mut self, handle: u32) -> Result<u32, MailboxError> {
        self.property_word(tags::LOCK_MEMORY, &[handle])
    }

    /// Unlocks GPU memory. Returns the firmware's status word (zero on success).
    pub fn mem_unlock(&mut self, handle: u32) -> Result<u32, MailboxError> {
        self.property_word(tags::UNLOCK_MEMORY, &[handle])
    }
}

#[cfg(test)]
impl<T> Mailbox<T> {
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }
}


#[cfg(test)]
mod tests {
    use super::{fake::FakeFirmware, *};

    #[test]
    fn frames_allocate_request() {
        let mut mailbox = Mailbox::with_transport(FakeFirmware::default());
        let handle = mailbox.mem_alloc(8192, 4096, 0x4).unwrap();
        assert_eq!(handle, 1);

        let request = &mailbox.transport.requests[0];
        assert_eq!(
            request,
            &[
                36,
                PROCESS_REQUEST,
                tags::ALLOCATE_MEMORY,
                12,
                12,
                8192,
                4096,
                0x4,
                0
            ]
        );
    }

    #[test]
    fn frames_request_without_payload() {
        let mut mailbox = Mailbox::with_transport(FakeFirmware::default());
        assert_eq!(mailbox.firmware_revision().unwrap(), 0x5f0e_3a1b);

        let request = &mailbox.transport.requests[0];
        assert_eq!(request, &[28, 0, tags::GET_FIRMWARE_REVISION, 4, 0, 0, 0]);
    }

    #[test]
    fn lock_returns_bus_address() {
        let mut mailbox = Mailbox::with_transport(FakeFirmware::default());
        let handle = mailbox.mem_alloc(4096, 4096, 0xc).unwrap();
        assert_eq!(mailbox.mem_lock(handle).unwrap(), 0xc001_0000);
        assert_eq!(mailbox.mem_unlock(handle).unwrap(), 0);
        assert_eq!(mailbox.mem_free(handle).unwrap(), 0);
    }

    #[test]
    fn rejected_request() {
        let mut mailbox = Mailbox::with_transport(FakeFirmware {
            reject_tag: Some(tags::LOCK_MEMORY),
            ..Default::default()
        });
        assert!(matches!(
            mailbox.mem_lock(7),
            Err(MailboxError::Rejected {
                tag: tags::LOCK_MEMORY,
                code: 0x8000_0001
            })
        ));
    }

    #[test]
    fn transport_failure() {
        let mut mailbox = Mailbox::with_transport(FakeFirmware::default());
        assert!(matches!(
            mailbox.property(0x0004_0001, &[0], 2),
            Err(MailboxError::Ioctl {
                tag: 0x0004_0001,
                ..
            })
        ));
    }

    #[test]
    fn oversized_request() {
        let mut mailbox = Mailbox::with_transport(FakeFirmware::default());
        let request = [0u32; 27];
        assert!(matches!(
            mailbox.property(0x1234, &request, 1),
            Err(MailboxError::MessageTooLarge { words: 33, .. })
        ));
        assert!(mailbox.transport.requests.is_empty());
    }
}
