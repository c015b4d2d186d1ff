use std::{io, path::PathBuf};

use snafu::prelude::*;

/// Errors of the hardware detection in [`rpi::hardware`](crate::rpi::hardware).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DetectError {
    /// The platform identity file could not be read.
    #[snafu(display("couldn't read model file {}", path.display()))]
    ReadModel {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// None of the known Raspberry Pi variants is a prefix of the reported model.
    #[snafu(display("couldn't identify Pi model {model:?}"))]
    UnknownModel {
        /// The model string as reported by the system.
        model: String,
    },
}

/// Errors of the VideoCore mailbox property interface.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MailboxError {
    /// The mailbox device could not be opened. Usually this requires root.
    #[snafu(display("couldn't open mailbox device {}", path.display()))]
    Open {
        /// The mailbox device node.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The property ioctl failed.
    #[snafu(display("mailbox property call for tag {tag:#x} failed"))]
    Ioctl {
        /// The property tag of the request.
        tag: u32,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The firmware did not acknowledge the request.
    #[snafu(display("firmware rejected tag {tag:#x} (response code {code:#x})"))]
    Rejected {
        /// The property tag of the request.
        tag: u32,
        /// The response code word returned by the firmware.
        code: u32,
    },
    /// The firmware answered a memory request with a non-zero status word.
    #[snafu(display("firmware reported status {status:#x} for GPU memory handle {handle}"))]
    Status {
        /// The GPU memory handle.
        handle: u32,
        /// The status word.
        status: u32,
    },
    /// The request does not fit into a single property message.
    #[snafu(display("request for tag {tag:#x} needs {words} words, more than a message holds"))]
    MessageTooLarge {
        /// The property tag of the request.
        tag: u32,
        /// The number of words the message would need.
        words: usize,
    },
}

/// Errors of the DMA memory allocator.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DmaError {
    /// The mailbox allocate request failed.
    #[snafu(display("couldn't allocate {size} bytes of GPU memory"))]
    Allocate {
        /// The requested size in bytes.
        size: usize,
        /// The mailbox error.
        source: MailboxError,
    },
    /// The firmware returned a null handle; GPU memory is exhausted.
    #[snafu(display("GPU memory exhausted while allocating {size} bytes"))]
    Exhausted {
        /// The requested size in bytes.
        size: usize,
    },
    /// The mailbox lock request failed.
    #[snafu(display("couldn't lock GPU memory handle {handle}"))]
    Lock {
        /// The GPU memory handle.
        handle: u32,
        /// The mailbox error.
        source: MailboxError,
    },
    /// Locking returned a null bus address.
    #[snafu(display("locking GPU memory handle {handle} returned no bus address"))]
    NullBusAddress {
        /// The GPU memory handle.
        handle: u32,
    },
    /// Mapping the locked memory into the process failed.
    #[snafu(display("couldn't map {size} bytes at physical address {address:#x}"))]
    Map {
        /// The physical address of the region.
        address: u32,
        /// The size of the region.
        size: usize,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// Unmapping the buffer failed.
    Unmap {
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The mailbox unlock request failed.
    #[snafu(display("couldn't unlock GPU memory handle {handle}"))]
    Unlock {
        /// The GPU memory handle.
        handle: u32,
        /// The mailbox error.
        source: MailboxError,
    },
    /// The mailbox release request failed.
    #[snafu(display("couldn't release GPU memory handle {handle}"))]
    Release {
        /// The GPU memory handle.
        handle: u32,
        /// The mailbox error.
        source: MailboxError,
    },
}

/// Errors of the peripheral register layer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PeripheralError {
    /// A register block could not be mapped. Usually this requires root.
    #[snafu(display("couldn't map {block} registers at {address:#x}"))]
    MapRegisters {
        /// The name of the register block.
        block: &'static str,
        /// The physical address of the block.
        address: u32,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The DMA channel number is not one of the 16 channels.
    #[snafu(display("invalid DMA channel {channel}"))]
    InvalidDmaChannel {
        /// The requested channel.
        channel: u8,
    },
    /// The pin cannot be routed to a PWM output.
    #[snafu(display("GPIO {pin} has no PWM function"))]
    InvalidPin {
        /// The requested GPIO pin.
        pin: u8,
    },
    /// No pins were given to output the signal on.
    NoPins,
    /// The PWM frequency cannot be derived from the clock oscillator.
    #[snafu(display("PWM frequency {frequency} Hz is out of range"))]
    InvalidFrequency {
        /// The requested frequency.
        frequency: u32,
    },
    /// The DMA buffer is smaller than the transfer it should hold.
    #[snafu(display("DMA buffer holds {capacity} bytes, transfer needs {required}"))]
    BufferTooSmall {
        /// Payload capacity of the buffer.
        capacity: usize,
        /// Bytes required by the transfer.
        required: usize,
    },
    /// The clock manager did not reach the expected state.
    #[snafu(display("PWM clock did not settle in time (enabling: {enabling})"))]
    ClockTimeout {
        /// Whether the clock was being enabled.
        enabling: bool,
    },
    /// The DMA engine reported an error.
    #[snafu(display("DMA transfer failed (debug flags {debug:#x})"))]
    DmaTransfer {
        /// The content of the channel's DEBUG register.
        debug: u32,
    },
    /// A peripheral was used before it was initialized.
    #[snafu(display("{block} used before initialization"))]
    NotInitialized {
        /// The name of the peripheral.
        block: &'static str,
    },
}

/// Errors of [`RPi::new`](crate::rpi::RPi::new).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RpiError {
    /// Couldn't detect RPi hardware.
    Detect {
        /// The detection error.
        source: DetectError,
    },
    /// Couldn't open the mailbox.
    OpenMailbox {
        /// The mailbox error.
        source: MailboxError,
    },
}

/// A colour order or colour model name was not recognized.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)), display("unknown {kind} {value:?}"))]
pub struct ParseColorError {
    /// What was being parsed.
    kind: &'static str,
    /// The rejected input.
    value: String,
}

/// Violations of the pixel buffer's calling contract.
///
/// These are programming errors at the call site and are never worth retrying.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum PixelError {
    /// The pixel index is past the end of the strip.
    #[snafu(display("pixel {index} out of range for a strip of {len} pixels"))]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of pixels.
        len: usize,
    },
    /// A bulk setter received the wrong number of pixels.
    #[snafu(display("expected {expected} pixels, got {actual}"))]
    LengthMismatch {
        /// The number of pixels of the strip.
        expected: usize,
        /// The number of pixels passed in.
        actual: usize,
    },
    /// A bulk setter does not match the strip's color model.
    #[snafu(display("strip has {actual} color channels, setter needs {expected}"))]
    ChannelMismatch {
        /// Channels written by the setter.
        expected: usize,
        /// Channels configured on the strip.
        actual: usize,
    },
}

/// Errors of the [`Ws281x`](crate::ws281x::Ws281x) driver.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Ws281xError {
    /// Couldn't init RPi.
    Init {
        /// The hardware handle error.
        source: RpiError,
    },
    /// The configuration cannot describe a strip.
    #[snafu(display("invalid configuration: {reason}"))]
    InvalidConfig {
        /// What is wrong.
        reason: &'static str,
    },
    /// Couldn't get DMA buffer.
    GetDmaBuf {
        /// The allocation error.
        source: DmaError,
    },
    /// Couldn't init DMA registers.
    InitDma {
        /// The register error.
        source: PeripheralError,
    },
    /// Couldn't init GPIO.
    InitGpio {
        /// The register error.
        source: PeripheralError,
    },
    /// Couldn't init PWM.
    InitPwm {
        /// The register error.
        source: PeripheralError,
    },
    /// Pre-DMA wait failed.
    Wait {
        /// The register error.
        source: PeripheralError,
    },
    /// Couldn't start DMA.
    Start {
        /// The register error.
        source: PeripheralError,
    },
    /// Couldn't stop PWM.
    Stop {
        /// The register error.
        source: PeripheralError,
    },
    /// Couldn't free DMA buffer.
    FreeDmaBuf {
        /// The release error.
        source: DmaError,
    },
    /// The driver has already been closed.
    Closed,
}

/// Errors of the [`Lpd8806`](crate::lpd8806::Lpd8806) driver.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Lpd8806Error {
    /// Couldn't set SPI speed.
    #[snafu(display("couldn't set SPI speed to {hz} Hz"))]
    SpiSpeed {
        /// The requested clock speed.
        hz: u32,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// Writing to the SPI device failed.
    Write {
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The strip has already been closed.
    StripClosed,
}
