// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error taxonomy shared by the bootloader core.

use core::fmt;

/// Serial link failures reported by a [`SerialLink`](crate::hal::SerialLink).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No byte arrived before the timeout expired.
    Timeout,
    /// The link reported a receive or transmit fault.
    Io,
}

/// Malformed frame structure on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramingError {
    /// No start-of-frame marker within the resync bound.
    SofNotFound,
    /// The byte after the checksum was not the end-of-frame marker.
    BadEof(u8),
    /// Type byte is not Start, Data or End.
    UnknownType(u8),
    /// Declared payload length exceeds `MAX_PAYLOAD_LEN`.
    PayloadTooLong(u16),
}

/// Flash controller failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    Unlock,
    Erase,
    /// Erase completed but the sector did not read back blank.
    NotBlank { addr: u32 },
    Program { addr: u32 },
}

/// Invalid addresses, sector ids or bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Sector id outside the primary, backup and config sectors.
    InvalidSector(u8),
    /// Address is not a firmware slot base.
    InvalidSlot(u32),
    /// Address is not the base of any managed sector.
    InvalidRegion(u32),
    /// Write would run past the end of its sector.
    OutOfBounds { offset: u32, len: u32 },
    /// Copy source and destination are the same slot.
    SameSlot(u32),
}

/// Bootloader core error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Transport(TransportError),
    Framing(FramingError),
    /// Frame checksum or whole-slot checksum mismatch.
    Integrity { expected: u8, actual: u8 },
    Flash(FlashError),
    Config(ConfigError),
}

impl Error {
    /// Flash failures leave the device in an uncertain state and must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Flash(_))
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<FramingError> for Error {
    fn from(e: FramingError) -> Self {
        Error::Framing(e)
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Error::Flash(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => f.write_str("timed out waiting for byte"),
            TransportError::Io => f.write_str("serial link fault"),
        }
    }
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::SofNotFound => f.write_str("start of frame not found"),
            FramingError::BadEof(b) => write!(f, "bad end of frame marker 0x{:02x}", b),
            FramingError::UnknownType(t) => write!(f, "unknown frame type 0x{:02x}", t),
            FramingError::PayloadTooLong(n) => write!(f, "payload length {} too long", n),
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::Unlock => f.write_str("flash unlock failed"),
            FlashError::Erase => f.write_str("flash erase failed"),
            FlashError::NotBlank { addr } => write!(f, "flash not blank at 0x{:08x}", addr),
            FlashError::Program { addr } => write!(f, "flash program failed at 0x{:08x}", addr),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSector(id) => write!(f, "sector {} is not managed", id),
            ConfigError::InvalidSlot(addr) => write!(f, "0x{:08x} is not a firmware slot", addr),
            ConfigError::InvalidRegion(addr) => {
                write!(f, "0x{:08x} is not a managed sector base", addr)
            }
            ConfigError::OutOfBounds { offset, len } => {
                write!(f, "{} bytes at offset {} exceed the sector", len, offset)
            }
            ConfigError::SameSlot(addr) => write!(f, "cannot copy slot 0x{:08x} onto itself", addr),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Framing(e) => write!(f, "framing error: {}", e),
            Error::Integrity { expected, actual } => write!(
                f,
                "checksum mismatch: expected 0x{:02x}, got 0x{:02x}",
                expected, actual
            ),
            Error::Flash(e) => write!(f, "flash error: {}", e),
            Error::Config(e) => write!(f, "config error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
