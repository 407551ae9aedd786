// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire protocol shared by the bootloader and the host uploader.
//!
//! Frame layout (all fields little-endian):
//!
//! ```text
//! [SOF 0x1A][type][len: u16][payload: len bytes][checksum: u8][EOF 0xF3]
//! ```
//!
//! The checksum is the XOR of every payload byte. Responses are single bytes
//! (`ACK`, `NACK`, `READY`).

use heapless::Vec;

use crate::error::{ConfigError, Error, FramingError};

// --- Wire constants ---

pub const SOF: u8 = 0x1A;
pub const EOF: u8 = 0xF3;

pub const ACK: u8 = 0xAA;
pub const NACK: u8 = 0xFF;

/// Sent by the bootloader once it is waiting for a Start frame.
pub const READY: u8 = 0xA2;

/// Command byte that forces update mode during the listen window.
pub const FORCE_UPDATE: u8 = 0x34;

/// Maximum payload carried by one frame.
pub const MAX_PAYLOAD_LEN: usize = 2048;

/// Frame retransmissions allowed per receive call (after the first attempt).
pub const MAX_RETRIES: u8 = 5;

/// Non-SOF bytes skipped while resynchronizing before an attempt fails.
pub const MAX_SOF_RETRIES: u8 = 10;

/// SOF + type + len(2) + checksum + EOF.
pub const FRAME_OVERHEAD: usize = 6;

pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FrameType {
    Start = 0x31,
    End = 0x32,
    Data = 0x33,
}

impl FrameType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x31 => Some(FrameType::Start),
            0x32 => Some(FrameType::End),
            0x33 => Some(FrameType::Data),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = FramingError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_byte(byte).ok_or(FramingError::UnknownType(byte))
    }
}

/// One decoded frame. Only lives for the duration of a receive call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFrame {
    pub frame_type: FrameType,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    pub checksum: u8,
}

impl DataFrame {
    pub fn payload_len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// True when the checksum field matches the XOR-fold of the payload.
    pub fn checksum_valid(&self) -> bool {
        payload_checksum(&self.payload) == self.checksum
    }
}

/// XOR-fold of the payload bytes.
///
/// An empty payload folds to `0x00`, the identity of XOR, which is also what the
/// uploader puts on the wire for empty Start/End frames.
pub fn payload_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Fold a 32-bit checksum to 8 bits by XOR-ing its four bytes.
pub fn fold_crc32(crc: u32) -> u8 {
    let [a, b, c, d] = crc.to_le_bytes();
    a ^ b ^ c ^ d
}

/// Encode a frame into `out`, returning the number of bytes written.
pub fn encode_frame(frame_type: FrameType, payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FramingError::PayloadTooLong(payload.len().min(u16::MAX as usize) as u16).into());
    }
    let total = payload.len() + FRAME_OVERHEAD;
    if out.len() < total {
        return Err(ConfigError::OutOfBounds {
            offset: 0,
            len: total as u32,
        }
        .into());
    }

    let len = (payload.len() as u16).to_le_bytes();
    out[0] = SOF;
    out[1] = frame_type.as_byte();
    out[2] = len[0];
    out[3] = len[1];
    out[4..4 + payload.len()].copy_from_slice(payload);
    out[4 + payload.len()] = payload_checksum(payload);
    out[5 + payload.len()] = EOF;

    Ok(total)
}
