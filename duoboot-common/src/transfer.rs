// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Transfer protocol engine: framed firmware download over a serial link.
//!
//! Session flow as seen on the wire:
//!
//! ```text
//! device                      host
//!   READY  ------------------>
//!          <------------------  Start
//!   (erase target slot)
//!   ACK    ------------------>
//!          <------------------  Data ...   (ACK / NACK per frame)
//!          <------------------  End
//!   ACK    ------------------>
//! ```

use heapless::Vec;

use crate::error::{Error, FramingError, Result};
use crate::flash::FlashManager;
use crate::hal::{ChecksumUnit, FlashDevice, SerialLink};
use crate::log;
use crate::protocol::{
    payload_checksum, DataFrame, FrameType, ACK, EOF, MAX_PAYLOAD_LEN, MAX_RETRIES,
    MAX_SOF_RETRIES, NACK, READY, SOF,
};

/// Per-byte timeout while a frame is being received.
pub const FRAME_BYTE_TIMEOUT_MS: u32 = 5_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferConfig {
    pub byte_timeout_ms: u32,
    /// Retransmissions requested (via NACK) per frame before giving up.
    pub max_retries: u8,
    /// Non-SOF bytes skipped per attempt before the attempt fails.
    pub max_sof_retries: u8,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            byte_timeout_ms: FRAME_BYTE_TIMEOUT_MS,
            max_retries: MAX_RETRIES,
            max_sof_retries: MAX_SOF_RETRIES,
        }
    }
}

/// Write cursor for one download. Created fresh by every
/// [`TransferEngine::download_and_flash`] call.
#[derive(Debug)]
struct TransferSession {
    target: u32,
    offset: u32,
}

impl TransferSession {
    fn new(target: u32) -> Self {
        Self { target, offset: 0 }
    }

    fn write<F: FlashDevice, C: ChecksumUnit>(
        &mut self,
        flash: &mut FlashManager<F, C>,
        payload: &[u8],
    ) -> Result<()> {
        flash.program(self.target, payload, self.offset)?;
        self.offset += payload.len() as u32;
        Ok(())
    }
}

pub struct TransferEngine<L> {
    link: L,
    config: TransferConfig,
}

impl<L: SerialLink> TransferEngine<L> {
    pub fn new(link: L, config: TransferConfig) -> Self {
        Self { link, config }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Send a single response byte.
    pub fn send(&mut self, byte: u8) -> Result<()> {
        self.link.write_byte(byte)?;
        Ok(())
    }

    /// Wait for one raw byte, used for the command window before a frame exchange.
    pub fn wait_for_byte(&mut self, timeout_ms: u32) -> Result<u8> {
        Ok(self.link.read_byte(timeout_ms)?)
    }

    /// Receive one valid frame, NACK-ing and retrying bad ones.
    ///
    /// Valid Data and End frames are ACKed here. A Start frame is not: the
    /// caller ACKs it once the target slot has been erased, so the sender cannot
    /// push data while the erase is still running.
    pub fn receive_frame(&mut self) -> Result<DataFrame> {
        let mut last_err = Error::Framing(FramingError::SofNotFound);

        for attempt in 0..=self.config.max_retries {
            match self.read_frame() {
                Ok(frame) => {
                    if frame.frame_type != FrameType::Start {
                        self.send(ACK)?;
                    }
                    return Ok(frame);
                }
                Err(e) => {
                    log::warn!("Frame attempt {} rejected: {}", attempt + 1, e);
                    self.send(NACK)?;
                    last_err = e;
                }
            }
        }

        log::error!("Frame retries exhausted");
        Err(last_err)
    }

    /// Receive an image into the slot at `target_addr`.
    ///
    /// Returns the number of image bytes written. On failure, whatever was
    /// already programmed stays in the slot.
    pub fn download_and_flash<F: FlashDevice, C: ChecksumUnit>(
        &mut self,
        flash: &mut FlashManager<F, C>,
        target_addr: u32,
    ) -> Result<u32> {
        let sector = flash.sector_for_slot(target_addr)?;

        log::info!("Waiting for firmware");
        self.send(READY)?;

        loop {
            let frame = self.receive_frame()?;
            if frame.frame_type == FrameType::Start {
                break;
            }
            log::debug!("Ignoring {} frame before Start", frame.frame_type);
        }

        log::info!("Download starting, erasing slot 0x{:08x}", target_addr);
        flash.erase_sector(sector.id)?;
        self.send(ACK)?;

        let mut session = TransferSession::new(target_addr);
        loop {
            let frame = self.receive_frame()?;
            match frame.frame_type {
                FrameType::Data => session.write(flash, &frame.payload)?,
                FrameType::End => {
                    log::info!("Finished writing new firmware ({} bytes)", session.offset);
                    return Ok(session.offset);
                }
                FrameType::Start => {
                    // The host missed our ACK and resent Start.
                    log::warn!("Repeated Start frame at offset {}", session.offset);
                    self.send(ACK)?;
                }
            }
        }
    }

    fn resync(&mut self) -> Result<()> {
        for _ in 0..=self.config.max_sof_retries {
            match self.link.read_byte(self.config.byte_timeout_ms) {
                Ok(SOF) => return Ok(()),
                Ok(_) => {}
                Err(e) => log::debug!("Resync read failed: {}", e),
            }
        }
        Err(FramingError::SofNotFound.into())
    }

    fn read_byte(&mut self) -> Result<u8> {
        Ok(self.link.read_byte(self.config.byte_timeout_ms)?)
    }

    /// One attempt at reading a frame. The whole frame is consumed before it is
    /// validated so the next attempt starts at a frame boundary.
    fn read_frame(&mut self) -> Result<DataFrame> {
        self.resync()?;

        let type_byte = self.read_byte()?;
        let len = u16::from_le_bytes([self.read_byte()?, self.read_byte()?]);
        if len as usize > MAX_PAYLOAD_LEN {
            return Err(FramingError::PayloadTooLong(len).into());
        }

        let mut payload: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
        for _ in 0..len {
            let byte = self.read_byte()?;
            payload
                .push(byte)
                .map_err(|_| FramingError::PayloadTooLong(len))?;
        }
        let checksum = self.read_byte()?;
        let eof = self.read_byte()?;

        if eof != EOF {
            return Err(FramingError::BadEof(eof).into());
        }
        let frame_type = FrameType::try_from(type_byte)?;

        let actual = payload_checksum(&payload);
        if actual != checksum {
            return Err(Error::Integrity {
                expected: checksum,
                actual,
            });
        }

        Ok(DataFrame {
            frame_type,
            payload,
            checksum,
        })
    }
}
