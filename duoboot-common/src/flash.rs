// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash manager: sector erase, programming, slot checksums and slot mirroring.
//!
//! Only the three sectors named by the [`FlashLayout`] can be touched. Every
//! erase is verified by reading the sector back.

use crate::error::{ConfigError, Error, FlashError, Result};
use crate::hal::{ChecksumUnit, FlashDevice};
use crate::layout::{FlashLayout, Sector};
use crate::log;
use crate::protocol::fold_crc32;

/// Read chunk used for blank checks, checksums and copies.
const CHUNK_LEN: usize = 256;

const ERASED: u8 = 0xFF;

pub struct FlashManager<F, C> {
    device: F,
    crc: C,
    layout: FlashLayout,
}

impl<F: FlashDevice, C: ChecksumUnit> FlashManager<F, C> {
    pub fn new(device: F, crc: C, layout: FlashLayout) -> Self {
        Self {
            device,
            crc,
            layout,
        }
    }

    pub fn layout(&self) -> &FlashLayout {
        &self.layout
    }

    pub fn device(&self) -> &F {
        &self.device
    }

    /// Membership test against the primary and backup slot bases.
    pub fn is_valid_slot(&self, addr: u32) -> bool {
        self.layout.slot(addr).is_some()
    }

    /// Sector holding the slot at `addr`.
    pub fn sector_for_slot(&self, addr: u32) -> Result<Sector> {
        self.layout
            .slot(addr)
            .ok_or(Error::Config(ConfigError::InvalidSlot(addr)))
    }

    /// Erase one managed sector and verify it reads back blank.
    pub fn erase_sector(&mut self, sector_id: u8) -> Result<()> {
        let sector = self
            .layout
            .sector(sector_id)
            .ok_or(Error::Config(ConfigError::InvalidSector(sector_id)))?;

        log::debug!("Erasing sector {} at 0x{:08x}", sector.id, sector.base);
        self.device.erase(sector.base, sector.size)?;
        self.verify_blank(&sector)
    }

    /// Program `bytes` at `base_addr + offset`, one device unit at a time.
    pub fn program(&mut self, base_addr: u32, bytes: &[u8], offset: u32) -> Result<()> {
        let sector = self
            .layout
            .sector_at(base_addr)
            .ok_or(Error::Config(ConfigError::InvalidRegion(base_addr)))?;

        let len = bytes.len() as u32;
        let fits = offset
            .checked_add(len)
            .is_some_and(|end| end <= sector.size);
        if !fits {
            return Err(ConfigError::OutOfBounds { offset, len }.into());
        }

        let mut addr = base_addr + offset;
        for unit in bytes.chunks(F::PROGRAM_UNIT.max(1)) {
            self.device.program(addr, unit)?;
            addr += unit.len() as u32;
        }
        Ok(())
    }

    /// Checksum of a whole slot sector, folded to 8 bits.
    pub fn checksum_region(&mut self, base_addr: u32) -> Result<u8> {
        let sector = self.sector_for_slot(base_addr)?;

        self.crc.reset();
        let mut buf = [0u8; CHUNK_LEN];
        let mut addr = sector.base;
        while addr < sector.end() {
            let n = ((sector.end() - addr) as usize).min(CHUNK_LEN);
            self.device.read(addr, &mut buf[..n]);
            for word in buf[..n].chunks_exact(4) {
                self.crc
                    .feed(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
            }
            addr += n as u32;
        }

        let crc = self.crc.finish();
        log::debug!("Slot 0x{:08x} crc 0x{:08x}", base_addr, crc);
        Ok(fold_crc32(crc))
    }

    /// Erase `dst` and reprogram it with the contents of `src`.
    pub fn copy_sector(&mut self, src: u32, dst: u32) -> Result<()> {
        let src_sector = self.sector_for_slot(src)?;
        let dst_sector = self.sector_for_slot(dst)?;
        if src == dst {
            return Err(ConfigError::SameSlot(src).into());
        }

        log::info!("Copying slot 0x{:08x} -> 0x{:08x}", src, dst);
        self.erase_sector(dst_sector.id)?;

        let len = src_sector.size.min(dst_sector.size);
        let mut buf = [0u8; CHUNK_LEN];
        let mut offset = 0u32;
        while offset < len {
            let n = ((len - offset) as usize).min(CHUNK_LEN);
            self.device.read(src + offset, &mut buf[..n]);
            // Erased bytes need no programming.
            if buf[..n].iter().any(|&b| b != ERASED) {
                self.program(dst, &buf[..n], offset)?;
            }
            offset += n as u32;
        }
        Ok(())
    }

    /// Read raw bytes from anywhere in flash.
    pub fn read(&self, addr: u32, buf: &mut [u8]) {
        self.device.read(addr, buf);
    }

    fn verify_blank(&self, sector: &Sector) -> Result<()> {
        let mut buf = [0u8; CHUNK_LEN];
        let mut addr = sector.base;
        while addr < sector.end() {
            let n = ((sector.end() - addr) as usize).min(CHUNK_LEN);
            self.device.read(addr, &mut buf[..n]);
            if let Some(pos) = buf[..n].iter().position(|&b| b != ERASED) {
                let addr = addr + pos as u32;
                log::error!("Erase verify failed at 0x{:08x}", addr);
                return Err(FlashError::NotBlank { addr }.into());
            }
            addr += n as u32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SoftCrc32;
    use crate::layout::Sector;

    /// Minimal NOR model: erase sets 0xFF, program ANDs bits in.
    struct RamFlash {
        base: u32,
        mem: std::vec::Vec<u8>,
        stuck_erase: bool,
    }

    impl FlashDevice for RamFlash {
        const PROGRAM_UNIT: usize = 4;

        fn erase(&mut self, addr: u32, len: u32) -> core::result::Result<(), FlashError> {
            let start = (addr - self.base) as usize;
            for b in &mut self.mem[start..start + len as usize] {
                *b = 0xFF;
            }
            if self.stuck_erase {
                self.mem[start] = 0x00;
            }
            Ok(())
        }

        fn program(&mut self, addr: u32, data: &[u8]) -> core::result::Result<(), FlashError> {
            assert!(data.len() <= Self::PROGRAM_UNIT);
            let start = (addr - self.base) as usize;
            for (cell, &b) in self.mem[start..start + data.len()].iter_mut().zip(data) {
                *cell &= b;
            }
            Ok(())
        }

        fn read(&self, addr: u32, buf: &mut [u8]) {
            let start = (addr - self.base) as usize;
            buf.copy_from_slice(&self.mem[start..start + buf.len()]);
        }
    }

    fn layout() -> FlashLayout {
        FlashLayout::new(
            Sector::new(2, 0x0000, 0x100),
            Sector::new(5, 0x0400, 0x400),
            Sector::new(6, 0x0800, 0x400),
        )
    }

    fn manager() -> FlashManager<RamFlash, SoftCrc32> {
        let flash = RamFlash {
            base: 0,
            mem: std::vec![0xFF; 0xC00],
            stuck_erase: false,
        };
        FlashManager::new(flash, SoftCrc32::new(), layout())
    }

    #[test]
    fn test_erase_rejects_unmanaged_sector() {
        let mut fm = manager();
        assert_eq!(
            fm.erase_sector(3),
            Err(Error::Config(ConfigError::InvalidSector(3)))
        );
    }

    #[test]
    fn test_erase_detects_non_blank_result() {
        let mut fm = manager();
        fm.device.stuck_erase = true;
        assert_eq!(
            fm.erase_sector(5),
            Err(Error::Flash(FlashError::NotBlank { addr: 0x0400 }))
        );
    }

    #[test]
    fn test_program_uses_explicit_offset() {
        let mut fm = manager();
        fm.program(0x0400, &[1, 2, 3, 4, 5, 6], 0x10).unwrap();
        let mut buf = [0u8; 6];
        fm.read(0x0410, &mut buf);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_program_rejects_write_past_sector_end() {
        let mut fm = manager();
        assert_eq!(
            fm.program(0x0400, &[0; 8], 0x3FC),
            Err(Error::Config(ConfigError::OutOfBounds {
                offset: 0x3FC,
                len: 8
            }))
        );
    }

    #[test]
    fn test_checksum_rejects_non_slot_address() {
        let mut fm = manager();
        assert_eq!(
            fm.checksum_region(0x0000),
            Err(Error::Config(ConfigError::InvalidSlot(0x0000)))
        );
    }

    #[test]
    fn test_checksum_of_identical_slots_matches() {
        let mut fm = manager();
        fm.program(0x0400, b"firmware", 0).unwrap();
        fm.program(0x0800, b"firmware", 0).unwrap();
        let a = fm.checksum_region(0x0400).unwrap();
        let b = fm.checksum_region(0x0800).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_copy_sector_mirrors_contents() {
        let mut fm = manager();
        fm.program(0x0400, &[0xA5; 0x300], 0).unwrap();
        fm.program(0x0800, &[0x00; 0x10], 0x3F0).unwrap();
        fm.copy_sector(0x0400, 0x0800).unwrap();

        let mut a = [0u8; 0x400];
        let mut b = [0u8; 0x400];
        fm.read(0x0400, &mut a);
        fm.read(0x0800, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_copy_sector_onto_itself_is_rejected() {
        let mut fm = manager();
        assert_eq!(
            fm.copy_sector(0x0400, 0x0400),
            Err(Error::Config(ConfigError::SameSlot(0x0400)))
        );
    }

    #[test]
    fn test_is_valid_slot() {
        let fm = manager();
        assert!(fm.is_valid_slot(0x0400));
        assert!(fm.is_valid_slot(0x0800));
        assert!(!fm.is_valid_slot(0x0000));
        assert!(!fm.is_valid_slot(0x0401));
    }
}
