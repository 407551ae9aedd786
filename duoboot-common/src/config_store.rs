// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Load and save the persisted [`BootRecord`].
//!
//! Saving erases the whole config sector and programs the record back as two
//! separate word writes. A power loss between the erase and the second write
//! leaves a partial record; `load` still decodes it and the boot sequence treats
//! the result like any other non-canonical record.

use crate::error::Result;
use crate::flash::FlashManager;
use crate::hal::{ChecksumUnit, FlashDevice};
use crate::layout::Sector;
use crate::log;
use crate::record::{BootRecord, RecordLayout, RECORD_LEN};

pub struct ConfigStore {
    sector: Sector,
    format: RecordLayout,
}

impl ConfigStore {
    pub fn new(sector: Sector) -> Self {
        Self {
            sector,
            format: RecordLayout::CURRENT,
        }
    }

    /// Read the record. Never fails: erased flash decodes to a first-boot record.
    pub fn load<F: FlashDevice, C: ChecksumUnit>(&self, flash: &FlashManager<F, C>) -> BootRecord {
        let mut raw = [0u8; RECORD_LEN];
        flash.read(self.sector.base, &mut raw);
        self.format.decode_bytes(&raw)
    }

    /// Erase the config sector and write the record back.
    pub fn save<F: FlashDevice, C: ChecksumUnit>(
        &self,
        flash: &mut FlashManager<F, C>,
        record: &BootRecord,
    ) -> Result<()> {
        log::info!(
            "Saving boot record: first_boot={}, primary_crc=0x{:02x}, backup_crc=0x{:02x}",
            record.first_boot,
            record.primary_crc,
            record.backup_crc
        );

        flash.erase_sector(self.sector.id)?;

        let words = self.format.encode(record);
        flash.program(self.sector.base, &words[0].to_le_bytes(), 0)?;
        flash.program(self.sector.base, &words[1].to_le_bytes(), 4)?;
        Ok(())
    }
}
