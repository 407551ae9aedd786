// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash layout: config record sector plus primary and backup firmware slots.

// --- Flash layout constants (RP2040, 2 MB QSPI flash) ---

pub const FLASH_BASE: u32 = 0x1000_0000;

/// Physical erase granule of the QSPI flash.
pub const FLASH_SECTOR_SIZE: u32 = 4096;
/// Physical program granule of the QSPI flash.
pub const FLASH_PAGE_SIZE: u32 = 256;

pub const CONFIG_SECTOR_ID: u8 = 2;
pub const CONFIG_ADDR: u32 = 0x1000_F000;
pub const CONFIG_SECTOR_SIZE: u32 = FLASH_SECTOR_SIZE;

pub const PRIMARY_SECTOR_ID: u8 = 5;
pub const PRIMARY_SLOT_ADDR: u32 = 0x1002_0000;

pub const BACKUP_SECTOR_ID: u8 = 6;
pub const BACKUP_SLOT_ADDR: u32 = 0x1004_0000;

/// Each slot is one logical sector of 128 KB.
pub const SLOT_SIZE: u32 = 0x0002_0000;

/// A logical erase sector managed by the bootloader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sector {
    pub id: u8,
    pub base: u32,
    pub size: u32,
}

impl Sector {
    pub const fn new(id: u8, base: u32, size: u32) -> Self {
        Self { id, base, size }
    }

    pub fn end(&self) -> u32 {
        self.base + self.size
    }

    pub fn contains(&self, addr: u32) -> bool {
        (self.base..self.end()).contains(&addr)
    }
}

/// The three sectors the bootloader is allowed to touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashLayout {
    pub config: Sector,
    pub primary: Sector,
    pub backup: Sector,
}

impl FlashLayout {
    pub const fn new(config: Sector, primary: Sector, backup: Sector) -> Self {
        Self {
            config,
            primary,
            backup,
        }
    }

    /// Sector lookup by logical id.
    pub fn sector(&self, id: u8) -> Option<Sector> {
        self.sectors().into_iter().find(|s| s.id == id)
    }

    /// Sector lookup by base address.
    pub fn sector_at(&self, base: u32) -> Option<Sector> {
        self.sectors().into_iter().find(|s| s.base == base)
    }

    /// Firmware slot sector for a slot base address; `None` for the config sector.
    pub fn slot(&self, addr: u32) -> Option<Sector> {
        [self.primary, self.backup]
            .into_iter()
            .find(|s| s.base == addr)
    }

    pub fn sectors(&self) -> [Sector; 3] {
        [self.config, self.primary, self.backup]
    }

    /// True when no two sectors overlap and slots share one size.
    pub fn is_consistent(&self) -> bool {
        let s = self.sectors();
        let disjoint = |a: &Sector, b: &Sector| a.end() <= b.base || b.end() <= a.base;
        disjoint(&s[0], &s[1])
            && disjoint(&s[0], &s[2])
            && disjoint(&s[1], &s[2])
            && self.primary.size == self.backup.size
            && s[0].id != s[1].id
            && s[0].id != s[2].id
            && s[1].id != s[2].id
    }
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self::new(
            Sector::new(CONFIG_SECTOR_ID, CONFIG_ADDR, CONFIG_SECTOR_SIZE),
            Sector::new(PRIMARY_SECTOR_ID, PRIMARY_SLOT_ADDR, SLOT_SIZE),
            Sector::new(BACKUP_SECTOR_ID, BACKUP_SLOT_ADDR, SLOT_SIZE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_consistent() {
        assert!(FlashLayout::default().is_consistent());
    }

    #[test]
    fn test_sectors_are_erase_aligned() {
        for s in FlashLayout::default().sectors() {
            assert_eq!(s.base % FLASH_SECTOR_SIZE, 0);
            assert_eq!(s.size % FLASH_SECTOR_SIZE, 0);
            assert!(s.base > FLASH_BASE);
        }
    }

    #[test]
    fn test_lookup_by_id_and_address() {
        let layout = FlashLayout::default();
        assert_eq!(layout.sector(PRIMARY_SECTOR_ID), Some(layout.primary));
        assert_eq!(layout.sector(CONFIG_SECTOR_ID), Some(layout.config));
        assert_eq!(layout.sector(7), None);
        assert_eq!(layout.sector_at(BACKUP_SLOT_ADDR), Some(layout.backup));
        assert_eq!(layout.slot(CONFIG_ADDR), None);
        assert_eq!(layout.slot(PRIMARY_SLOT_ADDR), Some(layout.primary));
    }

    #[test]
    fn test_overlapping_layout_is_rejected() {
        let layout = FlashLayout::new(
            Sector::new(1, 0x0000, 0x100),
            Sector::new(2, 0x0100, 0x200),
            Sector::new(3, 0x0200, 0x200),
        );
        assert!(!layout.is_consistent());
    }
}
