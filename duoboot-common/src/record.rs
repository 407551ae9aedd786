// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Persisted boot record and its on-flash encoding.

/// First-boot marker byte: device needs provisioning.
pub const FIRST_BOOT_TRUE: u8 = 0xFF;
/// First-boot marker byte: a verified image has been installed.
pub const FIRST_BOOT_FALSE: u8 = 0x11;

/// Number of bytes the record occupies in flash.
pub const RECORD_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirstBoot {
    True,
    False,
    /// Any non-canonical byte; treated as tampering.
    Unknown(u8),
}

impl FirstBoot {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            FIRST_BOOT_TRUE => FirstBoot::True,
            FIRST_BOOT_FALSE => FirstBoot::False,
            other => FirstBoot::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            FirstBoot::True => FIRST_BOOT_TRUE,
            FirstBoot::False => FIRST_BOOT_FALSE,
            FirstBoot::Unknown(b) => b,
        }
    }

    pub fn is_canonical(self) -> bool {
        !matches!(self, FirstBoot::Unknown(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootRecord {
    pub first_boot: FirstBoot,
    /// Folded checksum of the primary slot; meaningful once `first_boot` is False.
    pub primary_crc: u8,
    /// Folded checksum of the backup slot; meaningful once `first_boot` is False.
    pub backup_crc: u8,
    /// Reserved.
    pub status_flag: u8,
    pub primary_slot_addr: u32,
}

impl BootRecord {
    /// Record for a device that still has to receive its first image.
    pub fn provisioning(primary_slot_addr: u32) -> Self {
        Self {
            first_boot: FirstBoot::True,
            primary_crc: 0xFF,
            backup_crc: 0xFF,
            status_flag: 0xFF,
            primary_slot_addr,
        }
    }

    /// Record after a verified image landed in both slots.
    pub fn installed(self, crc: u8) -> Self {
        Self {
            first_boot: FirstBoot::False,
            primary_crc: crc,
            backup_crc: crc,
            ..self
        }
    }

    pub fn needs_provisioning(&self) -> bool {
        self.first_boot != FirstBoot::False
    }
}

/// Versioned record encodings. Only callers of [`RecordLayout::encode`] and
/// [`RecordLayout::decode`] know about byte offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordLayout {
    /// Two words: `status<<24 | backup_crc<<16 | primary_crc<<8 | first_boot`,
    /// then `primary_slot_addr`.
    V1,
}

impl RecordLayout {
    pub const CURRENT: RecordLayout = RecordLayout::V1;

    pub fn encode(self, record: &BootRecord) -> [u32; 2] {
        match self {
            RecordLayout::V1 => [
                (record.status_flag as u32) << 24
                    | (record.backup_crc as u32) << 16
                    | (record.primary_crc as u32) << 8
                    | record.first_boot.as_byte() as u32,
                record.primary_slot_addr,
            ],
        }
    }

    pub fn decode(self, words: [u32; 2]) -> BootRecord {
        match self {
            RecordLayout::V1 => {
                let [first_boot, primary_crc, backup_crc, status_flag] = words[0].to_le_bytes();
                BootRecord {
                    first_boot: FirstBoot::from_byte(first_boot),
                    primary_crc,
                    backup_crc,
                    status_flag,
                    primary_slot_addr: words[1],
                }
            }
        }
    }

    /// Decode from raw little-endian flash bytes.
    pub fn decode_bytes(self, bytes: &[u8; RECORD_LEN]) -> BootRecord {
        let w0 = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let w1 = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        self.decode([w0, w1])
    }
}
