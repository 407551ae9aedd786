// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for wire constants, frame encoding and the flash layout.

use duoboot_common::layout::{
    BACKUP_SECTOR_ID, BACKUP_SLOT_ADDR, CONFIG_ADDR, CONFIG_SECTOR_ID, FLASH_BASE,
    FLASH_PAGE_SIZE, FLASH_SECTOR_SIZE, PRIMARY_SECTOR_ID, PRIMARY_SLOT_ADDR, SLOT_SIZE,
};
use duoboot_common::protocol::{
    encode_frame, payload_checksum, ACK, EOF, FORCE_UPDATE, MAX_FRAME_LEN, MAX_PAYLOAD_LEN,
    MAX_RETRIES, MAX_SOF_RETRIES, NACK, READY, SOF,
};
use duoboot_common::{Error, FlashLayout, FrameType, FramingError};

// --- Wire constants ---

#[test]
fn test_frame_markers() {
    assert_eq!(SOF, 0x1A);
    assert_eq!(EOF, 0xF3);
}

#[test]
fn test_response_bytes() {
    assert_eq!(ACK, 0xAA);
    assert_eq!(NACK, 0xFF);
    assert_eq!(READY, 0xA2);
    assert_eq!(FORCE_UPDATE, 0x34);
}

#[test]
fn test_frame_type_bytes() {
    assert_eq!(FrameType::Start.as_byte(), 0x31);
    assert_eq!(FrameType::End.as_byte(), 0x32);
    assert_eq!(FrameType::Data.as_byte(), 0x33);
}

#[test]
fn test_unknown_frame_type_is_framing_error() {
    assert_eq!(FrameType::from_byte(0x30), None);
    assert_eq!(
        FrameType::try_from(0x34),
        Err(FramingError::UnknownType(0x34))
    );
}

#[test]
fn test_retry_bounds() {
    assert_eq!(MAX_RETRIES, 5);
    assert_eq!(MAX_SOF_RETRIES, 10);
    assert_eq!(MAX_PAYLOAD_LEN, 2048);
    assert_eq!(MAX_FRAME_LEN, 2048 + 6);
}

// --- Frame encoding ---

#[test]
fn test_empty_payload_checksum_is_zero() {
    assert_eq!(payload_checksum(&[]), 0x00);
}

#[test]
fn test_payload_checksum_is_xor_fold() {
    assert_eq!(payload_checksum(&[0x01, 0x02, 0x04]), 0x07);
    assert_eq!(payload_checksum(&[0xAA, 0xAA]), 0x00);
}

#[test]
fn test_encode_empty_start_frame() {
    let mut buf = [0u8; 8];
    let n = encode_frame(FrameType::Start, &[], &mut buf).unwrap();
    assert_eq!(&buf[..n], &[0x1A, 0x31, 0x00, 0x00, 0x00, 0xF3]);
}

#[test]
fn test_encode_length_is_little_endian() {
    let payload = [0x5Au8; 0x0102];
    let mut buf = [0u8; MAX_FRAME_LEN];
    let n = encode_frame(FrameType::Data, &payload, &mut buf).unwrap();
    assert_eq!(n, 0x0102 + 6);
    assert_eq!(buf[2], 0x02);
    assert_eq!(buf[3], 0x01);
    assert_eq!(buf[n - 2], 0x00);
    assert_eq!(buf[n - 1], EOF);
}

#[test]
fn test_encode_rejects_oversized_payload() {
    let payload = [0u8; MAX_PAYLOAD_LEN + 1];
    let mut buf = [0u8; MAX_FRAME_LEN + 1];
    assert_eq!(
        encode_frame(FrameType::Data, &payload, &mut buf),
        Err(Error::Framing(FramingError::PayloadTooLong(2049)))
    );
}

// --- Flash layout ---

#[test]
fn test_flash_geometry() {
    assert_eq!(FLASH_BASE, 0x1000_0000);
    assert_eq!(FLASH_SECTOR_SIZE, 4096);
    assert_eq!(FLASH_PAGE_SIZE, 256);
}

#[test]
fn test_sector_ids() {
    assert_eq!(CONFIG_SECTOR_ID, 2);
    assert_eq!(PRIMARY_SECTOR_ID, 5);
    assert_eq!(BACKUP_SECTOR_ID, 6);
}

#[test]
fn test_default_layout_addresses() {
    let layout = FlashLayout::default();
    assert_eq!(layout.config.base, CONFIG_ADDR);
    assert_eq!(layout.primary.base, PRIMARY_SLOT_ADDR);
    assert_eq!(layout.backup.base, BACKUP_SLOT_ADDR);
    assert_eq!(layout.primary.size, SLOT_SIZE);
    assert_eq!(layout.backup.size, SLOT_SIZE);
}

#[test]
fn test_default_layout_is_consistent() {
    assert!(FlashLayout::default().is_consistent());
}

#[test]
fn test_slots_are_sector_aligned() {
    assert_eq!(PRIMARY_SLOT_ADDR % FLASH_SECTOR_SIZE, 0);
    assert_eq!(BACKUP_SLOT_ADDR % FLASH_SECTOR_SIZE, 0);
    assert_eq!(CONFIG_ADDR % FLASH_SECTOR_SIZE, 0);
}

#[test]
fn test_slots_do_not_overlap() {
    assert!(PRIMARY_SLOT_ADDR + SLOT_SIZE <= BACKUP_SLOT_ADDR);
    assert!(CONFIG_ADDR + FLASH_SECTOR_SIZE <= PRIMARY_SLOT_ADDR);
}

#[test]
fn test_slot_lookup_only_matches_slot_bases() {
    let layout = FlashLayout::default();
    assert_eq!(layout.slot(PRIMARY_SLOT_ADDR), Some(layout.primary));
    assert_eq!(layout.slot(BACKUP_SLOT_ADDR), Some(layout.backup));
    assert_eq!(layout.slot(CONFIG_ADDR), None);
    assert_eq!(layout.slot(PRIMARY_SLOT_ADDR + 4), None);
}
