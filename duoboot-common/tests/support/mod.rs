// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-memory collaborators for host tests.

#![allow(dead_code)]

use std::collections::VecDeque;

use duoboot_common::error::{FlashError, TransportError};
use duoboot_common::hal::{FlashDevice, Platform, SerialLink};
use duoboot_common::protocol::{encode_frame, FrameType, FRAME_OVERHEAD};
use duoboot_common::record::{BootRecord, RecordLayout};
use duoboot_common::{FlashLayout, FlashManager, Sector, SoftCrc32};

pub const CONFIG_BASE: u32 = 0x1000;
pub const PRIMARY_BASE: u32 = 0x2000;
pub const BACKUP_BASE: u32 = 0x3000;
pub const SLOT_LEN: u32 = 0x1000;

pub const MEM_BASE: u32 = 0x1000;
pub const MEM_LEN: usize = 0x3000;

pub fn test_layout() -> FlashLayout {
    FlashLayout::new(
        Sector::new(2, CONFIG_BASE, 0x100),
        Sector::new(5, PRIMARY_BASE, SLOT_LEN),
        Sector::new(6, BACKUP_BASE, SLOT_LEN),
    )
}

// =============================================================================
// Flash
// =============================================================================

/// NOR flash model: erase sets bytes to 0xFF, programming can only clear bits.
pub struct SimFlash {
    mem: Vec<u8>,
    pub erase_calls: usize,
    pub program_calls: usize,
    /// Programming any byte at or after this address fails.
    pub fail_program_from: Option<u32>,
    /// Erase reports success but leaves this address programmed.
    pub stuck_after_erase: Option<u32>,
    pub fail_erase: bool,
    /// Programming this address silently drops bit 7.
    pub corrupt_program_at: Option<u32>,
}

impl SimFlash {
    pub fn new() -> Self {
        Self {
            mem: vec![0xFF; MEM_LEN],
            erase_calls: 0,
            program_calls: 0,
            fail_program_from: None,
            stuck_after_erase: None,
            fail_erase: false,
            corrupt_program_at: None,
        }
    }

    fn index(addr: u32) -> usize {
        (addr - MEM_BASE) as usize
    }

    /// Write bytes directly, bypassing NOR semantics and counters.
    pub fn poke(&mut self, addr: u32, bytes: &[u8]) {
        let i = Self::index(addr);
        self.mem[i..i + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, addr: u32, len: usize) -> &[u8] {
        let i = Self::index(addr);
        &self.mem[i..i + len]
    }

    pub fn write_record(&mut self, record: &BootRecord) {
        let words = RecordLayout::CURRENT.encode(record);
        self.poke(CONFIG_BASE, &words[0].to_le_bytes());
        self.poke(CONFIG_BASE + 4, &words[1].to_le_bytes());
    }

    pub fn read_record(&self) -> BootRecord {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.peek(CONFIG_BASE, 8));
        RecordLayout::CURRENT.decode_bytes(&raw)
    }

    pub fn slot(&self, base: u32) -> &[u8] {
        self.peek(base, SLOT_LEN as usize)
    }

    pub fn mutation_count(&self) -> usize {
        self.erase_calls + self.program_calls
    }
}

impl FlashDevice for SimFlash {
    const PROGRAM_UNIT: usize = 1;

    fn erase(&mut self, addr: u32, len: u32) -> Result<(), FlashError> {
        self.erase_calls += 1;
        if self.fail_erase {
            return Err(FlashError::Erase);
        }
        let i = Self::index(addr);
        self.mem[i..i + len as usize].fill(0xFF);
        if let Some(stuck) = self.stuck_after_erase {
            if (addr..addr + len).contains(&stuck) {
                self.mem[Self::index(stuck)] = 0x00;
            }
        }
        Ok(())
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        assert!(data.len() <= Self::PROGRAM_UNIT);
        self.program_calls += 1;
        if self.fail_program_from.is_some_and(|from| addr >= from) {
            return Err(FlashError::Program { addr });
        }
        let i = Self::index(addr);
        for (cell, &b) in self.mem[i..i + data.len()].iter_mut().zip(data) {
            *cell &= b;
        }
        if let Some(bad) = self.corrupt_program_at {
            if (addr..addr + data.len() as u32).contains(&bad) {
                self.mem[Self::index(bad)] &= 0x7F;
            }
        }
        Ok(())
    }

    fn read(&self, addr: u32, buf: &mut [u8]) {
        buf.copy_from_slice(self.peek(addr, buf.len()));
    }
}

pub fn flash_manager(flash: SimFlash) -> FlashManager<SimFlash, SoftCrc32> {
    FlashManager::new(flash, SoftCrc32::new(), test_layout())
}

/// Folded slot checksum of arbitrary slot contents, computed independently of
/// the device under test.
pub fn slot_checksum(contents: &[u8]) -> u8 {
    let mut flash = SimFlash::new();
    flash.poke(PRIMARY_BASE, contents);
    flash_manager(flash).checksum_region(PRIMARY_BASE).unwrap()
}

/// Flash holding an installed image mirrored into both slots.
pub fn installed_flash(image: &[u8]) -> SimFlash {
    let crc = slot_checksum(image);
    let mut flash = SimFlash::new();
    flash.poke(PRIMARY_BASE, image);
    flash.poke(BACKUP_BASE, image);
    flash.write_record(&BootRecord::provisioning(PRIMARY_BASE).installed(crc));
    flash
}

// =============================================================================
// Serial link
// =============================================================================

#[derive(Clone, Copy, Debug)]
pub enum Rx {
    Byte(u8),
    Timeout,
}

/// Serial link fed from a script; records everything sent.
pub struct ScriptedLink {
    rx: VecDeque<Rx>,
    pub sent: Vec<u8>,
    pub read_timeouts: Vec<u32>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            sent: Vec::new(),
            read_timeouts: Vec::new(),
        }
    }

    pub fn with_bytes(bytes: &[u8]) -> Self {
        let mut link = Self::new();
        link.push_bytes(bytes);
        link
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().map(|&b| Rx::Byte(b)));
    }

    pub fn push_timeout(&mut self) {
        self.rx.push_back(Rx::Timeout);
    }

    pub fn push_frame(&mut self, frame_type: FrameType, payload: &[u8]) {
        self.push_bytes(&frame(frame_type, payload));
    }

    pub fn remaining(&self) -> usize {
        self.rx.len()
    }

    pub fn count_sent(&self, byte: u8) -> usize {
        self.sent.iter().filter(|&&b| b == byte).count()
    }
}

impl SerialLink for ScriptedLink {
    fn read_byte(&mut self, timeout_ms: u32) -> Result<u8, TransportError> {
        self.read_timeouts.push(timeout_ms);
        match self.rx.pop_front() {
            Some(Rx::Byte(b)) => Ok(b),
            Some(Rx::Timeout) | None => Err(TransportError::Timeout),
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.sent.push(byte);
        Ok(())
    }
}

pub fn frame(frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; payload.len() + FRAME_OVERHEAD];
    let n = encode_frame(frame_type, payload, &mut out).unwrap();
    out.truncate(n);
    out
}

// =============================================================================
// Platform
// =============================================================================

/// Platform whose diverging calls panic; tests drive `run_cycle` instead.
#[derive(Default)]
pub struct TestPlatform {
    pub update_flag: bool,
    pub clear_calls: usize,
}

impl Platform for TestPlatform {
    fn update_requested(&mut self) -> bool {
        self.update_flag
    }

    fn clear_update_request(&mut self) {
        self.update_flag = false;
        self.clear_calls += 1;
    }

    fn hand_off(&mut self, slot_addr: u32) -> ! {
        panic!("hand_off(0x{:08x}) called from a test", slot_addr);
    }

    fn reset(&mut self) -> ! {
        panic!("reset called from a test");
    }

    fn halt(&mut self) -> ! {
        panic!("halt called from a test");
    }
}
