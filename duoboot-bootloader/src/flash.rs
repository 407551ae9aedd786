// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! RP2040 QSPI flash behind the [`FlashDevice`] seam, driven by the boot ROM.
//!
//! On RP2040, flash operations (erase/program) require disabling XIP first.
//! The full sequence is:
//!   1. connect_internal_flash()
//!   2. flash_exit_xip()
//!   3. flash_range_erase() or flash_range_program()
//!   4. flash_flush_cache()
//!   5. flash_enter_cmd_xip()
//!
//! All code executing during steps 1-5 must run from RAM, not flash.
//! The two wrappers live in `.data` and only call ROM pointers resolved by
//! [`Rp2040Flash::new`].

use duoboot_common::error::FlashError;
use duoboot_common::hal::FlashDevice;
use duoboot_common::layout::{FLASH_BASE, FLASH_PAGE_SIZE, FLASH_SECTOR_SIZE};

const PAGE_LEN: usize = FLASH_PAGE_SIZE as usize;

/// 4 KB sector erase command, matched with a FLASH_SECTOR_SIZE block size.
const SECTOR_ERASE_CMD: u8 = 0x20;

// ROM function pointer types
type RomFnVoid = unsafe extern "C" fn();
type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

// Kept in RAM so the RAM-resident wrappers never touch flash while XIP is off.
static mut ROM_CONNECT_INTERNAL_FLASH: RomFnVoid = dummy_void;
static mut ROM_FLASH_EXIT_XIP: RomFnVoid = dummy_void;
static mut ROM_FLASH_RANGE_ERASE: RomFnErase = dummy_erase;
static mut ROM_FLASH_RANGE_PROGRAM: RomFnProgram = dummy_program;
static mut ROM_FLASH_FLUSH_CACHE: RomFnVoid = dummy_void;
static mut ROM_FLASH_ENTER_CMD_XIP: RomFnVoid = dummy_void;

unsafe extern "C" fn dummy_void() {}
unsafe extern "C" fn dummy_erase(_: u32, _: usize, _: u32, _: u8) {}
unsafe extern "C" fn dummy_program(_: u32, _: *const u8, _: usize) {}

/// Look up a ROM function by its two-character tag.
/// ROM table pointer at 0x14 and lookup function at 0x18 are 16-bit halfword pointers.
unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
    let fn_table = *(0x14 as *const u16) as *const u16;
    let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
        core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
            *(0x18 as *const u16) as usize,
        );
    let code = u16::from_le_bytes(*tag) as u32;
    lookup(fn_table, code)
}

/// A missing ROM routine means flash can never be unlocked for writing.
unsafe fn rom_routine(tag: &[u8; 2]) -> Result<usize, FlashError> {
    match rom_func_lookup(tag) {
        0 => {
            defmt::error!("ROM routine {}{} not found", tag[0] as char, tag[1] as char);
            Err(FlashError::Unlock)
        }
        addr => Ok(addr),
    }
}

unsafe fn resolve_rom_routines() -> Result<(), FlashError> {
    ROM_CONNECT_INTERNAL_FLASH = core::mem::transmute::<usize, RomFnVoid>(rom_routine(b"IF")?);
    ROM_FLASH_EXIT_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_routine(b"EX")?);
    ROM_FLASH_RANGE_ERASE = core::mem::transmute::<usize, RomFnErase>(rom_routine(b"RE")?);
    ROM_FLASH_RANGE_PROGRAM = core::mem::transmute::<usize, RomFnProgram>(rom_routine(b"RP")?);
    ROM_FLASH_FLUSH_CACHE = core::mem::transmute::<usize, RomFnVoid>(rom_routine(b"FC")?);
    ROM_FLASH_ENTER_CMD_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_routine(b"CX")?);
    Ok(())
}

/// Convert an absolute XIP flash address to a flash-relative offset.
fn addr_to_offset(abs_addr: u32) -> u32 {
    abs_addr - FLASH_BASE
}

#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_erase(offset: u32, size: u32) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_ERASE(offset, size as usize, FLASH_SECTOR_SIZE, SECTOR_ERASE_CMD);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_program(offset: u32, data: *const u8, len: usize) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_PROGRAM(offset, data, len);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

/// On-chip QSPI flash. Only one instance should exist.
pub struct Rp2040Flash {
    _private: (),
}

impl Rp2040Flash {
    /// Resolve the ROM flash routines. Must run while XIP is still active.
    pub fn new() -> Result<Self, FlashError> {
        unsafe { resolve_rom_routines()? };
        Ok(Self { _private: () })
    }
}

impl FlashDevice for Rp2040Flash {
    const PROGRAM_UNIT: usize = PAGE_LEN;

    fn erase(&mut self, addr: u32, len: u32) -> Result<(), FlashError> {
        if addr < FLASH_BASE || addr % FLASH_SECTOR_SIZE != 0 || len % FLASH_SECTOR_SIZE != 0 {
            return Err(FlashError::Erase);
        }
        unsafe { flash_erase(addr_to_offset(addr), len) };
        Ok(())
    }

    /// Program up to one page worth of bytes at any address.
    ///
    /// The ROM only programs whole pages, so the bytes are placed in a 0xFF
    /// filled buffer covering the page(s) they touch. Programming 0xFF leaves
    /// NOR cells unchanged. The result is read back and compared.
    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        if addr < FLASH_BASE || data.len() > PAGE_LEN {
            return Err(FlashError::Program { addr });
        }

        let page_start = addr & !(FLASH_PAGE_SIZE - 1);
        let lead = (addr - page_start) as usize;
        let span = (lead + data.len()).div_ceil(PAGE_LEN) * PAGE_LEN;

        let mut buf = [0xFFu8; 2 * PAGE_LEN];
        buf[lead..lead + data.len()].copy_from_slice(data);
        unsafe { flash_program(addr_to_offset(page_start), buf.as_ptr(), span) };

        let mut check = [0u8; PAGE_LEN];
        let check = &mut check[..data.len()];
        self.read(addr, check);
        if check != data {
            return Err(FlashError::Program { addr });
        }
        Ok(())
    }

    fn read(&self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { ((addr + i as u32) as *const u8).read_volatile() };
        }
    }
}
