// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Persisted "update requested" flag shared by the bootloader and applications.
//!
//! Bit 0 of the RP2040 watchdog SCRATCH0 register. The scratch registers keep
//! their value across a watchdog or SYSRESETREQ reset, so an application can set
//! the bit and reset straight into update mode.

const WATCHDOG_BASE: u32 = 0x4005_8000;
const WATCHDOG_SCRATCH0: *mut u32 = (WATCHDOG_BASE + 0x0C) as *mut u32;

pub const UPDATE_REQUEST_BIT: u32 = 1 << 0;

/// True when the update request bit is set.
pub fn is_requested() -> bool {
    unsafe { WATCHDOG_SCRATCH0.read_volatile() & UPDATE_REQUEST_BIT != 0 }
}

/// Clear the update request bit, leaving the rest of SCRATCH0 untouched.
pub fn clear() {
    unsafe {
        let v = WATCHDOG_SCRATCH0.read_volatile();
        WATCHDOG_SCRATCH0.write_volatile(v & !UPDATE_REQUEST_BIT);
    }
}

/// Set the update request bit and reset into the bootloader.
///
/// For use by resident applications.
pub fn request_update() -> ! {
    unsafe {
        let v = WATCHDOG_SCRATCH0.read_volatile();
        WATCHDOG_SCRATCH0.write_volatile(v | UPDATE_REQUEST_BIT);
    }

    // Small delay to ensure write completes
    cortex_m::asm::delay(100_000);

    cortex_m::peripheral::SCB::sys_reset();
}
