// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Board services at the end of a boot cycle: update flag, hand-off, reset, halt.

use duoboot_common::hal::Platform;
use duoboot_common::layout::SLOT_SIZE;
use duoboot_common::update_flag;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use rp2040_hal::Timer;

use crate::peripherals::{self, LedPin};

const RAM_START: u32 = 0x2000_0000;
const RAM_END: u32 = 0x2004_2000;

const RESETS_RESET: *mut u32 = 0x4000_C000 as *mut u32;
const RESET_USBCTRL_BIT: u32 = 1 << 24;

struct VectorTable {
    initial_sp: u32,
    reset_vector: u32,
}

impl VectorTable {
    unsafe fn read_from(addr: u32) -> Self {
        Self {
            initial_sp: (addr as *const u32).read_volatile(),
            reset_vector: (addr as *const u32).offset(1).read_volatile(),
        }
    }

    /// Stack pointer in SRAM and reset handler inside the slot.
    fn is_plausible(&self, slot_addr: u32) -> bool {
        (RAM_START..=RAM_END).contains(&self.initial_sp)
            && (slot_addr..slot_addr + SLOT_SIZE).contains(&(self.reset_vector & !1))
    }
}

pub struct Rp2040Platform {
    led: LedPin,
    timer: Timer,
}

impl Rp2040Platform {
    pub fn new(led: LedPin, timer: Timer) -> Self {
        Self { led, timer }
    }
}

impl Platform for Rp2040Platform {
    fn update_requested(&mut self) -> bool {
        update_flag::is_requested()
    }

    fn clear_update_request(&mut self) {
        update_flag::clear();
    }

    fn hand_off(&mut self, slot_addr: u32) -> ! {
        let vt = unsafe { VectorTable::read_from(slot_addr) };
        if !vt.is_plausible(slot_addr) {
            defmt::error!(
                "Bad vector table at 0x{:08x}: sp=0x{:08x}, reset=0x{:08x}",
                slot_addr,
                vt.initial_sp,
                vt.reset_vector
            );
            self.halt();
        }

        self.led.set_low().ok();
        // Let RTT drain before the application takes over.
        self.timer.delay_ms(10);

        unsafe {
            prepare_for_firmware_handoff();
            relocate_vector_table(slot_addr);
            jump_to_firmware(vt.initial_sp, vt.reset_vector)
        }
    }

    fn reset(&mut self) -> ! {
        peripherals::blink(&mut self.led, &mut self.timer, 2, 100);
        cortex_m::peripheral::SCB::sys_reset();
    }

    fn halt(&mut self) -> ! {
        cortex_m::interrupt::disable();
        self.led.set_high().ok();
        loop {
            cortex_m::asm::wfi();
        }
    }
}

/// Quiesce interrupts and the USB controller so the application starts from
/// a clean slate. Clocks stay configured.
unsafe fn prepare_for_firmware_handoff() {
    cortex_m::interrupt::disable();

    // Clear all pending interrupts in NVIC
    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    NVIC_ICPR.write_volatile(0xFFFF_FFFF);

    // Disable all NVIC interrupts
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    NVIC_ICER.write_volatile(0xFFFF_FFFF);

    // Drop off the bus; the application enumerates on its own.
    let reset = RESETS_RESET.read_volatile();
    RESETS_RESET.write_volatile(reset | RESET_USBCTRL_BIT);
}

unsafe fn relocate_vector_table(addr: u32) {
    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(addr);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn jump_to_firmware(initial_sp: u32, reset_vector: u32) -> ! {
    core::arch::asm!(
        "msr msp, {sp}",
        "cpsie i",
        "bx {reset}",
        sp = in(reg) initial_sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
