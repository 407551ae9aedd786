// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Duoboot bootloader for RP2040: verified primary slot, backup mirror and
//! firmware download over USB CDC.

#![no_std]
#![no_main]

mod flash;
mod peripherals;
mod platform;
mod usb_transport;

use defmt_rtt as _;
use panic_probe as _;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;
use duoboot_common::{BootConfig, BootEngine, FlashLayout, FlashManager, Platform, SoftCrc32};

use crate::flash::Rp2040Flash;
use crate::platform::Rp2040Platform;
use crate::usb_transport::UsbTransport;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

#[entry]
fn main() -> ! {
    defmt::info!("Bootloader init");

    let mut p = peripherals::init();
    peripherals::blink(&mut p.led_pin, &mut p.timer, 3, 200);

    let link = UsbTransport::new(p.usb_bus, p.timer);
    let device = Rp2040Flash::new();
    let mut platform = Rp2040Platform::new(p.led_pin, p.timer);

    let (link, device) = match (link, device) {
        (Ok(link), Ok(device)) => (link, device),
        (Err(e), _) => {
            defmt::error!("USB init failed: {}", e);
            platform.halt()
        }
        (_, Err(e)) => {
            defmt::error!("Flash init failed: {}", e);
            platform.halt()
        }
    };

    let layout = FlashLayout::default();
    let flash = FlashManager::new(device, SoftCrc32::new(), layout);
    BootEngine::new(link, flash, platform, BootConfig::default()).run()
}
