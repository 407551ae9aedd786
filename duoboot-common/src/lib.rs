// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Core of the duoboot bootloader: boot record, flash manager, transfer
//! protocol and the boot decision state machine.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: `std::error::Error` for host tools
//! - `defmt` feature: log through `defmt` and derive `defmt::Format`
//! - `embedded` feature: RP2040 update-request flag for bootloader and applications

#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod log;

pub mod boot_fsm;
pub mod config_store;
pub mod error;
pub mod flash;
pub mod hal;
pub mod layout;
pub mod protocol;
pub mod record;
pub mod transfer;

#[cfg(feature = "embedded")]
pub mod update_flag;

// Re-export commonly used types
pub use boot_fsm::{BootConfig, BootEngine, BootState, Outcome};
pub use config_store::ConfigStore;
pub use error::{ConfigError, Error, FlashError, FramingError, TransportError};
pub use flash::FlashManager;
pub use hal::{ChecksumUnit, FlashDevice, Platform, SerialLink, SoftCrc32};
pub use layout::{FlashLayout, Sector};
pub use protocol::{DataFrame, FrameType};
pub use record::{BootRecord, FirstBoot, RecordLayout};
pub use transfer::{TransferConfig, TransferEngine};
