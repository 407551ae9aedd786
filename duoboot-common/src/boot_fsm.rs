// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot decision state machine.
//!
//! One pass per reset:
//!
//! ```text
//! ColdStart ─┬─ first boot / update flag ───────────────► Updating ─► (Recovering) ─► reset
//!            └─ AwaitingCommand ─┬─ 0x34 ────────────────► Updating
//!                                └─ timeout / other ─────► Verifying ─┬─► Booting ─► hand-off
//!                                                                     └─► Tampered ─► Recovering ─► reset
//! ```
//!
//! Every path that changes flash ends in a reset so the next pass re-derives
//! its decision from persisted state. Flash failures and mirror mismatches end
//! in a halt instead.
//!
//! The primary slot is always the one that boots; the backup slot is a mirror
//! refreshed after every successful update. An A/B scheme that alternates the
//! boot slot is a simpler alternative this engine does not implement.

use heapless::Vec;

use crate::config_store::ConfigStore;
use crate::error::Error;
use crate::flash::FlashManager;
use crate::hal::{ChecksumUnit, FlashDevice, Platform, SerialLink};
use crate::log;
use crate::protocol::FORCE_UPDATE;
use crate::record::{BootRecord, FirstBoot};
use crate::transfer::{TransferConfig, TransferEngine};

/// Listen window for the force-update command byte.
pub const COMMAND_TIMEOUT_MS: u32 = 3_000;

/// Longest state path through one cycle, with headroom.
pub const TRACE_CAPACITY: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootState {
    ColdStart,
    AwaitingCommand,
    Updating,
    Verifying,
    Tampered,
    Recovering,
    Booting,
}

/// How a boot cycle ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Start the image in the primary slot.
    Boot { entry: u32 },
    /// Flash or config changed; restart from ColdStart.
    Reset,
    /// Unrecoverable; stop.
    Halt(Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootConfig {
    pub command_timeout_ms: u32,
    pub transfer: TransferConfig,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: COMMAND_TIMEOUT_MS,
            transfer: TransferConfig::default(),
        }
    }
}

pub type Trace = Vec<BootState, TRACE_CAPACITY>;

pub struct BootEngine<L, F, C, P> {
    transfer: TransferEngine<L>,
    flash: FlashManager<F, C>,
    store: ConfigStore,
    platform: P,
    config: BootConfig,
    trace: Trace,
}

impl<L, F, C, P> BootEngine<L, F, C, P>
where
    L: SerialLink,
    F: FlashDevice,
    C: ChecksumUnit,
    P: Platform,
{
    pub fn new(link: L, flash: FlashManager<F, C>, platform: P, config: BootConfig) -> Self {
        let store = ConfigStore::new(flash.layout().config);
        Self {
            transfer: TransferEngine::new(link, config.transfer),
            flash,
            store,
            platform,
            config,
            trace: Vec::new(),
        }
    }

    /// States visited by the last [`BootEngine::run_cycle`].
    pub fn trace(&self) -> &[BootState] {
        &self.trace
    }

    pub fn flash(&self) -> &FlashManager<F, C> {
        &self.flash
    }

    pub fn link(&self) -> &L {
        self.transfer.link()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run one cycle and act on its outcome. Never returns.
    pub fn run(mut self) -> ! {
        match self.run_cycle() {
            Outcome::Boot { entry } => {
                log::info!("Going to application at 0x{:08x}", entry);
                self.platform.hand_off(entry)
            }
            Outcome::Reset => {
                log::info!("Rebooting");
                self.platform.reset()
            }
            Outcome::Halt(e) => {
                log::error!("Fatal: {}", e);
                self.platform.halt()
            }
        }
    }

    /// Decide what this reset does, performing any update or recovery on the way.
    pub fn run_cycle(&mut self) -> Outcome {
        self.trace.clear();

        let record = self.cold_start();
        if self.update_wanted(&record) {
            self.update(record)
        } else {
            self.verify(record)
        }
    }

    fn enter(&mut self, state: BootState) {
        log::debug!("-> {}", state);
        // Capacity exceeds the longest path.
        let _ = self.trace.push(state);
    }

    fn cold_start(&mut self) -> BootRecord {
        self.enter(BootState::ColdStart);

        let mut record = self.store.load(&self.flash);
        log::info!(
            "Boot record: first_boot={}, primary_crc=0x{:02x}, backup_crc=0x{:02x}, slot=0x{:08x}",
            record.first_boot,
            record.primary_crc,
            record.backup_crc,
            record.primary_slot_addr
        );

        if !record.first_boot.is_canonical() {
            log::warn!(
                "Unknown first boot marker 0x{:02x}, forcing provisioning",
                record.first_boot.as_byte()
            );
            record.first_boot = FirstBoot::True;
        }

        let primary = self.flash.layout().primary.base;
        if record.primary_slot_addr != primary {
            log::warn!(
                "Stored slot 0x{:08x} is not the primary slot, using 0x{:08x}",
                record.primary_slot_addr,
                primary
            );
            record.primary_slot_addr = primary;
        }

        record
    }

    fn update_wanted(&mut self, record: &BootRecord) -> bool {
        let requested = self.platform.update_requested();
        if requested {
            self.platform.clear_update_request();
        }

        if record.first_boot == FirstBoot::True {
            log::info!("First boot detected");
            return true;
        }

        if requested {
            log::info!("Update flag set by application");
            return true;
        }

        self.enter(BootState::AwaitingCommand);
        log::info!("Listening for commands");
        match self.transfer.wait_for_byte(self.config.command_timeout_ms) {
            Ok(FORCE_UPDATE) => {
                log::info!("Force update command received");
                true
            }
            Ok(other) => {
                log::debug!("Ignoring command byte 0x{:02x}", other);
                false
            }
            Err(_) => false,
        }
    }

    fn update(&mut self, record: BootRecord) -> Outcome {
        self.enter(BootState::Updating);

        match self
            .transfer
            .download_and_flash(&mut self.flash, record.primary_slot_addr)
        {
            Ok(len) => log::info!("Received {} bytes", len),
            Err(e) if e.is_fatal() => return Outcome::Halt(e),
            Err(e) => {
                log::error!("Update failed: {}", e);
                return self.recover(record);
            }
        }

        match self.mirror_new_image(record) {
            Ok(record) => {
                log::info!("Firmware update completed");
                self.persist(&record)
            }
            Err(e) => Outcome::Halt(e),
        }
    }

    /// Fingerprint the new primary image and replicate it into the backup slot.
    fn mirror_new_image(&mut self, record: BootRecord) -> Result<BootRecord, Error> {
        let primary = record.primary_slot_addr;
        let backup = self.flash.layout().backup.base;

        let primary_crc = self.flash.checksum_region(primary)?;
        self.flash.copy_sector(primary, backup)?;
        let backup_crc = self.flash.checksum_region(backup)?;

        if backup_crc != primary_crc {
            log::error!(
                "Backup copy mismatch: primary 0x{:02x}, backup 0x{:02x}",
                primary_crc,
                backup_crc
            );
            return Err(Error::Integrity {
                expected: primary_crc,
                actual: backup_crc,
            });
        }

        Ok(record.installed(primary_crc))
    }

    fn verify(&mut self, record: BootRecord) -> Outcome {
        self.enter(BootState::Verifying);

        let crc = match self.flash.checksum_region(record.primary_slot_addr) {
            Ok(crc) => crc,
            Err(e) => return Outcome::Halt(e),
        };

        if crc == record.primary_crc {
            self.enter(BootState::Booting);
            return Outcome::Boot {
                entry: record.primary_slot_addr,
            };
        }

        log::error!(
            "TAMPER DETECTED: primary crc 0x{:02x}, stored 0x{:02x}",
            crc,
            record.primary_crc
        );
        self.enter(BootState::Tampered);
        self.recover(record)
    }

    fn recover(&mut self, mut record: BootRecord) -> Outcome {
        self.enter(BootState::Recovering);

        // Stored checksums mean nothing until a first image was installed.
        if record.first_boot != FirstBoot::False {
            log::warn!("No verified backup yet, staying in provisioning");
            record.first_boot = FirstBoot::True;
            return self.persist(&record);
        }

        let backup = self.flash.layout().backup.base;
        let backup_crc = match self.flash.checksum_region(backup) {
            Ok(crc) => crc,
            Err(e) => return Outcome::Halt(e),
        };

        if backup_crc != record.backup_crc {
            log::error!(
                "Backup crc 0x{:02x} does not match stored 0x{:02x}, demoting to provisioning",
                backup_crc,
                record.backup_crc
            );
            record.first_boot = FirstBoot::True;
            return self.persist(&record);
        }

        match self.restore_from_backup(record) {
            Ok(record) => {
                log::info!("Primary slot restored from backup");
                self.persist(&record)
            }
            Err(e) => Outcome::Halt(e),
        }
    }

    fn restore_from_backup(&mut self, record: BootRecord) -> Result<BootRecord, Error> {
        let primary = record.primary_slot_addr;
        let backup = self.flash.layout().backup.base;

        self.flash.copy_sector(backup, primary)?;
        let crc = self.flash.checksum_region(primary)?;
        if crc != record.backup_crc {
            return Err(Error::Integrity {
                expected: record.backup_crc,
                actual: crc,
            });
        }

        Ok(BootRecord {
            primary_crc: crc,
            backup_crc: crc,
            ..record
        })
    }

    fn persist(&mut self, record: &BootRecord) -> Outcome {
        match self.store.save(&mut self.flash, record) {
            Ok(()) => Outcome::Reset,
            Err(e) => Outcome::Halt(e),
        }
    }
}
