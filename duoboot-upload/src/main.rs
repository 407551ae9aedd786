// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware upload tool for duoboot-bootloader via USB CDC.
//!
//! Usage:
//!   duoboot-upload --port /dev/ttyACM0 upload firmware.bin
//!   duoboot-upload --port /dev/ttyACM0 upload firmware.bin --chunk-size 1024 --retries 5
//!   duoboot-upload --port /dev/ttyACM0 trigger

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
