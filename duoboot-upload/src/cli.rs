// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use duoboot_common::protocol::MAX_PAYLOAD_LEN;

use crate::commands::{self, UploadOptions};
use crate::transport::Transport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "duoboot-upload")]
#[command(about = "Firmware upload tool for duoboot-bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    pub port: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Upload firmware to the primary slot
    Upload {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Payload bytes per Data frame
        #[arg(long, default_value_t = MAX_PAYLOAD_LEN as u16,
              value_parser = clap::value_parser!(u16).range(1..=MAX_PAYLOAD_LEN as i64))]
        chunk_size: u16,

        /// Do not send the force-update byte; wait for the device to report ready
        #[arg(long)]
        no_trigger: bool,

        /// Retransmissions per frame before giving up
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },

    /// Ask the device to enter update mode and wait until it is ready
    Trigger,
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let mut transport = Transport::new(&cli.port)?;

    match cli.command {
        Commands::Upload {
            file,
            chunk_size,
            no_trigger,
            retries,
        } => {
            let opts = UploadOptions {
                chunk_size: chunk_size as usize,
                trigger: !no_trigger,
                retries,
            };
            commands::upload(&mut transport, &file, &opts)
        }
        Commands::Trigger => {
            commands::trigger(&mut transport, true)?;
            println!("Bootloader on {} is ready for firmware", transport.port_name());
            Ok(())
        }
    }
}
