// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport layer for bootloader communication.

use anyhow::{bail, Context, Result};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use duoboot_common::protocol::{ACK, NACK, READY};

/// Default timeout for serial operations in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Single-byte responses sent by the bootloader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Nack,
    Ready,
    Other(u8),
}

impl Reply {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            ACK => Reply::Ack,
            NACK => Reply::Nack,
            READY => Reply::Ready,
            other => Reply::Other(other),
        }
    }
}

/// USB CDC transport for communicating with the bootloader.
pub struct Transport {
    port: Box<dyn SerialPort>,
}

impl Transport {
    /// Create a new transport connection to the specified serial port.
    pub fn new(port_name: &str) -> Result<Self> {
        Self::with_timeout(port_name, DEFAULT_TIMEOUT_MS)
    }

    /// Create a new transport connection with a custom timeout.
    pub fn with_timeout(port_name: &str, timeout_ms: u64) -> Result<Self> {
        let port = serialport::new(port_name, 115200)
            .timeout(Duration::from_millis(timeout_ms))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;

        Ok(Self { port })
    }

    /// Get the port name.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }

    /// Write raw bytes and flush.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .context("Failed to write to serial port")?;
        self.port.flush()?;
        Ok(())
    }

    /// Wait up to `timeout` for the next response byte. `None` on timeout.
    pub fn receive(&mut self, timeout: Duration) -> Result<Option<Reply>> {
        let deadline = Instant::now() + timeout;
        let mut byte = [0u8; 1];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.port
                .set_timeout(remaining)
                .context("Failed to set timeout")?;

            match self.port.read(&mut byte) {
                Ok(1) => return Ok(Some(Reply::from_byte(byte[0]))),
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => bail!("Serial read error: {}", e),
            }
        }
    }

    /// Discard anything already queued from the device.
    pub fn drain_rx(&mut self) {
        let mut buf = [0u8; 64];
        let old_timeout = self.port.timeout();
        let _ = self.port.set_timeout(Duration::from_millis(10));
        while self.port.read(&mut buf).unwrap_or(0) > 0 {}
        let _ = self.port.set_timeout(old_timeout);
    }
}
