// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for bootloader operations.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use duoboot_common::hal::{ChecksumUnit, SoftCrc32};
use duoboot_common::layout::{FLASH_SECTOR_SIZE, SLOT_SIZE};
use duoboot_common::protocol::{encode_frame, fold_crc32, FORCE_UPDATE, FRAME_OVERHEAD};
use duoboot_common::FrameType;

use crate::transport::{Reply, Transport};

/// How long to wait for READY after each force-update byte.
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(15);
const TRIGGER_ATTEMPTS: u32 = 4;

/// Worst-case 4 KiB sector erase time of the QSPI flash.
const SECTOR_ERASE_MAX_MS: u64 = 400;

/// Start is only ACKed once the device has erased the slot. Resending Start
/// early earns a second ACK that would be taken for the first Data frame's.
const START_TIMEOUT: Duration =
    Duration::from_millis(SECTOR_ERASE_MAX_MS * (SLOT_SIZE / FLASH_SECTOR_SIZE) as u64 + 2_000);
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for a single upload.
pub struct UploadOptions {
    pub chunk_size: usize,
    pub trigger: bool,
    pub retries: u32,
}

/// Build one wire frame.
pub fn build_frame(frame_type: FrameType, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; payload.len() + FRAME_OVERHEAD];
    let n = encode_frame(frame_type, payload, &mut out)?;
    out.truncate(n);
    Ok(out)
}

/// Split an image into Data frames of at most `chunk_size` payload bytes.
pub fn data_frames(firmware: &[u8], chunk_size: usize) -> Result<Vec<Vec<u8>>> {
    firmware
        .chunks(chunk_size)
        .map(|chunk| build_frame(FrameType::Data, chunk))
        .collect()
}

/// Reject images the bootloader could never accept.
pub fn check_image(firmware: &[u8]) -> Result<()> {
    if firmware.is_empty() {
        bail!("Firmware image is empty");
    }
    if firmware.len() > SLOT_SIZE as usize {
        bail!(
            "Firmware image is {} bytes, slot holds {} bytes",
            firmware.len(),
            SLOT_SIZE
        );
    }
    Ok(())
}

/// Folded slot checksum the bootloader will record for this image: the whole
/// slot, erased tail included, fed as little-endian words.
pub fn expected_slot_checksum(firmware: &[u8], slot_size: u32) -> u8 {
    let mut slot = firmware.to_vec();
    slot.resize(slot_size as usize, 0xFF);

    let mut crc = SoftCrc32::new();
    for word in slot.chunks_exact(4) {
        crc.feed(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
    }
    fold_crc32(crc.finish())
}

/// Wait for READY, optionally sending the force-update byte before each wait.
pub fn trigger(transport: &mut Transport, send_command: bool) -> Result<()> {
    transport.drain_rx();

    for attempt in 1..=TRIGGER_ATTEMPTS {
        if send_command {
            transport.send(&[FORCE_UPDATE])?;
        }
        if wait_for(transport, Reply::Ready, TRIGGER_TIMEOUT)? {
            return Ok(());
        }
        println!("Timeout waiting for bootloader ({}/{})", attempt, TRIGGER_ATTEMPTS);
    }
    bail!("Bootloader did not report ready");
}

/// Upload a firmware image to the primary slot.
pub fn upload(transport: &mut Transport, file: &Path, opts: &UploadOptions) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    check_image(&firmware)?;

    let frames = data_frames(&firmware, opts.chunk_size)?;
    println!(
        "Firmware: {} ({} bytes, {} chunks of up to {} bytes)",
        file.display(),
        firmware.len(),
        frames.len(),
        opts.chunk_size
    );
    println!(
        "Expected slot checksum: 0x{:02x}",
        expected_slot_checksum(&firmware, SLOT_SIZE)
    );
    println!();

    print!("Waiting for bootloader... ");
    std::io::stdout().flush()?;
    trigger(transport, opts.trigger)?;
    println!("READY");

    print!("Starting update (erasing slot)... ");
    std::io::stdout().flush()?;
    let start = build_frame(FrameType::Start, &[])?;
    send_until_ack(transport, &start, START_TIMEOUT, opts.retries).context("Start frame")?;
    // Drop any ACK for a resent Start before counting Data replies.
    transport.drain_rx();
    println!("OK");

    let pb = ProgressBar::new(firmware.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut offset = 0u64;
    for (n, frame) in frames.iter().enumerate() {
        if let Err(e) = send_until_ack(transport, frame, FRAME_TIMEOUT, opts.retries) {
            pb.abandon();
            return Err(e.context(format!("Chunk {} at offset {}", n + 1, offset)));
        }
        offset += (frame.len() - FRAME_OVERHEAD) as u64;
        pb.set_position(offset);
    }
    pb.finish_with_message("Upload complete");
    println!();

    print!("Finalizing... ");
    std::io::stdout().flush()?;
    let end = build_frame(FrameType::End, &[])?;
    send_until_ack(transport, &end, FRAME_TIMEOUT, opts.retries).context("End frame")?;
    println!("OK");

    println!();
    println!("Firmware uploaded successfully!");
    println!("The device mirrors the image to the backup slot and reboots into it.");

    Ok(())
}

/// Send `frame` until it is ACKed, resending on NACK or timeout.
fn send_until_ack(
    transport: &mut Transport,
    frame: &[u8],
    timeout: Duration,
    retries: u32,
) -> Result<()> {
    for attempt in 0..=retries {
        if attempt > 0 {
            println!("Retransmitting frame ({}/{})", attempt, retries);
        }
        transport.send(frame)?;

        loop {
            match transport.receive(timeout)? {
                Some(Reply::Ack) => return Ok(()),
                Some(Reply::Nack) => break,
                Some(other) => println!("Ignoring unexpected reply {:?}", other),
                None => {
                    println!("Timeout waiting for ACK/NACK");
                    break;
                }
            }
        }
    }
    bail!("Max retransmissions reached");
}

/// True when `expected` arrives before `timeout`; other bytes are skipped.
fn wait_for(transport: &mut Transport, expected: Reply, timeout: Duration) -> Result<bool> {
    loop {
        match transport.receive(timeout)? {
            Some(reply) if reply == expected => return Ok(true),
            Some(_) => continue,
            None => return Ok(false),
        }
    }
}
