// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB CDC serial link with timer-bounded byte reads and writes.

use duoboot_common::error::TransportError;
use duoboot_common::hal::SerialLink;
use rp2040_hal::usb::UsbBus;
use rp2040_hal::Timer;
use usb_device::class_prelude::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

/// One full-speed bulk packet.
const RX_BUF_SIZE: usize = 64;

/// Upper bound on waiting for the host to drain a response byte.
const WRITE_TIMEOUT_MS: u32 = 1_000;

pub struct UsbTransport {
    serial: SerialPort<'static, UsbBus>,
    usb_dev: UsbDevice<'static, UsbBus>,
    timer: Timer,
    rx_buf: [u8; RX_BUF_SIZE],
    rx_pos: usize,
    rx_len: usize,
}

impl UsbTransport {
    pub fn new(
        usb_bus: &'static UsbBusAllocator<UsbBus>,
        timer: Timer,
    ) -> Result<Self, TransportError> {
        let serial = SerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x2E8A, 0x000A))
            .strings(&[StringDescriptors::default()
                .manufacturer("ADNT")
                .product("Duoboot Bootloader")
                .serial_number("0001")])
            .map_err(|_| TransportError::Io)?
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Ok(Self {
            serial,
            usb_dev,
            timer,
            rx_buf: [0u8; RX_BUF_SIZE],
            rx_pos: 0,
            rx_len: 0,
        })
    }

    /// Poll USB device. Must be called frequently.
    pub fn poll(&mut self) -> bool {
        self.usb_dev.poll(&mut [&mut self.serial])
    }

    fn now_us(&self) -> u64 {
        self.timer.get_counter().ticks()
    }

    fn deadline(&self, timeout_ms: u32) -> u64 {
        self.now_us() + timeout_ms as u64 * 1_000
    }

    fn poll_until(&mut self, deadline: u64) -> Result<(), TransportError> {
        self.poll();
        if self.now_us() >= deadline {
            Err(TransportError::Timeout)
        } else {
            Ok(())
        }
    }
}

impl SerialLink for UsbTransport {
    fn read_byte(&mut self, timeout_ms: u32) -> Result<u8, TransportError> {
        let deadline = self.deadline(timeout_ms);
        loop {
            if self.rx_pos < self.rx_len {
                let byte = self.rx_buf[self.rx_pos];
                self.rx_pos += 1;
                return Ok(byte);
            }

            self.poll();
            match self.serial.read(&mut self.rx_buf) {
                Ok(count) => {
                    self.rx_pos = 0;
                    self.rx_len = count;
                }
                Err(UsbError::WouldBlock) => {}
                Err(_) => return Err(TransportError::Io),
            }

            if self.rx_pos >= self.rx_len && self.now_us() >= deadline {
                return Err(TransportError::Timeout);
            }
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        let deadline = self.deadline(WRITE_TIMEOUT_MS);

        loop {
            match self.serial.write(&[byte]) {
                Ok(n) if n > 0 => break,
                Ok(_) | Err(UsbError::WouldBlock) => {}
                Err(_) => return Err(TransportError::Io),
            }
            self.poll_until(deadline)?;
        }

        // Responses are single bytes; push each one out immediately.
        loop {
            match self.serial.flush() {
                Ok(()) => return Ok(()),
                Err(UsbError::WouldBlock) => {}
                Err(_) => return Err(TransportError::Io),
            }
            self.poll_until(deadline)?;
        }
    }
}
