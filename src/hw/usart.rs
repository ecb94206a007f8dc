// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! USART debug terminal.
//!
//! Prints the boot banner and periodic sensor readings. Values are printed as integers to keep
//! float formatting out of the image.
//!
//! To access the terminal on the host machine, connect to the debug USB port and use
//! ```text
//! $ screen /dev/tty.usbmodem* <baud_rate>
//! ```

use core::fmt;
use nb::block;

use stm32f7xx_hal::{
    prelude::*,
    serial::{Instance, Pins, Serial, Tx},
};

use crate::acquisition::Readings;
use crate::state::ErrorFlags;

pub struct Usart<U: Instance> {
    tx: Tx<U>,
}

impl<U: Instance> Usart<U> {
    pub fn new<PINS: Pins<U>>(serial: Serial<U, PINS>) -> Self {
        let (tx, _rx) = serial.split();
        Self { tx }
    }

    #[inline]
    pub fn write_byte(&mut self, b: u8) {
        let _ = block!(self.tx.write(b));
    }

    pub fn write_str(&mut self, s: &str) {
        for &b in s.as_bytes() {
            self.write_byte(b);
        }
    }

    /// Write string and CRLF terminator.
    #[inline]
    pub fn println(&mut self, s: &str) {
        self.write_str(s);
        self.write_str("\r\n");
    }

    pub fn print_hex_u8(&mut self, n: u8) {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        self.write_str("0x");
        self.write_byte(HEX[((n >> 4) & 0xF) as usize]);
        self.write_byte(HEX[(n & 0xF) as usize]);
    }

    pub fn print_u32(&mut self, mut n: u32) {
        let mut buf = [0u8; 10];
        let mut i = buf.len();
        if n == 0 {
            self.write_byte(b'0');
            return;
        }
        while n > 0 {
            i -= 1;
            buf[i] = b'0' + (n % 10) as u8;
            n /= 10;
        }
        for &b in &buf[i..] {
            self.write_byte(b);
        }
    }

    /// One line of `V: .. P: .. I: .. ERR: 0x..`, values truncated toward zero.
    pub fn print_readings(&mut self, readings: &Readings, flags: ErrorFlags) {
        self.write_str("V: ");
        self.print_u32(readings.battery_voltage as u32);
        self.write_str(" P: ");
        self.print_u32(readings.position as u32);
        self.write_str(" I: ");
        self.print_u32(readings.battery_current as u32);
        self.write_str(" ERR: ");
        self.print_hex_u8(flags.bits());
        self.write_str("\r\n");
    }
}

// Implement `core::fmt::Write` so we can use `write!` / `writeln!` on `Usart`.
impl<U: Instance> fmt::Write for Usart<U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Usart::write_str(self, s);
        Ok(())
    }
}
