//! PCF8574 side of the wiring.
//!
//! The backpack routes the expander lines to the HD44780 like this:
//!
//! | P7..P4   | P3        | P2 | P1  | P0 |
//! |----------|-----------|----|-----|----|
//! | D7..D4   | backlight | E  | R/W | RS |

use embedded_hal::blocking::i2c;
use log::trace;

use crate::Backlight;

pub(crate) const DATA_SHIFT: u8 = 4;
pub(crate) const ENABLE_BIT: u8 = 0x04;
pub(crate) const READ_WRITE_BIT: u8 = 0x02;

/// Controller register targeted by a transfer (the RS line).
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    Command = 0x00,
    Data = 0x01,
}

/// Logical state of the eight expander lines.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Value on D7..D4, only the low 4 bits are used.
    pub nibble: u8,
    pub register: Register,
    pub read: bool,
    pub enable: bool,
    pub backlight: Backlight,
}

impl Frame {
    /// Frame presenting `nibble` for a write with the enable line raised.
    pub const fn write(nibble: u8, register: Register, backlight: Backlight) -> Self {
        Self {
            nibble,
            register,
            read: false,
            enable: true,
            backlight,
        }
    }

    /// Frame used while reading the busy flag. The data lines are released high so the
    /// controller can pull them down.
    pub const fn status_read(backlight: Backlight) -> Self {
        Self {
            nibble: 0x0F,
            register: Register::Command,
            read: true,
            enable: true,
            backlight,
        }
    }

    pub const fn encode(self) -> u8 {
        let mut byte = (self.nibble & 0x0F) << DATA_SHIFT;
        byte |= self.backlight as u8;
        if self.enable {
            byte |= ENABLE_BIT;
        }
        if self.read {
            byte |= READ_WRITE_BIT;
        }
        byte | self.register as u8
    }
}

/// Packs a write nibble into the byte sent to the expander, enable raised when `enable`.
pub const fn encode(nibble: u8, register: Register, enable: bool, backlight: Backlight) -> u8 {
    let frame = Frame::write(nibble, register, backlight);
    Frame { enable, ..frame }.encode()
}

/// Single byte port on an already addressed PCF8574.
pub struct Pcf8574<'a, I> {
    i2c: &'a mut I,
    address: u8,
}

impl<'a, I, E> Pcf8574<'a, I>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
{
    pub fn new(i2c: &'a mut I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), E> {
        trace!("PCF8574 0x{:02x} <- {:08b}", self.address, value);
        self.i2c.write(self.address, &[value])
    }

    pub fn read_byte(&mut self) -> Result<u8, E> {
        let mut buffer = [0u8; 1];
        self.i2c.read(self.address, &mut buffer)?;
        trace!("PCF8574 0x{:02x} -> {:08b}", self.address, buffer[0]);
        Ok(buffer[0])
    }

    /// Latches the nibble in `base` by writing it with enable high, then again with
    /// enable low. A failed write aborts the pulse where it is.
    pub fn pulse(&mut self, base: u8) -> Result<(), E> {
        self.write_byte(base)?;
        self.write_byte(base ^ ENABLE_BIT)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::MockError;
    use std::{io::ErrorKind, vec};

    const ADDRESS: u8 = 0x27;

    #[test]
    fn encodes_lines_in_backpack_order() {
        assert_eq!(encode(0x2, Register::Command, true, Backlight::On), 0b0010_1100);
        assert_eq!(encode(0x2, Register::Command, false, Backlight::On), 0b0010_1000);
        assert_eq!(encode(0xA, Register::Data, true, Backlight::On), 0b1010_1101);
        assert_eq!(encode(0xA, Register::Data, true, Backlight::Off), 0b1010_0101);
        // only the low nibble reaches the data lines
        assert_eq!(encode(0xF3, Register::Command, false, Backlight::Off), 0b0011_0000);
    }

    #[test]
    fn status_read_frame_releases_data_lines() {
        assert_eq!(Frame::status_read(Backlight::On).encode(), 0xFE);
        let low = Frame {
            enable: false,
            ..Frame::status_read(Backlight::On)
        };
        assert_eq!(low.encode(), 0xFA);
    }

    #[test]
    fn pulse_writes_enable_high_then_low() {
        let expectations = [
            I2cTransaction::write(ADDRESS, vec![0b0100_1101]),
            I2cTransaction::write(ADDRESS, vec![0b0100_1001]),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let mut port = Pcf8574::new(&mut i2c, ADDRESS);
        port.pulse(0b0100_1101).unwrap();

        i2c.done();
    }

    #[test]
    fn pulse_stops_at_first_bus_error() {
        let expectations = [I2cTransaction::write(ADDRESS, vec![0x2C])
            .with_error(MockError::Io(ErrorKind::Other))];
        let mut i2c = I2cMock::new(&expectations);

        let mut port = Pcf8574::new(&mut i2c, ADDRESS);
        assert!(port.pulse(0x2C).is_err());

        i2c.done();
    }

    #[test]
    fn reads_single_byte() {
        let expectations = [I2cTransaction::read(ADDRESS, vec![0x8E])];
        let mut i2c = I2cMock::new(&expectations);

        let mut port = Pcf8574::new(&mut i2c, ADDRESS);
        assert_eq!(port.address(), ADDRESS);
        assert_eq!(port.read_byte().unwrap(), 0x8E);

        i2c.done();
    }
}
