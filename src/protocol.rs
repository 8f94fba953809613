//! 4-bit transfer protocol spoken to the HD44780 through the expander.

use embedded_hal::blocking::{delay::DelayMs, i2c};
use log::{trace, warn};

use crate::expander::{self, Frame, Pcf8574, Register, DATA_SHIFT, ENABLE_BIT};
use crate::{Backlight, BusyWait, Error};

/// Busy flag and address counter as reported by the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub busy: bool,
    /// DDRAM/CGRAM address counter, 7 bits.
    pub address: u8,
}

impl Status {
    /// Joins the two nibbles read from D7..D4.
    pub const fn from_nibbles(high: u8, low: u8) -> Self {
        let raw = ((high & 0x0F) << 4) | (low & 0x0F);
        Self {
            busy: raw & 0x80 != 0,
            address: raw & 0x7F,
        }
    }
}

pub(crate) struct Interface<'a, I, D> {
    port: Pcf8574<'a, I>,
    delay: D,
    backlight: Backlight,
    busy_wait: BusyWait,
    poll_interval_ms: u8,
}

impl<'a, I, D, E> Interface<'a, I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
{
    pub(crate) fn new(
        port: Pcf8574<'a, I>,
        delay: D,
        backlight: Backlight,
        busy_wait: BusyWait,
        poll_interval_ms: u8,
    ) -> Self {
        Self {
            port,
            delay,
            backlight,
            busy_wait,
            poll_interval_ms,
        }
    }

    pub(crate) fn backlight(&self) -> Backlight {
        self.backlight
    }

    /// Switches the backlight by writing an idle frame (enable low) with the new bit.
    pub(crate) fn set_backlight(&mut self, backlight: Backlight) -> Result<(), Error<E>> {
        self.backlight = backlight;
        let idle = expander::encode(0, Register::Command, false, backlight);
        self.port.write_byte(idle).map_err(Error::Bus)
    }

    /// Reads busy flag and address counter.
    ///
    /// In read mode the enable line does not latch anything, each strobe makes the
    /// controller present the next nibble on D7..D4.
    pub(crate) fn read_status(&mut self) -> Result<Status, Error<E>> {
        let strobe = Frame::status_read(self.backlight).encode();

        self.port.write_byte(strobe).map_err(Error::Bus)?;
        let high = self.port.read_byte().map_err(Error::Bus)? >> DATA_SHIFT;

        self.port.write_byte(strobe ^ ENABLE_BIT).map_err(Error::Bus)?;
        self.port.write_byte(strobe).map_err(Error::Bus)?;
        let low = self.port.read_byte().map_err(Error::Bus)? >> DATA_SHIFT;

        let status = Status::from_nibbles(high, low);
        trace!("Status: busy {}, address 0x{:02x}", status.busy, status.address);
        Ok(status)
    }

    /// Polls the busy flag until it clears, sleeping between polls.
    fn wait_ready(&mut self) -> Result<(), Error<E>> {
        let mut polls: u32 = 0;
        loop {
            if !self.read_status()?.busy {
                return Ok(());
            }
            polls = polls.saturating_add(1);
            if let BusyWait::Limited(max_polls) = self.busy_wait {
                if polls >= max_polls {
                    warn!("HD44780 still busy after {} polls", polls);
                    return Err(Error::BusyTimeout);
                }
            }
            self.delay.delay_ms(self.poll_interval_ms);
        }
    }

    /// Sends an instruction once the controller reports ready.
    pub(crate) fn send_command(&mut self, command: u8) -> Result<(), Error<E>> {
        self.wait_ready()?;
        self.send(command, Register::Command)
    }

    /// Writes a byte to the data register.
    ///
    /// Unlike [`Self::send_command`] the busy flag is not polled first: data writes only
    /// ever follow a command that already waited.
    pub(crate) fn send_data(&mut self, data: u8) -> Result<(), Error<E>> {
        self.send(data, Register::Data)
    }

    /// Sends only the high nibble of `command`, while the controller still listens in
    /// 8-bit mode.
    pub(crate) fn send_half_command(&mut self, command: u8) -> Result<(), Error<E>> {
        trace!("Sending half command: {:08b}", command);
        self.write_nibble(command >> 4, Register::Command)
    }

    fn send(&mut self, byte: u8, register: Register) -> Result<(), Error<E>> {
        trace!("Sending {:08b}, register {:?}", byte, register);
        self.write_nibble(byte >> 4, register)?;
        self.write_nibble(byte & 0x0F, register)
    }

    fn write_nibble(&mut self, nibble: u8, register: Register) -> Result<(), Error<E>> {
        let base = expander::encode(nibble, register, true, self.backlight);
        self.port.pulse(base).map_err(Error::Bus)
    }
}
