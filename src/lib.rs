#![no_std]
//! Driver for 16x2 HD44780 character displays wired through a PCF8574 I2C backpack.
//! It requires an I2C instance implementing both [`embedded_hal::blocking::i2c::Write`]
//! and [`embedded_hal::blocking::i2c::Read`], and an instance to delay execution with
//! [`embedded_hal::blocking::delay::DelayMs`].
//!
//! The busy flag is read back through the expander before every instruction, so the
//! backpack's R/W line has to be wired.
//!
//! Usage:
//! ```ignore
//! let mut lcd = LcdUninit::new(&mut i2c, DEFAULT_ADDRESS, delay)
//!     .busy_wait(BusyWait::Limited(100))
//!     .init()
//!     .unwrap();
//!
//! // Print directly
//! _ = lcd.clear();
//! _ = lcd.write_str("direct write");
//!
//! // Or stream newline terminated messages, wrapped onto the second line
//! let mut session = lcd.session();
//! _ = session.write(b"Hello, ");
//! _ = uwrite!(session, "{} degrees\n", 21);
//! ```
//! Datasheet used link [here](https://www.sparkfun.com/datasheets/LCD/HD44780.pdf)

mod expander;
mod protocol;
mod session;

use embedded_hal::blocking::{delay::DelayMs, i2c};
use log::{debug, error};
use thiserror::Error;
use ufmt_write::uWrite;

pub use expander::{encode, Frame, Pcf8574, Register};
pub use protocol::Status;
pub use session::{LineBuffer, Overflow, Session, BUFFER_LEN, MAX_MESSAGE_LEN, TERMINATOR};

use protocol::Interface;

/// Backpack address with A0..A2 left open.
pub const DEFAULT_ADDRESS: u8 = 0x27;
pub const LINES: u8 = 2;
pub const COLUMNS: u8 = 16;
/// Number of addressable cells, cursor positions run from 0 to `CELLS - 1`.
pub const CELLS: u8 = LINES * COLUMNS;
/// DDRAM address of the first cell on the second line.
pub const LINE_TWO_BASE: u8 = 0x40;
const DEFAULT_POLL_INTERVAL_MS: u8 = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backlight {
    Off = 0x00,
    On = 0x08,
}

/// How long an instruction waits for the busy flag to clear.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusyWait {
    /// Poll until the flag clears. A disconnected controller that reads as busy blocks
    /// forever.
    Unbounded,
    /// Give up with [`Error::BusyTimeout`] after this many polls.
    Limited(u32),
}

#[derive(Debug, Error)]
pub enum Error<E> {
    #[error("I2C bus error: {0:?}")]
    Bus(E),
    #[error("cursor position out of range")]
    InvalidArgument,
    #[error("message longer than {} bytes", MAX_MESSAGE_LEN)]
    MessageTooLong,
    #[error("controller stayed busy")]
    BusyTimeout,
}

impl<E> From<Overflow> for Error<E> {
    fn from(_: Overflow) -> Self {
        Error::MessageTooLong
    }
}

/// Initialization progress. Each step of [`LcdUninit::init`] moves one state forward.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    FunctionSetPending,
    TwoLineModePending,
    DisplayOnPending,
    Cleared,
    Ready,
}

#[repr(u8)]
#[derive(Copy, Clone)]
enum Mode {
    DisplayControl = 0x08,
    FunctionSet = 0x20,
    SetDdramAddress = 0x80,
}

enum Commands {
    Clear = 0x01,
    ReturnHome = 0x02,
}

enum BitMode {
    Bit4 = 0x00,
}

enum Lines {
    Two = 0x08,
}

enum DisplayControl {
    CursorBlink = 0x01,
    CursorOn = 0x02,
    DisplayOn = 0x04,
}

/// Maps a cursor position to its DDRAM address.
///
/// The second line does not follow the first in DDRAM, it starts at [`LINE_TWO_BASE`].
pub const fn ddram_address(pos: u8) -> Option<u8> {
    if pos >= CELLS {
        None
    } else if pos >= COLUMNS {
        Some(pos - COLUMNS + LINE_TWO_BASE)
    } else {
        Some(pos)
    }
}

/// Display configuration, consumed by [`LcdUninit::init`].
pub struct LcdUninit<'a, I, D>
where
    I: i2c::Write,
    D: DelayMs<u8>,
{
    i2c: &'a mut I,
    address: u8,
    backlight_state: Backlight,
    busy_wait: BusyWait,
    poll_interval_ms: u8,
    delay: D,
}

impl<'a, I, D, E> LcdUninit<'a, I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
{
    /// Create new instance with only the I2C, address and delay
    pub fn new(i2c: &'a mut I, address: u8, delay: D) -> Self {
        Self {
            i2c,
            address,
            backlight_state: Backlight::On,
            busy_wait: BusyWait::Unbounded,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            delay,
        }
    }

    pub fn backlight(mut self, backlight: Backlight) -> Self {
        self.backlight_state = backlight;
        self
    }

    pub fn busy_wait(mut self, busy_wait: BusyWait) -> Self {
        self.busy_wait = busy_wait;
        self
    }

    /// Pause between two busy flag polls, 10 ms unless set.
    pub fn poll_interval_ms(mut self, ms: u8) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Initializes the hardware and returns the ready display.
    ///
    /// The controller powers up in 8-bit mode, so the first function set goes out as a
    /// single nibble. Everything after it is a full 4-bit transfer.
    pub fn init(self) -> Result<Lcd<'a, I, D>, Error<E>> {
        let port = Pcf8574::new(self.i2c, self.address);
        let mut lcd = Lcd {
            bus: Interface::new(
                port,
                self.delay,
                self.backlight_state,
                self.busy_wait,
                self.poll_interval_ms,
            ),
            state: State::Uninitialized,
            cursor: 0,
        };

        lcd.reinit()?;
        Ok(lcd)
    }
}

pub struct Lcd<'a, I, D>
where
    I: i2c::Write,
    D: DelayMs<u8>,
{
    bus: Interface<'a, I, D>,
    state: State,
    cursor: u8,
}

impl<'a, I, D, E> Lcd<'a, I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
{
    /// Runs the initialization sequence again. Leaves the screen cleared.
    ///
    /// On error the state stays at the step that failed.
    pub fn reinit(&mut self) -> Result<(), Error<E>> {
        self.enter(State::Uninitialized);
        self.init_sequence().map_err(|e| {
            error!("LCD initialization failed in state {:?}", self.state);
            e
        })
    }

    fn init_sequence(&mut self) -> Result<(), Error<E>> {
        let function_set = Mode::FunctionSet as u8 | BitMode::Bit4 as u8;
        self.bus.send_half_command(function_set)?;
        self.enter(State::FunctionSetPending);

        self.bus.send_command(function_set | Lines::Two as u8)?;
        self.enter(State::TwoLineModePending);

        let display_ctrl = DisplayControl::DisplayOn as u8
            | DisplayControl::CursorOn as u8
            | DisplayControl::CursorBlink as u8;
        self.bus.send_command(Mode::DisplayControl as u8 | display_ctrl)?;
        self.enter(State::DisplayOnPending);

        self.clear()?;
        self.enter(State::Cleared);

        self.set_cursor(0)?;
        self.enter(State::Ready);
        Ok(())
    }

    fn enter(&mut self, state: State) {
        debug!("LCD state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == State::Ready
    }

    /// Cursor position last set through [`Self::set_cursor`], [`Self::clear`] or
    /// [`Self::return_home`]. Printing does not move it.
    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    /// Clear the display, the controller moves its cursor to 0.
    pub fn clear(&mut self) -> Result<(), Error<E>> {
        debug!("Clearing LCD");
        self.bus.send_command(Commands::Clear as u8)?;
        self.cursor = 0;
        Ok(())
    }

    /// Return cursor to upper left corner without clearing.
    pub fn return_home(&mut self) -> Result<(), Error<E>> {
        self.bus.send_command(Commands::ReturnHome as u8)?;
        self.cursor = 0;
        Ok(())
    }

    /// Moves the cursor to `pos`, counted from the first cell of line one through the
    /// last cell of line two.
    pub fn set_cursor(&mut self, pos: u8) -> Result<(), Error<E>> {
        let address = ddram_address(pos).ok_or(Error::InvalidArgument)?;
        self.bus.send_command(Mode::SetDdramAddress as u8 | address)?;
        self.cursor = pos;
        Ok(())
    }

    /// Set the cursor to (line, column). Coordinates are zero-based.
    pub fn set_cursor_at(&mut self, line: u8, column: u8) -> Result<(), Error<E>> {
        if line >= LINES || column >= COLUMNS {
            return Err(Error::InvalidArgument);
        }
        self.set_cursor(line * COLUMNS + column)
    }

    pub fn print_char(&mut self, symbol: u8) -> Result<(), Error<E>> {
        self.bus.send_data(symbol)
    }

    /// Write string to display at the controller's cursor.
    pub fn write_str(&mut self, data: &str) -> Result<(), Error<E>> {
        for byte in data.bytes() {
            self.print_char(byte)?;
        }
        Ok(())
    }

    pub fn read_status(&mut self) -> Result<Status, Error<E>> {
        self.bus.read_status()
    }

    pub fn backlight(&self) -> Backlight {
        self.bus.backlight()
    }

    pub fn set_backlight(&mut self, backlight: Backlight) -> Result<(), Error<E>> {
        self.bus.set_backlight(backlight)
    }

    /// Opens a writing session. The session borrows the display for its whole lifetime,
    /// so only one can be open at a time.
    pub fn session(&mut self) -> Session<'_, 'a, I, D> {
        Session::open(self)
    }
}

impl<'a, I, D, E> uWrite for Lcd<'a, I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
{
    type Error = Error<E>;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_maps_directly() {
        for pos in 0..COLUMNS {
            assert_eq!(ddram_address(pos), Some(pos));
            assert_eq!(Mode::SetDdramAddress as u8 | pos, 0x80 | pos);
        }
    }

    #[test]
    fn second_line_starts_at_0x40() {
        for pos in COLUMNS..CELLS {
            assert_eq!(ddram_address(pos), Some(pos - 16 + 0x40));
        }
        assert_eq!(ddram_address(16), Some(0x40));
        assert_eq!(ddram_address(31), Some(0x4F));
    }

    #[test]
    fn positions_past_last_cell_are_rejected() {
        assert_eq!(ddram_address(32), None);
        assert_eq!(ddram_address(u8::MAX), None);
    }

    #[test]
    fn init_instructions() {
        assert_eq!(Mode::FunctionSet as u8 | BitMode::Bit4 as u8, 0x20);
        assert_eq!(
            Mode::FunctionSet as u8 | BitMode::Bit4 as u8 | Lines::Two as u8,
            0x28
        );
        let display_ctrl = DisplayControl::DisplayOn as u8
            | DisplayControl::CursorOn as u8
            | DisplayControl::CursorBlink as u8;
        assert_eq!(Mode::DisplayControl as u8 | display_ctrl, 0x0F);
    }
}
