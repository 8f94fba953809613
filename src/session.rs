//! Newline terminated messages, buffered until complete and then drawn on both lines.

use embedded_hal::blocking::{delay::DelayMs, i2c};
use log::{debug, warn};
use ufmt_write::uWrite;

use crate::{Error, Lcd, COLUMNS};

/// Storage for one message, terminator included.
pub const BUFFER_LEN: usize = 34;
/// Longest message a session accepts, counted over all writes since the last flush.
pub const MAX_MESSAGE_LEN: usize = BUFFER_LEN - 1;
/// Ends a message and triggers drawing it.
pub const TERMINATOR: u8 = b'\n';

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("message longer than {} bytes", MAX_MESSAGE_LEN)]
pub struct Overflow;

/// Bytes written since the last flush.
#[derive(Clone, Debug)]
pub struct LineBuffer {
    bytes: [u8; BUFFER_LEN],
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; BUFFER_LEN],
            len: 0,
        }
    }

    /// Current write offset.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Appends `bytes` at the current offset.
    ///
    /// Anything that would take the buffer past [`MAX_MESSAGE_LEN`] is rejected as a
    /// whole, and the message collected so far is dropped with it.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize, Overflow> {
        let end = self.len + bytes.len();
        if end > MAX_MESSAGE_LEN {
            self.reset();
            return Err(Overflow);
        }
        self.bytes[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(bytes.len())
    }

    /// The buffered message without its terminator, once one has been written.
    pub fn message(&self) -> Option<&[u8]> {
        let buffered = self.as_bytes();
        buffered
            .iter()
            .position(|&b| b == TERMINATOR)
            .map(|end| &buffered[..end])
    }

    pub fn reset(&mut self) {
        self.bytes = [0; BUFFER_LEN];
        self.len = 0;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive writer on a display, owning its own [`LineBuffer`].
pub struct Session<'s, 'a, I, D>
where
    I: i2c::Write,
    D: DelayMs<u8>,
{
    lcd: &'s mut Lcd<'a, I, D>,
    buffer: LineBuffer,
}

impl<'s, 'a, I, D, E> Session<'s, 'a, I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
{
    pub(crate) fn open(lcd: &'s mut Lcd<'a, I, D>) -> Self {
        debug!("LCD session opened");
        Self {
            lcd,
            buffer: LineBuffer::new(),
        }
    }

    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    /// Buffers `bytes` and, once a [`TERMINATOR`] has arrived, redraws the display with
    /// the message. Returns the number of bytes taken, always all of them on success.
    ///
    /// Characters past the first line continue on the second. Whatever follows the
    /// terminator in the same write is discarded with the buffer.
    ///
    /// A bus error during the redraw leaves the buffer as it was.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, Error<E>> {
        if let Err(overflow) = self.buffer.append(bytes) {
            warn!(
                "LCD message too long, max {} characters",
                MAX_MESSAGE_LEN - 1
            );
            return Err(overflow.into());
        }

        if let Some(message) = self.buffer.message() {
            debug!("Flushing {} character message", message.len());
            self.lcd.clear()?;
            self.lcd.set_cursor(0)?;
            for (index, &symbol) in message.iter().enumerate() {
                if index == COLUMNS as usize {
                    self.lcd.set_cursor(COLUMNS)?;
                }
                self.lcd.print_char(symbol)?;
            }
            self.buffer.reset();
        }

        Ok(bytes.len())
    }

    /// Ends the session, returning whatever was buffered and not yet flushed.
    pub fn close(self) -> LineBuffer {
        debug!("LCD session closed with {} bytes pending", self.buffer.len());
        self.buffer
    }
}

impl<'s, 'a, I, D, E> uWrite for Session<'s, 'a, I, D>
where
    I: i2c::Write<Error = E> + i2c::Read<Error = E>,
    D: DelayMs<u8>,
{
    type Error = Error<E>;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.write(s.as_bytes()).map(|_| ())
    }
}
