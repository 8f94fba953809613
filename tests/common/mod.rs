#![allow(dead_code)]

use embedded_hal_mock::i2c::Transaction as I2cTransaction;
use embedded_hal_mock::MockError;
use std::io::ErrorKind;

pub const ADDRESS: u8 = 0x27;

/// Byte read back while the controller is idle: flag clear, control lines high.
pub const IDLE: u8 = 0x0E;
pub const BUSY: u8 = 0x8E;

pub fn bus_error() -> MockError {
    MockError::Io(ErrorKind::Other)
}

pub fn poll(high: u8) -> Vec<I2cTransaction> {
    vec![
        I2cTransaction::write(ADDRESS, vec![0xFE]),
        I2cTransaction::read(ADDRESS, vec![high]),
        I2cTransaction::write(ADDRESS, vec![0xFA]),
        I2cTransaction::write(ADDRESS, vec![0xFE]),
        I2cTransaction::read(ADDRESS, vec![IDLE]),
    ]
}

pub fn nibble(value: u8, rs: u8) -> Vec<I2cTransaction> {
    let base = (value << 4) | 0x0C | rs;
    vec![
        I2cTransaction::write(ADDRESS, vec![base]),
        I2cTransaction::write(ADDRESS, vec![base ^ 0x04]),
    ]
}

pub fn command(cmd: u8) -> Vec<I2cTransaction> {
    let mut transactions = poll(IDLE);
    transactions.extend(nibble(cmd >> 4, 0));
    transactions.extend(nibble(cmd & 0x0F, 0));
    transactions
}

pub fn data(byte: u8) -> Vec<I2cTransaction> {
    let mut transactions = nibble(byte >> 4, 1);
    transactions.extend(nibble(byte & 0x0F, 1));
    transactions
}

pub fn text(bytes: &[u8]) -> Vec<I2cTransaction> {
    bytes.iter().flat_map(|&b| data(b)).collect()
}

pub fn init() -> Vec<I2cTransaction> {
    let mut transactions = nibble(0x2, 0);
    transactions.extend(command(0x28));
    transactions.extend(command(0x0F));
    transactions.extend(command(0x01));
    transactions.extend(command(0x80));
    transactions
}

/// Clear, cursor home, then the message with the second line jump after 16 characters.
pub fn flush(message: &[u8]) -> Vec<I2cTransaction> {
    let mut transactions = command(0x01);
    transactions.extend(command(0x80));
    for (index, &byte) in message.iter().enumerate() {
        if index == 16 {
            transactions.extend(command(0xC0));
        }
        transactions.extend(data(byte));
    }
    transactions
}
