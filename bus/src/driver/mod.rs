//! HD44780 driver module.
//!
//! [HD44780Driver] encodes the HD44780U instruction set on top of the two
//! primitive transactions (instruction write, data write). The transactions
//! themselves, including all bus timing, live in the
//! [TransportHD44780Driver] implementation.

mod transport;

use crate::{LcdError, LcdResult};
pub use transport::*;
use std::fmt::Debug;

pub trait HD44780Driver: Debug {
    /// Initializes the HD44780 controller into 4-bit mode with the default
    /// settings, following the power-on sequence of the datasheet (figure 24).
    fn init(&mut self) -> LcdResult<()>;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> LcdResult<()> {
        self.send_command(0b00000001)
    }

    /// Sets the cursor to the home position.
    fn return_home(&mut self) -> LcdResult<()> {
        self.send_command(0b00000010)
    }

    /// Sets the display to the specified entry mode.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> LcdResult<()> {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> LcdResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the display.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> LcdResult<()> {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the function set.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> LcdResult<()> {
        let mut command = 0b00100000;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address.
    fn set_cgram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b00111111 {
            return Err(LcdError::InvalidArgument);
        }
        let command = 0b01000000 | address;
        self.send_command(command)
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b01111111 {
            return Err(LcdError::InvalidArgument);
        }
        let command = 0b10000000 | address;
        self.send_command(command)
    }

    /// Writes the given bytes starting at the given position. Line 0 starts
    /// at DDRAM address 0x00 and line 1 at 0x40.
    ///
    /// An empty slice is legal and only repositions the cursor.
    fn write_str_at(&mut self, line: u8, column: u8, bytes: &[u8]) -> LcdResult<()> {
        let address = column as u16 + line as u16 * 0x40;
        if line > 1 || address > 0b01111111 {
            return Err(LcdError::InvalidArgument);
        }
        self.set_ddram_address(address as u8)?;
        for &byte in bytes {
            self.send_data(byte)?;
        }
        Ok(())
    }

    /// Reads `length` bytes of display memory starting at the given position,
    /// in write order.
    ///
    /// Only available on bidirectional buses; write-only sessions return
    /// [LcdError::NotSupported].
    fn read_str_at(&mut self, line: u8, column: u8, length: usize) -> LcdResult<Vec<u8>> {
        if !self.supports_read() {
            return Err(LcdError::NotSupported);
        }
        let address = column as u16 + line as u16 * 0x40;
        if line > 1 || address > 0b01111111 {
            return Err(LcdError::InvalidArgument);
        }
        self.set_ddram_address(address as u8)?;
        let mut bytes = Vec::with_capacity(length);
        for _ in 0..length {
            bytes.push(self.read_data()?);
        }
        Ok(bytes)
    }

    /// Defines one of the 8 programmable CGRAM characters.
    ///
    /// `bitmap` must be exactly 8 bytes, one per pixel row, each using the
    /// low 5 bits. Fails with [LcdError::InvalidArgument] before touching the
    /// bus if `code` or the bitmap length is out of range.
    fn define_char(&mut self, code: u8, bitmap: &[u8]) -> LcdResult<()> {
        if code > 7 || bitmap.len() != 8 {
            return Err(LcdError::InvalidArgument);
        }
        self.set_cgram_address(code * 8)?;
        for &row in bitmap {
            self.send_data(row)?;
        }
        Ok(())
    }

    /// Reads the busy flag and address counter.
    fn get_busy_flag_and_address(&mut self) -> LcdResult<(bool, u8)> {
        let command = self.read_command()?;
        let busy_flag = command & 0b10000000 != 0;
        let address = command & 0b01111111;
        Ok((busy_flag, address))
    }

    /// Whether this session's bus supports reading back from the controller.
    fn supports_read(&self) -> bool;

    // Low-level transactions
    // These raw transactions are used by the high-level functions above.
    // They are not meant to be used directly, but implemented by the driver implementation.

    /// Writes a command to the instruction register (RS = 0) and waits for it
    /// to execute, per the session's timing policy.
    fn send_command(&mut self, command: u8) -> LcdResult<()>;

    /// Writes a byte to the data register (RS = 1) and waits for it to
    /// execute, per the session's timing policy.
    fn send_data(&mut self, data: u8) -> LcdResult<()>;

    /// Reads the busy flag and address counter from the instruction register
    /// (RS = 0).
    ///
    /// Returns both in a single u8, for easier usage use
    /// [Self::get_busy_flag_and_address], which uses this function internally.
    fn read_command(&mut self) -> LcdResult<u8>;

    /// Reads a byte of display memory from the data register (RS = 1).
    fn read_data(&mut self) -> LcdResult<u8>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}
