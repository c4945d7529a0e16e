use crate::driver::{CursorDirection, HD44780Driver};
use crate::timing::{self, TimingPolicy};
use crate::{BusState, LcdError, LcdResult, LcdTransport};
use log::trace;
use std::thread::yield_now;

/// HD44780 driver speaking the 4-bit bus protocol through an [LcdTransport].
///
/// The driver is a stateless encoder over the transport: cursor position,
/// display flags and glyphs all live in the controller. One instance is one
/// session and must not be shared between threads; a transaction is a
/// multi-step line sequence and interleaving another thread's transaction
/// would corrupt the bus.
#[derive(Debug)]
pub struct TransportHD44780Driver<'a> {
    transport: &'a dyn LcdTransport,
    timing: TimingPolicy,
}

/// Restores the bus to its released state (enable low, data lines tri-stated)
/// if a transaction does not run to completion, whether it bailed out on a
/// transport error or is unwinding through a panic. A partially driven bus
/// must never outlive the transaction that drove it.
struct ReleaseGuard<'a> {
    transport: &'a dyn LcdTransport,
    register_select: bool,
    armed: bool,
}

impl<'a> ReleaseGuard<'a> {
    fn new(transport: &'a dyn LcdTransport, register_select: bool) -> Self {
        ReleaseGuard {
            transport,
            register_select,
            armed: true,
        }
    }

    /// Sends the released state as the transaction's terminal edge and
    /// disarms the guard.
    fn release(mut self) -> LcdResult<()> {
        self.armed = false;
        self.transport.send(&BusState::released(self.register_select))
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            _ = self.transport.send(&BusState::released(self.register_select));
        }
    }
}

impl<'a> TransportHD44780Driver<'a> {
    /// Creates a session that polls the busy flag between transactions.
    /// Requires a transport whose `recv` is implemented.
    pub fn new_busy_flag(transport: &'a dyn LcdTransport) -> Self {
        TransportHD44780Driver {
            transport,
            timing: TimingPolicy::BusyFlag,
        }
    }

    /// Creates a session for a write-only bus that waits the worst-case
    /// datasheet delay after every transaction.
    pub fn new_fixed_delay(transport: &'a dyn LcdTransport) -> Self {
        TransportHD44780Driver {
            transport,
            timing: TimingPolicy::FixedDelay,
        }
    }

    pub fn timing(&self) -> TimingPolicy {
        self.timing
    }

    /// Emits one 4-bit write cycle: drive RS and the nibble with enable low,
    /// pulse enable, then release the data lines.
    fn write4(&mut self, register_select: bool, nibble: u8) -> LcdResult<()> {
        trace!("Writing nibble: {:04b}, RS: {}", nibble & 0b1111, register_select);

        let guard = ReleaseGuard::new(self.transport, register_select);
        let state = BusState::write(register_select, nibble);
        self.transport.send(&state)?;
        self.transport.delay(timing::ADDRESS_SETUP);
        self.transport.send(&state.with_enable(true))?;
        self.transport.delay(timing::ENABLE_PULSE_WIDTH);
        self.transport.send(&state.with_enable(false))?;
        self.transport.delay(timing::ENABLE_CYCLE_REMAINDER);
        guard.release()
    }

    /// Writes a byte as two 4-bit cycles, high nibble first.
    fn write8(&mut self, register_select: bool, data: u8) -> LcdResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, register_select);
        self.write4(register_select, data >> 4)?;
        self.write4(register_select, data & 0b1111)
    }

    /// Emits one 4-bit read cycle: the data lines stay released on our side,
    /// and the controller's nibble is sampled while enable is high.
    fn read4(&mut self, register_select: bool) -> LcdResult<u8> {
        let guard = ReleaseGuard::new(self.transport, register_select);
        let state = BusState::read(register_select, false);
        self.transport.send(&state)?;
        self.transport.delay(timing::ADDRESS_SETUP);
        self.transport.send(&state.with_enable(true))?;
        self.transport.delay(timing::READ_DATA_DELAY);
        let nibble = self.transport.recv()? & 0b1111;
        self.transport.delay(timing::READ_ENABLE_HOLD);
        self.transport.send(&state.with_enable(false))?;
        self.transport.delay(timing::ENABLE_CYCLE_REMAINDER);
        guard.release()?;

        trace!("Read nibble: {:04b}, RS: {}", nibble, register_select);
        Ok(nibble)
    }

    /// Reads a byte as two 4-bit cycles, high nibble first.
    fn read8(&mut self, register_select: bool) -> LcdResult<u8> {
        if self.timing == TimingPolicy::FixedDelay {
            return Err(LcdError::NotSupported);
        }

        let high_nibble = self.read4(register_select)?;
        let low_nibble = self.read4(register_select)?;
        let data = (high_nibble << 4) | low_nibble;

        trace!("Read data: {:08b}, RS: {}", data, register_select);
        Ok(data)
    }

    /// Polls the busy flag until the controller reports idle.
    ///
    /// There is deliberately no timeout; a controller that never clears the
    /// flag blocks forever. The scheduler is yielded between polls.
    fn busy_wait(&mut self) -> LcdResult<()> {
        loop {
            let status = self.read8(false)?;
            if status & 0b10000000 == 0 {
                return Ok(());
            }
            yield_now();
        }
    }

    /// Waits for the previous transaction to finish executing, either by
    /// polling the busy flag or by waiting out the given worst-case time.
    fn settle(&mut self, execution: std::time::Duration) -> LcdResult<()> {
        match self.timing {
            TimingPolicy::BusyFlag => self.busy_wait(),
            TimingPolicy::FixedDelay => {
                self.transport.delay(execution);
                Ok(())
            }
        }
    }
}

impl HD44780Driver for TransportHD44780Driver<'_> {
    /// Runs the 4-bit power-on sequence of the datasheet (figure 24).
    ///
    /// The first three forced function sets synchronize the controller out of
    /// whatever mode it powered up in, with fixed delays because the busy
    /// flag cannot be read before the interface width is known. The fourth
    /// nibble switches to 4-bit mode; from then on every transaction is a
    /// nibble pair. The ordering and delays are a hard contract: deviating
    /// risks the controller latching spurious nibbles.
    fn init(&mut self) -> LcdResult<()> {
        // Synchronize to 8-bit mode, then drop to 4-bit
        self.write4(false, 0b0011)?;
        self.transport.delay(timing::POWER_ON_FIRST);
        self.write4(false, 0b0011)?;
        self.transport.delay(timing::POWER_ON_SECOND);
        self.write4(false, 0b0011)?;
        self.transport.delay(timing::COMMAND_EXECUTION);
        self.write4(false, 0b0010)?;
        self.settle(timing::COMMAND_EXECUTION)?;

        // 4-bit interface, 2 display lines, 5x8 font
        self.function_set(false, true, false)?;
        // Display off while clearing, so no power-on garbage shows
        self.set_display_control(false, false, false)?;
        self.clear_display()?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.set_display_control(true, false, false)?;
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> LcdResult<()> {
        self.write8(false, command)?;
        self.settle(timing::execution_time(command))
    }

    fn send_data(&mut self, data: u8) -> LcdResult<()> {
        self.write8(true, data)?;
        self.settle(timing::COMMAND_EXECUTION)
    }

    fn supports_read(&self) -> bool {
        self.timing == TimingPolicy::BusyFlag
    }

    fn read_command(&mut self) -> LcdResult<u8> {
        self.read8(false)
    }

    fn read_data(&mut self) -> LcdResult<u8> {
        let data = self.read8(true)?;
        self.busy_wait()?;
        Ok(data)
    }
}
