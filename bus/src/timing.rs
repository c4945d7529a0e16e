//! Bus timing constants from the HD44780U datasheet.
//!
//! The nibble codec uses the edge timings for every transaction; the
//! power-on and execution delays only matter for the fixed-delay policy and
//! for the forced-4-bit-mode part of initialization, where the busy flag
//! cannot be read yet.

use std::time::Duration;

/// Address setup time before raising enable (t_AS).
pub const ADDRESS_SETUP: Duration = Duration::from_nanos(60);
/// Minimum enable pulse width (PW_EH).
pub const ENABLE_PULSE_WIDTH: Duration = Duration::from_nanos(450);
/// Remainder of the enable cycle after dropping enable, so that two
/// consecutive transactions respect the minimum cycle time (t_cycE).
pub const ENABLE_CYCLE_REMAINDER: Duration = Duration::from_nanos(490);
/// Delay between raising enable and the data lines being valid on a read (t_DDR).
pub const READ_DATA_DELAY: Duration = Duration::from_nanos(360);
/// Remainder of the enable pulse after sampling the data lines on a read.
pub const READ_ENABLE_HOLD: Duration = Duration::from_nanos(90);

/// Delay after the first forced-8-bit function set at power on. Covers the
/// worst-case supply ramp, after which the chip is guaranteed to accept
/// instructions.
pub const POWER_ON_FIRST: Duration = Duration::from_micros(4100);
/// Delay after the second forced-8-bit function set at power on.
pub const POWER_ON_SECOND: Duration = Duration::from_micros(100);
/// Worst-case execution time of an ordinary instruction or data write.
pub const COMMAND_EXECUTION: Duration = Duration::from_micros(37);
/// Worst-case execution time of the clear instruction, which rewrites all of
/// DDRAM internally.
pub const CLEAR_EXECUTION: Duration = Duration::from_micros(1520);

/// Worst-case execution time of the given instruction byte, for the
/// fixed-delay policy.
pub fn execution_time(command: u8) -> Duration {
    if command == 0b00000001 {
        CLEAR_EXECUTION
    } else {
        COMMAND_EXECUTION
    }
}

/// How the driver waits for the controller to finish executing between
/// transactions. Exactly one policy is picked per session.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TimingPolicy {
    /// Poll the busy flag (bit 7 of an instruction-register read) until it
    /// clears. Requires a bidirectional bus, and also enables reading display
    /// memory back.
    ///
    /// There is no poll timeout: a controller that never clears the busy flag
    /// blocks the calling thread indefinitely.
    BusyFlag,
    /// Wait the worst-case execution time of each instruction per the
    /// datasheet table. For write-only buses, e.g. behind an I2C port
    /// expander with the R/W line tied low.
    FixedDelay,
}
