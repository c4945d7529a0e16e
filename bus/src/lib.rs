pub mod driver;
pub mod timing;

use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the operation is not supported on this bus")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for LcdError {
    fn from(err: std::io::Error) -> Self {
        LcdError::Io(err.kind())
    }
}

pub type LcdResult<T> = Result<T, LcdError>;

/// One full state of the 4-bit HD44780 bus, sent to the transport on every
/// transaction edge.
///
/// The state is a plain value: composing a transaction means sending a series
/// of these, never mutating a shared cell. `data` of `None` means the data
/// lines are released (tri-stated), which is also the terminal state of every
/// transaction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BusState {
    /// Register select line; `false` for the instruction register, `true` for data.
    pub register_select: bool,
    /// Read/write line; `false` for write. Write-only transports may ignore it.
    pub read: bool,
    /// Enable line; data is latched by the controller on its falling edge.
    pub enable: bool,
    /// The 4 data lines, LSb first; `None` leaves them released (tri-stated).
    pub data: Option<u8>,
}

impl BusState {
    /// A write cycle state driving the given nibble, with enable low.
    pub fn write(register_select: bool, nibble: u8) -> Self {
        BusState {
            register_select,
            read: false,
            enable: false,
            data: Some(nibble & 0b1111),
        }
    }

    /// A read cycle state with the data lines released so the controller can
    /// drive them.
    pub fn read(register_select: bool, enable: bool) -> Self {
        BusState {
            register_select,
            read: true,
            enable,
            data: None,
        }
    }

    /// The idle state left behind after every transaction: enable low, write
    /// mode, data lines released.
    pub fn released(register_select: bool) -> Self {
        BusState {
            register_select,
            read: false,
            enable: false,
            data: None,
        }
    }

    /// The same state with the enable line changed.
    pub fn with_enable(self, enable: bool) -> Self {
        BusState { enable, ..self }
    }
}

/// The bus transport the protocol engine drives.
///
/// Implementations apply [BusState] values to physical pins or an
/// I2C-connected port expander. The engine holds only a borrowed reference to
/// the transport for the duration of a session and keeps no controller state
/// of its own.
pub trait LcdTransport: Debug {
    /// Applies the given bus state to the physical lines. Must complete,
    /// including any electrical settle the medium needs, before returning.
    fn send(&self, state: &BusState) -> LcdResult<()>;

    /// Samples the 4 data lines and returns them in the low nibble.
    ///
    /// Only required for the busy-flag timing variant; write-only transports
    /// keep the default, which returns [LcdError::NotSupported].
    fn recv(&self) -> LcdResult<u8> {
        Err(LcdError::NotSupported)
    }

    /// Blocks for at least the given duration.
    ///
    /// Sub-millisecond durations are expected to be honored with reasonable
    /// precision, so implementations typically spin on a monotonic clock for
    /// short waits and sleep for long ones.
    fn delay(&self, duration: Duration);
}
