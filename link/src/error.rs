use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

/// A bus transaction failed at the physical layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFault {
    #[error("no bus handle is open")]
    NotOpen,
    #[error("bus transaction failed: {0}")]
    Bus(ErrorKind),
}

/// The only irrecoverable condition: the first handle could not be acquired.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open I2C channel {channel}")]
    Open {
        channel: u8,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// The governing deadline passed before a frame arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no response before the deadline")]
pub struct TimedOut;

/// Outcome of a command that expects a data response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// No ACK (silence, or DATA where ACK was due)
    #[error("command was not acknowledged")]
    NotAcknowledged,
    /// Acknowledged, but the data frame never came
    #[error("command acknowledged but no response arrived")]
    TimedOut,
    #[error("unexpected response {0:02x?}")]
    UnexpectedResponse(Vec<u8>),
}

impl From<TimedOut> for ExchangeError {
    fn from(_: TimedOut) -> Self {
        ExchangeError::TimedOut
    }
}
