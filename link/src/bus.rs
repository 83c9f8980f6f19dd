//! Bus backends.
//!
//! A backend knows how to acquire a handle for a numbered I2C channel. The
//! handle itself is any `embedded-hal` I2C implementation; dropping it
//! releases the peripheral.

use embedded_hal::i2c::I2c;

pub trait BusBackend {
    type Handle: I2c;
    type Error: std::error::Error + Send + Sync + 'static;

    fn open(&mut self, channel: u8) -> Result<Self::Handle, Self::Error>;
}

/// Raspberry Pi I2C via `/dev/i2c-N`.
#[cfg(feature = "rppal")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RppalBackend;

#[cfg(feature = "rppal")]
impl BusBackend for RppalBackend {
    type Handle = rppal::i2c::I2c;
    type Error = rppal::i2c::Error;

    fn open(&mut self, channel: u8) -> Result<Self::Handle, Self::Error> {
        rppal::i2c::I2c::with_bus(channel)
    }
}
