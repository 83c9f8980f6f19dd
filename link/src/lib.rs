//! Reliable command/response link to a PN532 NFC controller over I2C.
//!
//! The controller may be silent, slow, busy with a previous command, or reset
//! under our feet. This crate hides that behind blocking operations:
//!
//! - [`Pn532::send`] writes a frame, resetting the bus and retrying on faults
//! - [`Pn532::poll`] reads until a frame decodes or the [`Deadline`] passes,
//!   acknowledging DATA frames on the way
//! - [`Pn532::send_and_await_ack`] / [`Pn532::send_and_await_data`] run the
//!   ACK-then-response handshake
//! - [`Pn532::configure_device`], [`Pn532::read_target_uid`] and friends wrap
//!   the commands a tag reader needs
//!
//! ```no_run
//! use std::time::Duration;
//! use pn532_link::{Config, Pn532, SimulatedChip};
//!
//! let chip = SimulatedChip::pn532();
//! chip.set_target(Some(vec![0x04, 0xA1, 0xB2, 0xC3]));
//!
//! let mut pn532 = Pn532::open(chip, &Config::default())?;
//! pn532.configure_device(None);
//! if let Some(target) = pn532.read_passive_target(Duration::from_secs(5))? {
//!     println!("UID {}", target.uid_hex());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bus;
pub mod commands;
pub mod config;
pub mod deadline;
pub mod error;
pub mod event;
pub mod frame;
mod link;
pub mod ops;
pub mod session;
pub mod sim;
pub mod target;

pub use bus::BusBackend;
#[cfg(feature = "rppal")]
pub use bus::RppalBackend;
pub use config::Config;
pub use deadline::Deadline;
pub use error::{ExchangeError, SessionError, TimedOut, TransportFault};
pub use event::{Event, EventSink, JsonLinesSink, TracingSink};
pub use frame::{DecodeError, Frame, FrameType};
pub use link::Pn532;
pub use session::BusSession;
pub use sim::SimulatedChip;
pub use target::{FirmwareVersion, NfcTagType, TargetInfo};
