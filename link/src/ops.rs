//! Controller operations built on the send/ACK/data handshake.

use std::time::Duration;

use crate::bus::BusBackend;
use crate::commands::{self, baud, sam};
use crate::deadline::Deadline;
use crate::error::ExchangeError;
use crate::event::EventSink;
use crate::frame::Frame;
use crate::link::Pn532;
use crate::target::{FirmwareVersion, TargetInfo};

/// SAMConfiguration: normal mode, 50 ms timeout, IRQ pin unused
pub fn sam_configuration() -> Frame {
    Frame::command(&[
        commands::SAM_CONFIGURATION,
        sam::MODE_NORMAL,
        sam::TIMEOUT_50MS,
        sam::IRQ_OFF,
    ])
}

/// InListPassiveTarget for one ISO14443A target at 106 kbps
pub fn list_passive_target() -> Frame {
    Frame::command(&[commands::IN_LIST_PASSIVE_TARGET, 0x01, baud::ISO14443A_106])
}

pub fn get_firmware_version() -> Frame {
    Frame::command(&[commands::GET_FIRMWARE_VERSION])
}

impl<B: BusBackend, S: EventSink> Pn532<B, S> {
    /// Configure the Security Access Module, with `custom` replacing the
    /// default SAMConfiguration command.
    ///
    /// The controller only acknowledges this command, so only the ACK is
    /// awaited. The result is reported, never raised.
    pub fn configure_device(&mut self, custom: Option<Frame>) -> bool {
        let frame = custom.unwrap_or_else(sam_configuration);
        let acked = self.send_and_await_ack(&frame, Deadline::after(self.default_timeout()));
        if acked {
            tracing::info!("SAM configuration acknowledged");
        } else {
            tracing::warn!("SAM configuration was not acknowledged");
        }
        acked
    }

    /// Wait for a tag to enter the field and return the controller's raw
    /// InListPassiveTarget response.
    pub fn read_target_uid(&mut self, timeout: Duration) -> Result<Frame, ExchangeError> {
        self.send_and_await_data(&list_passive_target(), timeout)
    }

    /// [`read_target_uid`](Self::read_target_uid) with the response parsed.
    pub fn read_passive_target(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<TargetInfo>, ExchangeError> {
        let response = self.read_target_uid(timeout)?;
        TargetInfo::parse(response.payload())
    }

    pub fn firmware_version(&mut self, timeout: Duration) -> Result<FirmwareVersion, ExchangeError> {
        let response = self.send_and_await_data(&get_firmware_version(), timeout)?;
        FirmwareVersion::parse(response.payload())
    }
}
