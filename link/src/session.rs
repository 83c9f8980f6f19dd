use embedded_hal::i2c::{Error as _, I2c};

use crate::bus::BusBackend;
use crate::error::{SessionError, TransportFault};

/// Exclusive owner of the I2C handle for one controller.
///
/// At most one handle is live at a time. `reset` drops the old handle before
/// acquiring a new one, so nothing from a previous handle survives it. The
/// handle is released on drop.
pub struct BusSession<B: BusBackend> {
    backend: B,
    handle: Option<B::Handle>,
    address: u8,
    channel: u8,
}

impl<B: BusBackend> BusSession<B> {
    pub fn open(mut backend: B, address: u8, channel: u8) -> Result<Self, SessionError> {
        let handle = backend
            .open(channel)
            .map_err(|e| SessionError::Open {
                channel,
                source: Box::new(e),
            })?;
        tracing::debug!("I2C channel {} opened for device {:#04x}", channel, address);

        Ok(Self {
            backend,
            handle: Some(handle),
            address,
            channel,
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Release the handle and acquire a fresh one on the same channel.
    ///
    /// On failure the session is left without a handle; transactions report
    /// `TransportFault::NotOpen` until a later reset succeeds.
    pub fn reset(&mut self) -> Result<(), B::Error> {
        self.handle = None;
        let handle = self.backend.open(self.channel)?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Release the handle. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            tracing::debug!("I2C channel {} closed", self.channel);
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), TransportFault> {
        let address = self.address;
        let handle = self.handle.as_mut().ok_or(TransportFault::NotOpen)?;
        handle
            .write(address, bytes)
            .map_err(|e| TransportFault::Bus(e.kind()))
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportFault> {
        let address = self.address;
        let handle = self.handle.as_mut().ok_or(TransportFault::NotOpen)?;
        handle
            .read(address, buf)
            .map_err(|e| TransportFault::Bus(e.kind()))
    }
}

impl<B: BusBackend> Drop for BusSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedChip;

    #[test]
    fn open_failure_is_fatal() {
        let chip = SimulatedChip::new();
        chip.fail_opens(1);
        let err = BusSession::open(chip.clone(), 0x24, 1).err().unwrap();
        assert!(matches!(err, SessionError::Open { channel: 1, .. }));
    }

    #[test]
    fn reset_replaces_the_handle() {
        let chip = SimulatedChip::new();
        let mut session = BusSession::open(chip.clone(), 0x24, 1).unwrap();
        session.reset().unwrap();
        assert_eq!(chip.open_count(), 2);
        assert_eq!(chip.live_handles(), 1);
    }

    #[test]
    fn failed_reset_leaves_session_closed() {
        let chip = SimulatedChip::new();
        let mut session = BusSession::open(chip.clone(), 0x24, 1).unwrap();
        chip.fail_opens(1);
        assert!(session.reset().is_err());
        assert!(!session.is_open());
        assert_eq!(session.write(&[0x00]), Err(TransportFault::NotOpen));

        session.reset().unwrap();
        assert!(session.write(&[0x00]).is_ok());
    }

    #[test]
    fn close_is_idempotent_and_runs_on_drop() {
        let chip = SimulatedChip::new();
        let mut session = BusSession::open(chip.clone(), 0x24, 1).unwrap();
        session.close();
        session.close();
        assert_eq!(chip.live_handles(), 0);

        let session = BusSession::open(chip.clone(), 0x24, 1).unwrap();
        assert_eq!(chip.live_handles(), 1);
        drop(session);
        assert_eq!(chip.live_handles(), 0);
    }

    #[test]
    fn transactions_go_to_the_session_address() {
        let chip = SimulatedChip::new();
        let mut session = BusSession::open(chip.clone(), 0x25, 1).unwrap();
        assert!(matches!(session.write(&[0x00]), Err(TransportFault::Bus(_))));
    }
}
