//! In-memory PN532 on a virtual I2C bus.
//!
//! Frames are queued for the host to read, writes are recorded, and faults
//! can be injected on open, read and write. With emulation on, the chip
//! answers the commands this crate issues the way the real controller does:
//! an ACK first, then the response frame.
//!
//! `SimulatedChip` is cheap to clone; clones share one chip, so a test can
//! keep a clone to inspect what the link did with the other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use thiserror::Error;

use crate::bus::BusBackend;
use crate::commands;
use crate::config::DEFAULT_ADDRESS;
use crate::frame::{self, Direction, Frame, I2C_READY};

#[derive(Debug, Error)]
#[error("simulated I2C channel {0} unavailable")]
pub struct SimulatedOpenError(pub u8);

struct ChipState {
    address: u8,
    emulate: bool,
    target: Option<Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    reads: usize,
    opens: usize,
    live: usize,
    open_faults: usize,
    write_faults: usize,
    read_faults: usize,
}

#[derive(Clone)]
pub struct SimulatedChip {
    state: Arc<Mutex<ChipState>>,
}

impl Default for SimulatedChip {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedChip {
    /// A scripted chip: it answers only with what is queued.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChipState {
                address: DEFAULT_ADDRESS,
                emulate: false,
                target: None,
                pending: VecDeque::new(),
                writes: Vec::new(),
                reads: 0,
                opens: 0,
                live: 0,
                open_faults: 0,
                write_faults: 0,
                read_faults: 0,
            })),
        }
    }

    /// A chip that answers commands like a PN532 with no tag in the field.
    pub fn pn532() -> Self {
        let chip = Self::new();
        chip.lock().emulate = true;
        chip
    }

    fn lock(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a tag with `uid` in the field, or take it away with `None`.
    pub fn set_target(&self, uid: Option<Vec<u8>>) {
        self.lock().target = uid;
    }

    pub fn set_address(&self, address: u8) {
        self.lock().address = address;
    }

    /// Queue a frame as the controller would send it.
    pub fn queue_frame(&self, frame: &Frame) {
        self.queue_raw(frame.encode_as(Direction::ControllerToHost));
    }

    /// Queue raw bytes to follow a ready status byte.
    pub fn queue_raw(&self, bytes: Vec<u8>) {
        self.lock().pending.push_back(bytes);
    }

    pub fn fail_opens(&self, count: usize) {
        self.lock().open_faults = count;
    }

    pub fn fail_writes(&self, count: usize) {
        self.lock().write_faults = count;
    }

    pub fn fail_reads(&self, count: usize) {
        self.lock().read_faults = count;
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    pub fn live_handles(&self) -> usize {
        self.lock().live
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Successful writes that decode as frames.
    pub fn written_frames(&self) -> Vec<Frame> {
        self.lock()
            .writes
            .iter()
            .filter_map(|bytes| frame::decode(bytes).ok())
            .collect()
    }

    pub fn pending_frames(&self) -> usize {
        self.lock().pending.len()
    }
}

impl ChipState {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        if self.write_faults > 0 {
            self.write_faults -= 1;
            return Err(ErrorKind::Bus);
        }
        self.writes.push(bytes.to_vec());

        if self.emulate {
            if let Ok(command) = frame::decode(bytes) {
                if command.is_data() {
                    // A new command supersedes any unread response
                    self.pending.clear();
                    for reply in self.respond(command.payload()) {
                        self.pending
                            .push_back(reply.encode_as(Direction::ControllerToHost));
                    }
                }
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind> {
        self.reads += 1;
        if self.read_faults > 0 {
            self.read_faults -= 1;
            return Err(ErrorKind::Bus);
        }

        buf.fill(0);
        if let Some((status, rest)) = buf.split_first_mut() {
            if let Some(bytes) = self.pending.pop_front() {
                *status = I2C_READY;
                let n = bytes.len().min(rest.len());
                rest[..n].copy_from_slice(&bytes[..n]);
            }
        }
        Ok(())
    }

    fn respond(&self, command: &[u8]) -> Vec<Frame> {
        let Some(&code) = command.first() else {
            return vec![Frame::ack()];
        };
        let reply = code.wrapping_add(1);

        match code {
            commands::GET_FIRMWARE_VERSION => vec![
                Frame::ack(),
                Frame::command(&[reply, 0x32, 0x01, 0x06, 0x07]),
            ],
            commands::IN_LIST_PASSIVE_TARGET => match &self.target {
                Some(uid) => {
                    let mut payload = vec![reply, 0x01, 0x01, 0x00, 0x44, 0x00, uid.len() as u8];
                    payload.extend_from_slice(uid);
                    vec![Frame::ack(), Frame::command(&payload)]
                }
                // The controller keeps looking and never answers
                None => vec![Frame::ack()],
            },
            _ => vec![Frame::ack(), Frame::command(&[reply])],
        }
    }
}

impl BusBackend for SimulatedChip {
    type Handle = SimulatedHandle;
    type Error = SimulatedOpenError;

    fn open(&mut self, channel: u8) -> Result<Self::Handle, Self::Error> {
        let mut state = self.lock();
        state.opens += 1;
        if state.open_faults > 0 {
            state.open_faults -= 1;
            return Err(SimulatedOpenError(channel));
        }
        state.live += 1;

        Ok(SimulatedHandle {
            chip: self.clone(),
        })
    }
}

/// One open handle on the virtual bus.
pub struct SimulatedHandle {
    chip: SimulatedChip,
}

impl Drop for SimulatedHandle {
    fn drop(&mut self) {
        let mut state = self.chip.lock();
        state.live = state.live.saturating_sub(1);
    }
}

impl ErrorType for SimulatedHandle {
    type Error = ErrorKind;
}

impl I2c for SimulatedHandle {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.chip.lock();
        if address != state.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for operation in operations {
            match operation {
                Operation::Write(bytes) => state.write(bytes)?,
                Operation::Read(buf) => state.read(buf)?,
            }
        }
        Ok(())
    }
}
