use std::time::{Duration, Instant};

use crate::bus::BusBackend;
use crate::config::Config;
use crate::deadline::Deadline;
use crate::error::{ExchangeError, SessionError, TimedOut};
use crate::event::{Event, EventSink, TracingSink};
use crate::frame::{self, Frame};
use crate::session::BusSession;

/// Command/response channel to one PN532.
///
/// Every operation takes `&mut self`: the controller is half-duplex and one
/// command/response cycle must finish before the next starts.
pub struct Pn532<B: BusBackend, S: EventSink = TracingSink> {
    session: BusSession<B>,
    sink: S,
    settle_delay: Duration,
    read_window: usize,
    default_timeout: Duration,
}

impl<B: BusBackend> Pn532<B> {
    /// Open the configured channel, logging through `tracing`.
    pub fn open(backend: B, config: &Config) -> Result<Self, SessionError> {
        Self::with_sink(backend, config, TracingSink)
    }
}

impl<B: BusBackend, S: EventSink> Pn532<B, S> {
    pub fn with_sink(backend: B, config: &Config, sink: S) -> Result<Self, SessionError> {
        let session = BusSession::open(backend, config.address, config.channel)?;
        sink.emit(&Event::SessionOpened {
            channel: session.channel(),
            address: session.address(),
        });

        Ok(Self {
            session,
            sink,
            settle_delay: config.settle_delay(),
            read_window: config.read_window(),
            default_timeout: config.default_timeout(),
        })
    }

    pub fn session(&self) -> &BusSession<B> {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Release the bus. Further operations fault until the session is reset
    /// by the sender's recovery path.
    pub fn close(&mut self) {
        if self.session.is_open() {
            self.session.close();
            self.sink.emit(&Event::SessionClosed {
                channel: self.session.channel(),
            });
        }
    }

    /// Write `frame` to the controller, resetting the bus and retrying for
    /// as long as the write faults. Acceptance is not checked here.
    pub fn send(&mut self, frame: &Frame) {
        // Without a deadline the loop only ends on success
        let _ = self.transmit(frame, None);
    }

    /// Like [`send`](Self::send), abandoned once `deadline` has passed.
    pub fn send_within(&mut self, frame: &Frame, deadline: Deadline) -> Result<(), TimedOut> {
        self.transmit(frame, Some(deadline))
    }

    fn transmit(&mut self, frame: &Frame, deadline: Option<Deadline>) -> Result<(), TimedOut> {
        let bytes = frame.encode();
        let mut attempt: u32 = 0;

        loop {
            if !self.settle(deadline) {
                return Err(TimedOut);
            }
            attempt = attempt.saturating_add(1);
            self.sink.emit(&Event::SendAttempt {
                attempt,
                bytes: bytes.len(),
            });

            match self.session.write(&bytes) {
                Ok(()) => {
                    self.sink.emit(&Event::Sent { attempts: attempt });
                    return Ok(());
                }
                Err(fault) => {
                    self.sink.emit(&Event::SendFailed {
                        attempt,
                        error: fault.to_string(),
                    });
                    self.reset();
                }
            }
        }
    }

    fn settle(&self, deadline: Option<Deadline>) -> bool {
        match deadline {
            Some(deadline) => deadline.sleep(self.settle_delay),
            None => {
                std::thread::sleep(self.settle_delay);
                true
            }
        }
    }

    fn reset(&mut self) {
        let channel = self.session.channel();
        self.sink.emit(&Event::ResetTriggered { channel });
        if let Err(e) = self.session.reset() {
            self.sink.emit(&Event::ResetFailed {
                channel,
                error: e.to_string(),
            });
        }
    }

    /// Read until a frame decodes or `deadline` passes.
    ///
    /// Bus faults and undecodable reads are treated as "not ready yet", so a
    /// persistently failing bus looks like silence until the deadline. DATA
    /// frames are acknowledged before they are returned.
    pub fn poll(&mut self, deadline: Deadline) -> Result<Frame, TimedOut> {
        let started = Instant::now();
        let mut buf = vec![0u8; self.read_window];
        let mut attempt: u32 = 0;

        while deadline.sleep(self.settle_delay) {
            attempt = attempt.saturating_add(1);
            self.sink.emit(&Event::ReadAttempt { attempt });

            if let Err(fault) = self.session.read(&mut buf) {
                self.sink.emit(&Event::ReadFailed {
                    attempt,
                    error: fault.to_string(),
                });
                continue;
            }
            let frame = match frame::decode_response(&buf) {
                Ok(frame) => frame,
                Err(e) => {
                    self.sink.emit(&Event::DecodeFailed {
                        attempt,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            self.sink.emit(&Event::FrameReceived {
                frame_type: frame.frame_type(),
                payload_len: frame.payload().len(),
            });

            if frame.is_data() {
                if self.transmit(&Frame::ack(), Some(deadline)).is_err() {
                    break;
                }
                self.sink.emit(&Event::AutoAck);
            }
            return Ok(frame);
        }

        self.sink.emit(&Event::TimedOut {
            waited_ms: started.elapsed().as_millis() as u64,
        });
        Err(TimedOut)
    }

    /// Send `frame` and wait for the controller's ACK. A DATA frame in place
    /// of the ACK counts as no acknowledgement.
    pub fn send_and_await_ack(&mut self, frame: &Frame, deadline: Deadline) -> bool {
        if self.send_within(frame, deadline).is_err() {
            return false;
        }
        match self.poll(deadline) {
            Ok(response) if response.is_ack() => true,
            Ok(response) => {
                tracing::warn!(
                    "Expected ACK, controller sent data {:02x?}",
                    response.payload()
                );
                false
            }
            Err(TimedOut) => false,
        }
    }

    /// Send `frame`, wait for the ACK, then wait for the data response.
    ///
    /// Each phase gets its own deadline of `timeout`. `NotAcknowledged` means
    /// the command may not have been accepted; `TimedOut` means it was
    /// accepted and the response never came.
    pub fn send_and_await_data(
        &mut self,
        frame: &Frame,
        timeout: Duration,
    ) -> Result<Frame, ExchangeError> {
        if !self.send_and_await_ack(frame, Deadline::after(timeout)) {
            return Err(ExchangeError::NotAcknowledged);
        }

        let deadline = Deadline::after(timeout);
        loop {
            let response = self.poll(deadline)?;
            if response.is_data() {
                return Ok(response);
            }
            tracing::debug!("Ignoring repeated ACK while waiting for data");
        }
    }
}
