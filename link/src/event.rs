//! Structured events emitted at every phase of a command/response cycle.

use std::cell::RefCell;
use std::io::Write;

use serde::Serialize;

use crate::frame::FrameType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionOpened { channel: u8, address: u8 },
    SessionClosed { channel: u8 },
    /// One bus write of an encoded frame
    SendAttempt { attempt: u32, bytes: usize },
    SendFailed { attempt: u32, error: String },
    Sent { attempts: u32 },
    ResetTriggered { channel: u8 },
    ResetFailed { channel: u8, error: String },
    ReadAttempt { attempt: u32 },
    ReadFailed { attempt: u32, error: String },
    DecodeFailed { attempt: u32, error: String },
    FrameReceived { frame_type: FrameType, payload_len: usize },
    /// A DATA frame was acknowledged on the caller's behalf
    AutoAck,
    TimedOut { waited_ms: u64 },
}

/// Consumer of link events, injected at construction.
pub trait EventSink {
    fn emit(&self, event: &Event);
}

impl<F: Fn(&Event)> EventSink for F {
    fn emit(&self, event: &Event) {
        self(event)
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::SessionOpened { channel, address } => {
                tracing::info!("PN532 session on channel {} at {:#04x}", channel, address)
            }
            Event::SessionClosed { channel } => {
                tracing::info!("PN532 session on channel {} closed", channel)
            }
            Event::SendAttempt { attempt, bytes } => {
                tracing::trace!("send_command: attempt {} ({} bytes)", attempt, bytes)
            }
            Event::SendFailed { attempt, error } => {
                tracing::debug!("send_command: attempt {} failed: {}", attempt, error)
            }
            Event::Sent { attempts } => tracing::trace!("send_command: sent after {} attempt(s)", attempts),
            Event::ResetTriggered { channel } => tracing::debug!("Resetting I2C channel {}", channel),
            Event::ResetFailed { channel, error } => {
                tracing::warn!("Failed to reopen I2C channel {}: {}", channel, error)
            }
            Event::ReadAttempt { attempt } => tracing::trace!("read_response: attempt {}", attempt),
            Event::ReadFailed { attempt, error } => {
                tracing::trace!("read_response: attempt {} failed: {}", attempt, error)
            }
            Event::DecodeFailed { attempt, error } => {
                tracing::trace!("read_response: attempt {} not decodable: {}", attempt, error)
            }
            Event::FrameReceived {
                frame_type,
                payload_len,
            } => tracing::debug!("read_response: {:?} frame ({} bytes)", frame_type, payload_len),
            Event::AutoAck => tracing::trace!("read_response: acknowledged data frame"),
            Event::TimedOut { waited_ms } => {
                tracing::debug!("read_response: no frame after {} ms", waited_ms)
            }
        }
    }
}

/// Writes each event as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &Event) {
        let mut out = self.out.borrow_mut();
        let written = serde_json::to_writer(&mut *out, event)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"));
        if let Err(e) = written {
            tracing::warn!("Failed to write event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_are_tagged() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(&Event::ReadAttempt { attempt: 3 });
        sink.emit(&Event::FrameReceived {
            frame_type: FrameType::Ack,
            payload_len: 0,
        });

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines[0], serde_json::json!({ "type": "read_attempt", "attempt": 3 }));
        assert_eq!(
            lines[1],
            serde_json::json!({ "type": "frame_received", "frame_type": "ack", "payload_len": 0 })
        );
    }

    #[test]
    fn closures_are_sinks() {
        let seen = RefCell::new(Vec::new());
        let sink = |event: &Event| seen.borrow_mut().push(event.clone());
        sink.emit(&Event::AutoAck);
        assert_eq!(seen.into_inner(), vec![Event::AutoAck]);
    }
}
