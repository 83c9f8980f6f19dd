//! PN532 command codes and parameters used by this crate.
//!
//! Response payloads start with the command code plus one.

pub const GET_FIRMWARE_VERSION: u8 = 0x02;
pub const SAM_CONFIGURATION: u8 = 0x14;
pub const IN_LIST_PASSIVE_TARGET: u8 = 0x4A;

/// SAMConfiguration parameters
pub mod sam {
    pub const MODE_NORMAL: u8 = 0x01;
    /// Virtual card timeout in units of 50 ms
    pub const TIMEOUT_50MS: u8 = 0x01;
    pub const IRQ_OFF: u8 = 0x00;
}

/// InListPassiveTarget baud rate / modulation
pub mod baud {
    pub const ISO14443A_106: u8 = 0x00;
}
