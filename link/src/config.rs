use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 7-bit I2C address of the PN532
pub const DEFAULT_ADDRESS: u8 = 0x24;
/// `/dev/i2c-1` on current Raspberry Pi boards
pub const DEFAULT_CHANNEL: u8 = 1;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_READ_WINDOW: usize = 255;
/// Status byte plus an ACK frame
pub const MIN_READ_WINDOW: usize = 7;

/// Link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub address: u8,
    pub channel: u8,
    /// Pause before every bus transaction
    pub settle_delay_ms: u64,
    /// Timeout for operations that do not take one explicitly
    pub default_timeout_secs: u64,
    /// Bytes requested per read, status byte included
    pub read_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            channel: DEFAULT_CHANNEL,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            read_window: DEFAULT_READ_WINDOW,
        }
    }
}

impl Config {
    /// Defaults overridden by `PN532_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_vars(|name| std::env::var(name).ok())
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Apply overrides from `lookup`. Unparsable values are logged and ignored.
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("PN532_I2C_ADDRESS") {
            match parse_address(&value) {
                Some(address) => self.address = address,
                None => tracing::warn!("Ignoring invalid PN532_I2C_ADDRESS {:?}", value),
            }
        }
        override_with(&lookup, "PN532_I2C_CHANNEL", &mut self.channel);
        override_with(&lookup, "PN532_SETTLE_DELAY_MS", &mut self.settle_delay_ms);
        override_with(&lookup, "PN532_TIMEOUT_SECS", &mut self.default_timeout_secs);
        override_with(&lookup, "PN532_READ_WINDOW", &mut self.read_window);
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn read_window(&self) -> usize {
        self.read_window.max(MIN_READ_WINDOW)
    }
}

fn override_with<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut T) {
    if let Some(value) = lookup(name) {
        match value.trim().parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => tracing::warn!("Ignoring invalid {} {:?}", name, value),
        }
    }
}

fn parse_address(value: &str) -> Option<u8> {
    let value = value.trim();
    let address = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    };
    address.filter(|address| *address < 0x80)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::default().with_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_the_breakout_board() {
        let config = Config::default();
        assert_eq!(config.address, 0x24);
        assert_eq!(config.channel, 1);
        assert_eq!(config.settle_delay(), Duration::from_millis(5));
        assert_eq!(config.read_window(), 255);
    }

    #[test]
    fn environment_overrides() {
        let config = with(&[
            ("PN532_I2C_ADDRESS", "0x48"),
            ("PN532_I2C_CHANNEL", "0"),
            ("PN532_SETTLE_DELAY_MS", "2"),
            ("PN532_TIMEOUT_SECS", "10"),
        ]);
        assert_eq!(config.address, 0x48);
        assert_eq!(config.channel, 0);
        assert_eq!(config.settle_delay_ms, 2);
        assert_eq!(config.default_timeout(), Duration::from_secs(10));

        assert_eq!(with(&[("PN532_I2C_ADDRESS", "36")]).address, 36);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = with(&[
            ("PN532_I2C_ADDRESS", "0x1FF"),
            ("PN532_I2C_CHANNEL", "one"),
            ("PN532_READ_WINDOW", "-3"),
        ]);
        assert_eq!(config, Config::default());
        assert_eq!(with(&[("PN532_I2C_ADDRESS", "0x80")]).address, DEFAULT_ADDRESS);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = Config::from_json(r#"{ "channel": 3, "read_window": 2 }"#).unwrap();
        assert_eq!(config.channel, 3);
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.read_window(), MIN_READ_WINDOW);
    }
}
