//! Parsing of InListPassiveTarget and GetFirmwareVersion responses.

use std::fmt::Write as _;

use crate::commands;
use crate::error::ExchangeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcTagType {
    MifareClassic1K,
    MifareClassic4K,
    Ntag,
    Unknown,
}

/// One ISO14443A target found by InListPassiveTarget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    /// Logical number the controller assigned to the target
    pub number: u8,
    pub sens_res: [u8; 2],
    pub sel_res: u8,
    /// 4, 7 or 10 bytes
    pub uid: Vec<u8>,
}

impl TargetInfo {
    /// Parse a response payload (`4B NbTg Tg SENS_RES SEL_RES NFCIDLength
    /// NFCID..`). `None` when no target was found.
    pub fn parse(payload: &[u8]) -> Result<Option<Self>, ExchangeError> {
        let unexpected = || ExchangeError::UnexpectedResponse(payload.to_vec());

        match payload {
            [code, 0, ..] if *code == commands::IN_LIST_PASSIVE_TARGET + 1 => Ok(None),
            [code, _, number, sens_hi, sens_lo, sel_res, uid_len, rest @ ..]
                if *code == commands::IN_LIST_PASSIVE_TARGET + 1 =>
            {
                let uid = rest.get(..usize::from(*uid_len)).ok_or_else(unexpected)?;
                Ok(Some(Self {
                    number: *number,
                    sens_res: [*sens_hi, *sens_lo],
                    sel_res: *sel_res,
                    uid: uid.to_vec(),
                }))
            }
            _ => Err(unexpected()),
        }
    }

    pub fn tag_type(&self) -> NfcTagType {
        match (self.sens_res[1], self.sel_res) {
            (0x44, 0x00) => NfcTagType::Ntag,
            (0x04, 0x08) | (0x44, 0x08) => NfcTagType::MifareClassic1K,
            (0x04, 0x18) | (0x02, 0x18) => NfcTagType::MifareClassic4K,
            _ => NfcTagType::Unknown,
        }
    }

    /// UID as uppercase hex, no separators
    pub fn uid_hex(&self) -> String {
        self.uid.iter().fold(String::new(), |mut out, byte| {
            let _ = write!(out, "{byte:02X}");
            out
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// 0x32 for the PN532
    pub ic: u8,
    pub version: u8,
    pub revision: u8,
    /// Supported protocol bitmask (ISO/IEC 14443 TypeA, TypeB, ISO 18092)
    pub support: u8,
}

impl FirmwareVersion {
    pub fn parse(payload: &[u8]) -> Result<Self, ExchangeError> {
        match payload {
            [code, ic, version, revision, support, ..]
                if *code == commands::GET_FIRMWARE_VERSION + 1 =>
            {
                Ok(Self {
                    ic: *ic,
                    version: *version,
                    revision: *revision,
                    support: *support,
                })
            }
            _ => Err(ExchangeError::UnexpectedResponse(payload.to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_ntag() {
        let payload = [0x4B, 0x01, 0x01, 0x00, 0x44, 0x00, 0x07, 0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80];
        let target = TargetInfo::parse(&payload).unwrap().unwrap();
        assert_eq!(target.number, 1);
        assert_eq!(target.uid, [0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80]);
        assert_eq!(target.tag_type(), NfcTagType::Ntag);
        assert_eq!(target.uid_hex(), "04A1B2C3D4E580");
    }

    #[test]
    fn classifies_mifare_classic() {
        let payload = [0x4B, 0x01, 0x01, 0x00, 0x04, 0x08, 0x04, 0xDE, 0xAD, 0xBE, 0xEF];
        let target = TargetInfo::parse(&payload).unwrap().unwrap();
        assert_eq!(target.tag_type(), NfcTagType::MifareClassic1K);
    }

    #[test]
    fn no_target_and_malformed_responses() {
        assert_eq!(TargetInfo::parse(&[0x4B, 0x00]), Ok(None));
        assert!(TargetInfo::parse(&[0x4B, 0x01, 0x01, 0x00, 0x44, 0x00, 0x07, 0x04]).is_err());
        assert!(TargetInfo::parse(&[0x15]).is_err());
    }

    #[test]
    fn parses_firmware_version() {
        let version = FirmwareVersion::parse(&[0x03, 0x32, 0x01, 0x06, 0x07]).unwrap();
        assert_eq!(version.ic, 0x32);
        assert_eq!((version.version, version.revision), (1, 6));
        assert!(FirmwareVersion::parse(&[0x03, 0x32]).is_err());
    }
}
