//! HID protocol mode, report types and handshake codes.
//!
//! The report-request gate lives here as a pure function so every reason
//! a GET_REPORT can be refused is decided in one place. The session runs
//! it against the current mode and turns a refusal into a handshake error.

use crate::config::GAMEPAD_REPORT_ID;

/// Negotiated HID protocol mode.
///
/// Report mode is the mandated initial mode; Boot mode is accepted as a
/// state but nothing is encoded for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolMode {
    #[default]
    Report,
    Boot,
}

impl ProtocolMode {
    /// Decode the Bluetooth HID protocol byte (0 = Report, 1 = Boot).
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(ProtocolMode::Report),
            1 => Some(ProtocolMode::Boot),
            _ => None,
        }
    }
}

/// Report type carried by GET/SET_REPORT requests and by sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportType {
    Other,
    Input,
    Output,
    Feature,
    /// Unsolicited report on the interrupt channel.
    InterruptData,
    Unknown(u8),
}

impl From<u8> for ReportType {
    fn from(raw: u8) -> Self {
        match raw {
            0x00 => ReportType::Other,
            0x01 => ReportType::Input,
            0x02 => ReportType::Output,
            0x03 => ReportType::Feature,
            0x10 => ReportType::InterruptData,
            other => ReportType::Unknown(other),
        }
    }
}

/// HID handshake result codes sent back through `report_error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HandshakeError {
    NotReady = 0x01,
    InvalidReportId = 0x02,
    UnsupportedRequest = 0x03,
    InvalidParameter = 0x04,
    Unknown = 0x0E,
    Fatal = 0x0F,
}

impl HandshakeError {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Decide whether a GET_REPORT for `(report_id, report_type)` can be
/// served while in `mode`.
///
/// Exactly one combination passes: an input report, in Report mode,
/// for the declared gamepad report ID.
pub fn report_request_valid(mode: ProtocolMode, report_id: u8, report_type: ReportType) -> bool {
    report_type == ReportType::Input
        && mode == ProtocolMode::Report
        && report_id == GAMEPAD_REPORT_ID
}
