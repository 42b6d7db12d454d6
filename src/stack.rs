//! Boundary with the Bluetooth stack.
//!
//! The stack is an external collaborator. It delivers callbacks as
//! [`HidEvent`] and [`GapEvent`] values, one at a time, and exposes its
//! outbound primitives through [`HidDevice`]. Raw status bytes that the
//! session does not recognise survive as `Unknown(_)` so newer stacks
//! can add values without breaking the match.

use heapless::String;

use crate::error::StackError;
use crate::protocol::{HandshakeError, ProtocolMode, ReportType};

/// Bluetooth device address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

/// Status carried by HID device callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Success,
    Error,
    NoResources,
    Busy,
    NoData,
    NeedInit,
    NeedDeinit,
    NeedRegister,
    NeedDeregister,
    NoConnection,
    Unknown(u8),
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<u8> for Status {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Status::Success,
            1 => Status::Error,
            2 => Status::NoResources,
            3 => Status::Busy,
            4 => Status::NoData,
            5 => Status::NeedInit,
            6 => Status::NeedDeinit,
            7 => Status::NeedRegister,
            8 => Status::NeedDeregister,
            9 => Status::NoConnection,
            other => Status::Unknown(other),
        }
    }
}

/// Connection substate reported with open/close/unplug events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnStatus {
    Connected,
    Connecting,
    Disconnected,
    Disconnecting,
    Unknown(u8),
}

impl From<u8> for ConnStatus {
    fn from(raw: u8) -> Self {
        match raw {
            0 => ConnStatus::Connected,
            1 => ConnStatus::Connecting,
            2 => ConnStatus::Disconnected,
            3 => ConnStatus::Disconnecting,
            other => ConnStatus::Unknown(other),
        }
    }
}

/// Inquiry/page scan setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanMode {
    pub connectable: bool,
    pub discoverable: bool,
}

impl ScanMode {
    /// Advertise to new hosts and accept connections.
    pub const VISIBLE: ScanMode = ScanMode {
        connectable: true,
        discoverable: true,
    };

    /// Neither discoverable nor connectable.
    pub const HIDDEN: ScanMode = ScanMode {
        connectable: false,
        discoverable: false,
    };
}

/// SDP record and descriptor passed to [`HidDevice::register_app`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppParams<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub provider: &'a str,
    pub subclass: u8,
    pub descriptor: &'a [u8],
}

/// PIN code answer for legacy pairing. Up to 16 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinCode {
    digits: [u8; 16],
    len: u8,
}

impl PinCode {
    /// Build a PIN from `digits`; anything past 16 bytes is ignored.
    pub fn new(digits: &[u8]) -> Self {
        let len = digits.len().min(16);
        let mut buf = [0u8; 16];
        buf[..len].copy_from_slice(&digits[..len]);
        Self {
            digits: buf,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.digits[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// HID device profile callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidEvent {
    InitComplete {
        status: Status,
    },
    DeinitComplete {
        status: Status,
    },
    AppRegistered {
        status: Status,
        /// The stack still holds a bond with `peer`.
        in_use: bool,
        peer: BdAddr,
    },
    AppUnregistered {
        status: Status,
    },
    Open {
        status: Status,
        conn: ConnStatus,
        peer: BdAddr,
    },
    Close {
        status: Status,
        conn: ConnStatus,
    },
    SendReportComplete {
        status: Status,
        reason: u8,
        report_type: ReportType,
        report_id: u8,
    },
    ReportError {
        status: Status,
    },
    GetReport {
        report_id: u8,
        report_type: ReportType,
        buffer_size: u16,
    },
    SetReport {
        report_id: u8,
        report_type: ReportType,
        len: u16,
    },
    SetProtocol {
        mode: ProtocolMode,
    },
    InterruptData {
        report_id: u8,
        len: u16,
    },
    VirtualCableUnplug {
        status: Status,
        conn: ConnStatus,
    },
}

/// GAP callbacks relevant to pairing.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GapEvent {
    AuthComplete {
        status: Status,
        peer: BdAddr,
        name: String<32>,
    },
    PinRequest {
        peer: BdAddr,
        min_16_digit: bool,
    },
    /// Secure Simple Pairing numeric comparison.
    ConfirmRequest {
        peer: BdAddr,
        value: u32,
    },
    PasskeyNotify {
        passkey: u32,
    },
    PasskeyRequest {
        peer: BdAddr,
    },
    ModeChange {
        mode: u8,
    },
}

/// Outbound primitives of the Bluetooth stack.
///
/// Methods take `&self`: the sampler and the callback path share one
/// handle and the stack serialises calls internally.
pub trait HidDevice {
    /// Register the HID application (SDP record + report descriptor).
    fn register_app(&self, app: &AppParams<'_>) -> Result<(), StackError>;

    /// Send `data` as report `report_id` of type `kind`.
    fn send_report(&self, kind: ReportType, report_id: u8, data: &[u8]) -> Result<(), StackError>;

    /// Answer the pending request with a handshake error.
    fn report_error(&self, error: HandshakeError) -> Result<(), StackError>;

    fn set_scan_mode(&self, mode: ScanMode) -> Result<(), StackError>;

    /// Initiate a connection (virtual cable plug) to a bonded host.
    fn connect(&self, peer: BdAddr) -> Result<(), StackError>;

    fn pin_reply(&self, peer: BdAddr, pin: &PinCode) -> Result<(), StackError>;

    fn ssp_confirm_reply(&self, peer: BdAddr, accept: bool) -> Result<(), StackError>;
}

impl<T: HidDevice + ?Sized> HidDevice for &T {
    fn register_app(&self, app: &AppParams<'_>) -> Result<(), StackError> {
        (**self).register_app(app)
    }

    fn send_report(&self, kind: ReportType, report_id: u8, data: &[u8]) -> Result<(), StackError> {
        (**self).send_report(kind, report_id, data)
    }

    fn report_error(&self, error: HandshakeError) -> Result<(), StackError> {
        (**self).report_error(error)
    }

    fn set_scan_mode(&self, mode: ScanMode) -> Result<(), StackError> {
        (**self).set_scan_mode(mode)
    }

    fn connect(&self, peer: BdAddr) -> Result<(), StackError> {
        (**self).connect(peer)
    }

    fn pin_reply(&self, peer: BdAddr, pin: &PinCode) -> Result<(), StackError> {
        (**self).pin_reply(peer, pin)
    }

    fn ssp_confirm_reply(&self, peer: BdAddr, accept: bool) -> Result<(), StackError> {
        (**self).ssp_confirm_reply(peer, accept)
    }
}
