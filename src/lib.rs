//! Bluetooth HID gamepad core.
//!
//! Everything here is hardware-independent: the report codec, the shared
//! report buffer, the connection state machine, the pairing responder and
//! the input sampler. The Bluetooth stack and the physical inputs are
//! reached only through the [`stack::HidDevice`] and
//! [`sampler::InputSource`] traits, so the whole pipeline runs on the host
//! under `cargo test`.
//!
//! The embedded binary (`src/main.rs`, feature `embedded`) binds those
//! traits to the nRF52840 SoftDevice and board peripherals.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod config;
pub mod error;
pub mod hid;
pub mod pairing;
pub mod protocol;
pub mod sampler;
pub mod session;
pub mod shared;
pub mod stack;

pub use error::{Error, StackError};
pub use hid::{encode, EncodedReport, InputSample, ReportLayout};
pub use pairing::PairingResponder;
pub use protocol::{HandshakeError, ProtocolMode, ReportType};
pub use sampler::{ButtonPolicy, InputSource, Level, Sampler, SamplerLink};
pub use session::{ConnectionState, Session};
pub use shared::SharedReport;
pub use stack::{BdAddr, ConnStatus, GapEvent, HidDevice, HidEvent, ScanMode, Status};
