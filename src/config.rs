//! Application-wide constants and compile-time configuration.
//!
//! All identity strings, timing parameters, and protocol constants live
//! here so they can be tuned in one place.

use crate::hid::ReportLayout;
use crate::sampler::ButtonPolicy;

// HID application

/// SDP service name announced when the application is registered.
pub const APP_NAME: &str = "Gamepad";

/// SDP service description.
pub const APP_DESCRIPTION: &str = "Bluetooth HID gamepad";

/// SDP provider name.
pub const APP_PROVIDER: &str = "bt-gamepad";

/// HID device subclass (minor device class): gamepad.
pub const HID_SUBCLASS_GAMEPAD: u8 = 0x08;

/// GAP device name shown to hosts during discovery.
pub const DEVICE_NAME: &str = "HID Gamepad";

/// The single application report ID declared by both report descriptors.
pub const GAMEPAD_REPORT_ID: u8 = 0x01;

/// Report layout compiled into this build. Never changes at runtime.
#[cfg(not(feature = "extended-report"))]
pub const ACTIVE_LAYOUT: ReportLayout = ReportLayout::Simple;
#[cfg(feature = "extended-report")]
pub const ACTIVE_LAYOUT: ReportLayout = ReportLayout::Extended;

// Sampling

/// Sampler period (ms). Tunable, not a protocol requirement.
pub const SAMPLE_PERIOD_MS: u64 = 20;

/// Full-scale value of the 12-bit analog front end.
pub const ADC_MAX: u16 = 4095;

/// Button policy used by the sampler when none is given explicitly.
pub const DEFAULT_BUTTON_POLICY: ButtonPolicy = ButtonPolicy::LatchUntilReported;

// Pairing
//
// Fixed demo codes. Replace with per-device secrets or numeric
// comparison before shipping anything real.

/// Legacy 4-digit PIN.
pub const LEGACY_PIN: &[u8] = b"1234";

/// Answer for peers that require a 16-digit PIN.
pub const LONG_PIN: [u8; 16] = [0; 16];

/// Auto-confirm numeric comparison requests (SSP).
pub const SSP_AUTO_CONFIRM: bool = true;
