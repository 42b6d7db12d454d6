//! Pairing responder.
//!
//! Answers GAP pairing requests with a fixed policy: a static PIN for
//! legacy pairing and auto-confirm for numeric comparison. The device
//! has no display or keypad, so passkey events are only logged.

use crate::config::{LEGACY_PIN, LONG_PIN, SSP_AUTO_CONFIRM};
use crate::error::StackError;
use crate::stack::{GapEvent, HidDevice, PinCode};

/// PIN answered for a legacy pairing request.
pub fn pin_for(min_16_digit: bool) -> PinCode {
    if min_16_digit {
        PinCode::new(&LONG_PIN)
    } else {
        PinCode::new(LEGACY_PIN)
    }
}

/// Stateless GAP event handler.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairingResponder;

impl PairingResponder {
    pub const fn new() -> Self {
        Self
    }

    /// React to one GAP callback.
    pub fn handle<D: HidDevice>(&self, device: &D, event: GapEvent) -> Result<(), StackError> {
        match event {
            GapEvent::AuthComplete { status, peer, name } => {
                if status.is_success() {
                    info!("authentication success: {} {:?}", name.as_str(), peer);
                } else {
                    error!("authentication failed, status: {:?}", status);
                }
                Ok(())
            }
            GapEvent::PinRequest { peer, min_16_digit } => {
                let pin = pin_for(min_16_digit);
                info!(
                    "PIN request (16 digit: {}), answering {} digits",
                    min_16_digit,
                    pin.len()
                );
                device.pin_reply(peer, &pin)
            }
            GapEvent::ConfirmRequest { peer, value } => {
                info!("numeric comparison request: {}", value);
                device.ssp_confirm_reply(peer, SSP_AUTO_CONFIRM)
            }
            GapEvent::PasskeyNotify { passkey } => {
                info!("passkey notification: {}", passkey);
                Ok(())
            }
            GapEvent::PasskeyRequest { peer } => {
                info!("passkey requested by {:?}, no keypad", peer);
                Ok(())
            }
            GapEvent::ModeChange { mode } => {
                info!("GAP mode change: {}", mode);
                Ok(())
            }
        }
    }
}
