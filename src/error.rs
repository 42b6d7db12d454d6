//! Unified error type for bt-gamepad.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the session and sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Bring-up
    /// The HID device profile failed to initialise.
    InitFailed,

    /// The stack rejected the HID application registration.
    RegisterFailed,

    /// A lifecycle event arrived after a fatal failure halted the session.
    Halted,

    // Stack primitives
    /// An outbound primitive (send, scan mode, reply...) returned an error.
    Stack(StackError),
}

/// Raw status code returned by an outbound stack primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackError(pub i32);

// Convenience conversions

impl From<StackError> for Error {
    fn from(e: StackError) -> Self {
        Error::Stack(e)
    }
}
