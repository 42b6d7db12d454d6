//! Gamepad input report codec.
//!
//! Two fixed layouts, exactly one compiled into a build
//! (see [`crate::config::ACTIVE_LAYOUT`]):
//!
//! ```text
//! Simple (6 bytes):
//! Byte 0..=3: X, Y, Rx, Ry          (signed 8-bit, -127..127)
//! Byte 4:     Buttons 1-8           (bit 0 = button 1)
//! Byte 5:     Buttons 9-15          (bit 7 = constant padding, always 0)
//!
//! Extended (10 bytes):
//! Byte 0..=7: X, Y, Rx, Ry          (signed 16-bit little-endian)
//! Byte 8:     Buttons 1-8
//! Byte 9:     Buttons 9-16
//! ```
//!
//! The Report ID is not part of the payload; the stack prepends it.

pub mod descriptor;


use crate::config::ADC_MAX;

/// Number of analog axes carried by both layouts.
pub const AXIS_COUNT: usize = 4;

/// Largest payload of any layout.
pub const MAX_REPORT_SIZE: usize = 10;

/// Report layout variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportLayout {
    /// 15 buttons + 4 signed 8-bit axes + 1 padding bit.
    Simple,
    /// 16 buttons + 4 signed 16-bit axes.
    Extended,
}

impl ReportLayout {
    /// Payload size in bytes (Report ID excluded).
    pub const fn payload_size(self) -> usize {
        match self {
            ReportLayout::Simple => 6,
            ReportLayout::Extended => 10,
        }
    }

    /// Number of logical buttons.
    pub const fn button_count(self) -> usize {
        match self {
            ReportLayout::Simple => 15,
            ReportLayout::Extended => 16,
        }
    }

    /// Bits of the button mask that carry data.
    pub const fn button_mask(self) -> u16 {
        match self {
            ReportLayout::Simple => 0x7FFF,
            ReportLayout::Extended => 0xFFFF,
        }
    }

    /// Byte offset of the button field inside the payload.
    const fn button_offset(self) -> usize {
        match self {
            ReportLayout::Simple => AXIS_COUNT,
            ReportLayout::Extended => AXIS_COUNT * 2,
        }
    }

    /// Report descriptor announced to the host for this layout.
    pub const fn descriptor(self) -> &'static [u8] {
        match self {
            ReportLayout::Simple => descriptor::SIMPLE_GAMEPAD_DESCRIPTOR,
            ReportLayout::Extended => descriptor::EXTENDED_GAMEPAD_DESCRIPTOR,
        }
    }

    /// Scale a raw 12-bit sample into this layout's axis range.
    ///
    /// Extended: [`rescale_axis`]. Simple: high byte of the same value,
    /// clamped to the descriptor's logical minimum of -127.
    pub fn scale_axis(self, raw: u16) -> i16 {
        let wide = rescale_axis(raw);
        match self {
            ReportLayout::Simple => (wide >> 8).max(-127),
            ReportLayout::Extended => wide,
        }
    }
}

/// Analog axis, in report order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

impl Axis {
    /// All axes in report order.
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::LeftX, Axis::LeftY, Axis::RightX, Axis::RightY];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One sampling tick worth of input.
///
/// `axes` must already be in range for the layout it is encoded with
/// (see [`ReportLayout::scale_axis`]); the codec does not clamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputSample {
    /// Button bitmask, bit N = logical button N (declaration order).
    pub buttons: u16,
    /// Axis values in [`Axis::ALL`] order.
    pub axes: [i16; AXIS_COUNT],
}

impl InputSample {
    /// No buttons pressed, all axes centred.
    pub const fn neutral() -> Self {
        Self {
            buttons: 0,
            axes: [0; AXIS_COUNT],
        }
    }

    pub fn axis(&self, axis: Axis) -> i16 {
        self.axes[axis.index()]
    }
}

/// Encoded report payload. The length is fixed by the layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncodedReport {
    bytes: [u8; MAX_REPORT_SIZE],
    len: u8,
}

impl EncodedReport {
    /// All-zero payload of the layout's size.
    pub const fn zeroed(layout: ReportLayout) -> Self {
        Self {
            bytes: [0; MAX_REPORT_SIZE],
            len: layout.payload_size() as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Button mask carried by this payload.
    pub fn buttons(&self, layout: ReportLayout) -> u16 {
        let at = layout.button_offset();
        decode_buttons([self.bytes[at], self.bytes[at + 1]], layout)
    }
}

/// Linearly rescale a raw 12-bit sample onto the signed 16-bit range.
///
/// `raw * 65535 / 4095 - 32768` with truncating division: 0 maps to
/// -32768, 4095 maps to 32767. Inputs above [`ADC_MAX`] saturate.
pub fn rescale_axis(raw: u16) -> i16 {
    let raw = raw.min(ADC_MAX) as i32;
    (raw * 65535 / ADC_MAX as i32 - 32768) as i16
}

/// Pack a button mask into the two button bytes of `layout`.
///
/// Bits the layout does not carry (bit 15 in the simple layout) are
/// dropped so the padding bit stays zero.
pub const fn encode_buttons(mask: u16, layout: ReportLayout) -> [u8; 2] {
    (mask & layout.button_mask()).to_le_bytes()
}

/// Inverse of [`encode_buttons`].
pub const fn decode_buttons(bytes: [u8; 2], layout: ReportLayout) -> u16 {
    u16::from_le_bytes(bytes) & layout.button_mask()
}

/// Encode `sample` with `layout`. Never fails.
pub fn encode(sample: &InputSample, layout: ReportLayout) -> EncodedReport {
    let mut report = EncodedReport::zeroed(layout);
    let buf = &mut report.bytes;

    match layout {
        ReportLayout::Simple => {
            for (slot, value) in buf[..AXIS_COUNT].iter_mut().zip(sample.axes) {
                *slot = value as i8 as u8;
            }
        }
        ReportLayout::Extended => {
            for (chunk, value) in buf[..AXIS_COUNT * 2].chunks_exact_mut(2).zip(sample.axes) {
                chunk.copy_from_slice(&value.to_le_bytes());
            }
        }
    }

    let at = layout.button_offset();
    buf[at..at + 2].copy_from_slice(&encode_buttons(sample.buttons, layout));
    report
}
