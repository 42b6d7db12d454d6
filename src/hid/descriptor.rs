//! Fixed HID report descriptors and a small descriptor summariser.
//!
//! The summariser walks the short items of a report descriptor and
//! totals the input fields so the descriptor bytes announced to the host
//! can be checked against the codec layout.
//!
//! ## Limitations
//!
//! Only what the two gamepad descriptors use is understood:
//! - Nested collections are flattened
//! - Push/Pop state is not supported
//! - Long items end the walk

use super::ReportLayout;
use crate::config::GAMEPAD_REPORT_ID;

/// 15 buttons + 4 signed 8-bit axes + 1 padding bit (6-byte payload).
#[rustfmt::skip]
pub const SIMPLE_GAMEPAD_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x05, // Usage (Gamepad)
    0xA1, 0x01, // Collection (Application)
    0x85, GAMEPAD_REPORT_ID, //   Report ID
    //
    //   - Sticks: X, Y, Rx, Ry -
    0x09, 0x30, //   Usage (X)
    0x09, 0x31, //   Usage (Y)
    0x09, 0x33, //   Usage (Rx)
    0x09, 0x34, //   Usage (Ry)
    0x15, 0x81, //   Logical Minimum (-127)
    0x25, 0x7F, //   Logical Maximum (127)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x04, //   Report Count (4)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    //   - Buttons 1-15 -
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x01, //   Usage Minimum (Button 1)
    0x29, 0x0F, //   Usage Maximum (Button 15)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x0F, //   Report Count (15)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    //   - Padding to a whole byte -
    0x75, 0x01, //   Report Size (1)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x03, //   Input (Constant, Variable, Absolute)
    0xC0,       // End Collection
];

/// 16 buttons + 4 signed 16-bit axes (10-byte payload).
#[rustfmt::skip]
pub const EXTENDED_GAMEPAD_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x05, // Usage (Gamepad)
    0xA1, 0x01, // Collection (Application)
    0x85, GAMEPAD_REPORT_ID, //   Report ID
    //
    //   - Sticks: X, Y, Rx, Ry -
    0x09, 0x30, //   Usage (X)
    0x09, 0x31, //   Usage (Y)
    0x09, 0x33, //   Usage (Rx)
    0x09, 0x34, //   Usage (Ry)
    0x16, 0x00, 0x80, //   Logical Minimum (-32768)
    0x26, 0xFF, 0x7F, //   Logical Maximum (32767)
    0x75, 0x10, //   Report Size (16)
    0x95, 0x04, //   Report Count (4)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    //   - Buttons 1-16 -
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x01, //   Usage Minimum (Button 1)
    0x29, 0x10, //   Usage Maximum (Button 16)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x10, //   Report Count (16)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0xC0,       // End Collection
];

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_PAGE_BUTTON: u16 = 0x09;

/// Input-field totals of one report descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptorSummary {
    /// Report ID, when the descriptor declares one.
    pub report_id: Option<u8>,
    /// Total input bits, padding included.
    pub input_bits: u16,
    /// Data bits on the Button page.
    pub buttons: u16,
    /// Data fields on the Generic Desktop page.
    pub axes: u16,
    /// Report size of the axis fields.
    pub axis_bits: u16,
    /// Constant (padding) input bits.
    pub padding_bits: u16,
    /// Logical minimum of the axis fields.
    pub axis_min: i32,
}

impl DescriptorSummary {
    /// Payload bytes implied by the input fields.
    pub fn payload_size(&self) -> usize {
        (self.input_bits as usize).div_ceil(8)
    }

    /// Whether this summary describes `layout`'s wire format.
    pub fn matches(&self, layout: ReportLayout) -> bool {
        self.report_id == Some(GAMEPAD_REPORT_ID)
            && self.payload_size() == layout.payload_size()
            && self.buttons as usize == layout.button_count()
            && self.axes as usize == super::AXIS_COUNT
    }
}

/// Summarise the input fields of a report descriptor.
///
/// Returns `None` for descriptors without any input field.
pub fn summarize(data: &[u8]) -> Option<DescriptorSummary> {
    let mut summary = DescriptorSummary::default();

    // Global state.
    let mut usage_page: u16 = 0;
    let mut report_size: u16 = 0;
    let mut report_count: u16 = 0;
    let mut logical_min: i32 = 0;
    let mut saw_input = false;

    let mut i = 0;
    while i < data.len() {
        let prefix = data[i];
        if prefix == 0xFE {
            // Long item: not used by gamepad descriptors.
            break;
        }

        let tag = (prefix >> 4) & 0x0F;
        let item_type = (prefix >> 2) & 0x03;
        let size = match prefix & 0x03 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };

        if i + 1 + size > data.len() {
            break;
        }

        let bytes = &data[i + 1..i + 1 + size];
        let unsigned: u32 = match size {
            0 => 0,
            1 => bytes[0] as u32,
            2 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            _ => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        };
        let signed: i32 = match size {
            0 => 0,
            1 => bytes[0] as i8 as i32,
            2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
            _ => unsigned as i32,
        };

        match (item_type, tag) {
            // Main: Input
            (0, 0x08) => {
                saw_input = true;
                let bits = report_size.saturating_mul(report_count);
                summary.input_bits = summary.input_bits.saturating_add(bits);

                if unsigned & 0x01 != 0 {
                    summary.padding_bits = summary.padding_bits.saturating_add(bits);
                } else {
                    match usage_page {
                        USAGE_PAGE_BUTTON => {
                            summary.buttons = summary.buttons.saturating_add(report_count)
                        }
                        USAGE_PAGE_GENERIC_DESKTOP => {
                            summary.axes = summary.axes.saturating_add(report_count);
                            summary.axis_bits = report_size;
                            summary.axis_min = logical_min;
                        }
                        _ => {}
                    }
                }
            }
            // Global: Usage Page
            (1, 0x00) => usage_page = unsigned as u16,
            // Global: Logical Minimum
            (1, 0x01) => logical_min = signed,
            // Global: Report Size
            (1, 0x07) => report_size = unsigned as u16,
            // Global: Report ID
            (1, 0x08) => summary.report_id = Some(unsigned as u8),
            // Global: Report Count
            (1, 0x09) => report_count = unsigned as u16,
            _ => {}
        }

        i += 1 + size;
    }

    if saw_input {
        Some(summary)
    } else {
        debug!("HID descriptor: no input fields found");
        None
    }
}
