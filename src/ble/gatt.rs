//! HID-over-GATT service table.
//!
//! Characteristic UUIDs follow the HID Service (0x1812). Value sizes are
//! the largest the codec can produce; the report map is filled in when
//! the application is registered.

use bt_gamepad::hid::MAX_REPORT_SIZE;
use heapless::Vec;

/// Room for either report descriptor.
pub const REPORT_MAP_CAPACITY: usize = 64;

/// bcdHID 1.11, country 0, normally connectable.
pub const HID_INFO: [u8; 4] = [0x11, 0x01, 0x00, 0x02];

/// HOGP Protocol Mode values (note: the reverse of the HIDP byte).
pub const HOGP_BOOT_MODE: u8 = 0x00;
pub const HOGP_REPORT_MODE: u8 = 0x01;

#[nrf_softdevice::gatt_service(uuid = "1812")]
pub struct HidService {
    #[characteristic(uuid = "2a4a", read)]
    pub hid_info: [u8; 4],

    #[characteristic(uuid = "2a4b", read)]
    pub report_map: Vec<u8, REPORT_MAP_CAPACITY>,

    #[characteristic(uuid = "2a4c", write_without_response)]
    pub control_point: u8,

    #[characteristic(uuid = "2a4e", read, write_without_response)]
    pub protocol_mode: u8,

    #[characteristic(uuid = "2a4d", read, write, notify)]
    pub input_report: Vec<u8, MAX_REPORT_SIZE>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub hid: HidService,
}
