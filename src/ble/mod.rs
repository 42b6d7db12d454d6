//! Bluetooth Low Energy subsystem.
//!
//! Drives the Nordic SoftDevice S140 in **Peripheral** role and binds it
//! to the session's stack boundary:
//!
//! 1. **SoftdeviceHid** - implements `HidDevice` on top of the GATT
//!    server (report notify/set, advertising control).
//! 2. **Advertiser** - advertises while the session asks to be
//!    discoverable, accepts one connection and runs the GATT server on it.
//! 3. **Bonder** - Just Works pairing with a single stored bond.
//!
//! Everything the SoftDevice reports is turned into `HidEvent` /
//! `GapEvent` values and queued on channels, so the session sees one
//! callback at a time.

pub mod gatt;

use core::cell::{Cell, RefCell};

use bt_gamepad::config::GAMEPAD_REPORT_ID;
use bt_gamepad::hid::MAX_REPORT_SIZE;
use bt_gamepad::protocol::{HandshakeError, ProtocolMode, ReportType};
use bt_gamepad::stack::{
    AppParams, BdAddr, ConnStatus, GapEvent, HidDevice, HidEvent, PinCode, ScanMode, Status,
};
use bt_gamepad::StackError;
use defmt::{debug, info, warn, Debug2Format, Format};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::{String, Vec};
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{
    gatt_server, peripheral, Address, AddressType, Connection, EncryptionInfo, IdentityKey,
    MasterId, SecurityMode,
};
use nrf_softdevice::{raw, Softdevice};

use self::gatt::{HidServiceEvent, Server, ServerEvent, HID_INFO, HOGP_BOOT_MODE, HOGP_REPORT_MODE};

/// HID device callbacks, in delivery order.
pub type HidEvents = Channel<CriticalSectionRawMutex, HidEvent, 8>;

/// GAP callbacks for the pairing responder.
pub type GapEvents = Channel<CriticalSectionRawMutex, GapEvent, 4>;

const ERR_INVALID_STATE: i32 = raw::NRF_ERROR_INVALID_STATE as i32;
const ERR_INVALID_PARAM: i32 = raw::NRF_ERROR_INVALID_PARAM as i32;
const ERR_DATA_SIZE: i32 = raw::NRF_ERROR_DATA_SIZE as i32;

// Flags (LE only, general discoverable), 16-bit UUID list (HID),
// appearance (gamepad, 0x03C4).
#[rustfmt::skip]
static ADV_DATA: [u8; 11] = [
    0x02, 0x01, raw::BLE_GAP_ADV_FLAGS_LE_ONLY_GENERAL_DISC_MODE as u8,
    0x03, 0x03, 0x12, 0x18,
    0x03, 0x19, 0xC4, 0x03,
];

// Complete local name, see `config::DEVICE_NAME`.
#[rustfmt::skip]
static SCAN_DATA: [u8; 13] = [
    0x0C, 0x09, b'H', b'I', b'D', b' ', b'G', b'a', b'm', b'e', b'p', b'a', b'd',
];

/// What the advertiser should be doing.
#[derive(Clone, Copy, Format)]
enum Advertise {
    /// Undirected, visible to any host.
    Open,
    /// Directed at a bonded host.
    Directed(Address),
    Off,
}

fn hogp_mode(raw: u8) -> Option<ProtocolMode> {
    match raw {
        HOGP_BOOT_MODE => Some(ProtocolMode::Boot),
        HOGP_REPORT_MODE => Some(ProtocolMode::Report),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Bonding
// ═══════════════════════════════════════════════════════════════════════════

struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
}

/// Security handler keeping the most recent bond in RAM.
pub struct Bonder {
    bond: RefCell<Option<PeerBond>>,
    gap: &'static GapEvents,
}

impl Bonder {
    pub fn new(gap: &'static GapEvents) -> Self {
        Self {
            bond: RefCell::new(None),
            gap,
        }
    }

    /// Identity address of the bonded host, if any.
    fn peer_address(&self) -> Option<Address> {
        self.bond.borrow().as_ref().map(|b| b.peer_id.addr)
    }

    fn emit(&self, event: GapEvent) {
        if self.gap.try_send(event).is_err() {
            warn!("GAP event queue full, event dropped");
        }
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::None
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        true
    }

    fn display_passkey(&self, passkey: &[u8; 6]) {
        let passkey = passkey
            .iter()
            .fold(0u32, |acc, d| acc * 10 + d.wrapping_sub(b'0') as u32);
        self.emit(GapEvent::PasskeyNotify { passkey });
    }

    fn on_bonded(
        &self,
        conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        *self.bond.borrow_mut() = Some(PeerBond {
            master_id,
            key,
            peer_id,
        });
        self.emit(GapEvent::AuthComplete {
            status: Status::Success,
            peer: BdAddr(conn.peer_address().bytes()),
            name: String::new(),
        });
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.bond
            .borrow()
            .as_ref()
            .and_then(|b| (b.master_id == master_id).then_some(b.key))
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("BLE security mode updated: {}", mode);
        self.emit(GapEvent::ModeChange { mode: mode as u8 });
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Stack adapter
// ═══════════════════════════════════════════════════════════════════════════

/// `HidDevice` backed by the SoftDevice GATT server.
pub struct SoftdeviceHid {
    server: Server,
    bonder: Bonder,
    events: &'static HidEvents,
    conn: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>>,
    notifications: Cell<bool>,
    advertise: Signal<CriticalSectionRawMutex, Advertise>,
}

impl SoftdeviceHid {
    pub fn new(server: Server, bonder: Bonder, events: &'static HidEvents) -> Self {
        Self {
            server,
            bonder,
            events,
            conn: Mutex::new(RefCell::new(None)),
            notifications: Cell::new(false),
            advertise: Signal::new(),
        }
    }

    fn emit(&self, event: HidEvent) {
        if self.events.try_send(event).is_err() {
            warn!("HID event queue full, event dropped");
        }
    }

    fn connection(&self) -> Option<Connection> {
        self.conn.lock(|c| c.borrow().clone())
    }

    fn attach(&self, conn: &Connection) {
        self.conn.lock(|c| *c.borrow_mut() = Some(conn.clone()));
    }

    fn detach(&self) {
        self.conn.lock(|c| *c.borrow_mut() = None);
        self.notifications.set(false);
    }

    fn on_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::Hid(HidServiceEvent::ProtocolModeWrite(value)) => match hogp_mode(value) {
                Some(mode) => self.emit(HidEvent::SetProtocol { mode }),
                None => warn!("invalid protocol mode write: {}", value),
            },
            ServerEvent::Hid(HidServiceEvent::InputReportWrite(data)) => {
                self.emit(HidEvent::SetReport {
                    report_id: GAMEPAD_REPORT_ID,
                    report_type: ReportType::Output,
                    len: data.len() as u16,
                });
            }
            ServerEvent::Hid(HidServiceEvent::InputReportCccdWrite { notifications, .. }) => {
                info!("input report notifications: {}", notifications);
                self.notifications.set(notifications);
            }
            ServerEvent::Hid(HidServiceEvent::ControlPointWrite(cmd)) => {
                // 0 = suspend, 1 = exit suspend. Nothing to power down.
                debug!("HID control point: {}", cmd);
            }
        }
    }
}

impl HidDevice for SoftdeviceHid {
    fn register_app(&self, app: &AppParams<'_>) -> Result<(), StackError> {
        info!(
            "HID app: {} / {} / {}, subclass {=u8:#x}",
            app.name, app.description, app.provider, app.subclass
        );

        let map: Vec<u8, { gatt::REPORT_MAP_CAPACITY }> =
            Vec::from_slice(app.descriptor).map_err(|_| StackError(ERR_DATA_SIZE))?;
        self.server
            .hid
            .report_map_set(&map)
            .map_err(|_| StackError(ERR_INVALID_PARAM))?;
        self.server
            .hid
            .hid_info_set(&HID_INFO)
            .map_err(|_| StackError(ERR_INVALID_PARAM))?;
        self.server
            .hid
            .protocol_mode_set(&HOGP_REPORT_MODE)
            .map_err(|_| StackError(ERR_INVALID_PARAM))?;

        let bonded = self.bonder.peer_address();
        self.emit(HidEvent::AppRegistered {
            status: Status::Success,
            in_use: bonded.is_some(),
            peer: bonded.map(|a| BdAddr(a.bytes())).unwrap_or_default(),
        });
        Ok(())
    }

    fn send_report(&self, kind: ReportType, report_id: u8, data: &[u8]) -> Result<(), StackError> {
        if report_id != GAMEPAD_REPORT_ID {
            return Err(StackError(ERR_INVALID_PARAM));
        }
        let value: Vec<u8, MAX_REPORT_SIZE> =
            Vec::from_slice(data).map_err(|_| StackError(ERR_DATA_SIZE))?;

        // Keep the readable value current for hosts that poll.
        self.server
            .hid
            .input_report_set(&value)
            .map_err(|_| StackError(ERR_INVALID_STATE))?;

        if kind != ReportType::InterruptData || !self.notifications.get() {
            return Ok(());
        }
        let conn = self.connection().ok_or(StackError(ERR_INVALID_STATE))?;
        self.server
            .hid
            .input_report_notify(&conn, &value)
            .map_err(|_| StackError(ERR_INVALID_STATE))
    }

    fn report_error(&self, error: HandshakeError) -> Result<(), StackError> {
        // GATT writes are already acknowledged when the event is delivered.
        debug!("handshake {} has no GATT equivalent", error);
        Ok(())
    }

    fn set_scan_mode(&self, mode: ScanMode) -> Result<(), StackError> {
        let cmd = if mode.discoverable || mode.connectable {
            Advertise::Open
        } else {
            Advertise::Off
        };
        self.advertise.signal(cmd);
        Ok(())
    }

    fn connect(&self, peer: BdAddr) -> Result<(), StackError> {
        let address = self
            .bonder
            .peer_address()
            .filter(|a| a.bytes() == peer.0)
            .unwrap_or_else(|| Address::new(AddressType::Public, peer.0));
        self.advertise.signal(Advertise::Directed(address));
        Ok(())
    }

    fn pin_reply(&self, _peer: BdAddr, pin: &PinCode) -> Result<(), StackError> {
        // LE pairing has no PIN; the SoftDevice runs Just Works itself.
        debug!("PIN reply ({} digits) not used on LE", pin.len());
        Ok(())
    }

    fn ssp_confirm_reply(&self, _peer: BdAddr, accept: bool) -> Result<(), StackError> {
        debug!("numeric comparison reply {} not used on LE", accept);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Advertiser
// ═══════════════════════════════════════════════════════════════════════════

/// Advertise on request, then serve one connection at a time.
pub async fn advertiser_task(sd: &'static Softdevice, hid: &'static SoftdeviceHid) -> ! {
    let mut pending: Option<Advertise> = None;

    loop {
        let cmd = match pending.take() {
            Some(cmd) => cmd,
            None => hid.advertise.wait().await,
        };

        let adv = match cmd {
            Advertise::Off => continue,
            Advertise::Open => peripheral::ConnectableAdvertisement::ScannableUndirected {
                adv_data: &ADV_DATA,
                scan_data: &SCAN_DATA,
            },
            Advertise::Directed(peer) => {
                peripheral::ConnectableAdvertisement::NonscannableDirected { peer }
            }
        };
        info!("advertising: {}", cmd);

        let config = peripheral::Config::default();
        let advertise = peripheral::advertise_pairable(sd, adv, &config, &hid.bonder);
        let conn = match select(hid.advertise.wait(), advertise).await {
            Either::First(next) => {
                pending = Some(next);
                continue;
            }
            Either::Second(Ok(conn)) => conn,
            Either::Second(Err(e)) => {
                warn!("advertising ended: {}", Debug2Format(&e));
                if let Advertise::Directed(_) = cmd {
                    // Bonded host did not answer; fall back to open advertising.
                    pending = Some(Advertise::Open);
                }
                continue;
            }
        };

        hid.attach(&conn);
        hid.emit(HidEvent::Open {
            status: Status::Success,
            conn: ConnStatus::Connected,
            peer: BdAddr(conn.peer_address().bytes()),
        });

        let reason = gatt_server::run(&conn, &hid.server, |e| hid.on_server_event(e)).await;
        info!("connection closed: {}", Debug2Format(&reason));

        hid.detach();
        hid.emit(HidEvent::Close {
            status: Status::Success,
            conn: ConnStatus::Disconnected,
        });
    }
}
