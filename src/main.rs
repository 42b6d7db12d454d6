//! nRF52840 Bluetooth HID gamepad.
//!
//! Brings up the SoftDevice, registers the HID-over-GATT service and runs
//! three tasks: the SoftDevice event loop, the advertiser/GATT server and
//! the input sampler. The session itself runs in `main`, fed by the HID
//! and GAP event channels.

#![no_std]
#![no_main]

mod ble;
mod board;

use core::mem;

use bt_gamepad::config::{ACTIVE_LAYOUT, DEFAULT_BUTTON_POLICY, DEVICE_NAME, SAMPLE_PERIOD_MS};
use bt_gamepad::sampler::{self, SamplerLink};
use bt_gamepad::stack::{HidEvent, Status};
use bt_gamepad::{PairingResponder, Session, SharedReport};
use defmt::{error, info, unwrap, warn, Debug2Format};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::Pin;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::saadc::{self, ChannelConfig, Saadc};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Duration;
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;

use defmt_rtt as _;
use panic_probe as _;

use crate::ble::gatt::Server;
use crate::ble::{Bonder, GapEvents, HidEvents, SoftdeviceHid};
use crate::board::Board;

static HID_EVENTS: HidEvents = HidEvents::new();
static GAP_EVENTS: GapEvents = GapEvents::new();
static SHARED: SharedReport<CriticalSectionRawMutex> = SharedReport::new();
static SAMPLER: SamplerLink<CriticalSectionRawMutex> = SamplerLink::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn advertiser_task(sd: &'static Softdevice, hid: &'static SoftdeviceHid) -> ! {
    ble::advertiser_task(sd, hid).await
}

#[embassy_executor::task]
async fn sampler_task(mut board: Board, hid: &'static SoftdeviceHid) -> ! {
    sampler::supervise(
        &SAMPLER,
        &mut board,
        &SHARED,
        hid,
        ACTIVE_LAYOUT,
        DEFAULT_BUTTON_POLICY,
        Duration::from_millis(SAMPLE_PERIOD_MS),
    )
    .await
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // The SoftDevice owns priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    info!("bt-gamepad starting, {} report layout", ACTIVE_LAYOUT);

    // - Sticks (AIN0..AIN3) and buttons ---------------------------
    interrupt::SAADC.set_priority(Priority::P3);
    let mut adc_config = saadc::Config::default();
    adc_config.resolution = saadc::Resolution::_12BIT;
    let channels = [
        ChannelConfig::single_ended(p.P0_02),
        ChannelConfig::single_ended(p.P0_03),
        ChannelConfig::single_ended(p.P0_04),
        ChannelConfig::single_ended(p.P0_05),
    ];
    let mut adc = Saadc::new(p.SAADC, board::Irqs, adc_config, channels);
    adc.calibrate().await;

    let buttons = [
        p.P0_11.degrade(),
        p.P0_12.degrade(),
        p.P0_24.degrade(),
        p.P0_25.degrade(),
        p.P1_01.degrade(),
        p.P1_02.degrade(),
        p.P1_03.degrade(),
        p.P1_04.degrade(),
    ];
    let board = Board::new(buttons, adc);

    // - Bluetooth ---------------------------------------------------
    let sd = Softdevice::enable(&softdevice_config());

    let server = match Server::new(sd) {
        Ok(server) => server,
        Err(e) => {
            error!("GATT server registration failed: {}", Debug2Format(&e));
            return;
        }
    };
    let sd: &'static Softdevice = sd;

    static HID: StaticCell<SoftdeviceHid> = StaticCell::new();
    let hid: &'static SoftdeviceHid =
        HID.init(SoftdeviceHid::new(server, Bonder::new(&GAP_EVENTS), &HID_EVENTS));

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(advertiser_task(sd, hid)));
    unwrap!(spawner.spawn(sampler_task(board, hid)));

    // - Session -----------------------------------------------------
    let mut session = Session::new(hid, &SHARED, &SAMPLER, ACTIVE_LAYOUT);
    let responder = PairingResponder::new();

    HID_EVENTS
        .send(HidEvent::InitComplete {
            status: Status::Success,
        })
        .await;

    loop {
        match select(HID_EVENTS.receive(), GAP_EVENTS.receive()).await {
            Either::First(event) => {
                if let Err(e) = session.handle(event) {
                    error!("HID event failed: {} (state {})", e, session.state());
                }
            }
            Either::Second(event) => {
                if let Err(e) = responder.handle(hid, event) {
                    warn!("pairing reply failed: {}", e);
                }
            }
        }
    }
}
