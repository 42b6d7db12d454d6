//! End-to-end tests for the gamepad session: stack events in, stack
//! primitive calls out.

use core::cell::{Cell, RefCell};

use bt_gamepad::config::{ACTIVE_LAYOUT, GAMEPAD_REPORT_ID};
use bt_gamepad::hid::{rescale_axis, Axis};
use bt_gamepad::sampler::{self, SamplerCommand};
use bt_gamepad::stack::{AppParams, PinCode};
use bt_gamepad::{
    BdAddr, ButtonPolicy, ConnStatus, ConnectionState, GapEvent, HandshakeError, HidDevice,
    HidEvent, InputSource, Level, PairingResponder, ProtocolMode, ReportLayout, ReportType,
    Sampler, SamplerLink, ScanMode, Session, SharedReport, StackError, Status,
};
use embassy_futures::block_on;
use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Timer};

type Shared = SharedReport<CriticalSectionRawMutex>;
type Link = SamplerLink<CriticalSectionRawMutex>;

const HOST: BdAddr = BdAddr([0xA0, 0xB1, 0xC2, 0xD3, 0xE4, 0xF5]);

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Register { name: String, descriptor: Vec<u8> },
    Send(ReportType, u8, Vec<u8>),
    Error(HandshakeError),
    Scan(ScanMode),
    Connect(BdAddr),
    Pin(BdAddr, Vec<u8>),
    Confirm(BdAddr, bool),
}

#[derive(Default)]
struct FakeStack {
    calls: RefCell<Vec<Call>>,
}

impl FakeStack {
    fn take(&self) -> Vec<Call> {
        self.calls.borrow_mut().drain(..).collect()
    }

    fn record(&self, call: Call) -> Result<(), StackError> {
        self.calls.borrow_mut().push(call);
        Ok(())
    }

    fn sends(&self) -> Vec<Vec<u8>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Send(_, _, data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }
}

impl HidDevice for FakeStack {
    fn register_app(&self, app: &AppParams<'_>) -> Result<(), StackError> {
        self.record(Call::Register {
            name: app.name.to_string(),
            descriptor: app.descriptor.to_vec(),
        })
    }

    fn send_report(&self, kind: ReportType, report_id: u8, data: &[u8]) -> Result<(), StackError> {
        self.record(Call::Send(kind, report_id, data.to_vec()))
    }

    fn report_error(&self, error: HandshakeError) -> Result<(), StackError> {
        self.record(Call::Error(error))
    }

    fn set_scan_mode(&self, mode: ScanMode) -> Result<(), StackError> {
        self.record(Call::Scan(mode))
    }

    fn connect(&self, peer: BdAddr) -> Result<(), StackError> {
        self.record(Call::Connect(peer))
    }

    fn pin_reply(&self, peer: BdAddr, pin: &PinCode) -> Result<(), StackError> {
        self.record(Call::Pin(peer, pin.as_bytes().to_vec()))
    }

    fn ssp_confirm_reply(&self, peer: BdAddr, accept: bool) -> Result<(), StackError> {
        self.record(Call::Confirm(peer, accept))
    }
}

/// Buttons and sticks of a test board.
struct Board {
    pressed: [bool; 16],
    sticks: [Option<u16>; 4],
}

impl Board {
    fn idle() -> Self {
        Self {
            pressed: [false; 16],
            sticks: [None; 4],
        }
    }
}

impl InputSource for Board {
    fn button_count(&self) -> usize {
        self.pressed.len()
    }

    fn button_level(&mut self, index: usize) -> Level {
        if self.pressed[index] {
            Level::Low
        } else {
            Level::High
        }
    }

    fn axis_raw(&mut self, axis: Axis) -> Option<u16> {
        self.sticks[axis.index()]
    }
}

fn bring_up(session: &mut Session<'_, CriticalSectionRawMutex, FakeStack>) {
    session
        .handle(HidEvent::InitComplete {
            status: Status::Success,
        })
        .unwrap();
    session
        .handle(HidEvent::AppRegistered {
            status: Status::Success,
            in_use: false,
            peer: BdAddr::default(),
        })
        .unwrap();
}

fn open(status: Status, conn: ConnStatus) -> HidEvent {
    HidEvent::Open {
        status,
        conn,
        peer: HOST,
    }
}

fn close(conn: ConnStatus) -> HidEvent {
    HidEvent::Close {
        status: Status::Success,
        conn,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn bring_up_registers_and_advertises() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ACTIVE_LAYOUT);

    bring_up(&mut session);
    assert_eq!(session.state(), ConnectionState::Discoverable);
    assert_eq!(
        stack.take(),
        [
            Call::Register {
                name: "Gamepad".to_string(),
                descriptor: ACTIVE_LAYOUT.descriptor().to_vec(),
            },
            Call::Scan(ScanMode::VISIBLE),
        ]
    );
}

#[test]
fn connect_then_disconnect_returns_to_discoverable() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ACTIVE_LAYOUT);
    bring_up(&mut session);
    let before = (session.state(), session.sampler_running(), shared.is_armed());
    stack.take();

    session
        .handle(open(Status::Success, ConnStatus::Connected))
        .unwrap();
    assert_eq!(session.state(), ConnectionState::Connected);
    assert!(session.sampler_running());
    assert_eq!(link.try_take(), Some(SamplerCommand::Start));

    session.handle(close(ConnStatus::Disconnected)).unwrap();
    assert_eq!(
        (session.state(), session.sampler_running(), shared.is_armed()),
        before
    );
    assert_eq!(link.try_take(), Some(SamplerCommand::Stop));
    assert_eq!(
        stack.take(),
        [Call::Scan(ScanMode::HIDDEN), Call::Scan(ScanMode::VISIBLE)]
    );
}

#[test]
fn reconnect_after_disconnect() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ACTIVE_LAYOUT);
    bring_up(&mut session);

    for _ in 0..3 {
        session
            .handle(open(Status::Success, ConnStatus::Connecting))
            .unwrap();
        session
            .handle(open(Status::Success, ConnStatus::Connected))
            .unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);
        session.handle(close(ConnStatus::Disconnecting)).unwrap();
        session.handle(close(ConnStatus::Disconnected)).unwrap();
        assert_eq!(session.state(), ConnectionState::Discoverable);
    }
    assert!(!shared.is_armed());
}

#[test]
fn bonded_host_is_dialled_after_registration() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ACTIVE_LAYOUT);
    session
        .handle(HidEvent::InitComplete {
            status: Status::Success,
        })
        .unwrap();
    stack.take();

    session
        .handle(HidEvent::AppRegistered {
            status: Status::Success,
            in_use: true,
            peer: HOST,
        })
        .unwrap();
    assert_eq!(
        stack.take(),
        [Call::Scan(ScanMode::VISIBLE), Call::Connect(HOST)]
    );
}

#[test]
fn failed_init_stops_everything() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ACTIVE_LAYOUT);

    assert!(session
        .handle(HidEvent::InitComplete {
            status: Status::Error,
        })
        .is_err());
    assert!(session
        .handle(open(Status::Success, ConnStatus::Connected))
        .is_err());
    assert_eq!(session.state(), ConnectionState::Uninitialized);
    assert!(stack.take().is_empty());
    assert_eq!(link.try_take(), None);
}

// ═══════════════════════════════════════════════════════════════════════════
// Reports
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn sampled_report_is_sent_and_served() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ReportLayout::Simple);
    bring_up(&mut session);
    session
        .handle(open(Status::Success, ConnStatus::Connected))
        .unwrap();
    stack.take();

    let mut board = Board::idle();
    board.pressed[0] = true;
    board.pressed[1] = true;
    let mut sampler = Sampler::new(ReportLayout::Simple, ButtonPolicy::Level);
    sampler.tick(&mut board, &shared, &stack);

    let expected = vec![0, 0, 0, 0, 0b0000_0011, 0b0000_0000];
    assert_eq!(
        stack.take(),
        [Call::Send(
            ReportType::InterruptData,
            GAMEPAD_REPORT_ID,
            expected.clone()
        )]
    );

    session
        .handle(HidEvent::GetReport {
            report_id: GAMEPAD_REPORT_ID,
            report_type: ReportType::Input,
            buffer_size: 7,
        })
        .unwrap();
    assert_eq!(
        stack.take(),
        [Call::Send(ReportType::Input, GAMEPAD_REPORT_ID, expected)]
    );
}

#[test]
fn extended_full_scale_stick() {
    let (stack, shared) = (FakeStack::default(), Shared::new());
    shared.arm(ReportLayout::Extended);

    let mut board = Board::idle();
    board.sticks = [Some(4095), Some(0), Some(0), Some(0)];
    let mut sampler = Sampler::new(ReportLayout::Extended, ButtonPolicy::Level);
    let report = sampler.tick(&mut board, &shared, &stack).unwrap();

    assert_eq!(
        report.as_bytes(),
        &[0xFF, 0x7F, 0x00, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x00]
    );
    assert_eq!(rescale_axis(4095), 32767);
}

#[test]
fn get_report_gate_allows_one_combination() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ACTIVE_LAYOUT);
    bring_up(&mut session);
    session
        .handle(open(Status::Success, ConnStatus::Connected))
        .unwrap();
    stack.take();

    let mut served = 0;
    for mode in [ProtocolMode::Report, ProtocolMode::Boot] {
        session.handle(HidEvent::SetProtocol { mode }).unwrap();
        for report_id in [GAMEPAD_REPORT_ID, 0x02] {
            for report_type in [ReportType::Input, ReportType::Feature] {
                session
                    .handle(HidEvent::GetReport {
                        report_id,
                        report_type,
                        buffer_size: 16,
                    })
                    .unwrap();
                match stack.take().as_slice() {
                    [Call::Send(ReportType::Input, GAMEPAD_REPORT_ID, data)] => {
                        assert_eq!(data.len(), ACTIVE_LAYOUT.payload_size());
                        served += 1;
                    }
                    [Call::Error(HandshakeError::InvalidReportId)] => {}
                    other => panic!("unexpected calls: {other:?}"),
                }
            }
        }
    }
    assert_eq!(served, 1);
}

#[test]
fn get_report_before_connect_is_not_ready() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ACTIVE_LAYOUT);
    bring_up(&mut session);
    stack.take();

    session
        .handle(HidEvent::GetReport {
            report_id: GAMEPAD_REPORT_ID,
            report_type: ReportType::Input,
            buffer_size: 16,
        })
        .unwrap();
    assert_eq!(stack.take(), [Call::Error(HandshakeError::NotReady)]);
}

#[test]
fn boot_mode_silences_sampler() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let mut session = Session::new(&stack, &shared, &link, ACTIVE_LAYOUT);
    bring_up(&mut session);
    session
        .handle(open(Status::Success, ConnStatus::Connected))
        .unwrap();
    session
        .handle(HidEvent::SetProtocol {
            mode: ProtocolMode::Boot,
        })
        .unwrap();
    stack.take();

    let mut board = Board::idle();
    let mut sampler = Sampler::new(ACTIVE_LAYOUT, ButtonPolicy::Level);
    assert_eq!(sampler.tick(&mut board, &shared, &stack), None);
    assert!(stack.take().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Pairing
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn pin_requests_get_fixed_codes() {
    let stack = FakeStack::default();
    let responder = PairingResponder::new();

    responder
        .handle(
            &stack,
            GapEvent::PinRequest {
                peer: HOST,
                min_16_digit: false,
            },
        )
        .unwrap();
    responder
        .handle(
            &stack,
            GapEvent::PinRequest {
                peer: HOST,
                min_16_digit: true,
            },
        )
        .unwrap();
    responder
        .handle(
            &stack,
            GapEvent::ConfirmRequest {
                peer: HOST,
                value: 999_999,
            },
        )
        .unwrap();

    assert_eq!(
        stack.take(),
        [
            Call::Pin(HOST, b"1234".to_vec()),
            Call::Pin(HOST, vec![0; 16]),
            Call::Confirm(HOST, true),
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Sampler task
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn supervised_sampler_streams_while_started() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    shared.arm(ReportLayout::Simple);
    link.start();

    let mut board = Board::idle();
    board.pressed[2] = true;

    let _ = block_on(select(
        sampler::supervise(
            &link,
            &mut board,
            &shared,
            &stack,
            ReportLayout::Simple,
            ButtonPolicy::Level,
            Duration::from_millis(5),
        ),
        Timer::after(Duration::from_millis(60)),
    ));

    let sends = stack.sends();
    assert!(!sends.is_empty());
    assert!(sends.iter().all(|s| s == &[0, 0, 0, 0, 0b100, 0]));
}

#[test]
fn supervised_sampler_idles_until_started() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    shared.arm(ReportLayout::Simple);

    let mut board = Board::idle();
    let _ = block_on(select(
        sampler::supervise(
            &link,
            &mut board,
            &shared,
            &stack,
            ReportLayout::Simple,
            ButtonPolicy::Level,
            Duration::from_millis(5),
        ),
        Timer::after(Duration::from_millis(30)),
    ));

    assert!(stack.sends().is_empty());
}

#[test]
fn supervised_sampler_goes_quiet_after_stop() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    shared.arm(ReportLayout::Simple);
    link.start();

    let mut board = Board::idle();
    board.pressed[0] = true;
    let sent_at_stop = Cell::new(0);

    let _ = block_on(select(
        sampler::supervise(
            &link,
            &mut board,
            &shared,
            &stack,
            ReportLayout::Simple,
            ButtonPolicy::Level,
            Duration::from_millis(5),
        ),
        async {
            Timer::after(Duration::from_millis(30)).await;
            link.stop();
            sent_at_stop.set(stack.sends().len());
            Timer::after(Duration::from_millis(40)).await;
        },
    ));

    assert!(sent_at_stop.get() > 0);
    assert_eq!(stack.sends().len(), sent_at_stop.get());
}

/// One button driven from outside the sampler task.
struct TapBoard<'a> {
    button: &'a Cell<bool>,
}

impl InputSource for TapBoard<'_> {
    fn button_count(&self) -> usize {
        1
    }

    fn button_level(&mut self, _index: usize) -> Level {
        if self.button.get() {
            Level::Low
        } else {
            Level::High
        }
    }

    fn axis_raw(&mut self, _axis: Axis) -> Option<u16> {
        None
    }
}

#[test]
fn restarted_sampler_forgets_latched_presses() {
    let (stack, shared, link) = (FakeStack::default(), Shared::new(), Link::new());
    let button = Cell::new(true);
    let mut board = TapBoard { button: &button };

    // Disarmed: the press is latched but never reported.
    link.start();

    let _ = block_on(select(
        sampler::supervise(
            &link,
            &mut board,
            &shared,
            &stack,
            ReportLayout::Simple,
            ButtonPolicy::LatchUntilReported,
            Duration::from_millis(5),
        ),
        async {
            Timer::after(Duration::from_millis(30)).await;
            link.stop();
            button.set(false);
            Timer::after(Duration::from_millis(10)).await;

            shared.arm(ReportLayout::Simple);
            link.start();
            Timer::after(Duration::from_millis(40)).await;
        },
    ));

    let sends = stack.sends();
    assert!(!sends.is_empty());
    assert!(sends.iter().all(|s| s == &[0, 0, 0, 0, 0, 0]));
}
