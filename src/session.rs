//! Connection state machine.
//!
//! One [`Session`] owns the lifecycle of the HID application: register on
//! init, advertise once registered, arm the report buffer and start the
//! sampler on connect, tear both down on disconnect. It also answers the
//! host's GET_REPORT / SET_REPORT / SET_PROTOCOL requests.
//!
//! The stack delivers callbacks one at a time, so handlers take
//! `&mut self` and never race each other. The only concurrent party is
//! the sampler, which shares the report buffer and protocol mode through
//! [`SharedReport`].

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::config::{
    APP_DESCRIPTION, APP_NAME, APP_PROVIDER, GAMEPAD_REPORT_ID, HID_SUBCLASS_GAMEPAD,
};
use crate::error::Error;
use crate::hid::{descriptor, ReportLayout};
use crate::protocol::{self, HandshakeError, ProtocolMode, ReportType};
use crate::sampler::SamplerLink;
use crate::shared::SharedReport;
use crate::stack::{AppParams, BdAddr, ConnStatus, HidDevice, HidEvent, ScanMode, Status};

/// Lifecycle state of the HID application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    AppRegistered,
    Discoverable,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    /// States from which a `Connected` open is accepted.
    fn accepts_connection(self) -> bool {
        matches!(
            self,
            ConnectionState::AppRegistered
                | ConnectionState::Discoverable
                | ConnectionState::Connecting
        )
    }

    /// States that own a (possibly half-open) link to tear down.
    fn has_link(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Disconnecting
        )
    }
}

/// SDP record registered for `layout`.
pub fn app_params(layout: ReportLayout) -> AppParams<'static> {
    AppParams {
        name: APP_NAME,
        description: APP_DESCRIPTION,
        provider: APP_PROVIDER,
        subclass: HID_SUBCLASS_GAMEPAD,
        descriptor: layout.descriptor(),
    }
}

/// HID session bound to one stack handle.
pub struct Session<'a, M: RawMutex, D: HidDevice> {
    device: &'a D,
    shared: &'a SharedReport<M>,
    sampler: &'a SamplerLink<M>,
    layout: ReportLayout,
    state: ConnectionState,
    peer: Option<BdAddr>,
    fault: Option<Error>,
    sampler_running: bool,
}

impl<'a, M: RawMutex, D: HidDevice> Session<'a, M, D> {
    pub fn new(
        device: &'a D,
        shared: &'a SharedReport<M>,
        sampler: &'a SamplerLink<M>,
        layout: ReportLayout,
    ) -> Self {
        Self {
            device,
            shared,
            sampler,
            layout,
            state: ConnectionState::Uninitialized,
            peer: None,
            fault: None,
            sampler_running: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Host of the current connection, if any.
    pub fn peer(&self) -> Option<BdAddr> {
        self.peer
    }

    /// Fatal failure that halted the session.
    pub fn fault(&self) -> Option<Error> {
        self.fault
    }

    /// Whether the sampler was told to run and has not been stopped since.
    pub fn sampler_running(&self) -> bool {
        self.sampler_running
    }

    pub fn layout(&self) -> ReportLayout {
        self.layout
    }

    /// Dispatch one HID device callback.
    ///
    /// Protocol violations are answered with a handshake error and return
    /// `Ok`. `Err` means a lifecycle step failed or the session is halted.
    pub fn handle(&mut self, event: HidEvent) -> Result<(), Error> {
        match event {
            HidEvent::InitComplete { status } => self.on_init_complete(status.is_success()),
            HidEvent::DeinitComplete { status } => {
                info!("HID device deinit complete: {:?}", status);
                Ok(())
            }
            HidEvent::AppRegistered {
                status,
                in_use,
                peer,
            } => self.on_app_registered(status.is_success(), in_use, peer),
            HidEvent::AppUnregistered { status } => {
                if status.is_success() {
                    info!("HID app unregistered");
                } else {
                    error!("HID app unregister failed: {:?}", status);
                }
                Ok(())
            }
            HidEvent::Open { status, conn, peer } => self.on_open(status, conn, peer),
            HidEvent::Close { status, conn } => self.on_close(status, conn),
            HidEvent::VirtualCableUnplug { status, conn } => {
                self.on_virtual_cable_unplug(status, conn)
            }
            HidEvent::SendReportComplete {
                status,
                reason,
                report_type,
                report_id,
            } => {
                self.on_send_report_complete(status, reason, report_type, report_id);
                Ok(())
            }
            HidEvent::ReportError { status } => {
                debug!("report error sent: {:?}", status);
                Ok(())
            }
            HidEvent::GetReport {
                report_id,
                report_type,
                buffer_size,
            } => {
                self.on_get_report(report_id, report_type, buffer_size);
                Ok(())
            }
            HidEvent::SetReport {
                report_id,
                report_type,
                len,
            } => {
                self.on_set_report(report_id, report_type, len);
                Ok(())
            }
            HidEvent::SetProtocol { mode } => {
                self.on_set_protocol(mode);
                Ok(())
            }
            HidEvent::InterruptData { report_id, len } => {
                info!("interrupt data from host: id {}, {} bytes", report_id, len);
                Ok(())
            }
        }
    }

    fn ensure_running(&self) -> Result<(), Error> {
        match self.fault {
            Some(fault) => {
                warn!("session halted by {:?}, event ignored", fault);
                Err(Error::Halted)
            }
            None => Ok(()),
        }
    }

    fn halt(&mut self, fault: Error) -> Result<(), Error> {
        error!("fatal: {:?}, session halted", fault);
        self.fault = Some(fault);
        Err(fault)
    }

    // Lifecycle

    pub fn on_init_complete(&mut self, success: bool) -> Result<(), Error> {
        self.ensure_running()?;
        if !success {
            return self.halt(Error::InitFailed);
        }
        if self.state != ConnectionState::Uninitialized {
            warn!("init complete in state {:?}, ignored", self.state);
            return Ok(());
        }

        let params = app_params(self.layout);
        if let Some(summary) = descriptor::summarize(params.descriptor) {
            info!(
                "registering HID app: {} buttons, {} axes x {} bits, {} byte report",
                summary.buttons,
                summary.axes,
                summary.axis_bits,
                summary.payload_size()
            );
        }
        if let Err(e) = self.device.register_app(&params) {
            return self.halt(Error::Stack(e));
        }
        self.state = ConnectionState::AppRegistered;
        Ok(())
    }

    pub fn on_app_registered(
        &mut self,
        success: bool,
        was_in_use: bool,
        peer: BdAddr,
    ) -> Result<(), Error> {
        self.ensure_running()?;
        if !success {
            return self.halt(Error::RegisterFailed);
        }
        if !matches!(
            self.state,
            ConnectionState::Uninitialized | ConnectionState::AppRegistered
        ) {
            warn!("app registered in state {:?}, ignored", self.state);
            return Ok(());
        }

        info!("HID app registered, advertising");
        self.state = ConnectionState::Discoverable;
        self.device.set_scan_mode(ScanMode::VISIBLE)?;

        if was_in_use {
            info!("reconnecting to bonded host {:?}", peer);
            self.device.connect(peer)?;
        }
        Ok(())
    }

    pub fn on_open(&mut self, status: Status, conn: ConnStatus, peer: BdAddr) -> Result<(), Error> {
        self.ensure_running()?;
        if !status.is_success() {
            error!("open failed: {:?}", status);
            return Ok(());
        }

        match conn {
            ConnStatus::Connecting => {
                info!("connecting to {:?}", peer);
                if matches!(
                    self.state,
                    ConnectionState::AppRegistered | ConnectionState::Discoverable
                ) {
                    self.state = ConnectionState::Connecting;
                }
                Ok(())
            }
            ConnStatus::Connected if self.state == ConnectionState::Connected => {
                warn!("duplicate connect from {:?}, ignored", peer);
                Ok(())
            }
            ConnStatus::Connected if self.state.accepts_connection() => {
                info!("connected to {:?}", peer);
                // Every link starts in Report mode.
                self.shared.set_protocol_mode(ProtocolMode::Report);
                self.shared.arm(self.layout);
                self.sampler.start();
                self.sampler_running = true;
                self.peer = Some(peer);
                self.state = ConnectionState::Connected;
                self.device.set_scan_mode(ScanMode::HIDDEN)?;
                Ok(())
            }
            ConnStatus::Connected => {
                warn!("connect in state {:?}, ignored", self.state);
                Ok(())
            }
            other => {
                error!("unexpected open substate: {:?}", other);
                Ok(())
            }
        }
    }

    pub fn on_close(&mut self, status: Status, conn: ConnStatus) -> Result<(), Error> {
        self.ensure_running()?;
        if !status.is_success() {
            error!("close failed: {:?}", status);
            return Ok(());
        }

        match conn {
            ConnStatus::Disconnecting => {
                info!("disconnecting");
                if self.state == ConnectionState::Connected {
                    self.state = ConnectionState::Disconnecting;
                }
                Ok(())
            }
            ConnStatus::Disconnected => self.teardown(),
            other => {
                error!("unexpected close substate: {:?}", other);
                Ok(())
            }
        }
    }

    /// The host removed the pairing. Same cleanup as a close.
    pub fn on_virtual_cable_unplug(&mut self, status: Status, conn: ConnStatus) -> Result<(), Error> {
        self.ensure_running()?;
        if !status.is_success() {
            error!("virtual cable unplug failed: {:?}", status);
            return Ok(());
        }
        match conn {
            ConnStatus::Disconnected => {
                info!("virtual cable unplugged");
                self.teardown()
            }
            other => {
                error!("unexpected unplug substate: {:?}", other);
                Ok(())
            }
        }
    }

    fn teardown(&mut self) -> Result<(), Error> {
        if !self.state.has_link() {
            info!("disconnected in state {:?}, nothing to tear down", self.state);
            return Ok(());
        }

        info!("disconnected, advertising again");
        self.sampler.stop();
        self.sampler_running = false;
        self.shared.disarm();
        self.shared.set_protocol_mode(ProtocolMode::Report);
        self.peer = None;
        self.state = ConnectionState::Discoverable;
        self.device.set_scan_mode(ScanMode::VISIBLE)?;
        Ok(())
    }

    fn on_send_report_complete(
        &self,
        status: Status,
        reason: u8,
        report_type: ReportType,
        report_id: u8,
    ) {
        if status.is_success() {
            trace!("report sent: {:?} id {}", report_type, report_id);
        } else {
            warn!(
                "report send failed: {:?} reason {} ({:?} id {})",
                status, reason, report_type, report_id
            );
        }
    }

    // Host requests

    fn reject(&self, error: HandshakeError) {
        if let Err(e) = self.device.report_error(error) {
            warn!("report_error({:?}) failed: {:?}", error, e);
        }
    }

    /// Validate a GET_REPORT target against the current protocol mode.
    ///
    /// A refusal is answered with exactly one `InvalidReportId` handshake.
    pub fn check_report_id_type(&self, report_id: u8, report_type: ReportType) -> bool {
        let mode = self.shared.protocol_mode();
        if protocol::report_request_valid(mode, report_id, report_type) {
            return true;
        }
        error!(
            "invalid report request: id {}, type {:?}, mode {:?}",
            report_id, report_type, mode
        );
        self.reject(HandshakeError::InvalidReportId);
        false
    }

    pub fn on_get_report(&self, report_id: u8, report_type: ReportType, buffer_size: u16) {
        debug!(
            "GET_REPORT id {}, type {:?}, size {}",
            report_id, report_type, buffer_size
        );
        if !self.check_report_id_type(report_id, report_type) {
            return;
        }

        let Some(report) = self.shared.latest() else {
            warn!("GET_REPORT with no host connected");
            self.reject(HandshakeError::NotReady);
            return;
        };
        if let Err(e) = self
            .device
            .send_report(report_type, GAMEPAD_REPORT_ID, report.as_bytes())
        {
            warn!("GET_REPORT reply failed: {:?}", e);
        }
    }

    /// Output and feature reports are not part of this device.
    pub fn on_set_report(&self, report_id: u8, report_type: ReportType, len: u16) {
        info!(
            "SET_REPORT id {}, type {:?}, {} bytes: unsupported",
            report_id, report_type, len
        );
        self.reject(HandshakeError::UnsupportedRequest);
    }

    pub fn on_set_protocol(&self, mode: ProtocolMode) {
        info!("protocol mode: {:?}", mode);
        self.shared.set_protocol_mode(mode);
    }
}
