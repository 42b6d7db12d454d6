//! Periodic input sampler.
//!
//! Each tick reads every button (active-low) and analog axis, encodes a
//! report through the shared buffer and pushes it to the host on the
//! interrupt channel. The sampler only runs while a host is connected;
//! the session starts and stops it through a [`SamplerLink`], and
//! [`supervise`] drops the running loop as soon as a stop arrives.

use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};

use crate::config::GAMEPAD_REPORT_ID;
use crate::hid::{Axis, EncodedReport, InputSample, ReportLayout, AXIS_COUNT};
use crate::protocol::ReportType;
use crate::shared::SharedReport;
use crate::stack::HidDevice;

/// Digital input level. Buttons are active-low: `Low` means pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

/// Synchronous view of the physical inputs.
pub trait InputSource {
    /// Number of wired buttons, in declaration order.
    fn button_count(&self) -> usize;

    fn button_level(&mut self, index: usize) -> Level;

    /// Raw 12-bit reading of `axis`, `None` if the axis is not wired
    /// (reported centred).
    fn axis_raw(&mut self, axis: Axis) -> Option<u16>;

    /// Refresh cached readings before a tick. Sources that read
    /// synchronously keep the default.
    fn refresh(&mut self) -> impl Future<Output = ()> {
        async {}
    }
}

/// How momentary presses map to the button mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonPolicy {
    /// Mask mirrors the level read on the tick.
    Level,
    /// A press seen by any poll stays set until a published report
    /// carried it.
    LatchUntilReported,
}

/// Per-connection sampler state.
#[derive(Debug)]
pub struct Sampler {
    layout: ReportLayout,
    policy: ButtonPolicy,
    latched: u16,
}

impl Sampler {
    pub const fn new(layout: ReportLayout, policy: ButtonPolicy) -> Self {
        Self {
            layout,
            policy,
            latched: 0,
        }
    }

    pub fn layout(&self) -> ReportLayout {
        self.layout
    }

    /// Read every button and return the instantaneous mask.
    ///
    /// Under [`ButtonPolicy::LatchUntilReported`] the presses are also
    /// latched, so this can be called between ticks to catch short taps.
    pub fn poll_buttons<S: InputSource>(&mut self, source: &mut S) -> u16 {
        let count = source.button_count().min(self.layout.button_count());
        let mut mask = 0u16;
        for index in 0..count {
            if source.button_level(index) == Level::Low {
                mask |= 1 << index;
            }
        }

        if self.policy == ButtonPolicy::LatchUntilReported {
            self.latched |= mask;
        }
        mask
    }

    /// Read all inputs into one sample. Does not clear latched presses.
    pub fn sample<S: InputSource>(&mut self, source: &mut S) -> InputSample {
        let level = self.poll_buttons(source);
        let buttons = match self.policy {
            ButtonPolicy::Level => level,
            ButtonPolicy::LatchUntilReported => self.latched,
        };

        let mut axes = [0i16; AXIS_COUNT];
        for axis in Axis::ALL {
            if let Some(raw) = source.axis_raw(axis) {
                axes[axis.index()] = self.layout.scale_axis(raw);
            }
        }

        InputSample { buttons, axes }
    }

    /// One sampling tick: sample, publish, send.
    ///
    /// Returns the published report, or `None` when the buffer is
    /// disarmed or the host selected Boot mode. Send failures are logged
    /// and dropped; the next tick carries fresher data.
    pub fn tick<M, D, S>(
        &mut self,
        source: &mut S,
        shared: &SharedReport<M>,
        device: &D,
    ) -> Option<EncodedReport>
    where
        M: RawMutex,
        D: HidDevice,
        S: InputSource,
    {
        let sample = self.sample(source);
        let Some(report) = shared.publish(&sample, self.layout) else {
            trace!("tick skipped: buffer disarmed or boot mode");
            return None;
        };
        self.latched = 0;

        if let Err(e) = device.send_report(
            ReportType::InterruptData,
            GAMEPAD_REPORT_ID,
            report.as_bytes(),
        ) {
            warn!("input report send failed: {:?}", e);
        }
        Some(report)
    }
}

/// Lifecycle command for the sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SamplerCommand {
    Start,
    Stop,
}

/// Start/stop signal from the session to [`supervise`].
///
/// Only the latest command matters, so a `Signal` (single slot,
/// overwrite) is enough.
pub struct SamplerLink<M: RawMutex> {
    command: Signal<M, SamplerCommand>,
}

impl<M: RawMutex> SamplerLink<M> {
    pub const fn new() -> Self {
        Self {
            command: Signal::new(),
        }
    }

    pub fn start(&self) {
        self.command.signal(SamplerCommand::Start);
    }

    pub fn stop(&self) {
        self.command.signal(SamplerCommand::Stop);
    }

    pub async fn wait(&self) -> SamplerCommand {
        self.command.wait().await
    }

    /// Take the pending command without waiting.
    pub fn try_take(&self) -> Option<SamplerCommand> {
        self.command.try_take()
    }
}

impl<M: RawMutex> Default for SamplerLink<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sampling loop. Never returns; cancel it by dropping the future.
pub async fn run<M, D, S>(
    sampler: &mut Sampler,
    source: &mut S,
    shared: &SharedReport<M>,
    device: &D,
    period: Duration,
) where
    M: RawMutex,
    D: HidDevice,
    S: InputSource,
{
    let mut ticker = Ticker::every(period);
    loop {
        source.refresh().await;
        sampler.tick(source, shared, device);
        ticker.next().await;
    }
}

/// Own the sampler lifetime: run it between `Start` and `Stop`.
///
/// Each start begins with fresh state (no latched presses carried over
/// from a previous connection). Stopping drops the loop between ticks.
pub async fn supervise<M, D, S>(
    link: &SamplerLink<M>,
    source: &mut S,
    shared: &SharedReport<M>,
    device: &D,
    layout: ReportLayout,
    policy: ButtonPolicy,
    period: Duration,
) -> !
where
    M: RawMutex,
    D: HidDevice,
    S: InputSource,
{
    let mut pending: Option<SamplerCommand> = None;

    loop {
        let cmd = match pending.take() {
            Some(cmd) => cmd,
            None => link.wait().await,
        };
        if cmd != SamplerCommand::Start {
            continue;
        }

        info!("sampler started ({} ms period)", period.as_millis());
        let mut sampler = Sampler::new(layout, policy);
        match select(
            link.wait(),
            run(&mut sampler, source, shared, device, period),
        )
        .await
        {
            Either::First(SamplerCommand::Stop) => info!("sampler stopped"),
            Either::First(SamplerCommand::Start) => {
                debug!("sampler restart requested");
                pending = Some(SamplerCommand::Start);
            }
            Either::Second(()) => {}
        }
    }
}
