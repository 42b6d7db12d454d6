//! Latest-report mailbox shared between the sampler and the stack
//! callback path.
//!
//! One slot, one lock. The lock also guards the negotiated protocol mode
//! so a mode change and an encode can never interleave. Critical sections
//! only copy a handful of bytes; sends happen after the lock is released.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::hid::{self, EncodedReport, InputSample, ReportLayout};
use crate::protocol::ProtocolMode;

struct Slot {
    mode: ProtocolMode,
    /// `Some` only while a host is connected.
    report: Option<EncodedReport>,
}

/// Shared report buffer plus protocol mode.
pub struct SharedReport<M: RawMutex> {
    inner: Mutex<M, RefCell<Slot>>,
}

impl<M: RawMutex> SharedReport<M> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Slot {
                mode: ProtocolMode::Report,
                report: None,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Slot) -> R) -> R {
        self.inner.lock(|slot| f(&mut slot.borrow_mut()))
    }

    /// Make the buffer readable, holding an all-zero report.
    pub fn arm(&self, layout: ReportLayout) {
        self.with(|slot| slot.report = Some(EncodedReport::zeroed(layout)));
    }

    /// Drop the current report; reads fail until the next [`arm`](Self::arm).
    pub fn disarm(&self) {
        self.with(|slot| slot.report = None);
    }

    pub fn is_armed(&self) -> bool {
        self.with(|slot| slot.report.is_some())
    }

    pub fn protocol_mode(&self) -> ProtocolMode {
        self.with(|slot| slot.mode)
    }

    pub fn set_protocol_mode(&self, mode: ProtocolMode) {
        self.with(|slot| slot.mode = mode);
    }

    /// Encode `sample` and store it as the latest report.
    ///
    /// Returns a copy for sending, or `None` when the buffer is disarmed
    /// or the host selected Boot mode.
    pub fn publish(&self, sample: &InputSample, layout: ReportLayout) -> Option<EncodedReport> {
        self.with(|slot| {
            if slot.mode != ProtocolMode::Report {
                return None;
            }
            let stored = slot.report.as_mut()?;
            *stored = hid::encode(sample, layout);
            Some(*stored)
        })
    }

    /// Latest report, if armed.
    pub fn latest(&self) -> Option<EncodedReport> {
        self.with(|slot| slot.report)
    }
}

impl<M: RawMutex> Default for SharedReport<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type Shared = SharedReport<CriticalSectionRawMutex>;

    #[test]
    fn starts_disarmed_in_report_mode() {
        let shared = Shared::new();
        assert!(!shared.is_armed());
        assert_eq!(shared.latest(), None);
        assert_eq!(shared.protocol_mode(), ProtocolMode::Report);
    }

    #[test]
    fn publish_requires_armed_buffer() {
        let shared = Shared::new();
        let sample = InputSample {
            buttons: 0b11,
            axes: [0; 4],
        };
        assert_eq!(shared.publish(&sample, ReportLayout::Simple), None);

        shared.arm(ReportLayout::Simple);
        let report = shared.publish(&sample, ReportLayout::Simple).unwrap();
        assert_eq!(report.as_bytes(), &[0, 0, 0, 0, 0b11, 0]);
        assert_eq!(shared.latest(), Some(report));
    }

    #[test]
    fn arm_holds_zeroed_report_of_layout_size() {
        let shared = Shared::new();
        shared.arm(ReportLayout::Extended);
        assert_eq!(shared.latest().unwrap().as_bytes(), &[0u8; 10]);
    }

    #[test]
    fn disarm_discards_last_report() {
        let shared = Shared::new();
        shared.arm(ReportLayout::Simple);
        shared.publish(&InputSample::neutral(), ReportLayout::Simple);
        shared.disarm();
        assert_eq!(shared.latest(), None);
        assert!(!shared.is_armed());
    }

    #[test]
    fn boot_mode_blocks_publish() {
        let shared = Shared::new();
        shared.arm(ReportLayout::Simple);
        shared.set_protocol_mode(ProtocolMode::Boot);

        let sample = InputSample {
            buttons: 1,
            axes: [0; 4],
        };
        assert_eq!(shared.publish(&sample, ReportLayout::Simple), None);
        assert_eq!(shared.latest(), Some(EncodedReport::zeroed(ReportLayout::Simple)));

        shared.set_protocol_mode(ProtocolMode::Report);
        assert!(shared.publish(&sample, ReportLayout::Simple).is_some());
    }

    #[test]
    fn publish_overwrites_previous_report() {
        let shared = Shared::new();
        shared.arm(ReportLayout::Simple);
        shared.publish(
            &InputSample {
                buttons: 0x4001,
                axes: [1, -1, 2, -2],
            },
            ReportLayout::Simple,
        );
        let second = shared
            .publish(&InputSample::neutral(), ReportLayout::Simple)
            .unwrap();
        assert_eq!(second.as_bytes(), &[0u8; 6]);
        assert_eq!(shared.latest(), Some(second));
    }
}
