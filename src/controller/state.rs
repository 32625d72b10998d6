//! State shared between the foreground adapter and its background runners.
//!
//! Firmware allocates one [`AdapterState`] (usually a `static`, it is
//! `const`-constructible) and lends it to [`TwaiService::new`](super::TwaiService::new).
//! Each field has a single writer:
//!
//! * fault state: the alert monitor;
//! * start hand-off: the first successful `open()`;
//! * statistics: the frame path (accumulate) and the ticker (decay);
//! * alert callback: the registration point on the adapter.
use core::cell::Cell;
use core::sync::atomic::{AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::controller::monitor::FaultState;
use crate::controller::stats::ThroughputStats;
use crate::infra::twai::alerts::AlertCallback;

/// Storage backing one adapter instance.
pub struct AdapterState {
    fault: FaultCell,
    started: Signal<CriticalSectionRawMutex, ()>,
    alert_callback: Mutex<CriticalSectionRawMutex, Cell<Option<AlertCallback>>>,
    stats: ThroughputStats,
}

impl Default for AdapterState {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterState {
    pub const fn new() -> Self {
        Self {
            fault: FaultCell::new(),
            started: Signal::new(),
            alert_callback: Mutex::new(Cell::new(None)),
            stats: ThroughputStats::new(),
        }
    }

    /// Last fault state published by the monitor.
    pub fn fault_state(&self) -> FaultState {
        self.fault.get()
    }

    pub(crate) fn set_fault_state(&self, state: FaultState) {
        self.fault.set(state);
    }

    /// Throughput counters of this instance.
    pub fn stats(&self) -> &ThroughputStats {
        &self.stats
    }

    pub(crate) fn alert_callback(&self) -> Option<AlertCallback> {
        self.alert_callback.lock(|cell| cell.get())
    }

    pub(crate) fn set_alert_callback(&self, callback: Option<AlertCallback>) {
        self.alert_callback.lock(|cell| cell.set(callback));
    }

    /// Release the alert monitor; raised once the driver runs.
    pub(crate) fn signal_started(&self) {
        self.started.signal(());
    }

    pub(crate) async fn wait_started(&self) {
        self.started.wait().await;
    }
}

/// Lock-free cell publishing the fault state (load/store only, no CAS needed).
struct FaultCell(AtomicU8);

impl FaultCell {
    const fn new() -> Self {
        Self(AtomicU8::new(FaultState::Normal as u8))
    }

    fn get(&self) -> FaultState {
        FaultState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: FaultState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
