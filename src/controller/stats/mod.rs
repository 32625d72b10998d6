//! Exponentially smoothed throughput counters.
//!
//! The frame path accumulates raw bits and packets per direction; once per
//! [`STATS_TICK_PERIOD`] the ticker folds them into the per-second estimate:
//!
//! ```text
//! smoothed = smoothed × 0.05 + raw × 0.95
//! raw      = 0
//! ```
//!
//! The weights favour the last interval: the figure follows live traffic within a
//! tick or two and is meant for diagnostics, not long-term accounting.
use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Ticker;

use crate::infra::twai::{CAN_FRAME_HEADER_BITS, STATS_TICK_PERIOD};

/// Weight kept from the previous estimate.
pub const DECAY_KEEP: f64 = 0.05;
/// Weight given to the interval that just ended.
pub const DECAY_NEW: f64 = 0.95;

/// Smoothed per-second rates for one direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rates {
    pub bits_per_second: u32,
    pub packets_per_second: u32,
}

/// Smoothed rates for both directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Throughput {
    pub rx: Rates,
    pub tx: Rates,
}

#[derive(Clone, Copy, Debug, Default)]
struct Direction {
    bits: u32,
    packets: u32,
    smoothed: Rates,
}

impl Direction {
    fn record(&mut self, payload_len: usize) {
        let bits = CAN_FRAME_HEADER_BITS + 8 * payload_len as u32;
        self.bits = self.bits.saturating_add(bits);
        self.packets = self.packets.saturating_add(1);
    }

    fn decay(&mut self) {
        self.smoothed.bits_per_second = smooth(self.smoothed.bits_per_second, self.bits);
        self.smoothed.packets_per_second = smooth(self.smoothed.packets_per_second, self.packets);
        self.bits = 0;
        self.packets = 0;
    }
}

fn smooth(previous: u32, raw: u32) -> u32 {
    (f64::from(previous) * DECAY_KEEP + f64::from(raw) * DECAY_NEW) as u32
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    rx: Direction,
    tx: Direction,
}

/// Raw accumulators and smoothed estimates for both directions.
pub struct ThroughputStats {
    counters: Mutex<CriticalSectionRawMutex, Cell<Counters>>,
}

impl Default for ThroughputStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputStats {
    pub const fn new() -> Self {
        Self {
            counters: Mutex::new(Cell::new(Counters {
                rx: Direction {
                    bits: 0,
                    packets: 0,
                    smoothed: Rates {
                        bits_per_second: 0,
                        packets_per_second: 0,
                    },
                },
                tx: Direction {
                    bits: 0,
                    packets: 0,
                    smoothed: Rates {
                        bits_per_second: 0,
                        packets_per_second: 0,
                    },
                },
            })),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Counters)) {
        self.counters.lock(|cell| {
            let mut counters = cell.get();
            f(&mut counters);
            cell.set(counters);
        });
    }

    /// Account for one transmitted frame carrying `payload_len` bytes.
    pub fn record_tx(&self, payload_len: usize) {
        self.update(|c| c.tx.record(payload_len));
    }

    /// Account for one received frame carrying `payload_len` bytes.
    pub fn record_rx(&self, payload_len: usize) {
        self.update(|c| c.rx.record(payload_len));
    }

    /// Fold the raw counters into the smoothed estimates and reset them.
    pub fn tick(&self) {
        self.update(|c| {
            c.rx.decay();
            c.tx.decay();
        });
    }

    /// Current smoothed estimates.
    pub fn throughput(&self) -> Throughput {
        let counters = self.counters.lock(|cell| cell.get());
        Throughput {
            rx: counters.rx.smoothed,
            tx: counters.tx.smoothed,
        }
    }
}

/// Runner applying [`ThroughputStats::tick`] every [`STATS_TICK_PERIOD`].
///
/// Only handed out when statistics are enabled in the controller configuration.
pub struct StatsTicker<'d> {
    stats: &'d ThroughputStats,
}

impl<'d> StatsTicker<'d> {
    pub(crate) fn new(stats: &'d ThroughputStats) -> Self {
        Self { stats }
    }

    /// Tick forever. Drop the future to stop.
    pub async fn run(self) -> ! {
        let mut ticker = Ticker::every(STATS_TICK_PERIOD);
        loop {
            ticker.next().await;
            self.stats.tick();
        }
    }
}
