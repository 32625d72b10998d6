//! Hardware alert bits raised by the TWAI controller and the watch masks the
//! adapter enables.
use bitflags::bitflags;

bitflags! {
    /// Bitmask of simultaneously raised controller alerts.
    ///
    /// Bit positions follow the ESP-IDF `TWAI_ALERT_*` layout so platform drivers
    /// can convert with [`Alerts::from_bits_truncate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Alerts: u32 {
        /// No more messages queued for transmission.
        const TX_IDLE = 0x0000_0001;
        /// The previous transmission succeeded.
        const TX_SUCCESS = 0x0000_0002;
        /// A frame has been received and queued.
        const RX_DATA = 0x0000_0004;
        /// Both error counters dropped below the warning limit.
        const BELOW_ERR_WARN = 0x0000_0008;
        /// The controller became error active.
        const ERR_ACTIVE = 0x0000_0010;
        /// Bus recovery is in progress.
        const RECOVERY_IN_PROGRESS = 0x0000_0020;
        /// Bus recovery completed; the controller is stopped.
        const BUS_RECOVERED = 0x0000_0040;
        /// A frame lost arbitration.
        const ARB_LOST = 0x0000_0080;
        /// One of the error counters exceeded the warning limit.
        const ABOVE_ERR_WARN = 0x0000_0100;
        /// A bus error (bit, stuff, CRC, form, ACK) occurred.
        const BUS_ERROR = 0x0000_0200;
        /// The previous transmission failed (single-shot).
        const TX_FAILED = 0x0000_0400;
        /// The RX queue was full and a frame was lost.
        const RX_QUEUE_FULL = 0x0000_0800;
        /// The controller became error passive.
        const ERR_PASS = 0x0000_1000;
        /// Bus-off: the transmit error counter exceeded 255.
        const BUS_OFF = 0x0000_2000;
        /// The hardware RX FIFO overran.
        const RX_FIFO_OVERRUN = 0x0000_4000;
        /// A transmission was retried.
        const TX_RETRIED = 0x0000_8000;
        /// The peripheral was reset.
        const PERIPH_RESET = 0x0001_0000;
    }
}

impl Alerts {
    /// Fault conditions forwarded as the error subset.
    pub const ERROR_ALERTS_TO_WATCH: Alerts = Alerts::ABOVE_ERR_WARN
        .union(Alerts::ERR_PASS)
        .union(Alerts::BUS_OFF)
        .union(Alerts::RX_FIFO_OVERRUN);

    /// Traffic events, useful to callback consumers only.
    pub const DATA_EVENTS_TO_WATCH: Alerts = Alerts::TX_IDLE
        .union(Alerts::TX_SUCCESS)
        .union(Alerts::RX_DATA);

    /// De-escalation events letting the monitor return to `Normal`.
    pub const RECOVERY_EVENTS_TO_WATCH: Alerts = Alerts::BELOW_ERR_WARN.union(Alerts::ERR_ACTIVE);

    /// Mask enabled at install time and restored after a bus recovery.
    pub const ALERTS_TO_WATCH: Alerts = Alerts::ERROR_ALERTS_TO_WATCH
        .union(Alerts::DATA_EVENTS_TO_WATCH)
        .union(Alerts::RECOVERY_EVENTS_TO_WATCH);
}

/// One alert batch as forwarded to the external callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertEvent {
    /// Every bit raised in this batch.
    pub alerts: Alerts,
    /// The fault subset of `alerts` (see [`Alerts::ERROR_ALERTS_TO_WATCH`]).
    pub errors: Alerts,
}

impl AlertEvent {
    pub fn new(alerts: Alerts) -> Self {
        Self {
            alerts,
            errors: alerts & Alerts::ERROR_ALERTS_TO_WATCH,
        }
    }

    /// `true` when the batch carries at least one fault condition.
    pub fn is_error(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Callback receiving raw alert telemetry, invoked from the monitor task.
pub type AlertCallback = fn(AlertEvent);
