//! Contract between the adapter and the platform TWAI driver.
//!
//! Implementations wrap the vendor driver (ESP-IDF `twai_*` bindings, `esp-hal`
//! TWAI, ...). Every method takes `&self`: the vendor driver serialises access to
//! its queues and status registers internally, so the foreground frame path and
//! the background alert monitor can share one reference without an extra lock.
use core::future::Future;

use embassy_time::Duration;

use crate::error::DriverError;
use crate::infra::twai::alerts::Alerts;
use crate::infra::twai::config::{FilterConfig, GeneralConfig, TimingConfig};

/// How long a driver call may suspend the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Fail immediately with [`DriverError::Timeout`] instead of blocking.
    NoWait,
    /// Block for at most the given duration.
    For(Duration),
    /// Block until the operation completes.
    Forever,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Wait {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Wait::NoWait => defmt::write!(f, "NoWait"),
            Wait::For(d) => defmt::write!(f, "For({=u64}us)", d.as_micros()),
            Wait::Forever => defmt::write!(f, "Forever"),
        }
    }
}

/// Operational state reported by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    /// Installed but not participating in bus activity.
    Stopped,
    /// Participating in bus activity.
    Running,
    /// Transmit error counter exceeded 255; waiting for recovery to be initiated.
    BusOff,
    /// Counting bus-free sequences before returning to `Stopped`.
    Recovering,
}

/// Non-destructive snapshot of the controller status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusInfo {
    pub state: ControllerState,
    pub msgs_to_tx: u32,
    pub msgs_to_rx: u32,
    pub tx_error_counter: u32,
    pub rx_error_counter: u32,
    pub bus_error_count: u32,
}

impl StatusInfo {
    /// Status of a freshly started controller with empty queues.
    pub const fn running() -> Self {
        Self::with_state(ControllerState::Running)
    }

    /// Status with the given state and zeroed counters.
    pub const fn with_state(state: ControllerState) -> Self {
        Self {
            state,
            msgs_to_tx: 0,
            msgs_to_rx: 0,
            tx_error_counter: 0,
            rx_error_counter: 0,
            bus_error_count: 0,
        }
    }
}

/// Frame as exchanged with the controller queues, standard or extended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwaiMessage {
    /// 11- or 29-bit identifier, depending on `extended`.
    pub identifier: u32,
    /// Extended (29-bit) identifier format.
    pub extended: bool,
    /// Transmit once, without retransmission on error.
    pub single_shot: bool,
    /// The caller asked for more than eight bytes; breaks ISO 11898-1 compliance.
    pub dlc_non_compliant: bool,
    /// Data length code; never above 8 for frames built by the adapter.
    pub data_length_code: u8,
    pub data: [u8; 8],
}

impl TwaiMessage {
    /// Number of payload bytes actually carried on the wire.
    pub fn payload_len(&self) -> usize {
        usize::from(self.data_length_code).min(8)
    }

    /// Meaningful payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.payload_len()]
    }
}

/// Platform TWAI driver as used by the adapter.
///
/// Mirrors the install / start / stop / transmit / receive / alert API of the
/// vendor driver. Asynchronous operations suspend the calling task instead of
/// blocking the core.
pub trait TwaiDriver {
    /// Install the driver with the given configuration. The controller is left stopped.
    fn install(
        &self,
        general: &GeneralConfig,
        timing: &TimingConfig,
        filter: &FilterConfig,
    ) -> Result<(), DriverError>;

    /// Uninstall a stopped (or bus-off) driver and free its resources.
    fn uninstall(&self) -> Result<(), DriverError>;

    /// Move the controller from `Stopped` to `Running`.
    fn start(&self) -> Result<(), DriverError>;

    /// Move the controller from `Running` to `Stopped`.
    fn stop(&self) -> Result<(), DriverError>;

    /// Queue a frame for transmission, waiting for queue space as allowed by `wait`.
    ///
    /// Fails with [`DriverError::InvalidState`] when the controller is not running
    /// and with [`DriverError::Timeout`] when the queue stayed full.
    fn transmit<'a>(
        &'a self,
        message: &'a TwaiMessage,
        wait: Wait,
    ) -> impl Future<Output = Result<(), DriverError>> + 'a;

    /// Dequeue a received frame. Fails with [`DriverError::Timeout`] when nothing
    /// arrived within `wait`.
    fn receive<'a>(
        &'a self,
        wait: Wait,
    ) -> impl Future<Output = Result<TwaiMessage, DriverError>> + 'a;

    /// Current controller status; never blocks and never mutates state.
    fn status(&self) -> StatusInfo;

    /// Wait until at least one enabled alert is raised and return the whole batch.
    fn read_alerts<'a>(&'a self) -> impl Future<Output = Result<Alerts, DriverError>> + 'a;

    /// Replace the set of enabled alerts.
    fn reconfigure_alerts(&self, enabled: Alerts) -> Result<(), DriverError>;

    /// Start the bus-off recovery sequence (128 × 11 recessive bits, hardware driven).
    fn initiate_recovery(&self) -> Result<(), DriverError>;
}
