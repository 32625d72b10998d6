//! Background alert monitor and bus-off recovery state machine.
//!
//! ```text
//!            ABOVE_ERR_WARN           ERR_PASS
//!   Normal ───────────────▶ ErrorWarning ───────▶ ErrorPassive
//!     ▲   ◀─────────────── (BELOW_ERR_WARN) ◀──────────┘
//!     │                                                 │ BUS_OFF (from any state)
//!     │  BUS_RECOVERED: start + restore alerts          ▼
//!     └──────────────── Recovering ◀───────────────── BusOff
//!                                  reconfigure alerts,
//!                                  initiate recovery
//! ```
//!
//! The monitor is the only writer of the fault state. It owns every recovery
//! step; the foreground frame path only reads the controller status and nudges
//! it without waiting for the outcome.
use embassy_time::Timer;

use crate::controller::state::AdapterState;
use crate::infra::twai::alerts::{AlertEvent, Alerts};
use crate::infra::twai::driver::TwaiDriver;
use crate::infra::twai::ALERT_RETRY_DELAY;

/// Fault condition of the bus as seen through controller alerts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FaultState {
    Normal = 0,
    ErrorWarning = 1,
    ErrorPassive = 2,
    BusOff = 3,
    Recovering = 4,
}

impl FaultState {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => FaultState::ErrorWarning,
            2 => FaultState::ErrorPassive,
            3 => FaultState::BusOff,
            4 => FaultState::Recovering,
            _ => FaultState::Normal,
        }
    }

    /// `true` while the controller is off the bus or recovering.
    pub fn is_bus_off(&self) -> bool {
        matches!(self, FaultState::BusOff | FaultState::Recovering)
    }
}

/// Runner consuming controller alerts for the whole life of the process.
///
/// Spawn [`run`](Self::run) on a task running at
/// [`ALERT_TASK_PRIORITY`](crate::infra::twai::ALERT_TASK_PRIORITY). It may be
/// spawned before `open()`: it parks until the driver has been started.
pub struct FaultMonitor<'d, D: TwaiDriver> {
    driver: &'d D,
    state: &'d AdapterState,
}

impl<'d, D: TwaiDriver> FaultMonitor<'d, D> {
    pub(crate) fn new(driver: &'d D, state: &'d AdapterState) -> Self {
        Self { driver, state }
    }

    /// Wait for the start hand-off, then react to alert batches forever.
    /// A failed read is retried after [`ALERT_RETRY_DELAY`]. Drop the future to
    /// stop monitoring.
    pub async fn run(mut self) -> ! {
        self.state.wait_started().await;
        debug!("alert monitor running");

        loop {
            match self.driver.read_alerts().await {
                Ok(alerts) => {
                    self.handle_alerts(alerts);
                }
                Err(err) => {
                    error!("failed to read alerts: {:?}", err);
                    Timer::after(ALERT_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Process one alert batch and return the resulting fault state.
    ///
    /// The batch is forwarded verbatim to the registered callback first.
    pub fn handle_alerts(&mut self, alerts: Alerts) -> FaultState {
        if let Some(callback) = self.state.alert_callback() {
            callback(AlertEvent::new(alerts));
        }

        let mut fault = self.state.fault_state();

        if alerts.contains(Alerts::ABOVE_ERR_WARN) {
            error!("one of the error counters exceeded the error warning limit");
            if fault == FaultState::Normal {
                fault = FaultState::ErrorWarning;
            }
        }
        if alerts.contains(Alerts::ERR_PASS) {
            error!("controller became error passive");
            if matches!(fault, FaultState::Normal | FaultState::ErrorWarning) {
                fault = FaultState::ErrorPassive;
            }
        }
        if alerts.contains(Alerts::ERR_ACTIVE) && fault == FaultState::ErrorPassive {
            info!("controller is error active again");
            fault = FaultState::ErrorWarning;
        }
        if alerts.contains(Alerts::BELOW_ERR_WARN)
            && matches!(fault, FaultState::ErrorWarning | FaultState::ErrorPassive)
        {
            info!("error counters back below the warning limit");
            fault = FaultState::Normal;
        }
        if alerts.contains(Alerts::RX_FIFO_OVERRUN) {
            error!("receive FIFO overrun, frames lost");
        }
        if alerts.contains(Alerts::BUS_OFF) {
            error!("bus-off condition occurred");
            fault = self.begin_recovery();
        }
        if alerts.contains(Alerts::BUS_RECOVERED) {
            fault = self.complete_recovery();
        }

        self.state.set_fault_state(fault);
        fault
    }

    /// Watch for recovery completion only, then ask the hardware to recover.
    fn begin_recovery(&mut self) -> FaultState {
        self.state.set_fault_state(FaultState::BusOff);

        if let Err(err) = self.driver.reconfigure_alerts(Alerts::BUS_RECOVERED) {
            error!("failed to reconfigure alerts for recovery: {:?}", err);
        }

        error!("initiate bus recovery");
        match self.driver.initiate_recovery() {
            Ok(()) => FaultState::Recovering,
            Err(err) => {
                error!("failed to initiate bus recovery: {:?}", err);
                FaultState::BusOff
            }
        }
    }

    /// Restart the controller and restore the full alert mask.
    ///
    /// The state returns to `Normal` even if the restart fails: the controller
    /// is then `Stopped`, which the next transmit attempt nudges back to running.
    fn complete_recovery(&mut self) -> FaultState {
        info!("controller completed bus recovery");

        match self.driver.start() {
            Ok(()) => info!("driver started"),
            Err(err) => error!("failed to start driver: {:?}", err),
        }

        if let Err(err) = self.driver.reconfigure_alerts(Alerts::ALERTS_TO_WATCH) {
            error!("failed to restore alert mask: {:?}", err);
        }
        FaultState::Normal
    }
}
