//! TWAI transceiver adapter: controller lifecycle, frame I/O, and the
//! background runners (alert monitor, statistics tick).
//!
//! [`TwaiService`] assembles the components and splits into:
//!
//! * a [`TwaiAdapter`] used by the protocol stack (implements [`CanBus`]);
//! * a [`FaultMonitor`] runner that firmware spawns on a high-priority task;
//! * an optional [`StatsTicker`] runner when statistics are enabled.
//!
//! Only one adapter may own the controller at a time. The claim is taken by the
//! first successful `open()` and never released: there is no close path.
use core::cell::Cell;
use core::fmt::Debug;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use futures_util::{future::select, future::Either, pin_mut};

use crate::error::{DriverError, OpenError, ReceiveError, SendError, TwaiError};
use crate::infra::twai::alerts::AlertCallback;
use crate::infra::twai::config::{ControllerConfig, FilterConfig, GeneralConfig};
use crate::infra::twai::driver::{ControllerState, TwaiDriver, Wait};
use crate::logging::{self, LogLevel};
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::traits::can_bus::CanBus;

pub mod monitor;
pub mod state;
pub mod stats;

use self::monitor::{FaultMonitor, FaultState};
use self::state::AdapterState;
use self::stats::{StatsTicker, Throughput, ThroughputStats};

//==================================================================================EXCLUSIVITY
/// Exclusivity claim on one physical controller.
pub struct ControllerSlot {
    in_use: Mutex<CriticalSectionRawMutex, Cell<bool>>,
}

impl Default for ControllerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerSlot {
    pub const fn new() -> Self {
        Self {
            in_use: Mutex::new(Cell::new(false)),
        }
    }

    /// Take the slot; `false` when it is already taken.
    fn try_claim(&self) -> bool {
        self.in_use.lock(|in_use| !in_use.replace(true))
    }

    /// Give the slot back after a failed open.
    fn release(&self) {
        self.in_use.lock(|in_use| in_use.set(false));
    }

    /// `true` once an adapter owns the controller.
    pub fn is_claimed(&self) -> bool {
        self.in_use.lock(|in_use| in_use.get())
    }
}

/// Process-wide slot used by [`TwaiService::new`]: the chip has one TWAI controller.
pub static CONTROLLER_SLOT: ControllerSlot = ControllerSlot::new();

//==================================================================================SERVICE
/// Service assembling the adapter components.
pub struct TwaiService<'d, D: TwaiDriver> {
    driver: &'d D,
    state: &'d AdapterState,
    slot: &'d ControllerSlot,
    config: ControllerConfig,
}

impl<'d, D: TwaiDriver> TwaiService<'d, D> {
    /// Service competing for the process-wide [`CONTROLLER_SLOT`].
    pub fn new(driver: &'d D, state: &'d AdapterState, config: ControllerConfig) -> Self {
        Self::with_slot(driver, state, config, &CONTROLLER_SLOT)
    }

    /// Service competing for an explicit slot (one per physical controller).
    pub fn with_slot(
        driver: &'d D,
        state: &'d AdapterState,
        config: ControllerConfig,
        slot: &'d ControllerSlot,
    ) -> Self {
        Self {
            driver,
            state,
            slot,
            config,
        }
    }

    /// Split into adapter/monitor/ticker components.
    pub fn into_parts(self) -> TwaiServiceParts<'d, D> {
        let ticker = self
            .config
            .statistics
            .then(|| StatsTicker::new(self.state.stats()));
        TwaiServiceParts {
            adapter: TwaiAdapter {
                driver: self.driver,
                state: self.state,
                slot: self.slot,
                config: self.config,
                is_open: false,
            },
            monitor: FaultMonitor::new(self.driver, self.state),
            ticker,
        }
    }
}

/// Bundle returned by [`TwaiService::into_parts`].
pub struct TwaiServiceParts<'d, D: TwaiDriver> {
    pub adapter: TwaiAdapter<'d, D>,
    pub monitor: FaultMonitor<'d, D>,
    pub ticker: Option<StatsTicker<'d>>,
}

impl<'d, D: TwaiDriver> TwaiServiceParts<'d, D> {
    /// Split off the adapter and merge both runners into one future, for
    /// firmware with a single spare task.
    pub fn into_runner(self) -> (TwaiAdapter<'d, D>, TwaiRunner<'d, D>) {
        (
            self.adapter,
            TwaiRunner {
                monitor: self.monitor,
                ticker: self.ticker,
            },
        )
    }
}

/// Alert monitor and statistics ticker driven by a single task.
pub struct TwaiRunner<'d, D: TwaiDriver> {
    monitor: FaultMonitor<'d, D>,
    ticker: Option<StatsTicker<'d>>,
}

impl<'d, D: TwaiDriver> TwaiRunner<'d, D> {
    pub async fn run(self) -> ! {
        match self.ticker {
            Some(ticker) => {
                let monitor = self.monitor.run();
                let ticker = ticker.run();
                pin_mut!(monitor);
                pin_mut!(ticker);
                match select(monitor, ticker).await {
                    Either::Left((never, _)) => never,
                    Either::Right((never, _)) => never,
                }
            }
            None => self.monitor.run().await,
        }
    }
}

//==================================================================================ADAPTER
/// Frame-level transceiver handed to the protocol stack.
pub struct TwaiAdapter<'d, D: TwaiDriver> {
    driver: &'d D,
    state: &'d AdapterState,
    slot: &'d ControllerSlot,
    config: ControllerConfig,
    is_open: bool,
}

impl<'d, D: TwaiDriver> TwaiAdapter<'d, D> {
    /// Install and start the controller, then release the alert monitor.
    ///
    /// Idempotent: an open adapter returns `Ok(())` without touching the hardware.
    /// Fails without touching the hardware when the configuration is invalid or
    /// another adapter owns the slot.
    /// A failed install or start leaves nothing behind: the slot is released, the
    /// adapter stays closed, and no retry is attempted.
    pub fn open(&mut self) -> Result<(), OpenError> {
        if self.is_open {
            return Ok(());
        }
        if let Err(err) = self.config.validate() {
            error!("invalid controller configuration: {:?}", err);
            return Err(OpenError::Config(err));
        }
        if !self.slot.try_claim() {
            warn!("controller already owned by another adapter");
            return Err(OpenError::ControllerInUse);
        }

        let general = GeneralConfig::from_config(&self.config);
        let filter = FilterConfig::accept_all();

        if let Err(err) = self.driver.install(&general, &self.config.timing, &filter) {
            error!("driver install failed: {:?}", err);
            self.slot.release();
            return Err(OpenError::Install(err));
        }

        if let Err(err) = self.driver.start() {
            error!("driver start failed: {:?}", err);
            if let Err(err) = self.driver.uninstall() {
                error!("driver uninstall failed: {:?}", err);
            }
            self.slot.release();
            return Err(OpenError::Start(err));
        }

        self.is_open = true;
        self.state.signal_started();
        info!(
            "controller started: tx pin {}, rx pin {}, {} bit/s",
            self.config.tx_pin,
            self.config.rx_pin,
            self.config.timing.bitrate()
        );
        Ok(())
    }

    /// `true` once `open()` succeeded.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Configuration the controller was (or will be) installed with.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Queue a frame for transmission.
    ///
    /// `wait = true` suspends until queue space frees up; `false` fails at once
    /// with `Driver(Timeout)` when the queue is full. Payloads longer than eight
    /// bytes are truncated and flagged non-compliant (see [`CanFrame::new`]).
    pub async fn send(&self, id: CanId, payload: &[u8], wait: bool) -> Result<(), SendError> {
        let frame = CanFrame::new(id, payload);
        self.send_frame(&frame, wait).await
    }

    /// Queue an already built frame for transmission.
    ///
    /// When the controller is not running, a stopped controller is restarted and a
    /// bus-off controller is asked to recover; the call still fails with
    /// [`SendError::NotReady`] and the caller retries later.
    pub async fn send_frame(&self, frame: &CanFrame, wait: bool) -> Result<(), SendError> {
        if !self.is_open {
            return Err(SendError::NotOpen);
        }
        if frame.oversized {
            warn!(
                "frame {:#x} longer than 8 bytes, payload truncated",
                frame.id.0
            );
        }
        if logging::enabled(LogLevel::Info) {
            let fields = frame.id.decompose();
            info!(
                "send frame len = {}, prio = {}, pgn = {}, src = {}, dst = {}",
                frame.len,
                fields.priority,
                fields.pgn,
                fields.source,
                fields.destination
            );
        }

        let message = frame.to_message();
        let wait = if wait { Wait::Forever } else { Wait::NoWait };

        match self.driver.transmit(&message, wait).await {
            Ok(()) => {
                if self.config.statistics {
                    self.state.stats().record_tx(message.payload_len());
                }
                Ok(())
            }
            Err(DriverError::InvalidState) => {
                let state = self.nudge_controller();
                error!("controller not ready for transmission: {:?}", state);
                Err(SendError::NotReady { state })
            }
            Err(err) => {
                error!("failed to queue frame for transmission: {:?}", err);
                Err(SendError::Driver(err))
            }
        }
    }

    /// Restart a stopped controller or start recovery of a bus-off one, without
    /// waiting for the outcome. Returns the state observed before the nudge.
    fn nudge_controller(&self) -> ControllerState {
        let state = self.driver.status().state;
        match state {
            ControllerState::Stopped => {
                warn!("controller stopped, restarting");
                if let Err(err) = self.driver.start() {
                    error!("failed to restart controller: {:?}", err);
                }
            }
            ControllerState::BusOff => {
                warn!("controller in bus-off, initiating recovery");
                if let Err(err) = self.driver.initiate_recovery() {
                    error!("failed to initiate recovery: {:?}", err);
                }
            }
            ControllerState::Running | ControllerState::Recovering => {}
        }
        state
    }

    /// Next extended frame, or `None`.
    ///
    /// Waits at most the configured receive wait. Timeouts, standard frames and
    /// driver failures all yield `None`; failures are logged. Use
    /// [`try_receive`](Self::try_receive) to tell them apart.
    pub async fn receive(&self) -> Option<CanFrame> {
        match self.try_receive().await {
            Ok(frame) => frame,
            Err(err) => {
                error!("receive failed: {:?}", err);
                None
            }
        }
    }

    /// Next extended frame; `Ok(None)` on timeout or when a standard frame was dropped.
    pub async fn try_receive(&self) -> Result<Option<CanFrame>, ReceiveError> {
        if !self.is_open {
            return Err(ReceiveError::NotOpen);
        }

        let message = match self.driver.receive(self.config.rx_wait).await {
            Ok(message) => message,
            Err(DriverError::Timeout) => return Ok(None),
            Err(err) => return Err(ReceiveError::Driver(err)),
        };

        let Some(frame) = CanFrame::from_message(&message) else {
            trace!("dropping standard frame {:#x}", message.identifier);
            return Ok(None);
        };

        if logging::enabled(LogLevel::Info) {
            let fields = frame.id.decompose();
            info!(
                "received frame len = {}, prio = {}, pgn = {}, src = {}, dst = {}",
                frame.len,
                fields.priority,
                fields.pgn,
                fields.source,
                fields.destination
            );
        }

        if self.config.statistics {
            self.state.stats().record_rx(frame.len);
        }
        Ok(Some(frame))
    }

    /// Register (or clear) the callback receiving every raw alert batch.
    pub fn set_alert_callback(&self, callback: Option<AlertCallback>) {
        self.state.set_alert_callback(callback);
    }

    /// Fault state last published by the alert monitor.
    pub fn fault_state(&self) -> FaultState {
        self.state.fault_state()
    }

    /// Current controller state, read without side effects.
    pub fn controller_state(&self) -> ControllerState {
        self.driver.status().state
    }

    /// Smoothed throughput, when statistics are enabled.
    pub fn throughput(&self) -> Option<Throughput> {
        self.config
            .statistics
            .then(|| self.state.stats().throughput())
    }

    /// Raw statistics handle, when statistics are enabled.
    pub fn stats(&self) -> Option<&'d ThroughputStats> {
        let state: &'d AdapterState = self.state;
        self.config.statistics.then(|| state.stats())
    }
}

impl<'d, D: TwaiDriver> CanBus for TwaiAdapter<'d, D> {
    type Error = TwaiError;

    fn open(&mut self) -> Result<(), Self::Error> {
        TwaiAdapter::open(self).map_err(TwaiError::from)
    }

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.send_frame(frame, true).await.map_err(TwaiError::from)
    }

    async fn recv(&mut self) -> Result<Option<CanFrame>, Self::Error> {
        if !self.is_open {
            return Err(ReceiveError::NotOpen.into());
        }
        Ok(self.receive().await)
    }

    fn init_frame_buffers(&mut self) {
        debug!("frame buffers initialised");
    }
}

impl<'d, D: TwaiDriver> Debug for TwaiAdapter<'d, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TwaiAdapter")
            .field("config", &self.config)
            .field("is_open", &self.is_open)
            .field("fault_state", &self.fault_state())
            .finish()
    }
}
