/// Test double simulating the platform TWAI driver during integration tests.
use korri_twai::error::DriverError;
use korri_twai::infra::twai::alerts::Alerts;
use korri_twai::infra::twai::config::{FilterConfig, GeneralConfig, TimingConfig};
use korri_twai::infra::twai::driver::{ControllerState, StatusInfo, TwaiDriver, TwaiMessage, Wait};
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};

#[allow(dead_code)]
/// Observable driver state, inspected by the assertions.
pub struct MockState {
    pub installed: bool,
    pub state: ControllerState,
    pub install_calls: u32,
    pub uninstall_calls: u32,
    pub start_calls: u32,
    pub recovery_calls: u32,
    pub alert_masks: Vec<Alerts>,
    pub sent: Vec<TwaiMessage>,
    pub tx_waits: Vec<Wait>,
    pub tx_capacity: usize,
    pub install_result: Result<(), DriverError>,
    pub start_result: Result<(), DriverError>,
    pub receive_error: Option<DriverError>,
    pub alert_error: Option<DriverError>,
    pub alert_reads: u32,
    pub general: Option<GeneralConfig>,
    pub timing: Option<TimingConfig>,
    pub filter: Option<FilterConfig>,
}

#[allow(dead_code)]
/// In-memory TWAI driver reproducing the vendor driver state rules.
pub struct MockTwai {
    inner: StdMutex<MockState>,
    rx_tx: mpsc::UnboundedSender<TwaiMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<TwaiMessage>>,
    alerts_tx: mpsc::UnboundedSender<Alerts>,
    alerts_rx: Mutex<mpsc::UnboundedReceiver<Alerts>>,
}

#[allow(dead_code)]
impl MockTwai {
    pub fn new() -> Self {
        let (rx_tx, rx) = mpsc::unbounded_channel();
        let (alerts_tx, alerts_rx) = mpsc::unbounded_channel();
        Self {
            inner: StdMutex::new(MockState {
                installed: false,
                state: ControllerState::Stopped,
                install_calls: 0,
                uninstall_calls: 0,
                start_calls: 0,
                recovery_calls: 0,
                alert_masks: Vec::new(),
                sent: Vec::new(),
                tx_waits: Vec::new(),
                tx_capacity: 32,
                install_result: Ok(()),
                start_result: Ok(()),
                receive_error: None,
                alert_error: None,
                alert_reads: 0,
                general: None,
                timing: None,
                filter: None,
            }),
            rx_tx,
            rx: Mutex::new(rx),
            alerts_tx,
            alerts_rx: Mutex::new(alerts_rx),
        }
    }

    /// Read or tweak the driver state.
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        f(&mut inner)
    }

    /// Make a frame available to `receive()`.
    pub fn inject(&self, message: TwaiMessage) {
        self.rx_tx.send(message).expect("receive queue closed");
    }

    /// Raise an alert batch for `read_alerts()`.
    pub fn raise(&self, alerts: Alerts) {
        self.alerts_tx.send(alerts).expect("alert queue closed");
    }

    pub fn set_state(&self, state: ControllerState) {
        self.with(|inner| inner.state = state);
    }

    pub fn state(&self) -> ControllerState {
        self.with(|inner| inner.state)
    }

    pub fn sent(&self) -> Vec<TwaiMessage> {
        self.with(|inner| inner.sent.clone())
    }
}

impl TwaiDriver for MockTwai {
    fn install(
        &self,
        general: &GeneralConfig,
        timing: &TimingConfig,
        filter: &FilterConfig,
    ) -> Result<(), DriverError> {
        self.with(|inner| {
            inner.install_calls += 1;
            if inner.installed {
                return Err(DriverError::InvalidState);
            }
            inner.install_result?;
            inner.installed = true;
            inner.state = ControllerState::Stopped;
            inner.general = Some(*general);
            inner.timing = Some(*timing);
            inner.filter = Some(*filter);
            Ok(())
        })
    }

    fn uninstall(&self) -> Result<(), DriverError> {
        self.with(|inner| {
            inner.uninstall_calls += 1;
            if !inner.installed {
                return Err(DriverError::InvalidState);
            }
            inner.installed = false;
            Ok(())
        })
    }

    fn start(&self) -> Result<(), DriverError> {
        self.with(|inner| {
            inner.start_calls += 1;
            inner.start_result?;
            if !inner.installed || inner.state != ControllerState::Stopped {
                return Err(DriverError::InvalidState);
            }
            inner.state = ControllerState::Running;
            Ok(())
        })
    }

    fn stop(&self) -> Result<(), DriverError> {
        self.with(|inner| {
            if inner.state != ControllerState::Running {
                return Err(DriverError::InvalidState);
            }
            inner.state = ControllerState::Stopped;
            Ok(())
        })
    }

    async fn transmit<'a>(
        &'a self,
        message: &'a TwaiMessage,
        wait: Wait,
    ) -> Result<(), DriverError> {
        self.with(|inner| {
            inner.tx_waits.push(wait);
            if inner.state != ControllerState::Running {
                return Err(DriverError::InvalidState);
            }
            if inner.sent.len() >= inner.tx_capacity {
                return Err(DriverError::Timeout);
            }
            inner.sent.push(*message);
            Ok(())
        })
    }

    async fn receive(&self, wait: Wait) -> Result<TwaiMessage, DriverError> {
        if let Some(err) = self.with(|inner| inner.receive_error.take()) {
            return Err(err);
        }
        let mut rx = self.rx.lock().await;
        match wait {
            Wait::NoWait => rx.try_recv().map_err(|_| DriverError::Timeout),
            Wait::For(duration) => timeout(Duration::from_micros(duration.as_micros()), rx.recv())
                .await
                .map_err(|_| DriverError::Timeout)?
                .ok_or(DriverError::Fail),
            Wait::Forever => rx.recv().await.ok_or(DriverError::Fail),
        }
    }

    fn status(&self) -> StatusInfo {
        self.with(|inner| StatusInfo {
            msgs_to_tx: inner.sent.len() as u32,
            ..StatusInfo::with_state(inner.state)
        })
    }

    async fn read_alerts(&self) -> Result<Alerts, DriverError> {
        let refused = self.with(|inner| {
            inner.alert_reads += 1;
            inner.alert_error
        });
        if let Some(err) = refused {
            return Err(err);
        }
        let mut alerts = self.alerts_rx.lock().await;
        alerts.recv().await.ok_or(DriverError::Fail)
    }

    fn reconfigure_alerts(&self, enabled: Alerts) -> Result<(), DriverError> {
        self.with(|inner| inner.alert_masks.push(enabled));
        Ok(())
    }

    fn initiate_recovery(&self) -> Result<(), DriverError> {
        self.with(|inner| {
            inner.recovery_calls += 1;
            if inner.state != ControllerState::BusOff {
                return Err(DriverError::InvalidState);
            }
            inner.state = ControllerState::Recovering;
            Ok(())
        })
    }
}

#[allow(dead_code)]
/// Extended-format controller message.
pub fn extended_message(identifier: u32, payload: &[u8]) -> TwaiMessage {
    let mut data = [0u8; 8];
    data[..payload.len()].copy_from_slice(payload);
    TwaiMessage {
        identifier,
        extended: true,
        single_shot: false,
        dlc_non_compliant: false,
        data_length_code: payload.len() as u8,
        data,
    }
}
