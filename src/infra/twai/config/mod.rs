//! Controller configuration records, validated once at construction time and
//! immutable afterwards.
//!
//! Bit timing on a TWAI/SJA1000-style controller:
//!
//! ```text
//! bit-rate     = clock / (brp × (1 + tseg1 + tseg2))
//! sample point = (1 + tseg1) / (1 + tseg1 + tseg2)
//! ```
//!
//! NMEA 2000 (SAE J1939-21) runs at 250 kbit/s with the sample point as close as
//! possible to 87.5 % without passing it.
use crate::error::ConfigError;
use crate::infra::twai::alerts::Alerts;
use crate::infra::twai::driver::Wait;
use crate::infra::twai::{
    DEFAULT_ISR_IN_IRAM, DEFAULT_MODE, DEFAULT_QUEUE_LEN, DEFAULT_RX_PIN, DEFAULT_RX_WAIT,
    DEFAULT_STATISTICS, DEFAULT_TX_PIN, INTR_LEVEL, SOURCE_CLOCK_HZ, SUPPORTED_BITRATES,
};

/// Highest accepted sample point, per mille.
pub const MAX_SAMPLE_POINT_PER_MILLE: u32 = 875;
/// Lowest accepted sample point, per mille.
pub const MIN_SAMPLE_POINT_PER_MILLE: u32 = 750;

//==================================================================================TIMING
/// Bit-timing parameters of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    /// Clock feeding the prescaler, in Hz.
    pub clock_hz: u32,
    /// Bit-rate prescaler.
    pub brp: u32,
    /// Time segment 1 (propagation + phase 1), in time quanta.
    pub tseg_1: u8,
    /// Time segment 2 (phase 2), in time quanta.
    pub tseg_2: u8,
    /// Synchronisation jump width, in time quanta.
    pub sjw: u8,
    /// Sample each bit three times.
    pub triple_sampling: bool,
}

impl TimingConfig {
    /// NMEA 2000 timing: 250 kbit/s, 85 % sample point, SJW 1, triple sampling.
    pub const fn nmea2000() -> Self {
        Self {
            clock_hz: SOURCE_CLOCK_HZ,
            brp: 16,
            tseg_1: 16,
            tseg_2: 3,
            sjw: 1,
            triple_sampling: true,
        }
    }

    /// Generic 250 kbit/s timing: 80 % sample point, SJW 3.
    pub const fn kbits_250() -> Self {
        Self {
            clock_hz: SOURCE_CLOCK_HZ,
            brp: 16,
            tseg_1: 15,
            tseg_2: 4,
            sjw: 3,
            triple_sampling: false,
        }
    }

    /// Number of time quanta per bit.
    pub fn quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.tseg_1) + u32::from(self.tseg_2)
    }

    /// Resulting bit-rate, rounded down; `0` when the divider is zero or overflows.
    pub fn bitrate(&self) -> u32 {
        match self.divider() {
            Some(divider) if divider != 0 => self.clock_hz / divider,
            _ => 0,
        }
    }

    fn divider(&self) -> Option<u32> {
        self.brp.checked_mul(self.quanta_per_bit())
    }

    /// Sample point position, per mille of the bit time.
    pub fn sample_point_per_mille(&self) -> u32 {
        1000 * (1 + u32::from(self.tseg_1)) / self.quanta_per_bit()
    }

    /// Check the parameters against the controller limits and the supported bit-rates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brp < 2 || self.brp > 128 || self.brp % 2 != 0 {
            return Err(ConfigError::InvalidPrescaler { brp: self.brp });
        }
        if !(1..=16).contains(&self.tseg_1) || !(1..=8).contains(&self.tseg_2) {
            return Err(ConfigError::InvalidSegments {
                tseg_1: self.tseg_1,
                tseg_2: self.tseg_2,
            });
        }
        if self.sjw == 0 || self.sjw > 4 || self.sjw > self.tseg_2 {
            return Err(ConfigError::InvalidSjw { sjw: self.sjw });
        }

        let bitrate = self.bitrate();
        let exact = self
            .divider()
            .is_some_and(|divider| divider != 0 && self.clock_hz % divider == 0);
        if !exact || !SUPPORTED_BITRATES.contains(&bitrate) {
            return Err(ConfigError::UnsupportedBitrate { bitrate });
        }

        let per_mille = self.sample_point_per_mille();
        if !(MIN_SAMPLE_POINT_PER_MILLE..=MAX_SAMPLE_POINT_PER_MILLE).contains(&per_mille) {
            return Err(ConfigError::SamplePoint { per_mille });
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::nmea2000()
    }
}

//==================================================================================INTERRUPTS
/// Interrupt allocation hint passed at install time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptConfig {
    /// Interrupt priority level.
    pub level: u8,
    /// Place the interrupt handler in fast (IRAM) memory.
    pub iram: bool,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            level: INTR_LEVEL,
            iram: DEFAULT_ISR_IN_IRAM,
        }
    }
}

//==================================================================================CONTROLLER_CONFIG
/// User-facing adapter configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    pub mode: Mode,
    pub tx_pin: u8,
    pub rx_pin: u8,
    /// How long `receive()` waits for a frame.
    pub rx_wait: Wait,
    pub tx_queue_len: u32,
    pub rx_queue_len: u32,
    pub timing: TimingConfig,
    pub interrupt: InterruptConfig,
    /// Maintain smoothed throughput counters.
    pub statistics: bool,
}

impl ControllerConfig {
    /// Builder pre-filled with the crate defaults.
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::new()
    }

    /// Check queue depths and bit timing. Run by the builder and again by `open()`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_queue_len == 0 || self.rx_queue_len == 0 {
            return Err(ConfigError::InvalidQueueLen);
        }
        self.timing.validate()
    }
}

/// Fluent builder validating the configuration on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl Default for ControllerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ControllerConfig {
                mode: DEFAULT_MODE,
                tx_pin: DEFAULT_TX_PIN,
                rx_pin: DEFAULT_RX_PIN,
                rx_wait: DEFAULT_RX_WAIT,
                tx_queue_len: DEFAULT_QUEUE_LEN,
                rx_queue_len: DEFAULT_QUEUE_LEN,
                timing: TimingConfig::nmea2000(),
                interrupt: InterruptConfig::default(),
                statistics: DEFAULT_STATISTICS,
            },
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn tx_pin(mut self, pin: u8) -> Self {
        self.config.tx_pin = pin;
        self
    }

    pub fn rx_pin(mut self, pin: u8) -> Self {
        self.config.rx_pin = pin;
        self
    }

    pub fn rx_wait(mut self, wait: Wait) -> Self {
        self.config.rx_wait = wait;
        self
    }

    pub fn queue_lens(mut self, tx: u32, rx: u32) -> Self {
        self.config.tx_queue_len = tx;
        self.config.rx_queue_len = rx;
        self
    }

    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.config.timing = timing;
        self
    }

    pub fn interrupt_level(mut self, level: u8) -> Self {
        self.config.interrupt.level = level;
        self
    }

    pub fn isr_in_iram(mut self, iram: bool) -> Self {
        self.config.interrupt.iram = iram;
        self
    }

    pub fn statistics(mut self, enabled: bool) -> Self {
        self.config.statistics = enabled;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<ControllerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==================================================================================INSTALL_RECORDS
/// Controller operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Transmit, receive and acknowledge.
    Normal,
    /// Transmit without requiring an acknowledgement (self-test).
    NoAck,
    /// Receive only; never acknowledges nor transmits.
    ListenOnly,
}

/// General install-time record handed to [`TwaiDriver::install`](crate::infra::twai::driver::TwaiDriver::install).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneralConfig {
    pub mode: Mode,
    pub tx_pin: u8,
    pub rx_pin: u8,
    pub tx_queue_len: u32,
    pub rx_queue_len: u32,
    pub alerts_enabled: Alerts,
    pub interrupt: InterruptConfig,
}

impl GeneralConfig {
    /// Install record watching the full alert mask.
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            mode: config.mode,
            tx_pin: config.tx_pin,
            rx_pin: config.rx_pin,
            tx_queue_len: config.tx_queue_len,
            rx_queue_len: config.rx_queue_len,
            alerts_enabled: Alerts::ALERTS_TO_WATCH,
            interrupt: config.interrupt,
        }
    }
}

/// Acceptance filter record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterConfig {
    pub acceptance_code: u32,
    pub acceptance_mask: u32,
    pub single_filter: bool,
}

impl FilterConfig {
    /// Accept every identifier; filtering belongs to the protocol layer.
    pub const fn accept_all() -> Self {
        Self {
            acceptance_code: 0,
            acceptance_mask: 0xFFFF_FFFF,
            single_filter: true,
        }
    }
}
