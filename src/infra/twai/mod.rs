//! TWAI (ISO 11898 CAN) controller boundary: alert bitmasks, controller
//! configuration, and the driver trait implemented by platform crates.
//!
//! ## Default configuration
//!
//! The constants below are the documented defaults picked up by
//! [`ControllerConfig::builder`](config::ControllerConfig::builder). Every one of
//! them can be overridden on the builder before the controller is opened.
use embassy_time::Duration;

use self::config::Mode;
use self::driver::Wait;

pub mod alerts;
pub mod config;
pub mod driver;

/// Default operating mode: transmit, receive and acknowledge.
pub const DEFAULT_MODE: Mode = Mode::Normal;

/// Default GPIO index driving the transceiver TX line.
pub const DEFAULT_TX_PIN: u8 = 16;

/// Default GPIO index reading the transceiver RX line.
pub const DEFAULT_RX_PIN: u8 = 4;

/// Default receive wait: never block, return immediately when the RX queue is empty.
pub const DEFAULT_RX_WAIT: Wait = Wait::NoWait;

/// Throughput statistics are disabled unless requested.
pub const DEFAULT_STATISTICS: bool = false;

/// Keep the TWAI interrupt handler out of IRAM unless requested.
pub const DEFAULT_ISR_IN_IRAM: bool = false;

/// Depth of both the transmit and the receive queues.
pub const DEFAULT_QUEUE_LEN: u32 = 32;

/// Interrupt priority level requested at install time.
pub const INTR_LEVEL: u8 = 3;

/// Priority at which firmware should run the alert monitor task.
///
/// High enough to service a bus-off before the bus recovery window closes
/// (128 × 11 recessive bits ≈ 5.6 ms at 250 kbit/s).
pub const ALERT_TASK_PRIORITY: u8 = 10;

/// Fixed framing overhead (bits) of an extended data frame, excluding payload.
pub const CAN_FRAME_HEADER_BITS: u32 = 52;

/// Pause before reading alerts again after the driver refused the read.
pub const ALERT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Period of the statistics smoothing tick.
pub const STATS_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Source clock feeding the bit-rate prescaler (APB clock).
pub const SOURCE_CLOCK_HZ: u32 = 80_000_000;

/// Bus bit-rates this protocol family runs at (NMEA 2000 / J1939-21).
pub const SUPPORTED_BITRATES: &[u32] = &[250_000];
