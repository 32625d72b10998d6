//! Error definitions shared across library modules.
//! Each type models one failure scenario of the adapter: configuration,
//! installation, transmission, reception, or identifier construction.
use crate::infra::twai::driver::ControllerState;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures reported by the platform TWAI driver.
pub enum DriverError {
    /// The wait elapsed (empty RX queue, full TX queue, no alert).
    #[error("Operation timed out")]
    Timeout,
    /// The driver is not installed, not running, or in bus-off.
    #[error("Driver is not in a valid state")]
    InvalidState,
    /// An argument was rejected by the driver.
    #[error("Invalid argument")]
    InvalidArg,
    /// The requested operation is not supported by the controller.
    #[error("Operation not supported")]
    NotSupported,
    /// The driver could not allocate its queues.
    #[error("Out of memory")]
    NoMem,
    /// Any other driver failure.
    #[error("Driver failure")]
    Fail,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Rejected controller configuration.
pub enum ConfigError {
    /// Timing parameters do not produce a supported bus bit-rate.
    #[error("Unsupported bit-rate: {bitrate} bit/s")]
    UnsupportedBitrate { bitrate: u32 },
    /// Sample point lies outside the accepted window (per mille).
    #[error("Sample point out of range: {per_mille}/1000")]
    SamplePoint { per_mille: u32 },
    /// Prescaler must be even and within 2..=128.
    #[error("Invalid bit-rate prescaler: {brp}")]
    InvalidPrescaler { brp: u32 },
    /// Time segment 1 must be within 1..=16, time segment 2 within 1..=8.
    #[error("Invalid time segments: tseg1 = {tseg_1}, tseg2 = {tseg_2}")]
    InvalidSegments { tseg_1: u8, tseg_2: u8 },
    /// Synchronisation jump width must be within 1..=min(4, tseg2).
    #[error("Invalid synchronisation jump width: {sjw}")]
    InvalidSjw { sjw: u8 },
    /// Send and receive queues need at least one slot.
    #[error("Queue length must be greater than zero")]
    InvalidQueueLen,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors returned by [`TwaiAdapter::open`](crate::controller::TwaiAdapter::open).
pub enum OpenError {
    /// The configuration was rejected before touching the controller.
    #[error("Invalid configuration: {0}")]
    Config(ConfigError),
    /// Another adapter already owns the controller.
    #[error("CAN controller already in use")]
    ControllerInUse,
    /// Driver installation failed; nothing was retained.
    #[error("Driver install failed: {0}")]
    Install(DriverError),
    /// Driver start failed; the driver was uninstalled again.
    #[error("Driver start failed: {0}")]
    Start(DriverError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors returned when queuing a frame for transmission.
pub enum SendError {
    /// `open()` has not succeeded yet.
    #[error("Adapter is not open")]
    NotOpen,
    /// The controller was not running. A start or a bus recovery may have been
    /// requested; retry later.
    #[error("Controller not ready: {state:?}")]
    NotReady { state: ControllerState },
    /// Queue full (`Timeout`) or another driver failure.
    #[error("Transmit failed: {0}")]
    Driver(DriverError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised while pulling a frame from the receive queue.
///
/// A timeout is not an error: it is reported as `Ok(None)`.
pub enum ReceiveError {
    /// `open()` has not succeeded yet.
    #[error("Adapter is not open")]
    NotOpen,
    /// Hardware failure reported by the driver.
    #[error("Receive failed: {0}")]
    Driver(DriverError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur while building a 29-bit CAN identifier.
pub enum CanIdBuildError {
    /// PGN does not fit in the 17 usable bits.
    #[error("PGN out of range: {pgn}")]
    PgnOutOfRange { pgn: u32 },
    /// Attempt to build a broadcast message (PDU2) with PF < 240.
    #[error("Invalid for broadcast message: PF is too low")]
    InvalidForBroadcast,
    /// Attempt to send an addressed message (PDU1) with PF ≥ 240.
    #[error("Invalid for addressed message: PF is too high: {pf}")]
    InvalidForFocusedMessage { pf: u8 },
    /// In PDU1 the lower 8 bits of the PGN must remain zero.
    #[error("PDU1 PGNs require PS = 0")]
    PsFocusMessageMustBeNull,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Error type exposed through the [`CanBus`](crate::protocol::transport::traits::can_bus::CanBus) contract.
pub enum TwaiError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Receive(#[from] ReceiveError),
}
