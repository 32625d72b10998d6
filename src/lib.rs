//! `korri-twai` library: TWAI/CAN transceiver adapter for NMEA 2000 and
//! SAE J1939 stacks in a `no_std` environment. The crate owns the controller
//! lifecycle, exposes the frame-level transmit/receive contract, and runs the
//! alert monitor that brings the controller back from bus-off.
#![no_std]
//==================================================================================
/// Runtime log level and the level-gated `defmt` macros used across the crate.
#[macro_use]
pub mod logging;
/// Adapter lifecycle, frame I/O, alert monitor, and throughput statistics.
pub mod controller;
/// Configuration, driver, and frame-I/O errors.
pub mod error;
/// TWAI controller boundary: configuration, alerts, and the driver trait.
pub mod infra;
/// 29-bit identifier codec, boundary frame type, and the transport contract.
pub mod protocol;
//==================================================================================
