//! Protocol-facing side of the adapter: 29-bit identifier codec, boundary frame
//! type, and the transport contract the NMEA 2000 stack consumes.
pub mod transport;
