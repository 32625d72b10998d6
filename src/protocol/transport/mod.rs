//! NMEA 2000 transport layer: CAN frame representation, 29-bit identifier
//! management, and the bus abstraction trait.

pub mod can_frame;
pub mod can_id;
pub mod traits;
