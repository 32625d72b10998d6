//! Base transport contract consumed by the NMEA 2000 message layer (fast-packet
//! assembly, address claiming, PGN dispatch). Any CAN backend implementing it can
//! sit under the stack.
use crate::protocol::transport::can_frame::CanFrame;
use core::future::Future;

/// Contract to open a CAN backend and exchange frames with it.
pub trait CanBus {
    type Error: core::fmt::Debug;

    /// Bring the backend up. Calling it again on an open backend is a no-op.
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Emit a frame on the bus, waiting for transmit queue space.
    fn send<'a>(
        &'a mut self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Retrieve the next available frame, or `None` when nothing arrived within
    /// the backend receive wait.
    fn recv<'a>(&'a mut self) -> impl Future<Output = Result<Option<CanFrame>, Self::Error>> + 'a;

    /// Hook invoked once by the message layer after `open()` succeeded, before the
    /// first frame is exchanged.
    fn init_frame_buffers(&mut self) {}
}
