//! In-memory representation of an SAE J1939 / NMEA 2000 CAN frame, as handed
//! across the adapter boundary. Only extended (29-bit) data frames exist here.
use embedded_can::{ExtendedId, Id};

use crate::infra::twai::driver::TwaiMessage;
use crate::protocol::transport::can_id::CanId;

/// Largest payload a classic CAN frame carries.
pub const MAX_FRAME_PAYLOAD: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Raw NMEA 2000 frame as read from the CAN bus.
pub struct CanFrame {
    /// Full 29-bit CAN identifier stored inside a `u32`.
    pub id: CanId,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
    /// The payload handed to [`CanFrame::new`] was longer than eight bytes and
    /// has been truncated. Such a frame breaks ISO 11898-1 compliance.
    pub oversized: bool,
}

impl CanFrame {
    /// Build a frame from a payload of any length.
    ///
    /// Bytes past the eighth are dropped and the frame is marked `oversized`:
    /// a misbehaving caller loses data silently instead of crashing the adapter.
    pub fn new(id: CanId, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_FRAME_PAYLOAD);
        let mut data = [0u8; 8];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id: CanId::new(id.0),
            data,
            len,
            oversized: payload.len() > MAX_FRAME_PAYLOAD,
        }
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(MAX_FRAME_PAYLOAD)]
    }

    /// Controller message for this frame (extended format, retransmit on error).
    pub fn to_message(&self) -> TwaiMessage {
        let len = self.len.min(MAX_FRAME_PAYLOAD);
        TwaiMessage {
            identifier: self.id.0 & crate::protocol::transport::can_id::CAN_ID_MASK,
            extended: true,
            single_shot: false,
            dlc_non_compliant: self.oversized,
            data_length_code: len as u8,
            data: self.data,
        }
    }

    /// Boundary frame for a received controller message.
    ///
    /// Returns `None` for standard (11-bit) frames, which the protocol layer
    /// cannot address.
    pub fn from_message(message: &TwaiMessage) -> Option<Self> {
        if !message.extended {
            return None;
        }
        let len = message.payload_len();
        let mut data = [0u8; 8];
        data[..len].copy_from_slice(message.payload());
        Some(Self {
            id: CanId::new(message.identifier),
            data,
            len,
            oversized: message.dlc_non_compliant || usize::from(message.data_length_code) > len,
        })
    }
}

impl embedded_can::Frame for CanFrame {
    /// Only extended identifiers and payloads up to eight bytes are accepted.
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Extended(ext) if data.len() <= MAX_FRAME_PAYLOAD => {
                Some(CanFrame::new(CanId(ext.as_raw()), data))
            }
            _ => None,
        }
    }

    /// Remote frames are not used by NMEA 2000.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        true
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        let raw = self.id.0 & ExtendedId::MAX.as_raw();
        Id::Extended(ExtendedId::new(raw).unwrap_or(ExtendedId::ZERO))
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
