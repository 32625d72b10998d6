//! Creation and decomposition of the 29-bit CAN identifiers used by
//! NMEA 2000 (derived from the SAE J1939 specification).
//!
//! ```text
//!  28  26 25  24  23        16 15         8 7          0
//! ┌──────┬───┬───┬────────────┬────────────┬────────────┐
//! │ prio │ R │DP │ PDU format │PDU specific│   source   │
//! └──────┴───┴───┴────────────┴────────────┴────────────┘
//! ```
//!
//! PF < 240 is PDU1: PS carries the destination address. PF ≥ 240 is PDU2: the
//! message is broadcast and PS extends the PGN.
use crate::error::CanIdBuildError;

/// First PDU-format value of the PDU2 (broadcast) range.
pub const PDU2_THRESHOLD: u8 = 240;

/// Global (broadcast) destination address.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Mask of the 29 meaningful identifier bits.
pub const CAN_ID_MASK: u32 = 0x1FFF_FFFF;

/// Highest PGN expressible with the data-page, PF and PS bits.
pub const MAX_PGN: u32 = 0x1_FFFF;

//==================================================================================ADDRESS_FIELDS
/// Protocol addressing fields derived from an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressFields {
    /// Message priority, 0 (highest) to 7.
    pub priority: u8,
    /// Parameter Group Number (17 usable bits).
    pub pgn: u32,
    /// Sender address.
    pub source: u8,
    /// Destination address, [`BROADCAST_ADDRESS`] for PDU2 messages.
    pub destination: u8,
}

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates an extended CAN identifier (29 bits) and exposes accessors
/// for priority, PGN, destination, and source.
pub struct CanId(pub u32);

impl CanId {
    /// Wrap a raw identifier, dropping anything above bit 28.
    pub const fn new(raw: u32) -> Self {
        Self(raw & CAN_ID_MASK)
    }

    /// Creates a pre-configured `CanIdBuilder` for a PGN and source address.
    pub fn builder(pgn: u32, source_address: u8) -> CanIdBuilder {
        CanIdBuilder::new(pgn, source_address)
    }

    /// Rebuild the identifier that [`decompose`](Self::decompose) maps to `fields`.
    ///
    /// For PDU2 PGNs the destination is implied and ignored.
    pub fn from_fields(fields: &AddressFields) -> Result<Self, CanIdBuildError> {
        let builder = CanIdBuilder::new(fields.pgn, fields.source).with_priority(fields.priority);
        let pf = ((fields.pgn >> 8) & 0xFF) as u8;
        if pf < PDU2_THRESHOLD {
            builder.to_destination(fields.destination).build()
        } else {
            builder.build()
        }
    }

    /// Returns the priority (3 bits, value 0-7) encoded in the CAN ID.
    pub fn priority(&self) -> u8 {
        ((self.0 >> 26) & 0x07) as u8
    }

    /// Data-page bit (bit 24).
    pub fn data_page(&self) -> u8 {
        ((self.0 >> 24) & 0x01) as u8
    }

    /// PDU-format byte (bits 16-23).
    pub fn pdu_format(&self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    /// PDU-specific byte (bits 8-15).
    pub fn pdu_specific(&self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    /// `true` for broadcast (PDU2) identifiers.
    pub fn is_pdu2(&self) -> bool {
        self.pdu_format() >= PDU2_THRESHOLD
    }

    /// Extracts the PGN, handling the PDU1/PDU2 distinction.
    pub fn pgn(&self) -> u32 {
        let dp = u32::from(self.data_page());
        let pf = u32::from(self.pdu_format());

        if self.is_pdu2() {
            // PDU2: implicit destination, PS becomes part of the PGN.
            (dp << 16) | (pf << 8) | u32::from(self.pdu_specific())
        } else {
            // PDU1: PS stores the explicit destination.
            (dp << 16) | (pf << 8)
        }
    }

    /// Returns the destination address (PDU1) when the PGN requires one.
    pub fn destination(&self) -> Option<u8> {
        if self.is_pdu2() {
            None
        } else {
            Some(self.pdu_specific())
        }
    }

    /// Eight-bit source address (logical node identifier on the N2K network).
    pub fn source_address(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Split the identifier into its addressing fields. Pure and deterministic.
    pub fn decompose(&self) -> AddressFields {
        AddressFields {
            priority: self.priority(),
            pgn: self.pgn(),
            source: self.source_address(),
            destination: self.destination().unwrap_or(BROADCAST_ADDRESS),
        }
    }
}

impl From<CanId> for AddressFields {
    fn from(id: CanId) -> Self {
        id.decompose()
    }
}

//==================================================================================CAN_ID_BUILDER
#[derive(Debug)]
/// Fluent builder that enforces the PDU1/PDU2 rules.
pub struct CanIdBuilder {
    pub priority: u8,
    pub pgn: u32,
    pub source_address: u8,
    pub destination: Option<u8>,
}

impl CanIdBuilder {
    /// Initializes the builder for a given PGN and source address.
    pub fn new(pgn: u32, source_address: u8) -> Self {
        Self {
            priority: 6, // Default priority
            pgn,
            source_address,
            destination: None,
        }
    }

    /// Sets the priority (3 bits) to use during construction.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority & 0x07;
        self
    }

    /// Assigns a destination address (PDU1). Implies a directed message.
    pub fn to_destination(mut self, destination_address: u8) -> Self {
        self.destination = Some(destination_address);
        self
    }

    /// Builds the CAN identifier while applying J1939 rules:
    /// - PF < 240 → addressed message (PDU1): `destination` mandatory and PGN PS byte must be `0`
    /// - PF ≥ 240 → broadcast (PDU2): `destination` must not be provided
    /// - DP/PF/PS bits are copied from the provided PGN
    pub fn build(self) -> Result<CanId, CanIdBuildError> {
        if self.pgn > MAX_PGN {
            return Err(CanIdBuildError::PgnOutOfRange { pgn: self.pgn });
        }
        let dp = (self.pgn >> 16) & 0x01;
        let pf = ((self.pgn >> 8) & 0xFF) as u8;
        let ps = (self.pgn & 0xFF) as u8;

        let pdu_specific = match self.destination {
            None => {
                if pf < PDU2_THRESHOLD {
                    return Err(CanIdBuildError::InvalidForBroadcast);
                }
                ps
            }
            Some(da) => {
                if pf >= PDU2_THRESHOLD {
                    return Err(CanIdBuildError::InvalidForFocusedMessage { pf });
                }
                if ps != 0 {
                    return Err(CanIdBuildError::PsFocusMessageMustBeNull);
                }
                da
            }
        };

        Ok(CanId(
            (u32::from(self.priority & 0x07) << 26)
                | (dp << 24)
                | (u32::from(pf) << 16)
                | (u32::from(pdu_specific) << 8)
                | u32::from(self.source_address),
        ))
    }
}
