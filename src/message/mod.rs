//! Element encoding shared by the Tx and Rx paths
//!
//! Tx, Rx and Tx event elements all start with two header words whose ID and
//! control fields follow the same layout. The word views and the data length
//! code mapping live here; the per-direction element types are in the
//! submodules.

pub mod rx;
pub mod tx;
pub mod tx_event;

use bitfield::bitfield;
use embedded_can::{ExtendedId, Id, StandardId};

/// Whether a frame carries data or requests a remote transmission
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    /// Data frame
    Data,
    /// Remote frame
    Remote,
}

/// Frame kind together with the outgoing payload
#[derive(Copy, Clone, Debug)]
pub enum FrameType<'a> {
    /// Data frame carrying `0..=64` bytes
    Data(&'a [u8]),
    /// Remote frame requesting `length` bytes
    Remote {
        /// Requested data length, transmitted in the DLC field
        length: u8,
    },
}

bitfield! {
    /// First header word of a Tx/Rx element (T0/R0)
    pub struct Word0(u32);
    /// Full 29-bit identifier field
    pub u32, id_field, set_id_field: 28, 0;
    /// Standard identifier, left-aligned in the field
    pub u16, standard_id, set_standard_id: 28, 18;
    /// Remote transmission request
    pub rtr, set_rtr: 29;
    /// Extended identifier flag
    pub xtd, set_xtd: 30;
    /// Error state indicator
    pub esi, set_esi: 31;
}

bitfield! {
    /// Second header word of a Tx element (T1)
    pub struct TxWord1(u32);
    /// Data length code
    pub u8, dlc, set_dlc: 19, 16;
    /// Bit rate switching
    pub brs, set_brs: 20;
    /// CAN FD format
    pub fdf, set_fdf: 21;
    /// Event FIFO control (store Tx event)
    pub efc, set_efc: 23;
    /// Message marker
    pub u8, mm, set_mm: 31, 24;
}

bitfield! {
    /// Second header word of an Rx element (R1)
    pub struct RxWord1(u32);
    /// Rx timestamp
    pub u16, rxts, _: 15, 0;
    /// Data length code
    pub u8, dlc, _: 19, 16;
    /// Bit rate switching
    pub brs, _: 20;
    /// CAN FD format
    pub fdf, _: 21;
    /// Filter index
    pub u8, fidx, _: 30, 24;
    /// Accepted non-matching frame
    pub anmf, _: 31;
}

bitfield! {
    /// Second word of a Tx event FIFO element (E1)
    pub struct TxEventWord1(u32);
    /// Tx timestamp
    pub u16, txts, _: 15, 0;
    /// Data length code
    pub u8, dlc, _: 19, 16;
    /// Bit rate switching
    pub brs, _: 20;
    /// CAN FD format
    pub fdf, _: 21;
    /// Event type
    pub u8, et, _: 23, 22;
    /// Message marker
    pub u8, mm, _: 31, 24;
}

impl Word0 {
    pub(crate) fn id(&self) -> Id {
        if self.xtd() {
            // Masked to the field width; cannot exceed the valid range.
            unsafe { ExtendedId::new_unchecked(self.id_field() & ExtendedId::MAX.as_raw()) }.into()
        } else {
            unsafe { StandardId::new_unchecked(self.standard_id() & StandardId::MAX.as_raw()) }
                .into()
        }
    }

    pub(crate) fn set_id(&mut self, id: Id) {
        match id {
            Id::Standard(id) => self.set_standard_id(id.as_raw()),
            Id::Extended(id) => {
                self.set_id_field(id.as_raw());
                self.set_xtd(true);
            }
        }
    }

    pub(crate) fn kind(&self) -> FrameKind {
        if self.rtr() {
            FrameKind::Remote
        } else {
            FrameKind::Data
        }
    }
}

/// Maps a data length in bytes to its DLC encoding.
///
/// Only the lengths the protocol can express are accepted; in-between values
/// (such as 9 or 50) have no encoding and yield `None`.
pub(crate) fn len_to_dlc(len: u8) -> Option<u8> {
    Some(match len {
        0..=8 => len,
        12 => 9,
        16 => 10,
        20 => 11,
        24 => 12,
        32 => 13,
        48 => 14,
        64 => 15,
        _ => return None,
    })
}

/// Decodes a DLC to a length in bytes.
///
/// In classic format every DLC above 8 means 8 bytes; in FD format the
/// extended codes select the longer lengths.
pub(crate) fn dlc_to_len(dlc: u8, fd_format: bool) -> u8 {
    match dlc & 0xF {
        dlc @ 0..=8 => dlc,
        _ if !fd_format => 8,
        9 => 12,
        10 => 16,
        11 => 20,
        12 => 24,
        13 => 32,
        14 => 48,
        _ => 64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlc_encoding_is_exact() {
        assert_eq!(len_to_dlc(0), Some(0));
        assert_eq!(len_to_dlc(8), Some(8));
        assert_eq!(len_to_dlc(12), Some(9));
        assert_eq!(len_to_dlc(64), Some(15));
        for len in [9, 10, 11, 15, 50, 63, 65, 255] {
            assert_eq!(len_to_dlc(len), None);
        }
    }

    #[test]
    fn dlc_decoding_depends_on_format() {
        for dlc in 0..=8 {
            assert_eq!(dlc_to_len(dlc, false), dlc);
            assert_eq!(dlc_to_len(dlc, true), dlc);
        }
        for dlc in 9..=15 {
            assert_eq!(dlc_to_len(dlc, false), 8);
        }
        assert_eq!(dlc_to_len(9, true), 12);
        assert_eq!(dlc_to_len(13, true), 32);
        assert_eq!(dlc_to_len(15, true), 64);
    }

    #[test]
    fn id_field_round_trips() {
        let mut word = Word0(0);
        word.set_id(StandardId::new(0x587).unwrap().into());
        assert_eq!(word.0, 0x587 << 18);
        assert_eq!(word.id(), Id::Standard(StandardId::new(0x587).unwrap()));

        let mut word = Word0(0);
        word.set_id(ExtendedId::new(0x1234_5678).unwrap().into());
        assert!(word.xtd());
        assert_eq!(
            word.id(),
            Id::Extended(ExtendedId::new(0x1234_5678).unwrap())
        );
    }
}
