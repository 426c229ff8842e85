//! Events for messages sent on the bus

use super::{dlc_to_len, FrameKind, TxEventWord1, Word0};
use core::ptr;
use embedded_can::Id;

/// Why an event was stored in the Tx event FIFO
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxEventType {
    /// Frame was transmitted
    Transmission,
    /// Frame was transmitted although a cancellation was requested
    Cancellation,
    /// Codes the hardware does not produce
    Reserved,
}

/// One entry read from the Tx event FIFO
#[derive(Copy, Clone, Debug)]
pub struct TxEvent {
    /// Identifier of the transmitted message
    pub id: Id,
    /// Data or remote frame
    pub kind: FrameKind,
    /// Error state indicator transmitted with the frame
    pub error_state_indicator: bool,
    /// Frame went out in CAN FD format
    pub fd_format: bool,
    /// Bit rate was switched for the data phase
    pub bit_rate_switching: bool,
    /// Data length of the transmitted frame in bytes
    pub data_length: u8,
    /// Capture of the timestamp counter at transmission
    pub timestamp: u16,
    /// Message marker copied from the Tx element
    pub marker: u8,
    /// Event type
    pub event_type: TxEventType,
}

impl TxEvent {
    /// Decodes the two event words stored at `slot`.
    ///
    /// # Safety
    /// `slot` must point at a readable 8-byte event element.
    pub(crate) unsafe fn decode(slot: *const u32) -> Self {
        let e0 = Word0(ptr::read_volatile(slot));
        let e1 = TxEventWord1(ptr::read_volatile(slot.add(1)));
        Self {
            id: e0.id(),
            kind: e0.kind(),
            error_state_indicator: e0.esi(),
            fd_format: e1.fdf(),
            bit_rate_switching: e1.brs(),
            data_length: dlc_to_len(e1.dlc(), e1.fdf()),
            timestamp: e1.txts(),
            marker: e1.mm(),
            event_type: match e1.et() {
                1 => TxEventType::Transmission,
                2 => TxEventType::Cancellation,
                _ => TxEventType::Reserved,
            },
        }
    }
}
