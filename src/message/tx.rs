//! Messages to be sent on the bus

use super::{len_to_dlc, FrameType, TxWord1, Word0};
use crate::Error;
use embedded_can::Id;

/// One outgoing message, ready to be placed into a Tx element slot
#[derive(Copy, Clone, Debug)]
pub struct TxElement<'a> {
    /// Message identifier
    pub id: Id,
    /// Payload for data frames, requested length for remote frames
    pub frame_type: FrameType<'a>,
    /// Error state indicator transmitted with the frame
    pub error_state_indicator: bool,
    /// Transmit in CAN FD format
    pub fd_format: bool,
    /// Switch bit rate for the data phase
    pub bit_rate_switching: bool,
    /// Message marker copied into the Tx event
    pub marker: u8,
    /// Store a Tx event once the frame went out
    pub store_tx_event: bool,
    /// Raise the transmission-completed interrupt for this slot
    pub interrupt_on_completion: bool,
}

impl TxElement<'_> {
    /// Data length transmitted in the DLC field
    pub fn data_length(&self) -> u8 {
        match self.frame_type {
            FrameType::Data(data) => data.len() as u8,
            FrameType::Remote { length } => length,
        }
    }

    /// Bytes to copy into the element data section
    pub(crate) fn payload(&self) -> &[u8] {
        match self.frame_type {
            FrameType::Data(data) => data,
            // Remote frames have no data phase.
            FrameType::Remote { .. } => &[],
        }
    }

    /// Encodes the two element header words.
    ///
    /// Fails with [`Error::ElementSizeInvalid`] when the data length has no
    /// DLC encoding; nothing is written anywhere in that case.
    pub(crate) fn header_words(&self) -> Result<[u32; 2], Error> {
        let dlc = len_to_dlc(self.data_length()).ok_or(Error::ElementSizeInvalid)?;

        let mut t0 = Word0(0);
        t0.set_id(self.id);
        t0.set_rtr(matches!(self.frame_type, FrameType::Remote { .. }));
        t0.set_esi(self.error_state_indicator);

        let mut t1 = TxWord1(0);
        t1.set_dlc(dlc);
        t1.set_brs(self.bit_rate_switching);
        t1.set_fdf(self.fd_format);
        t1.set_efc(self.store_tx_event);
        t1.set_mm(self.marker);

        Ok([t0.0, t1.0])
    }
}
