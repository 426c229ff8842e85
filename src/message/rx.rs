//! Messages received from the bus

use super::{dlc_to_len, FrameKind, RxWord1, Word0};
use core::ptr;
use embedded_can::Id;

/// One received message, decoded out of an Rx element slot
#[derive(Copy, Clone, Debug)]
pub struct RxElement {
    /// Message identifier
    pub id: Id,
    /// Data or remote frame
    pub kind: FrameKind,
    /// Error state indicator received with the frame
    pub error_state_indicator: bool,
    /// Frame was received in CAN FD format
    pub fd_format: bool,
    /// Bit rate was switched for the data phase
    pub bit_rate_switching: bool,
    /// Capture of the timestamp counter at reception
    pub timestamp: u16,
    /// Index of the matching filter, `None` for accepted non-matching frames
    pub filter_index: Option<u8>,
    data: [u8; 64],
    len: u8,
}

impl RxElement {
    /// Received payload
    pub fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }

    /// Received data length in bytes
    pub fn data_length(&self) -> u8 {
        self.len
    }

    /// Decodes the element stored at `slot`.
    ///
    /// # Safety
    /// `slot` must point at a readable element of at least
    /// `8 + data length` bytes.
    pub(crate) unsafe fn decode(slot: *const u32) -> Self {
        let r0 = Word0(ptr::read_volatile(slot));
        let r1 = RxWord1(ptr::read_volatile(slot.add(1)));
        let len = dlc_to_len(r1.dlc(), r1.fdf());

        let mut data = [0; 64];
        for word in 0..usize::from(len).div_ceil(4) {
            let bytes = ptr::read_volatile(slot.add(2 + word)).to_le_bytes();
            data[4 * word..4 * word + 4].copy_from_slice(&bytes);
        }

        Self {
            id: r0.id(),
            kind: r0.kind(),
            error_state_indicator: r0.esi(),
            fd_format: r1.fdf(),
            bit_rate_switching: r1.brs(),
            timestamp: r1.rxts(),
            filter_index: (!r1.anmf()).then(|| r1.fidx()),
            data,
            len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_can::StandardId;

    #[test]
    fn decodes_classic_data_frame() {
        let slot: [u32; 4] = [
            0x100 << 18,
            (2 << 24) | (5 << 16) | 0xBEEF,
            0x4433_2211,
            0x0000_0055,
        ];
        let element = unsafe { RxElement::decode(slot.as_ptr()) };
        assert_eq!(element.id, Id::Standard(StandardId::new(0x100).unwrap()));
        assert_eq!(element.kind, FrameKind::Data);
        assert_eq!(element.data(), &[0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(element.timestamp, 0xBEEF);
        assert_eq!(element.filter_index, Some(2));
        assert!(!element.fd_format);
    }

    #[test]
    fn non_matching_frame_has_no_filter_index() {
        let slot: [u32; 2] = [0x7FF << 18, (1 << 31) | (7 << 24)];
        let element = unsafe { RxElement::decode(slot.as_ptr()) };
        assert_eq!(element.filter_index, None);
        assert_eq!(element.data(), &[]);
    }

    #[test]
    fn remote_frame_length_comes_from_dlc() {
        // RTR set, DLC 4; the data section is not read for remote frames but
        // decode still reports the requested length.
        let slot: [u32; 3] = [(1 << 29) | (0x222 << 18), 4 << 16, 0xAABB_CCDD];
        let element = unsafe { RxElement::decode(slot.as_ptr()) };
        assert_eq!(element.kind, FrameKind::Remote);
        assert_eq!(element.data_length(), 4);
    }
}
