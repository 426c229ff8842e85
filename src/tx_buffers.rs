//! Transmission of messages
//!
//! The Tx buffer area holds the dedicated buffers first and the queue slots
//! right behind them; both share one element size. Dedicated buffers are
//! addressed explicitly with [`Mcan::tx_buffer_add`], the queue is fed
//! through the hardware put index with [`Mcan::tx_queue_push`].

use crate::bus::Mcan;
use crate::message::tx::TxElement;
use crate::messageram::MessageRamRegion;
use crate::reg::{self, Txbc, Txfqs};
use crate::Error;
use core::ptr;
use core::sync::atomic::{fence, Ordering};

/// Snapshot of the Tx queue state
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxQueueStatus {
    /// Free queue slots
    pub free_level: u8,
    /// No further element can be pushed
    pub is_full: bool,
}

/// Zeroes the slot, then writes headers and payload.
///
/// The fence afterwards orders the RAM writes before the transmission
/// request that follows at the caller.
unsafe fn write_element(region: &MessageRamRegion, slot: *mut u32, headers: [u32; 2], data: &[u8]) {
    for word in 0..region.element_words() {
        ptr::write_volatile(slot.add(word), 0);
    }
    ptr::write_volatile(slot, headers[0]);
    ptr::write_volatile(slot.add(1), headers[1]);
    for (word, chunk) in data.chunks(4).enumerate() {
        let mut bytes = [0_u8; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        ptr::write_volatile(slot.add(2 + word), u32::from_le_bytes(bytes));
    }
    fence(Ordering::SeqCst);
}

impl Mcan {
    /// Places `element` into dedicated Tx buffer `index` and requests its
    /// transmission.
    ///
    /// Nothing is written when `index` lies outside the configured dedicated
    /// buffers or when the payload length has no DLC encoding.
    pub fn tx_buffer_add(&mut self, element: &TxElement, index: u8) -> Result<(), Error> {
        if index >= self.tx_dedicated {
            return Err(Error::IndexOutOfRange);
        }
        let headers = self.encode_for_slot(element)?;
        let slot = self.tx_area.element_ptr(index);
        // In bounds: dedicated buffers are the front of the Tx area.
        unsafe { write_element(&self.tx_area, slot, headers, element.payload()) };
        self.arm_and_request(element, index);
        Ok(())
    }

    /// Pushes `element` into the Tx queue at the hardware put index and
    /// returns the Tx area slot it occupies.
    ///
    /// Fails with [`Error::TxFifoFull`] when no free slot is available,
    /// without touching the message RAM.
    pub fn tx_queue_push(&mut self, element: &TxElement) -> Result<u8, Error> {
        if self.tx_area.count() == self.tx_dedicated {
            // No queue slots were configured.
            return Err(Error::TxFifoFull);
        }
        let status = Txfqs(self.registers().txfqs.get());
        if status.tfqf() {
            return Err(Error::TxFifoFull);
        }
        let headers = self.encode_for_slot(element)?;
        // The put index counts across the whole Tx area.
        let index = status.tfqpi();
        let slot = self.tx_area.element_ptr(index);
        unsafe { write_element(&self.tx_area, slot, headers, element.payload()) };
        self.arm_and_request(element, index);
        Ok(index)
    }

    /// Encodes the headers, additionally checking that the payload fits the
    /// configured element data section.
    fn encode_for_slot(&self, element: &TxElement) -> Result<[u32; 2], Error> {
        let headers = element.header_words()?;
        let capacity = self.tx_area.element_bytes().saturating_sub(8);
        if element.data_length() > capacity {
            return Err(Error::ElementSizeInvalid);
        }
        Ok(headers)
    }

    fn arm_and_request(&mut self, element: &TxElement, index: u8) {
        let regs = self.registers();
        let bit = 1_u32 << index;
        reg::modify(&regs.txbtie, |v| {
            if element.interrupt_on_completion {
                v | bit
            } else {
                v & !bit
            }
        });
        regs.txbar.set(bit);
    }

    /// Whether the transmission from Tx area slot `index` completed
    pub fn tx_transmission_finished(&self, index: u8) -> bool {
        self.registers().txbto.get() & (1 << index) != 0
    }

    /// Reads the queue fill state.
    pub fn tx_queue_status(&self) -> TxQueueStatus {
        let status = Txfqs(self.registers().txfqs.get());
        TxQueueStatus {
            free_level: status.tffl(),
            is_full: status.tfqf(),
        }
    }

    /// Whether every configured queue slot is currently free
    pub fn is_tx_queue_empty(&self) -> bool {
        let regs = self.registers();
        Txfqs(regs.txfqs.get()).tffl() == Txbc(regs.txbc.get()).tfqs()
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::tests::{full_config, MockController};
    use crate::message::tx::TxElement;
    use crate::message::FrameType;
    use crate::Error;
    use embedded_can::StandardId;

    fn element(data: &[u8]) -> TxElement<'_> {
        TxElement {
            id: StandardId::new(0x123).unwrap().into(),
            frame_type: FrameType::Data(data),
            error_state_indicator: false,
            fd_format: false,
            bit_rate_switching: false,
            marker: 0,
            store_tx_event: false,
            interrupt_on_completion: false,
        }
    }

    #[test]
    fn dedicated_add_writes_slot_and_requests() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        let data = [0xAA, 0xBB];
        let mut element = element(&data);
        element.interrupt_on_completion = true;
        can.tx_buffer_add(&element, 1).unwrap();

        // Tx area starts at word 80, slot 1 of 16-byte elements at word 84.
        assert_eq!(ram[84], 0x123 << 18);
        assert_eq!(ram[85], 2 << 16);
        assert_eq!(ram[86], 0x0000_BBAA);
        assert_eq!(mock.block.txbar.get(), 1 << 1);
        assert_eq!(mock.block.txbtie.get(), 1 << 1);
    }

    #[test]
    fn dedicated_add_out_of_range_leaves_everything_untouched() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        let data = [0u8; 4];
        assert_eq!(
            can.tx_buffer_add(&element(&data), 2),
            Err(Error::IndexOutOfRange)
        );
        assert_eq!(mock.block.txbar.get(), 0);
        assert!(ram[80..].iter().all(|&w| w == 0));
    }

    #[test]
    fn queue_push_uses_the_hardware_put_index() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        // Hardware reports put index 3 (second queue slot).
        mock.block.txfqs.set(3 << 16);
        let data = [1, 2, 3, 4, 5];
        assert_eq!(can.tx_queue_push(&element(&data)), Ok(3));

        assert_eq!(ram[92], 0x123 << 18);
        assert_eq!(ram[94], 0x0403_0201);
        assert_eq!(ram[95], 0x0000_0005);
        assert_eq!(mock.block.txbar.get(), 1 << 3);
    }

    #[test]
    fn full_queue_rejects_the_push_without_side_effects() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        mock.block.txfqs.set(1 << 21);
        let data = [0u8; 8];
        assert_eq!(can.tx_queue_push(&element(&data)), Err(Error::TxFifoFull));
        assert_eq!(mock.block.txbar.get(), 0);
        assert!(ram[80..].iter().all(|&w| w == 0));
    }

    #[test]
    fn unencodable_payload_is_rejected_before_the_slot_is_written() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        let data = [0u8; 13];
        assert_eq!(
            can.tx_queue_push(&element(&data)),
            Err(Error::ElementSizeInvalid)
        );
        assert!(ram[80..].iter().all(|&w| w == 0));
    }

    #[test]
    fn queue_status_mirrors_the_status_register() {
        let mock = MockController::new();
        let can = mock.handle();
        mock.block.txfqs.set(4);
        let status = can.tx_queue_status();
        assert_eq!(status.free_level, 4);
        assert!(!status.is_full);

        // TXBC.TFQS equal to the free level means nothing is pending.
        mock.block.txbc.set(4 << 24);
        assert!(can.is_tx_queue_empty());
        mock.block.txfqs.set(3);
        assert!(!can.is_tx_queue_empty());
    }

    #[test]
    fn transmission_finished_tracks_txbto() {
        let mock = MockController::new();
        let can = mock.handle();
        mock.block.txbto.set(1 << 5);
        assert!(can.tx_transmission_finished(5));
        assert!(!can.tx_transmission_finished(4));
    }
}
