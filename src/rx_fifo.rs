//! Reception from the Rx FIFOs
//!
//! The hardware exposes two independent FIFOs. The get index, fill level and
//! the lost-message flag live in the per-FIFO status register; pulling an
//! element reads the slot the get index points at and acknowledges exactly
//! that index.

use crate::bus::Mcan;
use crate::message::rx::RxElement;
use crate::messageram::MessageRamRegion;
use crate::reg::{RxFifoRegs, Rxfs};
use crate::Error;

/// Selects one of the two Rx FIFOs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifoId {
    /// Rx FIFO 0
    Fifo0,
    /// Rx FIFO 1
    Fifo1,
}

/// Snapshot of one Rx FIFO state
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxFifoStatus {
    /// Elements currently stored
    pub count: u8,
    /// No further element can be stored
    pub is_full: bool,
    /// A frame was lost since the flag was last cleared
    pub is_message_lost: bool,
}

impl Mcan {
    fn rx_fifo(&self, id: RxFifoId) -> (&RxFifoRegs, &MessageRamRegion) {
        match id {
            RxFifoId::Fifo0 => (&self.reg.block().rxf0, &self.rx_fifo_0),
            RxFifoId::Fifo1 => (&self.reg.block().rxf1, &self.rx_fifo_1),
        }
    }

    /// Takes the oldest element out of the selected FIFO.
    ///
    /// Fails with [`Error::InvalidRxFifoId`] when the FIFO was not given any
    /// message RAM, and with [`Error::RxFifoEmpty`] when there is nothing to
    /// read; the get index is only acknowledged after a successful read.
    pub fn rx_fifo_pull(&mut self, id: RxFifoId) -> Result<RxElement, Error> {
        let (regs, region) = self.rx_fifo(id);
        if !region.is_configured() {
            return Err(Error::InvalidRxFifoId);
        }
        let status = Rxfs(regs.s.get());
        if status.ffl() == 0 {
            return Err(Error::RxFifoEmpty);
        }
        let index = status.fgi();
        // The get index stays within the configured FIFO size.
        let element = unsafe { RxElement::decode(region.element_ptr(index)) };
        regs.a.set(u32::from(index));
        Ok(element)
    }

    /// Reads the fill state of the selected FIFO.
    pub fn rx_fifo_status(&self, id: RxFifoId) -> RxFifoStatus {
        let (regs, _) = self.rx_fifo(id);
        let status = Rxfs(regs.s.get());
        RxFifoStatus {
            count: status.ffl(),
            is_full: status.ff(),
            is_message_lost: status.rfl(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::tests::{full_config, MockController};
    use embedded_can::{Id, StandardId};

    #[test]
    fn fresh_fifo_reports_empty_status() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        let status = can.rx_fifo_status(RxFifoId::Fifo0);
        assert_eq!(status.count, 0);
        assert!(!status.is_full);
        assert!(!status.is_message_lost);
    }

    #[test]
    fn pull_from_empty_fifo_does_not_acknowledge() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        assert!(matches!(
            can.rx_fifo_pull(RxFifoId::Fifo0),
            Err(Error::RxFifoEmpty)
        ));
        assert_eq!(mock.block.rxf0.a.get(), 0);
    }

    #[test]
    fn pull_from_unconfigured_fifo_is_rejected() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        let mut config = full_config(&mut ram);
        config.rx_fifo_1 = None;
        can.set_config(&config, 100).unwrap();

        assert!(matches!(
            can.rx_fifo_pull(RxFifoId::Fifo1),
            Err(Error::InvalidRxFifoId)
        ));
    }

    #[test]
    fn pull_decodes_at_the_get_index_and_acknowledges_it() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        // FIFO 0 starts at word 16 with 16-byte elements; craft a frame in
        // slot 1 and report fill level 2, get index 1.
        ram[20] = 0x2A5 << 18;
        ram[21] = (1 << 24) | (4 << 16) | 0x0123;
        ram[22] = 0x0D0C_0B0A;
        mock.block.rxf0.s.set((1 << 8) | 2);

        let element = can.rx_fifo_pull(RxFifoId::Fifo0).unwrap();
        assert_eq!(element.id, Id::Standard(StandardId::new(0x2A5).unwrap()));
        assert_eq!(element.data(), &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(element.timestamp, 0x0123);
        assert_eq!(element.filter_index, Some(1));
        assert_eq!(mock.block.rxf0.a.get(), 1);
    }

    #[test]
    fn lost_messages_show_up_in_the_status() {
        let mock = MockController::new();
        let can = mock.handle();
        mock.block.rxf1.s.set((1 << 25) | (1 << 24) | 2);
        let status = can.rx_fifo_status(RxFifoId::Fifo1);
        assert_eq!(status.count, 2);
        assert!(status.is_full);
        assert!(status.is_message_lost);
    }
}
