//! Information about successfully transmitted messages
//!
//! Events are only generated for messages with
//! [`store_tx_event`](crate::message::tx::TxElement::store_tx_event) set.
//! Each event records the marker of the originating Tx element, so
//! transmissions can be matched to their outcome.

use crate::bus::Mcan;
use crate::message::tx_event::TxEvent;
use crate::reg::Txefs;
use crate::Error;

/// Snapshot of the Tx event FIFO state
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxEventFifoStatus {
    /// Events currently stored
    pub count: u8,
    /// No further event can be stored
    pub is_full: bool,
    /// An event was lost since the flag was last cleared
    pub is_event_lost: bool,
}

impl Mcan {
    /// Takes the oldest event out of the Tx event FIFO.
    ///
    /// Fails with [`Error::TxEventFifoEmpty`] when nothing is stored; the
    /// get index is only acknowledged after a successful read.
    pub fn tx_event_fifo_pull(&mut self) -> Result<TxEvent, Error> {
        let regs = self.registers();
        let status = Txefs(regs.txefs.get());
        if status.effl() == 0 {
            return Err(Error::TxEventFifoEmpty);
        }
        let index = status.efgi();
        // The get index stays within the configured FIFO size.
        let event = unsafe { TxEvent::decode(self.tx_event_fifo.element_ptr(index)) };
        regs.txefa.set(u32::from(index));
        Ok(event)
    }

    /// Reads the fill state of the Tx event FIFO.
    pub fn tx_event_fifo_status(&self) -> TxEventFifoStatus {
        let status = Txefs(self.registers().txefs.get());
        TxEventFifoStatus {
            count: status.effl(),
            is_full: status.eff(),
            is_event_lost: status.tefl(),
        }
    }
}
