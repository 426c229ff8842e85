//! Reception into dedicated Rx buffers
//!
//! Filters with the store-buffer action deliver frames into fixed buffer
//! slots instead of a FIFO. Arrival is signalled per buffer through the two
//! new-data registers; reading a buffer clears its flag so the hardware may
//! reuse the slot.

use crate::bus::Mcan;
use crate::message::rx::RxElement;
use crate::Error;

impl Mcan {
    /// Whether dedicated buffer `index` holds a frame not yet read
    pub fn rx_buffer_has_new_data(&self, index: u8) -> bool {
        let regs = self.registers();
        let flags = if index < 32 {
            regs.ndat1.get()
        } else {
            regs.ndat2.get()
        };
        flags & (1 << (index % 32)) != 0
    }

    /// Reads the frame stored in dedicated buffer `index` and clears its
    /// new-data flag.
    ///
    /// Fails with [`Error::IndexOutOfRange`] when the buffer region is not
    /// configured or `index` exceeds the addressable buffers.
    pub fn rx_buffer_get(&mut self, index: u8) -> Result<RxElement, Error> {
        if !self.rx_buffers.is_configured() || index >= self.rx_buffers.count() {
            return Err(Error::IndexOutOfRange);
        }
        // In bounds per the check above.
        let element = unsafe { RxElement::decode(self.rx_buffers.element_ptr(index)) };
        let regs = self.registers();
        // Writing a one clears exactly this flag.
        if index < 32 {
            regs.ndat1.set(1 << index);
        } else {
            regs.ndat2.set(1 << (index - 32));
        }
        Ok(element)
    }
}
