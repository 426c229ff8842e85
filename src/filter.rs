//! Acceptance filters
//!
//! Filter lists live in message RAM. Standard ID filters occupy one word,
//! extended ID filters two. Entries can be rewritten at any time; the
//! hardware evaluates whatever the list holds when a frame arrives.

use crate::bus::Mcan;
use crate::Error;
use bitfield::bitfield;
use core::ptr;

/// Where frames matching no filter list entry are stored
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NonMatchingPolicy {
    /// Store in Rx FIFO 0
    StoreFifo0,
    /// Store in Rx FIFO 1
    StoreFifo1,
    /// Discard
    #[default]
    Reject,
}

/// How a filter element compares identifiers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterKind {
    /// Match identifiers in `id1..=id2`
    Range = 0,
    /// Match `id1` or `id2` exactly
    Dual = 1,
    /// Match identifiers equal to `id1` under the mask `id2`
    Mask = 2,
}

/// What happens to a frame matching a filter element
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterAction {
    /// Element is skipped
    Disabled = 0,
    /// Store in Rx FIFO 0
    StoreFifo0 = 1,
    /// Store in Rx FIFO 1
    StoreFifo1 = 2,
    /// Discard
    Reject = 3,
    /// Flag as high priority, store per the non-matching policy
    Priority = 4,
    /// Flag as high priority and store in Rx FIFO 0
    PriorityFifo0 = 5,
    /// Flag as high priority and store in Rx FIFO 1
    PriorityFifo1 = 6,
    /// Store in the dedicated Rx buffer selected by `id2`
    StoreBuffer = 7,
}

/// One acceptance filter element
///
/// The meaning of `id1` and `id2` depends on [`FilterKind`]; with
/// [`FilterAction::StoreBuffer`] the kind field is ignored by the hardware
/// and `id2` selects the target buffer index.
#[derive(Copy, Clone, Debug)]
pub struct FilterEntry {
    /// Comparison performed by this element
    pub kind: FilterKind,
    /// Action on match
    pub action: FilterAction,
    /// First identifier operand
    pub id1: u32,
    /// Second identifier operand (upper bound, second ID, mask or buffer)
    pub id2: u32,
}

bitfield! {
    /// Standard ID filter element (S0)
    struct StandardFilterWord(u32);
    u16, sfid2, set_sfid2: 10, 0;
    u16, sfid1, set_sfid1: 26, 16;
    u8, sfec, set_sfec: 29, 27;
    u8, sft, set_sft: 31, 30;
}

bitfield! {
    /// First word of an extended ID filter element (F0)
    struct ExtendedFilterWord0(u32);
    u32, efid1, set_efid1: 28, 0;
    u8, efec, set_efec: 31, 29;
}

bitfield! {
    /// Second word of an extended ID filter element (F1)
    struct ExtendedFilterWord1(u32);
    u32, efid2, set_efid2: 28, 0;
    u8, eft, set_eft: 31, 30;
}

impl FilterEntry {
    fn standard_word(&self) -> u32 {
        let mut word = StandardFilterWord(0);
        word.set_sft(self.kind as u8);
        word.set_sfec(self.action as u8);
        word.set_sfid1(self.id1 as u16);
        word.set_sfid2(self.id2 as u16);
        word.0
    }

    fn extended_words(&self) -> [u32; 2] {
        let mut word0 = ExtendedFilterWord0(0);
        word0.set_efec(self.action as u8);
        word0.set_efid1(self.id1);
        let mut word1 = ExtendedFilterWord1(0);
        word1.set_eft(self.kind as u8);
        word1.set_efid2(self.id2);
        [word0.0, word1.0]
    }
}

impl Mcan {
    /// Writes `entry` into slot `index` of the standard ID filter list.
    ///
    /// Fails with [`Error::IndexOutOfRange`] when `index` does not fall into
    /// the configured list; nothing is written in that case.
    pub fn set_standard_filter(&mut self, entry: &FilterEntry, index: u8) -> Result<(), Error> {
        if index >= self.standard_filters.count() {
            return Err(Error::IndexOutOfRange);
        }
        let slot = self.standard_filters.element_ptr(index);
        // Slot validity follows from the region bounds check above.
        unsafe { ptr::write_volatile(slot, entry.standard_word()) };
        Ok(())
    }

    /// Writes `entry` into slot `index` of the extended ID filter list.
    pub fn set_extended_filter(&mut self, entry: &FilterEntry, index: u8) -> Result<(), Error> {
        if index >= self.extended_filters.count() {
            return Err(Error::IndexOutOfRange);
        }
        let slot = self.extended_filters.element_ptr(index);
        let words = entry.extended_words();
        unsafe {
            ptr::write_volatile(slot, words[0]);
            ptr::write_volatile(slot.add(1), words[1]);
        }
        Ok(())
    }
}
