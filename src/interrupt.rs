//! Interrupt configuration and status aggregation
//!
//! The peripheral exposes two interrupt lines; which interrupt sources
//! trigger which line is part of [`CanConfig`](crate::config::CanConfig).
//! Flagged sources are collected with [`Mcan::interrupt_status`], which
//! acknowledges exactly the flags it returns.

use crate::bus::Mcan;
use bitfield::bitfield;
use core::ops::{Index, IndexMut};

/// Mask of the interrupt bits the hardware implements
pub(crate) const IMPLEMENTED: u32 = 0x3FCF_FFFF;

/// Interrupt lines going to the system interrupt controller
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptLine {
    /// Line 0
    #[default]
    Line0,
    /// Line 1
    Line1,
}

bitfield! {
    /// A set of flagged interrupt sources, one bit per source
    #[derive(Copy, Clone)]
    pub struct InterruptSet(u32);

    /// ARA, access to a reserved address
    pub ara, set_ara: 29;
    /// PED, protocol error in the data phase
    pub ped, set_ped: 28;
    /// PEA, protocol error in the arbitration phase
    pub pea, set_pea: 27;
    /// WDI, message RAM watchdog expired
    pub wdi, set_wdi: 26;
    /// BO, bus-off status changed
    pub bo, set_bo: 25;
    /// EW, error warning status changed
    pub ew, set_ew: 24;
    /// EP, error passive status changed
    pub ep, set_ep: 23;
    /// ELO, error logging counter overflowed
    pub elo, set_elo: 22;
    /// DRX, message stored to a dedicated Rx buffer
    pub drx, set_drx: 19;
    /// TOO, timeout counter reached zero
    pub too, set_too: 18;
    /// MRAF, message RAM access failure
    pub mraf, set_mraf: 17;
    /// TSW, timestamp counter wrapped around
    pub tsw, set_tsw: 16;
    /// TEFL, Tx event FIFO element lost
    pub tefl, set_tefl: 15;
    /// TEFF, Tx event FIFO full
    pub teff, set_teff: 14;
    /// TEFW, Tx event FIFO watermark reached
    pub tefw, set_tefw: 13;
    /// TEFN, new Tx event FIFO entry
    pub tefn, set_tefn: 12;
    /// TFE, Tx FIFO empty
    pub tfe, set_tfe: 11;
    /// TCF, transmission cancellation finished; the per-buffer sub-flags
    /// are tracked in TXBCF
    pub tcf, set_tcf: 10;
    /// TC, transmission completed; armed per submitted element through
    /// `TxElement::interrupt_on_completion`
    pub tc, set_tc: 9;
    /// HPM, high priority message received
    pub hpm, set_hpm: 8;
    /// RF1L, Rx FIFO 1 message lost
    pub rf1l, set_rf1l: 7;
    /// RF1F, Rx FIFO 1 full
    pub rf1f, set_rf1f: 6;
    /// RF1W, Rx FIFO 1 watermark reached
    pub rf1w, set_rf1w: 5;
    /// RF1N, new message in Rx FIFO 1
    pub rf1n, set_rf1n: 4;
    /// RF0L, Rx FIFO 0 message lost
    pub rf0l, set_rf0l: 3;
    /// RF0F, Rx FIFO 0 full
    pub rf0f, set_rf0f: 2;
    /// RF0W, Rx FIFO 0 watermark reached
    pub rf0w, set_rf0w: 1;
    /// RF0N, new message in Rx FIFO 0
    pub rf0n, set_rf0n: 0;
}

impl FromIterator<Interrupt> for InterruptSet {
    fn from_iter<T: IntoIterator<Item = Interrupt>>(iter: T) -> Self {
        InterruptSet(
            iter.into_iter()
                .fold(0, |bits, int| bits | u32::from(int)),
        )
    }
}

impl core::fmt::Debug for InterruptSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InterruptSet {{")?;
        for int in self.iter() {
            write!(f, " {:?}", int)?;
        }
        write!(f, " }}")
    }
}

/// A single interrupt source
///
/// Bits 20 and 21 of the status register are reserved on this hardware, so
/// the discriminants skip them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    /// New message in Rx FIFO 0 (RF0N)
    RxFifo0NewMessage = 0,
    /// Rx FIFO 0 watermark reached (RF0W)
    RxFifo0WatermarkReached = 1,
    /// Rx FIFO 0 full (RF0F)
    RxFifo0Full = 2,
    /// Rx FIFO 0 message lost (RF0L)
    RxFifo0MessageLost = 3,
    /// New message in Rx FIFO 1 (RF1N)
    RxFifo1NewMessage = 4,
    /// Rx FIFO 1 watermark reached (RF1W)
    RxFifo1WatermarkReached = 5,
    /// Rx FIFO 1 full (RF1F)
    RxFifo1Full = 6,
    /// Rx FIFO 1 message lost (RF1L)
    RxFifo1MessageLost = 7,
    /// High priority message received (HPM)
    HighPriorityMessage = 8,
    /// Transmission completed (TC)
    TransmissionCompleted = 9,
    /// Transmission cancellation finished (TCF)
    TransmissionCancellationFinished = 10,
    /// Tx FIFO empty (TFE)
    TxFifoEmpty = 11,
    /// New Tx event FIFO entry (TEFN)
    TxEventFifoNewEntry = 12,
    /// Tx event FIFO watermark reached (TEFW)
    TxEventFifoWatermarkReached = 13,
    /// Tx event FIFO full (TEFF)
    TxEventFifoFull = 14,
    /// Tx event FIFO element lost (TEFL)
    TxEventFifoElementLost = 15,
    /// Timestamp counter wrapped around (TSW)
    TimestampWraparound = 16,
    /// Message RAM access failure (MRAF)
    MessageRamAccessFailure = 17,
    /// Timeout counter reached zero (TOO)
    TimeoutOccurred = 18,
    /// Message stored to a dedicated Rx buffer (DRX)
    MessageStoredToDedicatedRxBuffer = 19,
    /// Error logging counter overflowed (ELO)
    ErrorLoggingOverflow = 22,
    /// Error passive status changed (EP)
    ErrorPassive = 23,
    /// Error warning status changed (EW)
    WarningStatusChanged = 24,
    /// Bus-off status changed (BO)
    BusOff = 25,
    /// Message RAM watchdog expired (WDI)
    Watchdog = 26,
    /// Protocol error in the arbitration phase (PEA)
    ProtocolErrorArbitration = 27,
    /// Protocol error in the data phase (PED)
    ProtocolErrorData = 28,
    /// Access to a reserved address (ARA)
    AccessToReservedAddress = 29,
}

impl Interrupt {
    /// Every implemented interrupt source, in bit order
    pub const ALL: [Self; 28] = {
        use Interrupt::*;
        [
            RxFifo0NewMessage,
            RxFifo0WatermarkReached,
            RxFifo0Full,
            RxFifo0MessageLost,
            RxFifo1NewMessage,
            RxFifo1WatermarkReached,
            RxFifo1Full,
            RxFifo1MessageLost,
            HighPriorityMessage,
            TransmissionCompleted,
            TransmissionCancellationFinished,
            TxFifoEmpty,
            TxEventFifoNewEntry,
            TxEventFifoWatermarkReached,
            TxEventFifoFull,
            TxEventFifoElementLost,
            TimestampWraparound,
            MessageRamAccessFailure,
            TimeoutOccurred,
            MessageStoredToDedicatedRxBuffer,
            ErrorLoggingOverflow,
            ErrorPassive,
            WarningStatusChanged,
            BusOff,
            Watchdog,
            ProtocolErrorArbitration,
            ProtocolErrorData,
            AccessToReservedAddress,
        ]
    };
}

impl From<Interrupt> for u32 {
    fn from(int: Interrupt) -> Self {
        1 << int as u32
    }
}

/// Error type of `Interrupt::try_from` for reserved or out-of-range bits
pub struct InvalidInterruptNumber;

impl TryFrom<u8> for Interrupt {
    type Error = InvalidInterruptNumber;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|int| *int as u8 == value)
            .ok_or(InvalidInterruptNumber)
    }
}

impl InterruptSet {
    /// An iterator visiting all contained interrupts, lowest bit first
    pub fn iter(&self) -> Iter {
        Iter {
            flags: *self,
            index: 0,
        }
    }
}

/// Iterator over the sources contained in an [`InterruptSet`]
pub struct Iter {
    flags: InterruptSet,
    index: u8,
}

impl Iterator for Iter {
    type Item = Interrupt;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < 30 {
            let bit = self.index;
            self.index += 1;
            if self.flags.0 & (1 << bit) != 0 {
                // Reserved bits fail the conversion and are skipped.
                if let Ok(int) = bit.try_into() {
                    return Some(int);
                }
            }
        }
        None
    }
}

/// Enable and line selection of one interrupt source
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptConfig {
    /// Whether the source raises its line at all
    pub enabled: bool,
    /// Line the source is routed to
    pub line: InterruptLine,
}

/// Routing table covering every implemented interrupt source
///
/// Defaults to everything disabled on line 0.
#[derive(Copy, Clone, Debug, Default)]
pub struct InterruptRouting {
    table: [InterruptConfig; 30],
}

impl Index<Interrupt> for InterruptRouting {
    type Output = InterruptConfig;

    fn index(&self, int: Interrupt) -> &Self::Output {
        &self.table[int as usize]
    }
}

impl IndexMut<Interrupt> for InterruptRouting {
    fn index_mut(&mut self, int: Interrupt) -> &mut Self::Output {
        &mut self.table[int as usize]
    }
}

impl InterruptRouting {
    /// Routes `int` to `line` and enables it.
    pub fn enable(&mut self, int: Interrupt, line: InterruptLine) {
        self[int] = InterruptConfig {
            enabled: true,
            line,
        };
    }
}

impl Mcan {
    /// Collects and acknowledges the currently flagged interrupts.
    ///
    /// Only the flags observed in the status register are written back, so
    /// sources flagged after the read stay pending for the next call.
    pub fn interrupt_status(&mut self) -> InterruptSet {
        let regs = self.registers();
        let flagged = regs.ir.get() & IMPLEMENTED;
        regs.ir.set(flagged);
        InterruptSet(flagged)
    }

    /// Reads the timestamp counter.
    pub fn timestamp(&self) -> u16 {
        self.registers().tscv.get() as u16
    }
}
