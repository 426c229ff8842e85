//! Memory-mapped register interface of the MCAN peripheral
//!
//! [`Registers`] is a plain descriptor built from raw addresses; it does not
//! claim any peripheral singleton. The caller decides which MCAN instance
//! (and which chip configuration register) the addresses refer to.

use bitfield::bitfield;
use vcell::VolatileCell;

/// Control and status registers of one MCAN instance
///
/// Matches the hardware layout starting at the instance base address.
/// Registers that the driver never touches are kept as reserved words so the
/// offsets of the ones that follow stay correct.
#[repr(C)]
pub struct RegisterBlock {
    /// Core release
    pub crel: VolatileCell<u32>,
    /// Customer register
    pub endn: VolatileCell<u32>,
    _reserved0: VolatileCell<u32>,
    /// Data bit timing and prescaler
    pub dbtp: VolatileCell<u32>,
    /// Test
    pub test: VolatileCell<u32>,
    /// RAM watchdog
    pub rwd: VolatileCell<u32>,
    /// CC control
    pub cccr: VolatileCell<u32>,
    /// Nominal bit timing and prescaler
    pub nbtp: VolatileCell<u32>,
    /// Timestamp counter configuration
    pub tscc: VolatileCell<u32>,
    /// Timestamp counter value
    pub tscv: VolatileCell<u32>,
    /// Timeout counter configuration
    pub tocc: VolatileCell<u32>,
    /// Timeout counter value
    pub tocv: VolatileCell<u32>,
    _reserved1: [VolatileCell<u32>; 4],
    /// Error counter
    pub ecr: VolatileCell<u32>,
    /// Protocol status
    pub psr: VolatileCell<u32>,
    /// Transmitter delay compensation
    pub tdcr: VolatileCell<u32>,
    _reserved2: VolatileCell<u32>,
    /// Interrupt status
    pub ir: VolatileCell<u32>,
    /// Interrupt enable
    pub ie: VolatileCell<u32>,
    /// Interrupt line select
    pub ils: VolatileCell<u32>,
    /// Interrupt line enable
    pub ile: VolatileCell<u32>,
    _reserved3: [VolatileCell<u32>; 8],
    /// Global filter configuration
    pub gfc: VolatileCell<u32>,
    /// Standard ID filter configuration
    pub sidfc: VolatileCell<u32>,
    /// Extended ID filter configuration
    pub xidfc: VolatileCell<u32>,
    _reserved4: VolatileCell<u32>,
    /// Extended ID AND mask
    pub xidam: VolatileCell<u32>,
    /// High-priority message status
    pub hpms: VolatileCell<u32>,
    /// New data 1 (dedicated Rx buffers 0..=31)
    pub ndat1: VolatileCell<u32>,
    /// New data 2 (dedicated Rx buffers 32..=63)
    pub ndat2: VolatileCell<u32>,
    /// Rx FIFO 0 configuration, status and acknowledge
    pub rxf0: RxFifoRegs,
    /// Rx buffer configuration
    pub rxbc: VolatileCell<u32>,
    /// Rx FIFO 1 configuration, status and acknowledge
    pub rxf1: RxFifoRegs,
    /// Rx buffer / FIFO element size configuration
    pub rxesc: VolatileCell<u32>,
    /// Tx buffer configuration
    pub txbc: VolatileCell<u32>,
    /// Tx FIFO/queue status
    pub txfqs: VolatileCell<u32>,
    /// Tx buffer element size configuration
    pub txesc: VolatileCell<u32>,
    /// Tx buffer request pending
    pub txbrp: VolatileCell<u32>,
    /// Tx buffer add request
    pub txbar: VolatileCell<u32>,
    /// Tx buffer cancellation request
    pub txbcr: VolatileCell<u32>,
    /// Tx buffer transmission occurred
    pub txbto: VolatileCell<u32>,
    /// Tx buffer cancellation finished
    pub txbcf: VolatileCell<u32>,
    /// Tx buffer transmission interrupt enable
    pub txbtie: VolatileCell<u32>,
    /// Tx buffer cancellation finished interrupt enable
    pub txbcie: VolatileCell<u32>,
    _reserved5: [VolatileCell<u32>; 2],
    /// Tx event FIFO configuration
    pub txefc: VolatileCell<u32>,
    /// Tx event FIFO status
    pub txefs: VolatileCell<u32>,
    /// Tx event FIFO acknowledge
    pub txefa: VolatileCell<u32>,
}

/// Configuration, status and acknowledge registers of one Rx FIFO
#[repr(C)]
pub struct RxFifoRegs {
    /// Configuration
    pub c: VolatileCell<u32>,
    /// Status
    pub s: VolatileCell<u32>,
    /// Acknowledge
    pub a: VolatileCell<u32>,
}

/// Register addresses of one MCAN instance
///
/// Keeps raw pointers rather than references so the descriptor stays `Send`
/// across construction sites and carries no lifetime.
pub struct Registers {
    base: *const RegisterBlock,
    chip_cfg: *const VolatileCell<u32>,
}

unsafe impl Send for Registers {}

impl Registers {
    /// Creates a register descriptor from raw addresses.
    ///
    /// `base` is the MCAN instance base address and `chip_cfg` the chip
    /// configuration register holding the upper message RAM address bits
    /// for that instance.
    ///
    /// # Safety
    /// Both addresses must be valid for volatile access for the lifetime of
    /// the returned value, and no other code may concurrently drive the same
    /// instance.
    pub const unsafe fn new(base: *const (), chip_cfg: *const ()) -> Self {
        Self {
            base: base as *const RegisterBlock,
            chip_cfg: chip_cfg as *const VolatileCell<u32>,
        }
    }

    pub(crate) fn block(&self) -> &RegisterBlock {
        // Validity is guaranteed by the `new` contract.
        unsafe { &*self.base }
    }

    pub(crate) fn chip_cfg(&self) -> &VolatileCell<u32> {
        unsafe { &*self.chip_cfg }
    }
}

/// Read-modify-write of a single register.
pub(crate) fn modify(cell: &VolatileCell<u32>, f: impl FnOnce(u32) -> u32) {
    cell.set(f(cell.get()));
}

bitfield! {
    /// CCCR fields
    pub struct Cccr(u32);
    /// Initialization
    pub init, set_init: 0;
    /// Configuration change enable
    pub cce, set_cce: 1;
    /// Restricted operation mode (ASM)
    pub restricted, set_restricted: 2;
    /// Clock stop acknowledge
    pub csa, _: 3;
    /// Clock stop request
    pub csr, set_csr: 4;
    /// Bus monitoring mode
    pub mon, set_mon: 5;
    /// Disable automatic retransmission
    pub dar, set_dar: 6;
    /// Test mode enable
    pub test_mode, set_test_mode: 7;
    /// CAN FD operation enable
    pub fdoe, set_fdoe: 8;
}

bitfield! {
    /// TEST fields
    pub struct Test(u32);
    /// Loop back mode
    pub lbck, set_lbck: 4;
}

bitfield! {
    /// NBTP fields
    pub struct Nbtp(u32);
    /// Time segment after sample point
    pub u8, ntseg2, set_ntseg2: 6, 0;
    /// Time segment before sample point
    pub u8, ntseg1, set_ntseg1: 15, 8;
    /// Bit rate prescaler
    pub u16, nbrp, set_nbrp: 24, 16;
    /// (Re)synchronization jump width
    pub u8, nsjw, set_nsjw: 31, 25;
}

bitfield! {
    /// DBTP fields
    pub struct Dbtp(u32);
    /// (Re)synchronization jump width
    pub u8, dsjw, set_dsjw: 3, 0;
    /// Time segment after sample point
    pub u8, dtseg2, set_dtseg2: 7, 4;
    /// Time segment before sample point
    pub u8, dtseg1, set_dtseg1: 12, 8;
    /// Bit rate prescaler
    pub u8, dbrp, set_dbrp: 20, 16;
    /// Transmitter delay compensation enable
    pub tdc, set_tdc: 23;
}

bitfield! {
    /// TDCR fields
    pub struct Tdcr(u32);
    /// Filter window length
    pub u8, tdcf, set_tdcf: 6, 0;
    /// Offset
    pub u8, tdco, set_tdco: 14, 8;
}

bitfield! {
    /// TSCC fields
    pub struct Tscc(u32);
    /// Timestamp select
    pub u8, tss, set_tss: 1, 0;
    /// Timestamp counter prescaler
    pub u8, tcp, set_tcp: 19, 16;
}

bitfield! {
    /// TOCC fields
    pub struct Tocc(u32);
    /// Enable timeout counter
    pub etoc, set_etoc: 0;
    /// Timeout select
    pub u8, tos, set_tos: 2, 1;
    /// Timeout period
    pub u16, top, set_top: 31, 16;
}

bitfield! {
    /// GFC fields
    pub struct Gfc(u32);
    /// Reject remote frames with extended ID
    pub rrfe, set_rrfe: 0;
    /// Reject remote frames with standard ID
    pub rrfs, set_rrfs: 1;
    /// Accept non-matching frames with extended ID
    pub u8, anfe, set_anfe: 3, 2;
    /// Accept non-matching frames with standard ID
    pub u8, anfs, set_anfs: 5, 4;
}

bitfield! {
    /// SIDFC fields
    pub struct Sidfc(u32);
    /// Filter list start address
    pub u16, flssa, set_flssa: 15, 0;
    /// List size
    pub u8, lss, set_lss: 23, 16;
}

bitfield! {
    /// XIDFC fields
    pub struct Xidfc(u32);
    /// Filter list start address
    pub u16, flesa, set_flesa: 15, 0;
    /// List size
    pub u8, lse, set_lse: 22, 16;
}

bitfield! {
    /// RXF0C/RXF1C fields
    pub struct Rxfc(u32);
    /// FIFO start address
    pub u16, fsa, set_fsa: 15, 0;
    /// FIFO size
    pub u8, fs, set_fs: 22, 16;
    /// FIFO watermark
    pub u8, fwm, set_fwm: 30, 24;
    /// FIFO operation mode (0 blocking, 1 overwrite)
    pub fom, set_fom: 31;
}

bitfield! {
    /// RXF0S/RXF1S fields
    pub struct Rxfs(u32);
    /// Fill level
    pub u8, ffl, _: 6, 0;
    /// Get index
    pub u8, fgi, _: 13, 8;
    /// Put index
    pub u8, fpi, _: 21, 16;
    /// FIFO full
    pub ff, _: 24;
    /// Message lost
    pub rfl, _: 25;
}

bitfield! {
    /// RXESC fields
    pub struct Rxesc(u32);
    /// Rx FIFO 0 data field size
    pub u8, f0ds, set_f0ds: 2, 0;
    /// Rx FIFO 1 data field size
    pub u8, f1ds, set_f1ds: 6, 4;
    /// Rx buffer data field size
    pub u8, rbds, set_rbds: 10, 8;
}

bitfield! {
    /// TXBC fields
    pub struct Txbc(u32);
    /// Tx buffers start address
    pub u16, tbsa, set_tbsa: 15, 0;
    /// Number of dedicated Tx buffers
    pub u8, ndtb, set_ndtb: 21, 16;
    /// Tx FIFO/queue size
    pub u8, tfqs, set_tfqs: 29, 24;
    /// Tx FIFO/queue mode (0 FIFO, 1 priority queue)
    pub tfqm, set_tfqm: 30;
}

bitfield! {
    /// TXFQS fields
    pub struct Txfqs(u32);
    /// Free level
    pub u8, tffl, _: 5, 0;
    /// Get index
    pub u8, tfgi, _: 12, 8;
    /// Put index
    pub u8, tfqpi, _: 20, 16;
    /// FIFO/queue full
    pub tfqf, _: 21;
}

bitfield! {
    /// TXESC fields
    pub struct Txesc(u32);
    /// Tx buffer data field size
    pub u8, tbds, set_tbds: 2, 0;
}

bitfield! {
    /// TXEFC fields
    pub struct Txefc(u32);
    /// Event FIFO start address
    pub u16, efsa, set_efsa: 15, 0;
    /// Event FIFO size
    pub u8, efs, set_efs: 21, 16;
    /// Event FIFO watermark
    pub u8, efwm, set_efwm: 29, 24;
}

bitfield! {
    /// TXEFS fields
    pub struct Txefs(u32);
    /// Fill level
    pub u8, effl, _: 5, 0;
    /// Get index
    pub u8, efgi, _: 12, 8;
    /// Put index
    pub u8, efpi, _: 20, 16;
    /// Event FIFO full
    pub eff, _: 24;
    /// Event lost
    pub tefl, _: 25;
}

bitfield! {
    /// RWD fields
    pub struct Rwd(u32);
    /// Watchdog configuration value
    pub u8, wdc, set_wdc: 7, 0;
}

bitfield! {
    /// ILE fields
    pub struct Ile(u32);
    /// Enable interrupt line 0
    pub eint0, set_eint0: 0;
    /// Enable interrupt line 1
    pub eint1, set_eint1: 1;
}
