//! Controller handle and the configuration sequence
//!
//! [`Mcan`] owns the register descriptor of one controller instance together
//! with the message RAM region records derived from the last applied
//! configuration. [`Mcan::set_config`] runs the full initialization
//! handshake; everything it programs can be read back with
//! [`Mcan::get_config`].

use crate::config::{
    BitTiming, CanConfig, IdFiltering, Mode, RxBufferConfig, RxFifoConfig, RxFifoOperationMode,
    TimeoutConfig, TimeoutKind, TimestampClock, TimestampConfig, TransmitterDelayCompensation,
    TxBufferConfig, TxEventFifoConfig, TxQueueKind,
};
use crate::filter::NonMatchingPolicy;
use crate::interrupt::{self, Interrupt, InterruptConfig, InterruptLine};
use crate::messageram::{
    ElementSize, MessageRamRegion, EXTENDED_FILTER_BYTES, STANDARD_FILTER_BYTES,
    TX_EVENT_ELEMENT_BYTES,
};
use crate::reg::{
    self, Cccr, Dbtp, Gfc, Ile, Nbtp, RegisterBlock, Registers, Rwd, RxFifoRegs, Rxesc, Rxfc,
    Sidfc, Tdcr, Test, Tocc, Tscc, Txbc, Txefc, Txesc, Xidfc,
};
use crate::Error;

/// Total number of Tx buffer area slots the hardware supports
const TX_AREA_CAPACITY: u8 = 32;
/// Number of dedicated Rx buffers addressable through NDAT1/NDAT2
const RX_BUFFER_CAPACITY: u8 = 64;
/// Value accepting every extended identifier
const EXTENDED_ID_MASK_ALL: u32 = 0x1FFF_FFFF;

/// One MCAN controller instance
pub struct Mcan {
    pub(crate) reg: Registers,
    message_ram_base: *mut u32,
    pub(crate) tx_area: MessageRamRegion,
    pub(crate) tx_dedicated: u8,
    pub(crate) rx_buffers: MessageRamRegion,
    pub(crate) rx_fifo_0: MessageRamRegion,
    pub(crate) rx_fifo_1: MessageRamRegion,
    pub(crate) tx_event_fifo: MessageRamRegion,
    pub(crate) standard_filters: MessageRamRegion,
    pub(crate) extended_filters: MessageRamRegion,
}

/// Polls `poll` until it reports completion, at most `limit` times.
fn wait_for_ack(mut poll: impl FnMut() -> bool, limit: u32) -> bool {
    for _ in 0..limit {
        if poll() {
            return true;
        }
    }
    false
}

fn ram_offset(address: *mut u32) -> u16 {
    // The regions live in a 64 KiB window; the registers take the low
    // address bits only.
    address as usize as u16
}

impl Mcan {
    /// Wraps the registers of one controller instance.
    ///
    /// The returned handle has no message RAM regions until
    /// [`Self::set_config`] ran successfully.
    pub fn new(reg: Registers) -> Self {
        Self {
            reg,
            message_ram_base: core::ptr::null_mut(),
            tx_area: MessageRamRegion::empty(),
            tx_dedicated: 0,
            rx_buffers: MessageRamRegion::empty(),
            rx_fifo_0: MessageRamRegion::empty(),
            rx_fifo_1: MessageRamRegion::empty(),
            tx_event_fifo: MessageRamRegion::empty(),
            standard_filters: MessageRamRegion::empty(),
            extended_filters: MessageRamRegion::empty(),
        }
    }

    pub(crate) fn registers(&self) -> &RegisterBlock {
        self.reg.block()
    }

    /// Applies `config`, running the full initialization handshake.
    ///
    /// `poll_limit` bounds the number of status reads spent waiting for each
    /// hardware acknowledgement. The two acknowledgements are the entry into
    /// initialization ([`Error::InitializationStartTimeout`]) and, for
    /// [`Mode::PowerDown`], the clock stop
    /// ([`Error::ClockStopRequestTimeout`]).
    ///
    /// On any error the remaining steps are skipped; in particular the
    /// addressing precheck fails before a single register is touched.
    pub fn set_config(&mut self, config: &CanConfig, poll_limit: u32) -> Result<(), Error> {
        if let Some(tx) = &config.tx_buffer {
            if u16::from(tx.buffer_size) + u16::from(tx.queue_size) > u16::from(TX_AREA_CAPACITY) {
                return Err(Error::IndexOutOfRange);
            }
        }

        self.set_message_ram_base(config.message_ram_base);
        self.enter_configuration(poll_limit)?;
        self.apply_mode(config, poll_limit)?;
        self.apply_nominal_timing(&config.nominal_timing);
        if config.fd_enabled {
            self.apply_data_timing(&config.data_timing);
            self.apply_delay_compensation(&config.delay_compensation);
        }
        self.apply_timestamp(&config.timestamp);
        self.apply_timeout(&config.timeout);
        self.apply_standard_filtering(&config.standard_filtering);
        self.apply_extended_filtering(&config.extended_filtering);
        self.apply_rx_sections(config);
        self.apply_tx_area(config.tx_buffer.as_ref());
        self.apply_tx_event_fifo(config.tx_event_fifo.as_ref());
        self.apply_interrupts(config);

        let regs = self.registers();
        let mut rwd = Rwd(0);
        rwd.set_wdc(config.watchdog);
        regs.rwd.set(rwd.0);
        regs.xidam.set(EXTENDED_ID_MASK_ALL);

        // Leaving initialization locks the configuration registers again and
        // synchronizes the controller to the bus.
        reg::modify(&regs.cccr, |v| {
            let mut w = Cccr(v);
            w.set_init(false);
            w.set_cce(false);
            w.0
        });
        Ok(())
    }

    /// Reads the applied configuration back from the registers and the
    /// recorded regions.
    pub fn get_config(&self) -> CanConfig {
        let regs = self.registers();
        let cccr = Cccr(regs.cccr.get());
        CanConfig {
            message_ram_base: self.message_ram_base,
            mode: self.mode(),
            fd_enabled: cccr.fdoe(),
            nominal_timing: self.read_nominal_timing(),
            data_timing: self.read_data_timing(),
            delay_compensation: self.read_delay_compensation(),
            timestamp: self.read_timestamp(),
            timeout: self.read_timeout(),
            standard_filtering: self.read_standard_filtering(),
            extended_filtering: self.read_extended_filtering(),
            rx_fifo_0: read_rx_fifo(&self.rx_fifo_0, &regs.rxf0),
            rx_fifo_1: read_rx_fifo(&self.rx_fifo_1, &regs.rxf1),
            rx_buffer: self.read_rx_buffer(),
            tx_buffer: self.read_tx_area(),
            tx_event_fifo: self.read_tx_event_fifo(),
            interrupts: self.read_interrupts(),
            interrupt_line_0_enabled: Ile(regs.ile.get()).eint0(),
            interrupt_line_1_enabled: Ile(regs.ile.get()).eint1(),
            watchdog: Rwd(regs.rwd.get()).wdc(),
        }
    }

    /// Derives the current operating mode from the control bits.
    ///
    /// Combinations no configuration request produces (a half-finished clock
    /// stop, test mode without loopback) read back as [`Mode::Invalid`].
    pub fn mode(&self) -> Mode {
        let regs = self.registers();
        let cccr = Cccr(regs.cccr.get());
        if cccr.init() {
            if cccr.csr() && cccr.csa() {
                Mode::PowerDown
            } else {
                Mode::Invalid
            }
        } else if cccr.csr() || cccr.csa() {
            Mode::Invalid
        } else if cccr.test_mode() {
            if cccr.mon() && Test(regs.test.get()).lbck() {
                Mode::InternalLoopback
            } else {
                Mode::Invalid
            }
        } else if cccr.mon() {
            Mode::BusMonitoring
        } else if cccr.restricted() {
            Mode::Restricted
        } else if cccr.dar() {
            Mode::AutomaticRetransmissionDisabled
        } else {
            Mode::Normal
        }
    }

    /// Restarts the timeout down counter.
    ///
    /// Only meaningful in [`TimeoutKind::Continuous`] operation; in the
    /// FIFO-bound kinds the hardware restarts the counter itself.
    pub fn reset_timeout_counter(&mut self) {
        self.registers().tocv.set(0);
    }

    fn set_message_ram_base(&mut self, base: *mut u32) {
        self.message_ram_base = base;
        let msb = ((base as usize) >> 16) as u32 & 0xFFFF;
        reg::modify(self.reg.chip_cfg(), |v| (v & 0x0000_FFFF) | (msb << 16));
    }

    fn enter_configuration(&mut self, poll_limit: u32) -> Result<(), Error> {
        let regs = self.registers();
        let mut cccr = Cccr(0);
        cccr.set_init(true);
        regs.cccr.set(cccr.0);
        if !wait_for_ack(|| Cccr(regs.cccr.get()).init(), poll_limit) {
            return Err(Error::InitializationStartTimeout);
        }
        reg::modify(&regs.cccr, |v| {
            let mut w = Cccr(v);
            w.set_cce(true);
            w.0
        });
        // Baseline control state; the mode bits are added afterwards.
        let mut cccr = Cccr(0);
        cccr.set_init(true);
        cccr.set_cce(true);
        regs.cccr.set(cccr.0);
        regs.gfc.set(0);
        Ok(())
    }

    fn apply_mode(&mut self, config: &CanConfig, poll_limit: u32) -> Result<(), Error> {
        let regs = self.registers();
        if config.fd_enabled {
            reg::modify(&regs.cccr, |v| {
                let mut w = Cccr(v);
                w.set_fdoe(true);
                w.0
            });
        }
        match config.mode {
            Mode::Normal => {}
            Mode::AutomaticRetransmissionDisabled => {
                reg::modify(&regs.cccr, |v| {
                    let mut w = Cccr(v);
                    w.set_dar(true);
                    w.0
                });
            }
            Mode::Restricted => {
                reg::modify(&regs.cccr, |v| {
                    let mut w = Cccr(v);
                    w.set_restricted(true);
                    w.0
                });
            }
            Mode::BusMonitoring => {
                reg::modify(&regs.cccr, |v| {
                    let mut w = Cccr(v);
                    w.set_mon(true);
                    w.0
                });
            }
            Mode::InternalLoopback => {
                reg::modify(&regs.cccr, |v| {
                    let mut w = Cccr(v);
                    w.set_test_mode(true);
                    w.set_mon(true);
                    w.0
                });
                let mut test = Test(0);
                test.set_lbck(true);
                regs.test.set(test.0);
            }
            Mode::PowerDown => {
                reg::modify(&regs.cccr, |v| {
                    let mut w = Cccr(v);
                    w.set_csr(true);
                    w.0
                });
                if !wait_for_ack(|| Cccr(regs.cccr.get()).csa(), poll_limit) {
                    return Err(Error::ClockStopRequestTimeout);
                }
            }
            Mode::Invalid => return Err(Error::ModeInvalid),
        }
        Ok(())
    }

    fn apply_nominal_timing(&mut self, timing: &BitTiming) {
        let mut w = Nbtp(0);
        w.set_nbrp(timing.prescaler);
        w.set_nsjw(timing.sync_jump_width);
        w.set_ntseg1(timing.segment_before_sample_point);
        w.set_ntseg2(timing.segment_after_sample_point);
        self.registers().nbtp.set(w.0);
    }

    fn apply_data_timing(&mut self, timing: &BitTiming) {
        let regs = self.registers();
        reg::modify(&regs.dbtp, |v| {
            let mut w = Dbtp(v);
            w.set_dbrp(timing.prescaler as u8);
            w.set_dsjw(timing.sync_jump_width);
            w.set_dtseg1(timing.segment_before_sample_point);
            w.set_dtseg2(timing.segment_after_sample_point);
            w.0
        });
    }

    fn apply_delay_compensation(&mut self, tdc: &TransmitterDelayCompensation) {
        let regs = self.registers();
        reg::modify(&regs.dbtp, |v| {
            let mut w = Dbtp(v);
            w.set_tdc(tdc.enabled);
            w.0
        });
        let mut w = Tdcr(0);
        w.set_tdcf(tdc.filter);
        w.set_tdco(tdc.offset);
        regs.tdcr.set(w.0);
    }

    fn apply_timestamp(&mut self, timestamp: &TimestampConfig) {
        let mut w = Tscc(0);
        w.set_tss(match timestamp.clock {
            TimestampClock::Disabled => 0,
            TimestampClock::Internal => 1,
            TimestampClock::External => 2,
        });
        w.set_tcp(timestamp.prescaler);
        self.registers().tscc.set(w.0);
    }

    fn apply_timeout(&mut self, timeout: &TimeoutConfig) {
        let mut w = Tocc(0);
        w.set_etoc(timeout.enabled);
        w.set_tos(match timeout.kind {
            TimeoutKind::Continuous => 0,
            TimeoutKind::TxEventFifo => 1,
            TimeoutKind::RxFifo0 => 2,
            TimeoutKind::RxFifo1 => 3,
        });
        w.set_top(timeout.period);
        self.registers().tocc.set(w.0);
    }

    fn apply_standard_filtering(&mut self, filtering: &IdFiltering) {
        let regs = self.reg.block();
        match *filtering {
            IdFiltering::RejectAll => {
                reg::modify(&regs.gfc, |v| {
                    let mut w = Gfc(v);
                    w.set_rrfs(true);
                    w.set_anfs(NonMatchingPolicy::Reject as u8);
                    w.0
                });
                regs.sidfc.set(0);
                self.standard_filters = MessageRamRegion::empty();
            }
            IdFiltering::Filtered {
                non_matching,
                list_address,
                list_size,
            } => {
                reg::modify(&regs.gfc, |v| {
                    let mut w = Gfc(v);
                    w.set_anfs(non_matching as u8);
                    w.0
                });
                let mut w = Sidfc(0);
                w.set_flssa(ram_offset(list_address));
                w.set_lss(list_size);
                regs.sidfc.set(w.0);
                self.standard_filters =
                    MessageRamRegion::new(list_address, STANDARD_FILTER_BYTES, list_size);
            }
        }
    }

    fn apply_extended_filtering(&mut self, filtering: &IdFiltering) {
        let regs = self.reg.block();
        match *filtering {
            IdFiltering::RejectAll => {
                reg::modify(&regs.gfc, |v| {
                    let mut w = Gfc(v);
                    w.set_rrfe(true);
                    w.set_anfe(NonMatchingPolicy::Reject as u8);
                    w.0
                });
                regs.xidfc.set(0);
                self.extended_filters = MessageRamRegion::empty();
            }
            IdFiltering::Filtered {
                non_matching,
                list_address,
                list_size,
            } => {
                reg::modify(&regs.gfc, |v| {
                    let mut w = Gfc(v);
                    w.set_anfe(non_matching as u8);
                    w.0
                });
                let mut w = Xidfc(0);
                w.set_flesa(ram_offset(list_address));
                w.set_lse(list_size);
                regs.xidfc.set(w.0);
                self.extended_filters =
                    MessageRamRegion::new(list_address, EXTENDED_FILTER_BYTES, list_size);
            }
        }
    }

    fn apply_rx_sections(&mut self, config: &CanConfig) {
        let regs = self.reg.block();
        let mut esc = Rxesc(0);

        self.rx_fifo_0 = program_rx_fifo(&regs.rxf0, config.rx_fifo_0.as_ref());
        if let Some(fifo) = &config.rx_fifo_0 {
            esc.set_f0ds(fifo.element_size.code());
        }
        self.rx_fifo_1 = program_rx_fifo(&regs.rxf1, config.rx_fifo_1.as_ref());
        if let Some(fifo) = &config.rx_fifo_1 {
            esc.set_f1ds(fifo.element_size.code());
        }

        self.rx_buffers = match &config.rx_buffer {
            Some(buffer) => {
                regs.rxbc.set(u32::from(ram_offset(buffer.start_address)));
                esc.set_rbds(buffer.element_size.code());
                MessageRamRegion::new(
                    buffer.start_address,
                    buffer.element_size.element_bytes(),
                    RX_BUFFER_CAPACITY,
                )
            }
            None => {
                regs.rxbc.set(0);
                MessageRamRegion::empty()
            }
        };

        regs.rxesc.set(esc.0);
    }

    fn apply_tx_area(&mut self, config: Option<&TxBufferConfig>) {
        let regs = self.reg.block();
        match config {
            Some(tx) => {
                let mut w = Txbc(0);
                w.set_tbsa(ram_offset(tx.start_address));
                w.set_ndtb(tx.buffer_size);
                w.set_tfqs(tx.queue_size);
                w.set_tfqm(matches!(tx.queue_kind, TxQueueKind::Priority));
                regs.txbc.set(w.0);
                let mut esc = Txesc(0);
                esc.set_tbds(tx.element_size.code());
                regs.txesc.set(esc.0);
                self.tx_area = MessageRamRegion::new(
                    tx.start_address,
                    tx.element_size.element_bytes(),
                    tx.buffer_size + tx.queue_size,
                );
                self.tx_dedicated = tx.buffer_size;
            }
            None => {
                regs.txbc.set(0);
                regs.txesc.set(0);
                self.tx_area = MessageRamRegion::empty();
                self.tx_dedicated = 0;
            }
        }
    }

    fn apply_tx_event_fifo(&mut self, config: Option<&TxEventFifoConfig>) {
        let regs = self.reg.block();
        self.tx_event_fifo = match config {
            Some(fifo) => {
                let mut w = Txefc(0);
                w.set_efsa(ram_offset(fifo.start_address));
                w.set_efs(fifo.size);
                w.set_efwm(fifo.watermark);
                regs.txefc.set(w.0);
                MessageRamRegion::new(fifo.start_address, TX_EVENT_ELEMENT_BYTES, fifo.size)
            }
            None => {
                regs.txefc.set(0);
                MessageRamRegion::empty()
            }
        };
    }

    fn apply_interrupts(&mut self, config: &CanConfig) {
        let regs = self.registers();
        let mut enable = 0_u32;
        let mut line_select = 0_u32;
        for int in Interrupt::ALL {
            let bit = u32::from(int);
            let routing = config.interrupts[int];
            if routing.enabled {
                enable |= bit;
            }
            if matches!(routing.line, InterruptLine::Line1) {
                line_select |= bit;
            }
        }
        // Clear stale flags before unmasking anything.
        regs.ir.set(interrupt::IMPLEMENTED);
        regs.ie.set(enable);
        regs.ils.set(line_select);
        let mut ile = Ile(0);
        ile.set_eint0(config.interrupt_line_0_enabled);
        ile.set_eint1(config.interrupt_line_1_enabled);
        regs.ile.set(ile.0);
        // Per-buffer sub-interrupts are armed when elements are submitted.
        regs.txbtie.set(0);
        regs.txbcie.set(0);
    }

    fn read_nominal_timing(&self) -> BitTiming {
        let w = Nbtp(self.registers().nbtp.get());
        BitTiming {
            prescaler: w.nbrp(),
            sync_jump_width: w.nsjw(),
            segment_before_sample_point: w.ntseg1(),
            segment_after_sample_point: w.ntseg2(),
        }
    }

    fn read_data_timing(&self) -> BitTiming {
        let w = Dbtp(self.registers().dbtp.get());
        BitTiming {
            prescaler: u16::from(w.dbrp()),
            sync_jump_width: w.dsjw(),
            segment_before_sample_point: w.dtseg1(),
            segment_after_sample_point: w.dtseg2(),
        }
    }

    fn read_delay_compensation(&self) -> TransmitterDelayCompensation {
        let regs = self.registers();
        let tdcr = Tdcr(regs.tdcr.get());
        TransmitterDelayCompensation {
            enabled: Dbtp(regs.dbtp.get()).tdc(),
            filter: tdcr.tdcf(),
            offset: tdcr.tdco(),
        }
    }

    fn read_timestamp(&self) -> TimestampConfig {
        let w = Tscc(self.registers().tscc.get());
        TimestampConfig {
            clock: match w.tss() {
                1 => TimestampClock::Internal,
                2 => TimestampClock::External,
                _ => TimestampClock::Disabled,
            },
            prescaler: w.tcp(),
        }
    }

    fn read_timeout(&self) -> TimeoutConfig {
        let w = Tocc(self.registers().tocc.get());
        TimeoutConfig {
            enabled: w.etoc(),
            kind: match w.tos() {
                1 => TimeoutKind::TxEventFifo,
                2 => TimeoutKind::RxFifo0,
                3 => TimeoutKind::RxFifo1,
                _ => TimeoutKind::Continuous,
            },
            period: w.top(),
        }
    }

    fn read_standard_filtering(&self) -> IdFiltering {
        if self.standard_filters.is_configured() {
            IdFiltering::Filtered {
                non_matching: non_matching_policy(Gfc(self.registers().gfc.get()).anfs()),
                list_address: self.standard_filters.address(),
                list_size: self.standard_filters.count(),
            }
        } else {
            IdFiltering::RejectAll
        }
    }

    fn read_extended_filtering(&self) -> IdFiltering {
        if self.extended_filters.is_configured() {
            IdFiltering::Filtered {
                non_matching: non_matching_policy(Gfc(self.registers().gfc.get()).anfe()),
                list_address: self.extended_filters.address(),
                list_size: self.extended_filters.count(),
            }
        } else {
            IdFiltering::RejectAll
        }
    }

    fn read_rx_buffer(&self) -> Option<RxBufferConfig> {
        if !self.rx_buffers.is_configured() {
            return None;
        }
        Some(RxBufferConfig {
            start_address: self.rx_buffers.address(),
            element_size: ElementSize::from_element_bytes(self.rx_buffers.element_bytes())?,
        })
    }

    fn read_tx_area(&self) -> Option<TxBufferConfig> {
        if !self.tx_area.is_configured() {
            return None;
        }
        let w = Txbc(self.registers().txbc.get());
        Some(TxBufferConfig {
            start_address: self.tx_area.address(),
            buffer_size: self.tx_dedicated,
            queue_size: self.tx_area.count() - self.tx_dedicated,
            queue_kind: if w.tfqm() {
                TxQueueKind::Priority
            } else {
                TxQueueKind::Fifo
            },
            element_size: ElementSize::from_element_bytes(self.tx_area.element_bytes())?,
        })
    }

    fn read_tx_event_fifo(&self) -> Option<TxEventFifoConfig> {
        if !self.tx_event_fifo.is_configured() {
            return None;
        }
        let w = Txefc(self.registers().txefc.get());
        Some(TxEventFifoConfig {
            start_address: self.tx_event_fifo.address(),
            size: self.tx_event_fifo.count(),
            watermark: w.efwm(),
        })
    }

    fn read_interrupts(&self) -> crate::interrupt::InterruptRouting {
        let regs = self.registers();
        let enable = regs.ie.get();
        let line_select = regs.ils.get();
        let mut routing = crate::interrupt::InterruptRouting::default();
        for int in Interrupt::ALL {
            let bit = u32::from(int);
            routing[int] = InterruptConfig {
                enabled: enable & bit != 0,
                line: if line_select & bit != 0 {
                    InterruptLine::Line1
                } else {
                    InterruptLine::Line0
                },
            };
        }
        routing
    }
}

fn non_matching_policy(bits: u8) -> NonMatchingPolicy {
    match bits {
        0 => NonMatchingPolicy::StoreFifo0,
        1 => NonMatchingPolicy::StoreFifo1,
        _ => NonMatchingPolicy::Reject,
    }
}

fn program_rx_fifo(regs: &RxFifoRegs, config: Option<&RxFifoConfig>) -> MessageRamRegion {
    match config {
        Some(fifo) => {
            let mut w = Rxfc(0);
            w.set_fsa(ram_offset(fifo.start_address));
            w.set_fs(fifo.size);
            w.set_fwm(fifo.watermark);
            w.set_fom(matches!(fifo.mode, RxFifoOperationMode::Overwrite));
            regs.c.set(w.0);
            MessageRamRegion::new(
                fifo.start_address,
                fifo.element_size.element_bytes(),
                fifo.size,
            )
        }
        None => {
            regs.c.set(0);
            MessageRamRegion::empty()
        }
    }
}

fn read_rx_fifo(region: &MessageRamRegion, regs: &RxFifoRegs) -> Option<RxFifoConfig> {
    if !region.is_configured() {
        return None;
    }
    let w = Rxfc(regs.c.get());
    Some(RxFifoConfig {
        start_address: region.address(),
        size: region.count(),
        watermark: w.fwm(),
        mode: if w.fom() {
            RxFifoOperationMode::Overwrite
        } else {
            RxFifoOperationMode::Blocking
        },
        element_size: ElementSize::from_element_bytes(region.element_bytes())?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::cell::Cell;
    use core::mem::MaybeUninit;
    use vcell::VolatileCell;

    /// Register block plus chip configuration word living in plain memory
    pub(crate) struct MockController {
        pub block: RegisterBlock,
        pub chip_cfg: VolatileCell<u32>,
    }

    impl MockController {
        pub fn new() -> Self {
            Self {
                // Every field is a plain word, so all-zero is the hardware
                // reset lookalike.
                block: unsafe { MaybeUninit::zeroed().assume_init() },
                chip_cfg: VolatileCell::new(0),
            }
        }

        pub fn handle(&self) -> Mcan {
            let reg = unsafe {
                Registers::new(
                    &self.block as *const RegisterBlock as *const (),
                    &self.chip_cfg as *const VolatileCell<u32> as *const (),
                )
            };
            Mcan::new(reg)
        }
    }

    pub(crate) fn full_config(ram: &mut [u32]) -> CanConfig {
        let base = ram.as_mut_ptr();
        let mut config = CanConfig::new(base);
        // Carve the RAM front to back the way a linker script would.
        config.standard_filtering = IdFiltering::Filtered {
            non_matching: NonMatchingPolicy::StoreFifo0,
            list_address: base,
            list_size: 8,
        };
        config.extended_filtering = IdFiltering::Filtered {
            non_matching: NonMatchingPolicy::Reject,
            list_address: ram[8..].as_mut_ptr(),
            list_size: 4,
        };
        config.rx_fifo_0 = Some(RxFifoConfig {
            start_address: ram[16..].as_mut_ptr(),
            size: 4,
            watermark: 2,
            mode: RxFifoOperationMode::Blocking,
            element_size: ElementSize::Bytes8,
        });
        config.rx_fifo_1 = Some(RxFifoConfig {
            start_address: ram[32..].as_mut_ptr(),
            size: 2,
            watermark: 0,
            mode: RxFifoOperationMode::Overwrite,
            element_size: ElementSize::Bytes64,
        });
        config.tx_buffer = Some(TxBufferConfig {
            start_address: ram[80..].as_mut_ptr(),
            buffer_size: 2,
            queue_size: 4,
            queue_kind: TxQueueKind::Fifo,
            element_size: ElementSize::Bytes8,
        });
        config.tx_event_fifo = Some(TxEventFifoConfig {
            start_address: ram[104..].as_mut_ptr(),
            size: 4,
            watermark: 1,
        });
        config.rx_buffer = Some(RxBufferConfig {
            start_address: ram[112..].as_mut_ptr(),
            element_size: ElementSize::Bytes16,
        });
        config.interrupts.enable(
            Interrupt::RxFifo0NewMessage,
            InterruptLine::Line0,
        );
        config
            .interrupts
            .enable(Interrupt::BusOff, InterruptLine::Line1);
        config.interrupt_line_0_enabled = true;
        config.interrupt_line_1_enabled = true;
        config
    }

    #[test]
    fn wait_for_ack_polls_exactly_limit_times() {
        let polls = Cell::new(0_u32);
        let acked = wait_for_ack(
            || {
                polls.set(polls.get() + 1);
                false
            },
            100,
        );
        assert!(!acked);
        assert_eq!(polls.get(), 100);

        let polls = Cell::new(0_u32);
        let acked = wait_for_ack(
            || {
                polls.set(polls.get() + 1);
                polls.get() == 3
            },
            100,
        );
        assert!(acked);
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn oversized_tx_area_fails_before_any_register_write() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        let mut config = full_config(&mut ram);
        if let Some(tx) = &mut config.tx_buffer {
            tx.buffer_size = 20;
            tx.queue_size = 16;
        }
        assert_eq!(can.set_config(&config, 100), Err(Error::IndexOutOfRange));
        assert_eq!(mock.block.cccr.get(), 0);
        assert_eq!(mock.chip_cfg.get(), 0);
    }

    #[test]
    fn clock_stop_timeout_skips_region_programming() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        let mut config = full_config(&mut ram);
        config.mode = Mode::PowerDown;
        // The mock never acknowledges the clock stop request.
        assert_eq!(
            can.set_config(&config, 100),
            Err(Error::ClockStopRequestTimeout)
        );
        assert_eq!(mock.block.rxf0.c.get(), 0);
        assert_eq!(mock.block.txbc.get(), 0);
        assert!(!can.rx_fifo_0.is_configured());
    }

    #[test]
    fn init_ack_timeout_skips_region_programming() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        // A zero poll budget behaves like a controller that never
        // acknowledges the initialization request.
        assert_eq!(
            can.set_config(&full_config(&mut ram), 0),
            Err(Error::InitializationStartTimeout)
        );
        assert_eq!(mock.block.rxf0.c.get(), 0);
        assert_eq!(mock.block.txbc.get(), 0);
        assert_eq!(mock.block.sidfc.get(), 0);
        assert!(!can.rx_fifo_0.is_configured());
        assert!(!can.tx_area.is_configured());
    }

    #[test]
    fn requesting_the_invalid_mode_is_rejected() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        let mut config = full_config(&mut ram);
        config.mode = Mode::Invalid;
        assert_eq!(can.set_config(&config, 100), Err(Error::ModeInvalid));
        // The handshake ran, so configuration access is granted.
        assert!(Cccr(mock.block.cccr.get()).cce());
    }

    #[test]
    fn set_config_programs_regions_and_leaves_initialization() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        let config = full_config(&mut ram);
        can.set_config(&config, 100).unwrap();

        let cccr = Cccr(mock.block.cccr.get());
        assert!(!cccr.init());
        assert!(!cccr.cce());
        assert_eq!(Rxfc(mock.block.rxf0.c.get()).fs(), 4);
        assert_eq!(Rxfc(mock.block.rxf1.c.get()).fs(), 2);
        assert!(Rxfc(mock.block.rxf1.c.get()).fom());
        let rxesc = Rxesc(mock.block.rxesc.get());
        assert_eq!(rxesc.f0ds(), 0);
        assert_eq!(rxesc.f1ds(), 7);
        assert_eq!(rxesc.rbds(), 2);
        let txbc = Txbc(mock.block.txbc.get());
        assert_eq!(txbc.ndtb(), 2);
        assert_eq!(txbc.tfqs(), 4);
        assert_eq!(Txefc(mock.block.txefc.get()).efs(), 4);
        assert_eq!(mock.block.xidam.get(), EXTENDED_ID_MASK_ALL);
        assert_eq!(mock.block.gfc.get(), {
            let mut w = Gfc(0);
            w.set_anfe(NonMatchingPolicy::Reject as u8);
            w.set_anfs(NonMatchingPolicy::StoreFifo0 as u8);
            w.0
        });

        // The queue sits right behind the two dedicated elements.
        assert_eq!(can.tx_area.count(), 6);
        assert_eq!(can.tx_dedicated, 2);
        assert_eq!(can.tx_area.element_ptr(2), ram[88..].as_mut_ptr());
    }

    #[test]
    fn interrupt_routing_is_programmed_per_source() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        can.set_config(&full_config(&mut ram), 100).unwrap();

        let rf0n = u32::from(Interrupt::RxFifo0NewMessage);
        let bo = u32::from(Interrupt::BusOff);
        assert_eq!(mock.block.ie.get(), rf0n | bo);
        assert_eq!(mock.block.ils.get(), bo);
        let ile = Ile(mock.block.ile.get());
        assert!(ile.eint0());
        assert!(ile.eint1());
        assert_eq!(mock.block.txbtie.get(), 0);
    }

    #[test]
    fn get_config_reads_back_what_was_programmed() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        let mut config = full_config(&mut ram);
        config.fd_enabled = true;
        config.data_timing = BitTiming {
            prescaler: 1,
            sync_jump_width: 2,
            segment_before_sample_point: 7,
            segment_after_sample_point: 2,
        };
        config.delay_compensation = TransmitterDelayCompensation {
            enabled: true,
            filter: 3,
            offset: 11,
        };
        config.timestamp = TimestampConfig {
            clock: TimestampClock::Internal,
            prescaler: 9,
        };
        config.timeout = TimeoutConfig {
            enabled: true,
            kind: TimeoutKind::RxFifo1,
            period: 0xBEEF,
        };
        config.watchdog = 42;
        can.set_config(&config, 100).unwrap();

        let read = can.get_config();
        assert_eq!(read.mode, Mode::Normal);
        assert!(read.fd_enabled);
        assert_eq!(read.nominal_timing, config.nominal_timing);
        assert_eq!(read.data_timing, config.data_timing);
        assert_eq!(read.delay_compensation, config.delay_compensation);
        assert_eq!(read.timestamp, config.timestamp);
        assert_eq!(read.timeout, config.timeout);
        assert_eq!(read.watchdog, 42);
        assert_eq!(read.message_ram_base, ram.as_mut_ptr());

        let fifo = read.rx_fifo_0.unwrap();
        assert_eq!(fifo.size, 4);
        assert_eq!(fifo.watermark, 2);
        assert_eq!(fifo.element_size, ElementSize::Bytes8);
        let tx = read.tx_buffer.unwrap();
        assert_eq!(tx.buffer_size, 2);
        assert_eq!(tx.queue_size, 4);
        assert_eq!(tx.element_size, ElementSize::Bytes8);
        match read.standard_filtering {
            IdFiltering::Filtered {
                non_matching,
                list_size,
                ..
            } => {
                assert_eq!(non_matching, NonMatchingPolicy::StoreFifo0);
                assert_eq!(list_size, 8);
            }
            IdFiltering::RejectAll => panic!("standard filtering lost"),
        }
        assert!(read.interrupts[Interrupt::BusOff].enabled);
        assert_eq!(read.interrupts[Interrupt::BusOff].line, InterruptLine::Line1);
        assert!(!read.interrupts[Interrupt::Watchdog].enabled);
        assert!(read.interrupt_line_0_enabled);
        assert!(read.interrupt_line_1_enabled);
    }

    #[test]
    fn disabled_regions_read_back_as_absent() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        let mut config = full_config(&mut ram);
        config.rx_fifo_1 = None;
        config.tx_event_fifo = None;
        config.extended_filtering = IdFiltering::RejectAll;
        can.set_config(&config, 100).unwrap();

        let read = can.get_config();
        assert!(read.rx_fifo_1.is_none());
        assert!(read.tx_event_fifo.is_none());
        assert!(matches!(read.extended_filtering, IdFiltering::RejectAll));
        assert!(Gfc(mock.block.gfc.get()).rrfe());
        assert_eq!(mock.block.rxf1.c.get(), 0);
        assert_eq!(mock.block.txefc.get(), 0);
    }

    #[test]
    fn message_ram_base_lands_in_the_chip_configuration() {
        let mock = MockController::new();
        let mut can = mock.handle();
        let mut ram = [0_u32; 128];
        mock.chip_cfg.set(0x0000_1234);
        can.set_config(&full_config(&mut ram), 100).unwrap();
        let msb = ((ram.as_ptr() as usize) >> 16) as u32 & 0xFFFF;
        assert_eq!(mock.chip_cfg.get(), (msb << 16) | 0x1234);
    }

    #[test]
    fn mode_readback_flags_inconsistent_control_bits() {
        let mock = MockController::new();
        let can = mock.handle();
        assert_eq!(can.mode(), Mode::Normal);

        // Initialization without a completed clock stop request
        let mut w = Cccr(0);
        w.set_init(true);
        mock.block.cccr.set(w.0);
        assert_eq!(can.mode(), Mode::Invalid);

        // Test mode without loopback
        let mut w = Cccr(0);
        w.set_test_mode(true);
        mock.block.cccr.set(w.0);
        assert_eq!(can.mode(), Mode::Invalid);

        let mut w = Cccr(0);
        w.set_mon(true);
        mock.block.cccr.set(w.0);
        assert_eq!(can.mode(), Mode::BusMonitoring);

        let mut w = Cccr(0);
        w.set_dar(true);
        mock.block.cccr.set(w.0);
        assert_eq!(can.mode(), Mode::AutomaticRetransmissionDisabled);
    }
}
