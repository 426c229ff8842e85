//! CAN bus configuration
//!
//! [`CanConfig`] aggregates everything [`crate::Mcan::set_config`] programs
//! in one sequence: operating mode, bit timing, timestamp/timeout counters,
//! acceptance filtering and the message RAM regions. Regions are optional;
//! a `None` leaves the corresponding hardware region disabled.

use crate::filter::NonMatchingPolicy;
use crate::interrupt::InterruptRouting;
use crate::messageram::ElementSize;

/// Requested operating mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Normal operation
    Normal,
    /// Normal operation without automatic retransmission
    AutomaticRetransmissionDisabled,
    /// Restricted operation (no dominant bits are transmitted)
    Restricted,
    /// Bus monitoring (receive only)
    BusMonitoring,
    /// Clock-stopped low power state
    PowerDown,
    /// Internal loopback for self test
    InternalLoopback,
    /// Readback sentinel for mode bit combinations no request produces
    ///
    /// Cannot be requested; configuring it fails with
    /// [`Error::ModeInvalid`](crate::Error::ModeInvalid).
    Invalid,
}

/// Bit timing for the nominal or data phase
///
/// Values are raw register quantities, each one less than the count of time
/// quanta it selects. Defaults match the hardware reset state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Bit rate prescaler
    pub prescaler: u16,
    /// (Re)synchronization jump width
    pub sync_jump_width: u8,
    /// Time segment before the sample point
    pub segment_before_sample_point: u8,
    /// Time segment after the sample point
    pub segment_after_sample_point: u8,
}

impl Default for BitTiming {
    fn default() -> Self {
        Self {
            prescaler: 0,
            sync_jump_width: 3,
            segment_before_sample_point: 10,
            segment_after_sample_point: 3,
        }
    }
}

/// Transmitter delay compensation for the CAN FD data phase
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitterDelayCompensation {
    /// Enable the compensation
    pub enabled: bool,
    /// Filter window length in clock periods
    pub filter: u8,
    /// Offset in clock periods
    pub offset: u8,
}

/// Clock source of the timestamp counter
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimestampClock {
    /// Counter stays at zero
    #[default]
    Disabled,
    /// Counts CAN bit times, divided by the prescaler
    Internal,
    /// External counter value is captured
    External,
}

/// Timestamp counter configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimestampConfig {
    /// Clock source
    pub clock: TimestampClock,
    /// Prescaler for the internal clock source, `0..=15` meaning 1 to 16
    pub prescaler: u8,
}

/// What restarts the timeout counter
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeoutKind {
    /// Free running, restarted by writing the counter value register
    #[default]
    Continuous,
    /// Restarted when the Tx event FIFO becomes empty
    TxEventFifo,
    /// Restarted when Rx FIFO 0 becomes empty
    RxFifo0,
    /// Restarted when Rx FIFO 1 becomes empty
    RxFifo1,
}

/// Timeout counter configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeoutConfig {
    /// Enable the down counter
    pub enabled: bool,
    /// Restart condition
    pub kind: TimeoutKind,
    /// Start value in CAN bit times
    pub period: u16,
}

/// Acceptance filtering setup for one identifier class
#[derive(Copy, Clone, Debug)]
pub enum IdFiltering {
    /// Reject every frame of this identifier class
    RejectAll,
    /// Run the filter list placed in message RAM
    Filtered {
        /// Where frames matching no list entry go
        non_matching: NonMatchingPolicy,
        /// Start of the filter list in message RAM
        list_address: *mut u32,
        /// Number of filter elements in the list
        list_size: u8,
    },
}

/// Rx FIFO behavior when full
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifoOperationMode {
    /// New frames are discarded while the FIFO is full
    #[default]
    Blocking,
    /// New frames overwrite the oldest entry
    Overwrite,
}

/// One Rx FIFO region
#[derive(Copy, Clone, Debug)]
pub struct RxFifoConfig {
    /// Start of the FIFO in message RAM
    pub start_address: *mut u32,
    /// Number of elements, `1..=64`
    pub size: u8,
    /// Fill level triggering the watermark interrupt, `0` disables it
    pub watermark: u8,
    /// Behavior when full
    pub mode: RxFifoOperationMode,
    /// Data field size of each element
    pub element_size: ElementSize,
}

/// The dedicated Rx buffer region
#[derive(Copy, Clone, Debug)]
pub struct RxBufferConfig {
    /// Start of the buffer area in message RAM
    pub start_address: *mut u32,
    /// Data field size of each buffer
    pub element_size: ElementSize,
}

/// Tx queue ordering
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxQueueKind {
    /// Transmit in push order
    #[default]
    Fifo,
    /// Transmit lowest identifier first
    Priority,
}

/// The Tx buffer area: dedicated buffers followed by the queue
#[derive(Copy, Clone, Debug)]
pub struct TxBufferConfig {
    /// Start of the area in message RAM
    pub start_address: *mut u32,
    /// Number of dedicated buffers
    pub buffer_size: u8,
    /// Number of queue slots
    pub queue_size: u8,
    /// Queue ordering
    pub queue_kind: TxQueueKind,
    /// Data field size of each element
    pub element_size: ElementSize,
}

/// The Tx event FIFO region
#[derive(Copy, Clone, Debug)]
pub struct TxEventFifoConfig {
    /// Start of the FIFO in message RAM
    pub start_address: *mut u32,
    /// Number of 8-byte event elements, `1..=32`
    pub size: u8,
    /// Fill level triggering the watermark interrupt, `0` disables it
    pub watermark: u8,
}

/// Complete controller configuration
#[derive(Clone, Debug)]
pub struct CanConfig {
    /// Base address of the message RAM window
    ///
    /// Its upper address bits are programmed into the chip configuration
    /// register; all region start addresses must fall into the 64 KiB
    /// window this selects.
    pub message_ram_base: *mut u32,
    /// Operating mode to enter once configuration completes
    pub mode: Mode,
    /// Enable CAN FD frame format
    pub fd_enabled: bool,
    /// Bit timing of the nominal phase
    pub nominal_timing: BitTiming,
    /// Bit timing of the CAN FD data phase, programmed only when FD is on
    pub data_timing: BitTiming,
    /// Transmitter delay compensation, programmed only when FD is on
    pub delay_compensation: TransmitterDelayCompensation,
    /// Timestamp counter
    pub timestamp: TimestampConfig,
    /// Timeout counter
    pub timeout: TimeoutConfig,
    /// Standard ID acceptance filtering
    pub standard_filtering: IdFiltering,
    /// Extended ID acceptance filtering
    pub extended_filtering: IdFiltering,
    /// Rx FIFO 0
    pub rx_fifo_0: Option<RxFifoConfig>,
    /// Rx FIFO 1
    pub rx_fifo_1: Option<RxFifoConfig>,
    /// Dedicated Rx buffers
    pub rx_buffer: Option<RxBufferConfig>,
    /// Tx buffers and queue
    pub tx_buffer: Option<TxBufferConfig>,
    /// Tx event FIFO
    pub tx_event_fifo: Option<TxEventFifoConfig>,
    /// Per-interrupt enable and line routing
    pub interrupts: InterruptRouting,
    /// Gate for interrupt line 0 as a whole
    pub interrupt_line_0_enabled: bool,
    /// Gate for interrupt line 1 as a whole
    pub interrupt_line_1_enabled: bool,
    /// Message RAM watchdog counter start value, `0` disables it
    pub watchdog: u8,
}

impl CanConfig {
    /// A disabled-everything configuration for the given message RAM window
    pub fn new(message_ram_base: *mut u32) -> Self {
        Self {
            message_ram_base,
            mode: Mode::Normal,
            fd_enabled: false,
            nominal_timing: BitTiming::default(),
            data_timing: BitTiming::default(),
            delay_compensation: TransmitterDelayCompensation::default(),
            timestamp: TimestampConfig::default(),
            timeout: TimeoutConfig::default(),
            standard_filtering: IdFiltering::RejectAll,
            extended_filtering: IdFiltering::RejectAll,
            rx_fifo_0: None,
            rx_fifo_1: None,
            rx_buffer: None,
            tx_buffer: None,
            tx_event_fifo: None,
            interrupts: InterruptRouting::default(),
            interrupt_line_0_enabled: false,
            interrupt_line_1_enabled: false,
            watchdog: 0,
        }
    }
}
