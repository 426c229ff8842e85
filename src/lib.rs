#![no_std]
#![warn(missing_docs)]
//! # MCAN driver for SAMV71-class MCUs
//!
//! ## Overview
//! This crate drives the MCAN CAN/CAN FD controller: the initialization
//! handshake, the message RAM layout and the element traffic through it.
//!
//! It provides the following features:
//!
//! - classical CAN and CAN FD with bit rate switching support
//! - message transmission using dedicated buffers and a FIFO/priority queue
//! - message reception using dedicated buffers and two FIFOs
//! - Tx event FIFO readout with message markers
//! - standard and extended acceptance filter lists
//! - per-source interrupt enabling, line routing and status aggregation
//!
//! The controller and the CPU share a RAM region (the message RAM) holding
//! the element storage. The driver never caches hardware-owned state: put
//! and get indices, fill levels and flags are read from the status registers
//! on every operation, only the RAM layout derived from the configuration is
//! recorded on the driver side.
//!
//! A controller instance is described explicitly by its addresses, so
//! several instances can be driven independently and the whole driver can be
//! exercised against plain memory:
//!
//! ```no_run
//! use samv71_mcan::bus::Mcan;
//! use samv71_mcan::config::{CanConfig, RxFifoConfig, RxFifoOperationMode};
//! use samv71_mcan::messageram::ElementSize;
//! use samv71_mcan::reg::Registers;
//!
//! const MCAN1: *const () = 0x40034000 as *const ();
//! const CCFG_CAN1: *const () = 0x40088114 as *const ();
//! const MESSAGE_RAM: *mut u32 = 0x2045_0000 as *mut u32;
//!
//! // Safety: the addresses are the MCAN1 instance of this MCU and nothing
//! // else drives it.
//! let registers = unsafe { Registers::new(MCAN1, CCFG_CAN1) };
//! let mut can = Mcan::new(registers);
//!
//! let mut config = CanConfig::new(MESSAGE_RAM);
//! config.rx_fifo_0 = Some(RxFifoConfig {
//!     start_address: MESSAGE_RAM,
//!     size: 16,
//!     watermark: 0,
//!     mode: RxFifoOperationMode::Blocking,
//!     element_size: ElementSize::Bytes64,
//! });
//! can.set_config(&config, 100)?;
//!
//! # Ok::<(), samv71_mcan::Error>(())
//! ```

pub mod bus;
pub mod config;
pub mod filter;
pub mod interrupt;
pub mod message;
pub mod messageram;
pub mod reg;
pub mod rx_dedicated_buffers;
pub mod rx_fifo;
pub mod tx_buffers;
pub mod tx_event_fifo;

pub use bus::Mcan;
pub use embedded_can;

/// Things that can go wrong while configuring or moving messages
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The addressed Rx FIFO has no message RAM configured
    InvalidRxFifoId,
    /// Nothing to read from the addressed Rx FIFO
    RxFifoEmpty,
    /// No free slot in the Tx queue
    TxFifoFull,
    /// Nothing to read from the Tx event FIFO
    TxEventFifoEmpty,
    /// A buffer or filter index lies outside the configured region
    IndexOutOfRange,
    /// A data length without DLC encoding or exceeding the element size
    ElementSizeInvalid,
    /// The controller did not acknowledge entering initialization
    InitializationStartTimeout,
    /// The controller did not acknowledge the clock stop request
    ClockStopRequestTimeout,
    /// The requested operating mode cannot be entered
    ModeInvalid,
}
