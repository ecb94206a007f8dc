// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Controller Area Network (CAN) abstraction layer.
//!
//! - `CanBus` wraps a HAL `can::Can` instance in `bxcan::Can`.
//! - Implements [`Transport`] for CAN1 with non-blocking receive and fire-and-forget transmit.

use bxcan::{self, Frame, OverrunError, TransmitStatus};
use stm32f7xx_hal::{can as hal_can, pac};

use crate::transport::{ErrorCounters, Transport};

/// Error type for `CanBus` operations.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// All transmit mailboxes are occupied by frames of equal or higher priority.
    TxBusy,
    /// The receive FIFO overflowed and at least one frame was lost.
    Overrun,
}

impl From<OverrunError> for Error {
    fn from(_: OverrunError) -> Self {
        Error::Overrun
    }
}

/// Wrapper around a bxcan CAN instance built from a HAL CAN peripheral.
pub struct CanBus<I>
where
    hal_can::Can<I>: bxcan::Instance,
{
    can: bxcan::Can<hal_can::Can<I>>,
    /// Frame pulled from the FIFO by `frame_available` and not yet handed out.
    pending: Option<Frame>,
}

impl<I> CanBus<I>
where
    hal_can::Can<I>: bxcan::Instance,
{
    /// Create and enable a bxcan instance from a HAL CAN peripheral.
    ///
    /// * `hal_can` – the HAL CAN wrapper
    /// * `btr` – value for the CAN_BTR register (bit timing), see `config::CAN_BIT_TIMING`
    /// * `loopback` – enable internal loopback
    /// * `silent` – enable silent mode
    pub fn new(hal_can: hal_can::Can<I>, btr: u32, loopback: bool, silent: bool) -> Self {
        let can = bxcan::Can::builder(hal_can)
            .set_bit_timing(btr)
            .set_loopback(loopback)
            .set_silent(silent)
            .enable();

        Self { can, pending: None }
    }

    /// Queue a frame without waiting for a free mailbox.
    pub fn try_transmit(&mut self, frame: &Frame) -> Result<TransmitStatus, Error> {
        match self.can.transmit(frame) {
            Ok(status) => Ok(status),
            Err(nb::Error::WouldBlock) => Err(Error::TxBusy),
            Err(nb::Error::Other(never)) => match never {},
        }
    }

    /// Pull one frame from the receive FIFO if there is one.
    pub fn try_receive(&mut self) -> Result<Option<Frame>, Error> {
        match self.can.receive() {
            Ok(frame) => Ok(Some(frame)),
            Err(nb::Error::WouldBlock) => Ok(None),
            Err(nb::Error::Other(e)) => Err(e.into()),
        }
    }
}

impl CanBus<pac::CAN1> {
    /// Accept every frame into FIFO0. Application-level filtering happens on the signature byte.
    pub fn accept_all(&mut self) {
        let regs = unsafe { &*pac::CAN1::ptr() };

        // Enter filter init mode
        regs.fmr.modify(|_, w| w.finit().set_bit());

        // Bank 0: 32-bit mask mode, FIFO0, all mask bits don't-care
        regs.fa1r.modify(|r, w| unsafe { w.bits(r.bits() & !1) });
        regs.fs1r.modify(|r, w| unsafe { w.bits(r.bits() | 1) });
        regs.fm1r.modify(|r, w| unsafe { w.bits(r.bits() & !1) });
        regs.ffa1r.modify(|r, w| unsafe { w.bits(r.bits() & !1) });
        regs.fb[0].fr1.write(|w| unsafe { w.bits(0) });
        regs.fb[0].fr2.write(|w| unsafe { w.bits(0) });
        regs.fa1r.modify(|r, w| unsafe { w.bits(r.bits() | 1) });

        // Leave filter init mode (FINIT = 0)
        regs.fmr.modify(|_, w| w.finit().clear_bit());
    }
}

impl Transport for CanBus<pac::CAN1> {
    fn frame_available(&mut self) -> bool {
        if self.pending.is_none() {
            match self.try_receive() {
                Ok(frame) => self.pending = frame,
                Err(e) => warn!("can rx: {}", e),
            }
        }
        self.pending.is_some()
    }

    fn receive_frame(&mut self) -> Option<Frame> {
        if let Some(frame) = self.pending.take() {
            return Some(frame);
        }
        match self.try_receive() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("can rx: {}", e);
                None
            }
        }
    }

    fn send_frame(&mut self, frame: &Frame) {
        if let Err(e) = self.try_transmit(frame) {
            warn!("can tx dropped: {}", e);
        }
    }

    fn read_error_counters(&self) -> ErrorCounters {
        let regs = unsafe { &*pac::CAN1::ptr() };
        let esr = regs.esr.read();
        ErrorCounters {
            rx: esr.rec().bits(),
            tx: esr.tec().bits(),
        }
    }
}
