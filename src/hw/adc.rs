// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Timer-triggered ADC1 using direct PAC register access.
//!
//! TIM2 runs free and pulses TRGO on every update event; each pulse starts one conversion on
//! ADC1. The end-of-conversion interrupt hands the result to [`Acquisition`] and programs the
//! channel it returns, so the next trigger samples the next input in the round-robin.
//!
//! Example:
//! ```ignore
//! let adc = TriggeredAdc::configure(dp.ADC1, dp.TIM2, ADC_RESOLUTION, &ACQUISITION);
//!
//! #[interrupt]
//! fn ADC() {
//!     adc.on_interrupt(&ACQUISITION);
//! }
//! ```

use stm32f7xx_hal::pac;

use crate::acquisition::{Acquisition, Channel};
use crate::config::{Resolution, ADC_TIMER_COMPARE, ADC_TIMER_PRESCALER};

/// ADC_CR2 EXTSEL value for TIM2 TRGO.
const EXTSEL_TIM2_TRGO: u8 = 0b1011;
/// ADC_CR2 EXTEN value for rising-edge triggering.
const EXTEN_RISING: u8 = 0b01;
/// TIMx_CR2 MMS value routing the update event to TRGO.
const MMS_UPDATE: u8 = 0b010;

/// ADC1 retriggered by TIM2.
pub struct TriggeredAdc {
    adc: pac::ADC1,
    // Owned for as long as the trigger runs
    _tim: pac::TIM2,
}

impl TriggeredAdc {
    /// Enable clocks, arm the trigger timer and start converting channel 1.
    ///
    /// The end-of-conversion interrupt is enabled in the peripheral but must still be unmasked in
    /// the NVIC by the caller.
    pub fn configure(
        adc: pac::ADC1,
        tim: pac::TIM2,
        resolution: Resolution,
        engine: &Acquisition,
    ) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb2enr.modify(|_, w| w.adc1en().set_bit());
        rcc.apb1enr.modify(|_, w| w.tim2en().set_bit());

        // ADC prescaler: PCLK2 / 4
        let common = unsafe { &*pac::ADC_COMMON::ptr() };
        common.ccr.modify(|_, w| w.adcpre().div4());

        // Power off to configure
        adc.cr2.modify(|_, w| w.adon().clear_bit());

        adc.cr1.modify(|_, w| {
            w.res().bits(resolution.res_bits());
            w.eocie().set_bit();
            w
        });
        adc.cr2.modify(|_, w| {
            w.cont().clear_bit();
            w.align().right();
            w.eocs().set_bit();
            unsafe {
                w.exten().bits(EXTEN_RISING);
                w.extsel().bits(EXTSEL_TIM2_TRGO);
            }
            w
        });

        // Long sample time on the three inputs
        adc.smpr2.modify(|_, w| {
            w.smp1().bits(0b111);
            w.smp2().bits(0b111);
            w.smp3().bits(0b111);
            w
        });

        // Sequence length = 1 conversion, starting on channel 1
        adc.sqr1.modify(|_, w| w.l().bits(0));
        select(&adc, Channel::FIRST);
        engine.restart();

        adc.cr2.modify(|_, w| w.adon().set_bit());

        // Trigger timer: f = clk / (PSC + 1) / (ARR + 1)
        tim.cr1.modify(|_, w| w.cen().clear_bit());
        tim.psc.write(|w| unsafe { w.psc().bits(ADC_TIMER_PRESCALER - 1) });
        tim.arr.write(|w| w.bits(ADC_TIMER_COMPARE));
        tim.cr2.modify(|_, w| unsafe { w.mms().bits(MMS_UPDATE) });
        tim.cnt.write(|w| w.bits(0));
        tim.cr1.modify(|_, w| w.cen().set_bit());

        Self { adc, _tim: tim }
    }

    /// Service the end-of-conversion interrupt.
    ///
    /// Reading the data register clears EOC.
    pub fn on_interrupt(&mut self, engine: &Acquisition) {
        let raw = self.adc.dr.read().data().bits() as u16;
        let active = self.adc.sqr3.read().sq1().bits();

        let next = engine.on_conversion_complete(raw, active);
        select(&self.adc, next);
    }
}

fn select(adc: &pac::adc1::RegisterBlock, channel: Channel) {
    adc.sqr3
        .modify(|_, w| unsafe { w.sq1().bits(channel.index() & 0x1F) });
}
