// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin definitions for the STM32F777 on the MDE22 board.

use stm32f7xx_hal::{
    gpio::{gpioa, gpiod, Alternate, Analog, Output, PushPull},
    pac,
    prelude::*,
};

/// All board pins. Construct this once at startup using:
///
/// ```ignore
/// let pins = BoardPins::new(dp.GPIOA, dp.GPIOD);
/// ```
pub struct BoardPins {
    pub leds: LedPins,
    pub usart1: Usart1Pins,
    pub can1: Can1Pins,
    pub sense: SensePins,
}

pub struct LedPins {
    pub red: gpiod::PD8<Output<PushPull>>,
    pub green: gpiod::PD10<Output<PushPull>>,
}

pub struct Usart1Pins {
    pub tx: gpioa::PA9<Alternate<7>>,
    pub rx: gpioa::PA10<Alternate<7>>,
}

/// CAN1 bus pins
pub struct Can1Pins {
    pub tx: gpioa::PA12<Alternate<9>>,
    pub rx: gpioa::PA11<Alternate<9>>,
}

/// Analog sense inputs, one per acquisition channel.
pub struct SensePins {
    pub battery_voltage: gpioa::PA1<Analog>, // ADC123_IN1
    pub position: gpioa::PA2<Analog>,        // ADC123_IN2
    pub battery_current: gpioa::PA3<Analog>, // ADC123_IN3
}

impl BoardPins {
    /// Create all named pins from raw GPIO peripherals.
    pub fn new(gpioa: pac::GPIOA, gpiod: pac::GPIOD) -> Self {
        let gpioa = gpioa.split();
        let gpiod = gpiod.split();

        Self {
            leds: LedPins {
                red: gpiod.pd8.into_push_pull_output(),
                green: gpiod.pd10.into_push_pull_output(),
            },

            usart1: Usart1Pins {
                tx: gpioa.pa9.into_alternate::<7>(),
                rx: gpioa.pa10.into_alternate::<7>(),
            },

            can1: Can1Pins {
                tx: gpioa.pa12.into_alternate::<9>(),
                rx: gpioa.pa11.into_alternate::<9>().internal_pull_up(true),
            },

            sense: SensePins {
                battery_voltage: gpioa.pa1.into_analog(),
                position: gpioa.pa2.into_analog(),
                battery_current: gpioa.pa3.into_analog(),
            },
        }
    }
}
