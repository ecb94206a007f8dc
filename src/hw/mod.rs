// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! STM32F7 peripheral bindings. Only built for the bare-metal target.

pub mod adc;
pub mod can;
pub mod led;
pub mod pins;
pub mod usart;

pub use adc::TriggeredAdc;
pub use can::CanBus;
pub use led::Led;
pub use pins::BoardPins;
pub use usart::Usart;
