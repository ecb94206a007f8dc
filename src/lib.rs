// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # MDE22 Firmware
//!
//! Sensor acquisition and fleet telemetry for the MDE22 motor-controller node, written in Rust,
//! targeting an STM32F777 MCU on the shared CAN bus.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`acquisition`] | Timer-triggered round-robin sampling of battery voltage, position, current |
//! | [`protocol`] | CAN application protocol: periodic frames, dispatch, heartbeat loss |
//! | [`state`] | Application state and error flags |
//! | [`transport`] | CAN transport seam used by [`protocol`] |
//! | [`config`] | Compile-time configuration |
//! | `hw` | MCU-level wrappers around ADC, timers, CAN, USART (target only) |
//!
//! ## Getting Started
//!
//! Run the host-side unit tests:
//!
//! ```bash
//! cargo test --lib
//! ```
//!
//! Flash the board:
//!
//! ```bash
//! cargo run --release --target thumbv7em-none-eabihf
//! ```
//!
//! Verbose builds log over RTT with `--features defmt`.
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod acquisition;
pub mod config;
pub mod protocol;
pub mod state;
pub mod transport;

#[cfg(target_os = "none")]
pub mod hw;
