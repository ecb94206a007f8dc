// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Fleet CAN application protocol.

pub mod app;
pub mod messages;
pub mod schedule;

pub use app::{CanApp, Dispatch};
pub use messages::{FrameError, PeerState};
