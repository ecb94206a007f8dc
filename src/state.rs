// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Application state and error flags.
//!
//! The CAN task only needs three things from the rest of the node: the current state, the
//! aggregate error byte, and a way to report a fault. Those are captured by [`NodeState`];
//! [`StateMachine`] is the implementation the firmware runs with.

bitflags::bitflags! {
    /// Aggregate error byte reported in every state frame.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ErrorFlags: u8 {
        /// No frame from the peer controller for too many ticks.
        const NO_CANBUS  = 1 << 0;
        /// The peer controller reported a nonzero error byte.
        const PEER_ERROR = 1 << 1;
    }
}

/// Node operating state, sent on the bus as its `u8` discriminant.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AppState {
    Initializing = 0,
    Idle = 1,
    Running = 2,
    Error = 3,
    Reset = 4,
}

impl AppState {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Faults detected by the CAN application layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Peer state frame carried a nonzero error byte.
    PeerError { flags: u8 },
    /// Heartbeat-loss counter reached its threshold.
    BusSilence,
}

impl Fault {
    /// Error flag latched when this fault is raised.
    pub fn flag(self) -> ErrorFlags {
        match self {
            Fault::PeerError { .. } => ErrorFlags::PEER_ERROR,
            Fault::BusSilence => ErrorFlags::NO_CANBUS,
        }
    }
}

/// State/error collaborator consumed by the CAN task.
pub trait NodeState {
    fn state(&self) -> AppState;
    fn error_flags(&self) -> ErrorFlags;
    /// Latch the fault and enter the error state.
    fn raise(&mut self, fault: Fault);
}

/// Rejected state transition.
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: AppState,
    pub to: AppState,
}

/// Node state machine.
///
/// `Initializing -> Idle -> Running`, with any raised fault forcing `Error`. Leaving `Error`
/// requires [`StateMachine::reset`].
pub struct StateMachine {
    state: AppState,
    flags: ErrorFlags,
    last_fault: Option<Fault>,
}

impl StateMachine {
    pub const fn new() -> Self {
        Self {
            state: AppState::Initializing,
            flags: ErrorFlags::empty(),
            last_fault: None,
        }
    }

    fn transition(&mut self, from: AppState, to: AppState) -> Result<(), InvalidTransition> {
        if self.state != from {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Peripherals are up.
    pub fn initialized(&mut self) -> Result<(), InvalidTransition> {
        self.transition(AppState::Initializing, AppState::Idle)
    }

    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(AppState::Idle, AppState::Running)
    }

    /// Clear all latched errors and start over from `Initializing`.
    pub fn reset(&mut self) {
        self.state = AppState::Initializing;
        self.flags = ErrorFlags::empty();
        self.last_fault = None;
    }

    #[inline]
    pub fn last_fault(&self) -> Option<Fault> {
        self.last_fault
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeState for StateMachine {
    fn state(&self) -> AppState {
        self.state
    }

    fn error_flags(&self) -> ErrorFlags {
        self.flags
    }

    fn raise(&mut self, fault: Fault) {
        self.flags |= fault.flag();
        self.last_fault = Some(fault);
        self.state = AppState::Error;
    }
}
