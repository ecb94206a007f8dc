// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! CAN application task.
//!
//! [`CanApp::tick`] is called at a steady cadence from the foreground loop. Each tick runs, in
//! order:
//!
//! 1. heartbeat accounting, then receive and dispatch of at most one frame;
//! 2. the state frame, when its divider fires;
//! 3. the measurements frame, when its divider fires.
//!
//! ```ignore
//! let mut app = CanApp::new(TelemetryConfig::DEFAULT);
//! loop {
//!     app.tick(&mut bus, &mut node, &ACQUISITION);
//!     delay.delay_ms(TICK_PERIOD_MS);
//! }
//! ```

use bxcan::{Frame, Id};

use crate::acquisition::MeasurementSource;
use crate::config::TelemetryConfig;
use crate::protocol::messages::{self, PeerState, MSG_MIC19_STATE_ID, SIGNATURE_PEER};
use crate::protocol::schedule::{Divider, HeartbeatMonitor};
use crate::state::{Fault, NodeState};
use crate::transport::{ErrorCounters, Transport};

/// Outcome of routing one received frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Not from the peer controller (or not an application frame).
    Ignored,
    /// Peer state frame, handed to the state extractor.
    PeerState,
    /// Peer frame with an identifier this node has no extractor for.
    Unknown,
}

pub struct CanApp {
    state_div: Divider,
    measurements_div: Divider,
    heartbeat: HeartbeatMonitor,
    peer_fault_streak: u32,
    last_peer_state: Option<PeerState>,
}

impl CanApp {
    pub const fn new(config: TelemetryConfig) -> Self {
        Self {
            state_div: Divider::new(config.state_divider),
            measurements_div: Divider::new(config.measurements_divider),
            heartbeat: HeartbeatMonitor::new(config.heartbeat_threshold),
            peer_fault_streak: 0,
            last_peer_state: None,
        }
    }

    /// Run one tick of the application protocol.
    pub fn tick<T, N, M>(&mut self, bus: &mut T, node: &mut N, measurements: &M)
    where
        T: Transport,
        N: NodeState,
        M: MeasurementSource,
    {
        self.check_and_dispatch(bus, node);

        if self.state_div.step() {
            self.send_state(bus, node);
        }

        if self.measurements_div.step() {
            self.send_measurements(bus, measurements);
        }
    }

    /// Heartbeat accounting followed by receive and dispatch of at most one frame.
    ///
    /// Returns how the received frame was routed, or `None` if nothing was waiting.
    pub fn check_and_dispatch<T, N>(&mut self, bus: &mut T, node: &mut N) -> Option<Dispatch>
    where
        T: Transport,
        N: NodeState,
    {
        if self.heartbeat.tick() {
            error!("too many cycles without a peer message");
            node.raise(Fault::BusSilence);
        }

        if !bus.frame_available() {
            return None;
        }

        let frame = bus.receive_frame()?;
        let routed = self.dispatch(&frame, node);
        if routed != Dispatch::Ignored {
            self.print_diagnostics(bus, &frame);
        }
        Some(routed)
    }

    /// Route a frame to its extractor by signature, then identifier.
    pub fn dispatch<N: NodeState>(&mut self, frame: &Frame, node: &mut N) -> Dispatch {
        match messages::signature(frame) {
            Ok(SIGNATURE_PEER) => {}
            Ok(sig) => {
                trace!("ignoring frame with signature {}", sig);
                return Dispatch::Ignored;
            }
            Err(_) => {
                trace!("ignoring frame without payload");
                return Dispatch::Ignored;
            }
        }

        // Any peer frame counts as a heartbeat
        self.heartbeat.feed();

        match messages::standard_id(frame) {
            Some(MSG_MIC19_STATE_ID) => {
                debug!("got a state msg");
                self.extract_peer_state(frame, node);
                Dispatch::PeerState
            }
            id => {
                debug!("got an unknown msg, id {}", id.unwrap_or(u16::MAX));
                Dispatch::Unknown
            }
        }
    }

    /// Every faulted peer state frame raises immediately; the streak is kept for diagnostics only.
    fn extract_peer_state<N: NodeState>(&mut self, frame: &Frame, node: &mut N) {
        let peer = match PeerState::parse(frame) {
            Ok(peer) => peer,
            Err(_) => {
                warn!("malformed peer state frame, dlc {}", frame.dlc());
                return;
            }
        };

        self.last_peer_state = Some(peer);

        if peer.has_error() {
            self.peer_fault_streak = self.peer_fault_streak.saturating_add(1);
            error!(
                "peer reported error flags {=u8:#x} ({} in a row)",
                peer.error_flags,
                self.peer_fault_streak
            );
            node.raise(Fault::PeerError {
                flags: peer.error_flags,
            });
        } else {
            self.peer_fault_streak = 0;
        }
    }

    /// Send the state frame now.
    pub fn send_state<T: Transport, N: NodeState>(&mut self, bus: &mut T, node: &N) {
        let frame = messages::state_frame(node.state(), node.error_flags());
        bus.send_frame(&frame);
        self.print_diagnostics(bus, &frame);
    }

    /// Send the measurements frame now, consuming the accumulated averages.
    pub fn send_measurements<T: Transport, M: MeasurementSource>(
        &mut self,
        bus: &mut T,
        measurements: &M,
    ) {
        let averages = measurements.take_averages();
        let frame = messages::measurements_frame(&averages);
        bus.send_frame(&frame);
        self.print_diagnostics(bus, &frame);

        debug!(
            "adc msg was sent: {} {} {}",
            averages.battery_voltage,
            averages.position,
            averages.battery_current
        );
    }

    /// Log a frame's identifier and payload next to the controller's error counters.
    pub fn print_diagnostics<T: Transport>(&self, bus: &T, frame: &Frame) -> ErrorCounters {
        let id = match frame.id() {
            Id::Standard(id) => u32::from(id.as_raw()),
            Id::Extended(id) => id.as_raw(),
        };
        let data: &[u8] = match frame.data() {
            Some(data) => data,
            None => &[],
        };
        let errors = bus.read_error_counters();
        debug!(
            "msg id {} data {=[u8]:#x} ERR rx {} tx {}",
            id,
            data,
            errors.rx,
            errors.tx
        );
        errors
    }

    /// Ticks since the last peer frame.
    #[inline]
    pub fn checks_without_peer_msg(&self) -> u32 {
        self.heartbeat.missed()
    }

    /// Consecutive peer state frames with a nonzero error byte.
    #[inline]
    pub fn peer_fault_streak(&self) -> u32 {
        self.peer_fault_streak
    }

    #[inline]
    pub fn last_peer_state(&self) -> Option<PeerState> {
        self.last_peer_state
    }
}
