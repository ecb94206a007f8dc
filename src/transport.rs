// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! CAN transport seam between the application protocol and the controller driver.
//!
//! All operations are non-blocking. Sending is fire-and-forget: a frame that cannot be queued is
//! dropped by the implementation and never surfaces to the caller.

use bxcan::Frame;

/// Receive/transmit error counters of the CAN controller.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorCounters {
    pub rx: u8,
    pub tx: u8,
}

pub trait Transport {
    /// Whether a received frame is waiting.
    fn frame_available(&mut self) -> bool;

    /// Take one received frame, if any.
    fn receive_frame(&mut self) -> Option<Frame>;

    /// Queue a frame for transmission.
    fn send_frame(&mut self, frame: &Frame);

    fn read_error_counters(&self) -> ErrorCounters;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;

    /// In-memory transport: frames pushed to `inbox` are received in order, sent frames are
    /// recorded in `sent`.
    #[derive(Default)]
    pub struct MockTransport {
        pub inbox: VecDeque<Frame>,
        pub sent: Vec<Frame>,
        pub counters: ErrorCounters,
        pub receive_calls: usize,
        pub counter_reads: Cell<usize>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&mut self, frame: Frame) {
            self.inbox.push_back(frame);
        }

        /// Sent frames with the given standard identifier.
        pub fn sent_with_id(&self, id: u16) -> Vec<&Frame> {
            self.sent
                .iter()
                .filter(|f| matches!(f.id(), bxcan::Id::Standard(s) if s.as_raw() == id))
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn frame_available(&mut self) -> bool {
            !self.inbox.is_empty()
        }

        fn receive_frame(&mut self) -> Option<Frame> {
            self.receive_calls += 1;
            self.inbox.pop_front()
        }

        fn send_frame(&mut self, frame: &Frame) {
            self.sent.push(frame.clone());
        }

        fn read_error_counters(&self) -> ErrorCounters {
            self.counter_reads.set(self.counter_reads.get() + 1);
            self.counters
        }
    }
}
