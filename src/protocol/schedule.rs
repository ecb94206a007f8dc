// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Tick-based scheduling primitives for the CAN application task.

/// "Do X every N ticks."
///
/// The counter is incremented first and then compared, so with threshold `N` the divider fires on
/// ticks `N, 2N, 3N, ...`. It is reset only when it fires.
#[derive(Copy, Clone, Debug)]
pub struct Divider {
    count: u32,
    threshold: u32,
}

impl Divider {
    pub const fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold,
        }
    }

    /// Advance one tick. Returns `true` when the divider fires.
    pub fn step(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count >= self.threshold {
            self.count = 0;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Counts ticks without a peer frame.
///
/// A threshold of 0 disables detection (the node does not depend on the bus).
#[derive(Copy, Clone, Debug)]
pub struct HeartbeatMonitor {
    missed: u32,
    threshold: u32,
}

impl HeartbeatMonitor {
    pub const fn new(threshold: u32) -> Self {
        Self {
            missed: 0,
            threshold,
        }
    }

    /// Count one more tick without a heartbeat. Returns `true` on the tick the threshold is
    /// reached; the count restarts from zero so the next report needs another full period.
    pub fn tick(&mut self) -> bool {
        if self.threshold == 0 {
            return false;
        }
        self.missed = self.missed.saturating_add(1);
        if self.missed >= self.threshold {
            self.missed = 0;
            true
        } else {
            false
        }
    }

    /// A qualifying peer frame arrived.
    #[inline]
    pub fn feed(&mut self) {
        self.missed = 0;
    }

    #[inline]
    pub fn missed(&self) -> u32 {
        self.missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_fires_on_multiples() {
        let mut div = Divider::new(4);
        let fired: Vec<u32> = (1..=12).filter(|_| div.step()).collect();
        // filter evaluates in order, so the tick numbers line up
        assert_eq!(fired, vec![4, 8, 12]);
        assert_eq!(div.count(), 0);
    }

    #[test]
    fn divider_of_one_fires_every_tick() {
        let mut div = Divider::new(1);
        assert!((0..5).all(|_| div.step()));
    }

    #[test]
    fn heartbeat_fires_on_threshold_and_rearms() {
        let mut hb = HeartbeatMonitor::new(3);
        assert!(!hb.tick());
        assert!(!hb.tick());
        assert!(hb.tick());
        assert_eq!(hb.missed(), 0);
        assert!(!hb.tick());
        assert!(!hb.tick());
        assert!(hb.tick());
    }

    #[test]
    fn feed_restarts_count() {
        let mut hb = HeartbeatMonitor::new(3);
        hb.tick();
        hb.tick();
        hb.feed();
        assert_eq!(hb.missed(), 0);
        assert!(!hb.tick());
        assert!(!hb.tick());
        assert!(hb.tick());
    }

    #[test]
    fn zero_threshold_disables_detection() {
        let mut hb = HeartbeatMonitor::new(0);
        assert!((0..1000).all(|_| !hb.tick()));
        assert_eq!(hb.missed(), 0);
    }
}
