// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Interrupt-driven acquisition of the three analog channels.
//!
//! The converter is retriggered by a hardware timer; every end-of-conversion interrupt lands in
//! [`Acquisition::on_conversion_complete`], which calibrates the reading, publishes it and returns
//! the channel the converter should sample next.
//!
//! Shared state is split by access pattern:
//!
//! - latest calibrated values are `f32` bit patterns in `AtomicU32`s (one writer, the interrupt);
//! - the "cycle completed" flag is an `AtomicBool` that the foreground takes;
//! - the measurement accumulator sits behind a `critical_section::Mutex`, so the foreground's
//!   read-then-reset can never interleave with a conversion.
//!
//! ```ignore
//! static ACQUISITION: Acquisition = Acquisition::new(CHANNEL_COEFFICIENTS);
//!
//! // in the ADC interrupt
//! let next = ACQUISITION.on_conversion_complete(raw, active_channel);
//! ```

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use critical_section::Mutex;

use crate::config::Coefficients;

/// Analog inputs, numbered as the converter's channel selector sees them.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    BatteryVoltage = 1,
    Position = 2,
    BatteryCurrent = 3,
}

impl Channel {
    /// Conversion order. The cycle restarts after the last entry.
    pub const SEQUENCE: [Channel; 3] = [
        Channel::BatteryVoltage,
        Channel::Position,
        Channel::BatteryCurrent,
    ];

    pub const FIRST: Channel = Channel::BatteryVoltage;

    /// Map a hardware channel index back to a channel.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Channel::BatteryVoltage),
            2 => Some(Channel::Position),
            3 => Some(Channel::BatteryCurrent),
            _ => None,
        }
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Position in [`Channel::SEQUENCE`].
    #[inline]
    const fn slot(self) -> usize {
        self as usize - 1
    }

    #[inline]
    pub fn is_last(self) -> bool {
        self == Channel::BatteryCurrent
    }

    /// Next channel in the round-robin, wrapping after the last one.
    pub fn next(self) -> Self {
        Self::SEQUENCE[(self.slot() + 1) % Self::SEQUENCE.len()]
    }
}

/// Calibrated value of one channel, stored as raw `f32` bits.
struct SampleCell(AtomicU32);

impl SampleCell {
    const fn new() -> Self {
        // 0x0000_0000 is +0.0
        Self(AtomicU32::new(0))
    }

    #[inline]
    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Snapshot of the latest calibrated readings.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Readings {
    pub battery_voltage: f32,
    pub position: f32,
    pub battery_current: f32,
}

/// Per-channel averages as carried on the bus.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Averages {
    pub battery_voltage: u16,
    pub position: u16,
    pub battery_current: u16,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct ChannelSum {
    sum: f32,
    count: u32,
}

impl ChannelSum {
    const ZERO: Self = Self { sum: 0.0, count: 0 };

    fn average(&self) -> Option<f32> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f32)
        }
    }
}

/// Running per-channel sums since the last measurements frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Accumulator {
    channels: [ChannelSum; 3],
}

impl Accumulator {
    pub const fn new() -> Self {
        Self {
            channels: [ChannelSum::ZERO; 3],
        }
    }

    pub fn add(&mut self, channel: Channel, value: f32) {
        let slot = &mut self.channels[channel.slot()];
        slot.sum += value;
        slot.count = slot.count.saturating_add(1);
    }

    pub fn count(&self, channel: Channel) -> u32 {
        self.channels[channel.slot()].count
    }

    /// Average of a single channel, `None` when nothing was accumulated.
    pub fn average(&self, channel: Channel) -> Option<f32> {
        self.channels[channel.slot()].average()
    }

    /// Averages truncated to the wire format. A channel with no samples reports 0.
    pub fn averages(&self) -> Averages {
        let wire = |ch| self.average(ch).map_or(0, |avg| avg as u16);
        Averages {
            battery_voltage: wire(Channel::BatteryVoltage),
            position: wire(Channel::Position),
            battery_current: wire(Channel::BatteryCurrent),
        }
    }

    pub fn reset(&mut self) {
        self.channels = [ChannelSum::ZERO; 3];
    }
}

/// Anything the telemetry task can pull per-period averages from.
pub trait MeasurementSource {
    /// Return the averages for the elapsed period and start a new one.
    fn take_averages(&self) -> Averages;
}

/// Acquisition engine state shared between the ADC interrupt and the foreground.
pub struct Acquisition {
    coefficients: Coefficients,
    selected: AtomicU8,
    battery_voltage: SampleCell,
    position: SampleCell,
    battery_current: SampleCell,
    cycle_complete: AtomicBool,
    accumulator: Mutex<RefCell<Accumulator>>,
}

impl Acquisition {
    pub const fn new(coefficients: Coefficients) -> Self {
        Self {
            coefficients,
            selected: AtomicU8::new(Channel::FIRST.index()),
            battery_voltage: SampleCell::new(),
            position: SampleCell::new(),
            battery_current: SampleCell::new(),
            cycle_complete: AtomicBool::new(false),
            accumulator: Mutex::new(RefCell::new(Accumulator::new())),
        }
    }

    fn cell(&self, channel: Channel) -> &SampleCell {
        match channel {
            Channel::BatteryVoltage => &self.battery_voltage,
            Channel::Position => &self.position,
            Channel::BatteryCurrent => &self.battery_current,
        }
    }

    /// Convert a raw reading with the channel's coefficient.
    pub fn calibrate(&self, channel: Channel, raw: u16) -> f32 {
        let coeff = match channel {
            Channel::BatteryVoltage => self.coefficients.battery_voltage,
            Channel::Position => self.coefficients.position,
            Channel::BatteryCurrent => self.coefficients.battery_current,
        };
        raw as f32 * coeff
    }

    /// Point the selector back at the first channel. Called when the converter is (re)armed.
    pub fn restart(&self) {
        self.selected.store(Channel::FIRST.index(), Ordering::Relaxed);
    }

    /// Handle one finished conversion and return the channel to convert next.
    ///
    /// `active_channel` is the index the converter was sampling. Indices outside the sequence are
    /// treated like the last channel: the cycle is marked complete and restarts at channel 1.
    pub fn on_conversion_complete(&self, raw: u16, active_channel: u8) -> Channel {
        let channel = Channel::from_index(active_channel);

        if let Some(channel) = channel {
            let value = self.calibrate(channel, raw);
            self.cell(channel).store(value);
            critical_section::with(|cs| {
                self.accumulator.borrow_ref_mut(cs).add(channel, value);
            });
        }

        let next = match channel {
            Some(ch) if !ch.is_last() => ch.next(),
            _ => {
                self.cycle_complete.store(true, Ordering::Release);
                Channel::FIRST
            }
        };

        self.selected.store(next.index(), Ordering::Relaxed);
        next
    }

    /// Channel the converter will sample on the next trigger.
    pub fn selected(&self) -> Channel {
        Channel::from_index(self.selected.load(Ordering::Relaxed)).unwrap_or(Channel::FIRST)
    }

    #[inline]
    pub fn latest(&self, channel: Channel) -> f32 {
        self.cell(channel).load()
    }

    pub fn readings(&self) -> Readings {
        Readings {
            battery_voltage: self.latest(Channel::BatteryVoltage),
            position: self.latest(Channel::Position),
            battery_current: self.latest(Channel::BatteryCurrent),
        }
    }

    /// Returns `true` once per completed cycle, clearing the flag.
    pub fn take_cycle_complete(&self) -> bool {
        self.cycle_complete.swap(false, Ordering::Acquire)
    }

    /// Samples accumulated for `channel` since the last report.
    pub fn sample_count(&self, channel: Channel) -> u32 {
        critical_section::with(|cs| self.accumulator.borrow_ref(cs).count(channel))
    }
}

impl MeasurementSource for Acquisition {
    fn take_averages(&self) -> Averages {
        critical_section::with(|cs| {
            let mut acc = self.accumulator.borrow_ref_mut(cs);
            let averages = acc.averages();
            acc.reset();
            averages
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Acquisition {
        Acquisition::new(Coefficients::UNITY)
    }

    /// Drive `n` conversions, feeding back the selected channel as the hardware would.
    fn run(engine: &Acquisition, raws: &[u16]) -> Vec<Channel> {
        raws.iter()
            .map(|&raw| {
                let active = engine.selected();
                engine.on_conversion_complete(raw, active.index());
                active
            })
            .collect()
    }

    #[test]
    fn channel_sequence_wraps() {
        assert_eq!(Channel::BatteryVoltage.next(), Channel::Position);
        assert_eq!(Channel::Position.next(), Channel::BatteryCurrent);
        assert_eq!(Channel::BatteryCurrent.next(), Channel::BatteryVoltage);
        assert_eq!(Channel::from_index(0), None);
        assert_eq!(Channel::from_index(4), None);
    }

    #[test]
    fn visits_channels_round_robin() {
        let engine = engine();
        let visited = run(&engine, &[0; 10]);
        for (i, ch) in visited.iter().enumerate() {
            assert_eq!(ch.index() as usize, (i % 3) + 1);
        }
    }

    #[test]
    fn round_robin_from_any_start() {
        for start in 0..3usize {
            let engine = engine();
            let mut active = Channel::SEQUENCE[start];
            for i in 0..9 {
                assert_eq!(active.index() as usize, ((start + i) % 3) + 1);
                active = engine.on_conversion_complete(0, active.index());
            }
        }
    }

    #[test]
    fn cycle_flag_set_once_per_three_conversions() {
        let engine = engine();
        for i in 1..=9 {
            let active = engine.selected();
            engine.on_conversion_complete(0, active.index());
            let flagged = engine.take_cycle_complete();
            assert_eq!(flagged, i % 3 == 0, "conversion {}", i);
        }
        assert!(!engine.take_cycle_complete());
    }

    #[test]
    fn unknown_channel_completes_cycle() {
        let engine = engine();
        let next = engine.on_conversion_complete(512, 7);
        assert_eq!(next, Channel::BatteryVoltage);
        assert_eq!(engine.selected(), Channel::BatteryVoltage);
        assert!(engine.take_cycle_complete());
        assert_eq!(engine.readings(), Readings::default());
        assert_eq!(engine.sample_count(Channel::BatteryVoltage), 0);
    }

    #[test]
    fn calibration_is_raw_times_coefficient() {
        let coeffs = Coefficients {
            battery_voltage: 0.065_824_905,
            position: 0.067_177_82,
            battery_current: 0.015_993_15,
        };
        let engine = Acquisition::new(coeffs);

        engine.on_conversion_complete(1023, 1);
        engine.on_conversion_complete(512, 2);
        engine.on_conversion_complete(7, 3);

        assert_eq!(engine.latest(Channel::BatteryVoltage), 1023.0 * coeffs.battery_voltage);
        assert_eq!(engine.latest(Channel::Position), 512.0 * coeffs.position);
        assert_eq!(engine.latest(Channel::BatteryCurrent), 7.0 * coeffs.battery_current);
    }

    #[test]
    fn channels_are_written_independently() {
        let engine = engine();
        engine.on_conversion_complete(300, 1);
        assert_eq!(
            engine.readings(),
            Readings {
                battery_voltage: 300.0,
                position: 0.0,
                battery_current: 0.0,
            }
        );
        engine.on_conversion_complete(400, 1);
        assert_eq!(engine.latest(Channel::BatteryVoltage), 400.0);
        assert_eq!(engine.latest(Channel::Position), 0.0);
    }

    #[test]
    fn averages_are_sum_over_count_and_reset() {
        let engine = engine();
        // Two full cycles: voltage 300/302, position 500/524, current 10/12
        run(&engine, &[300, 500, 10, 302, 524, 12]);
        assert_eq!(engine.sample_count(Channel::Position), 2);

        let averages = engine.take_averages();
        assert_eq!(
            averages,
            Averages {
                battery_voltage: 301,
                position: 512,
                battery_current: 11,
            }
        );

        for ch in Channel::SEQUENCE {
            assert_eq!(engine.sample_count(ch), 0);
        }
    }

    #[test]
    fn empty_accumulator_reports_zero() {
        let engine = engine();
        engine.on_conversion_complete(100, 1);
        let averages = engine.take_averages();
        assert_eq!(averages.battery_voltage, 100);
        assert_eq!(averages.position, 0);
        assert_eq!(averages.battery_current, 0);
        assert_eq!(engine.take_averages(), Averages::default());
    }

    #[test]
    fn accumulator_average_guards_zero_count() {
        let mut acc = Accumulator::new();
        assert_eq!(acc.average(Channel::Position), None);
        acc.add(Channel::Position, 4.0);
        acc.add(Channel::Position, 6.0);
        assert_eq!(acc.average(Channel::Position), Some(5.0));
        acc.reset();
        assert_eq!(acc.count(Channel::Position), 0);
    }
}
