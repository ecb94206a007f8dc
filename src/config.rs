// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Compile-time configuration for the MDE22 node.
//!
//! Every tunable lives here as a `const`. Build-time toggles are Cargo features and resolve to
//! constants, so there is no runtime branching on them:
//!
//! | Feature | Effect |
//! | ------- | ------ |
//! | `adc-8bit` | Truncate conversions to 8 bits (default is full 10-bit) |
//! | `defmt` | Verbose logging over RTT |

// ----- Acquisition timing -----

/// Clock feeding TIM2 (APB1 timer clock with the default HSI configuration).
pub const TIMER_CLOCK_HZ: u32 = 16_000_000;

/// TIM2 prescaler.
pub const ADC_TIMER_PRESCALER: u16 = 64;

/// Target trigger rate. One conversion per trigger, so each channel is refreshed at a third of this.
pub const ADC_TRIGGER_HZ: u32 = 1_500;

/// TIM2 auto-reload (compare) value producing [`ADC_TRIGGER_HZ`].
pub const ADC_TIMER_COMPARE: u32 = timer_compare(TIMER_CLOCK_HZ, ADC_TIMER_PRESCALER, ADC_TRIGGER_HZ);

const _: () = assert!(ADC_TIMER_COMPARE > 0, "trigger rate too high for this prescaler");

/// Compare value for a timer that fires every `prescaler * (compare + 1)` clock cycles.
pub const fn timer_compare(clock_hz: u32, prescaler: u16, rate_hz: u32) -> u32 {
    clock_hz / (prescaler as u32 * rate_hz) - 1
}

/// Trigger rate actually achieved by a prescaler/compare pair (integer division, rounds down).
pub const fn trigger_rate_hz(clock_hz: u32, prescaler: u16, compare: u32) -> u32 {
    clock_hz / (prescaler as u32 * (compare + 1))
}

// ----- Converter resolution -----

/// Converter output resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Bits10,
    Bits8,
}

impl Resolution {
    /// Number of significant bits in a raw reading.
    pub const fn bits(self) -> u8 {
        match self {
            Resolution::Bits10 => 10,
            Resolution::Bits8 => 8,
        }
    }

    /// Largest raw reading the converter can produce.
    pub const fn max_raw(self) -> u16 {
        (1 << self.bits()) - 1
    }

    /// Value for the ADC_CR1 `RES` field.
    pub const fn res_bits(self) -> u8 {
        match self {
            Resolution::Bits10 => 0b01,
            Resolution::Bits8 => 0b10,
        }
    }
}

#[cfg(not(feature = "adc-8bit"))]
pub const ADC_RESOLUTION: Resolution = Resolution::Bits10;

#[cfg(feature = "adc-8bit")]
pub const ADC_RESOLUTION: Resolution = Resolution::Bits8;

// ----- Calibration -----

/// Per-channel scaling from raw counts to engineering units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coefficients {
    pub battery_voltage: f32,
    pub position: f32,
    pub battery_current: f32,
}

impl Coefficients {
    /// Raw counts pass through unchanged.
    pub const UNITY: Self = Self {
        battery_voltage: 1.0,
        position: 1.0,
        battery_current: 1.0,
    };
}

/// Coefficients flashed into the node.
pub const CHANNEL_COEFFICIENTS: Coefficients = Coefficients::UNITY;

// ----- CAN application protocol -----

/// Foreground tick period. `CanApp::tick` is called once per period.
pub const TICK_PERIOD_MS: u32 = 10;

/// Ticks between state frames.
pub const SEND_STATE_CLK_DIV: u32 = 10;

/// Ticks between measurement frames.
pub const SEND_MEASUREMENTS_CLK_DIV: u32 = 5;

/// Ticks without a peer frame before the bus is considered silent.
pub const CHECKS_WITHOUT_PEER_MSG: u32 = 100;

/// CAN_BTR for 500 kbit/s from a 16 MHz APB1 clock (BRP = 2, BS1 = 13, BS2 = 2, SJW = 1).
pub const CAN_BIT_TIMING: u32 = 0x001C_0001;

/// Scheduling thresholds for the CAN application task.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub state_divider: u32,
    pub measurements_divider: u32,
    pub heartbeat_threshold: u32,
}

impl TelemetryConfig {
    pub const DEFAULT: Self = Self {
        state_divider: SEND_STATE_CLK_DIV,
        measurements_divider: SEND_MEASUREMENTS_CLK_DIV,
        heartbeat_threshold: CHECKS_WITHOUT_PEER_MSG,
    };
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_trigger_rate_is_close_to_target() {
        assert_eq!(ADC_TIMER_COMPARE, 165);
        let achieved = trigger_rate_hz(TIMER_CLOCK_HZ, ADC_TIMER_PRESCALER, ADC_TIMER_COMPARE);
        assert_eq!(achieved, 1506);
    }

    #[test]
    fn compare_round_trips_for_exact_rates() {
        let compare = timer_compare(8_000_000, 8, 1_000);
        assert_eq!(compare, 999);
        assert_eq!(trigger_rate_hz(8_000_000, 8, compare), 1_000);
    }

    #[test]
    fn resolution_limits() {
        assert_eq!(Resolution::Bits10.max_raw(), 1023);
        assert_eq!(Resolution::Bits8.max_raw(), 255);
        assert_ne!(Resolution::Bits10.res_bits(), Resolution::Bits8.res_bits());
    }

    #[test]
    fn full_resolution_by_default() {
        #[cfg(not(feature = "adc-8bit"))]
        assert_eq!(ADC_RESOLUTION, Resolution::Bits10);
        #[cfg(feature = "adc-8bit")]
        assert_eq!(ADC_RESOLUTION, Resolution::Bits8);
    }

    #[test]
    fn default_dividers_are_distinct() {
        let cfg = TelemetryConfig::default();
        assert_ne!(cfg.state_divider, cfg.measurements_divider);
        assert!(cfg.heartbeat_threshold > cfg.state_divider);
    }
}
