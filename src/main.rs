// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

#![cfg_attr(target_os = "none", no_std, no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use core::cell::RefCell;
    use core::fmt::Write;

    use cortex_m::{delay::Delay, peripheral::NVIC};
    use cortex_m_rt::entry;
    use critical_section::Mutex;
    use panic_halt as _;

    #[cfg(feature = "defmt")]
    use defmt_rtt as _;

    use hal::{
        can::Can,
        pac::{self, interrupt},
        prelude::*,
        serial::{Config, Serial},
    };
    use stm32f7xx_hal as hal;

    use mde22::{
        acquisition::Acquisition,
        config::{
            TelemetryConfig, ADC_RESOLUTION, CAN_BIT_TIMING, CHANNEL_COEFFICIENTS, TICK_PERIOD_MS,
        },
        hw::{BoardPins, CanBus, Led, TriggeredAdc, Usart},
        protocol::{schedule::Divider, CanApp},
        state::{AppState, NodeState, StateMachine},
    };

    /// Ticks between readings printed on the debug terminal.
    const PRINT_CLK_DIV: u32 = 50;

    static ACQUISITION: Acquisition = Acquisition::new(CHANNEL_COEFFICIENTS);
    static TRIGGERED_ADC: Mutex<RefCell<Option<TriggeredAdc>>> = Mutex::new(RefCell::new(None));

    #[entry]
    fn main() -> ! {
        // Peripherals
        let dp = pac::Peripherals::take().unwrap();
        let cp = cortex_m::Peripherals::take().unwrap();

        // Clocks
        let mut rcc = dp.RCC.constrain();
        let clocks = rcc.cfgr.freeze();

        let pins = BoardPins::new(dp.GPIOA, dp.GPIOD);
        let _sense = pins.sense;

        // LED
        let mut led_error = Led::active_low(pins.leds.red);
        let mut led_alive = Led::active_low(pins.leds.green);

        // USART1 (DBG)
        let usart_cfg = Config {
            baud_rate: 115_200.bps(),
            ..Default::default()
        };
        let serial = Serial::new(
            dp.USART1,
            (pins.usart1.tx, pins.usart1.rx),
            &clocks,
            usart_cfg,
        );
        let mut usart = Usart::new(serial);
        usart.println("MDE22 starting");

        // CAN1
        let can1 = Can::new(dp.CAN1, &mut rcc.apb1, (pins.can1.tx, pins.can1.rx));
        let mut bus = CanBus::new(can1, CAN_BIT_TIMING, false, false);
        bus.accept_all();

        // ADC1 triggered by TIM2
        let adc = TriggeredAdc::configure(dp.ADC1, dp.TIM2, ADC_RESOLUTION, &ACQUISITION);
        critical_section::with(|cs| TRIGGERED_ADC.borrow(cs).replace(Some(adc)));
        unsafe { NVIC::unmask(pac::Interrupt::ADC) };

        let mut node = StateMachine::new();
        if let Err(e) = node.initialized().and_then(|()| node.start()) {
            let _ = writeln!(usart, "startup transition rejected: {:?}\r", e);
        }

        let mut app = CanApp::new(TelemetryConfig::DEFAULT);
        let mut print_div = Divider::new(PRINT_CLK_DIV);
        let mut delay = Delay::new(cp.SYST, clocks.sysclk().raw());

        loop {
            app.tick(&mut bus, &mut node, &ACQUISITION);

            led_error.set(node.state() == AppState::Error);

            if print_div.step() && ACQUISITION.take_cycle_complete() {
                led_alive.toggle();
                usart.print_readings(&ACQUISITION.readings(), node.error_flags());
            }

            delay.delay_ms(TICK_PERIOD_MS);
        }
    }

    #[interrupt]
    fn ADC() {
        critical_section::with(|cs| {
            if let Some(adc) = TRIGGERED_ADC.borrow_ref_mut(cs).as_mut() {
                adc.on_interrupt(&ACQUISITION);
            }
        });
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
