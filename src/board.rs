//! Board wiring: buttons on GPIO, sticks on the SAADC.
//!
//! Buttons are active-low with internal pull-ups. The four stick
//! channels are sampled in one SAADC scan per tick (12-bit, single
//! ended); negative readings from offset error are clamped to zero.

use bt_gamepad::config::ADC_MAX;
use bt_gamepad::hid::{Axis, AXIS_COUNT};
use bt_gamepad::sampler::{InputSource, Level};
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_nrf::saadc::{self, Saadc};
use embassy_nrf::bind_interrupts;

bind_interrupts!(pub struct Irqs {
    SAADC => saadc::InterruptHandler;
});

/// Buttons wired on this board. Higher report bits stay released.
pub const BUTTON_COUNT: usize = 8;

pub struct Board {
    buttons: [Input<'static>; BUTTON_COUNT],
    adc: Saadc<'static, AXIS_COUNT>,
    sticks: [i16; AXIS_COUNT],
}

impl Board {
    pub fn new(buttons: [AnyPin; BUTTON_COUNT], adc: Saadc<'static, AXIS_COUNT>) -> Self {
        Self {
            buttons: buttons.map(|pin| Input::new(pin, Pull::Up)),
            adc,
            sticks: [0; AXIS_COUNT],
        }
    }
}

impl InputSource for Board {
    fn button_count(&self) -> usize {
        BUTTON_COUNT
    }

    fn button_level(&mut self, index: usize) -> Level {
        match self.buttons.get(index) {
            Some(pin) if pin.is_low() => Level::Low,
            _ => Level::High,
        }
    }

    fn axis_raw(&mut self, axis: Axis) -> Option<u16> {
        let raw = self.sticks[axis.index()].clamp(0, ADC_MAX as i16);
        Some(raw as u16)
    }

    async fn refresh(&mut self) {
        self.adc.sample(&mut self.sticks).await;
    }
}
