use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, Input, PinDriver, Pull};
use std::time::{Duration, Instant};

const DEBOUNCE_TIME: Duration = Duration::from_millis(50);

/// Active-low push button reporting clicks (press then release)
pub struct UpdateButton {
    pin: PinDriver<'static, AnyIOPin, Input>,
    pressed: bool,
    last_change: Instant,
}

impl UpdateButton {
    pub fn new(pin: impl Into<AnyIOPin> + 'static) -> Result<Self> {
        let mut pin = PinDriver::input(pin.into())?;
        pin.set_pull(Pull::Up)?;

        Ok(Self {
            pin,
            pressed: false,
            last_change: Instant::now(),
        })
    }

    /// True once per click, on release
    pub fn poll_click(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_change) < DEBOUNCE_TIME {
            return false;
        }

        let pressed = self.pin.is_low(); // Active low
        if pressed == self.pressed {
            return false;
        }
        self.last_change = now;
        self.pressed = pressed;
        !pressed
    }
}
