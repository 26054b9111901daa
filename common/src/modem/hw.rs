use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

/// Trait for controlling the modem power trigger and DTR pins.
///
/// Pin changes are fire-and-forget, failures are ignored.
pub trait ModemPin {
    /// Sets the pin output to high.
    fn set_high(&mut self);
    /// Sets the pin output to low.
    fn set_low(&mut self);
}

impl<P: OutputPin> ModemPin for P {
    fn set_high(&mut self) {
        let _ = OutputPin::set_high(self);
    }

    fn set_low(&mut self) {
        let _ = OutputPin::set_low(self);
    }
}

/// A pin that is not wired, e.g. when the modem is powered and woken by other means.
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Records the level of a pin, to be used in tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FakePin {
    pub high: bool,
    pub toggles: u32,
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.toggles += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.toggles += 1;
        Ok(())
    }
}
