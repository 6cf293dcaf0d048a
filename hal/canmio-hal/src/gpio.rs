//! GPIO pin abstractions
//!
//! Provides the output pin trait used for servo signal lines, plus an
//! adapter for any `embedded-hal` 1.0 output pin.

/// Digital output pin
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Check if the pin is currently set high
    fn is_set_high(&self) -> bool;

    /// Check if the pin is currently set low
    fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }
}

/// Adapter from an `embedded-hal` output pin
///
/// `embedded-hal` pin operations are fallible and its state query needs
/// `&mut self`, so the adapter tracks the last driven level itself. Errors
/// from infallible GPIO implementations are discarded.
pub struct HalPin<P> {
    pin: P,
    high: bool,
}

impl<P: embedded_hal::digital::OutputPin> HalPin<P> {
    /// Wrap a pin, driving it low
    pub fn new(mut pin: P) -> Self {
        let _ = pin.set_low();
        Self { pin, high: false }
    }

    /// Release the wrapped pin
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: embedded_hal::digital::OutputPin> OutputPin for HalPin<P> {
    fn set_high(&mut self) {
        let _ = self.pin.set_high();
        self.high = true;
    }

    fn set_low(&mut self) {
        let _ = self.pin.set_low();
        self.high = false;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}
