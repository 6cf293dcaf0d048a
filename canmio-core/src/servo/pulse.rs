//! Servo pulse generation
//!
//! The pulse engine owns the timer bank and the 16 output pins. A pulse is
//! started by [`PulseEngine::arm`] with a [`PulseToken`] naming the slot,
//! the channel and the width. The token is kept with the slot binding, so
//! the completion handler recovers the channel from the token alone and
//! never consults the scheduler's block counter.
//!
//! Narrow counters complete long pulses in several shots: the first shot
//! loads the remainder, each further expiry restarts a full period until
//! the extension count is exhausted.
//!
//! Only the count is hardware timed. The engine raises the pin just before
//! starting the counter and lowers it when the completion is handled, so
//! the width on the wire is the count plus the difference between the
//! start and completion handling latencies. On the RP2040 the completion
//! runs on an interrupt executor above every other task, which keeps that
//! difference to a few microseconds, below one position step
//! ([`POS2TICK_MULTIPLIER`] ticks, 4.75 µs) in the common case.

use canmio_hal::{OneShotTimers, OutputPin, TimerSlotId, TIMER_SLOTS};

use crate::config::NUM_IO;

/// Timer ticks per microsecond (4 MHz counter clock)
pub const TICKS_PER_US: u32 = 4;

/// Ticks at position 0 (900 µs)
pub const POS2TICK_OFFSET: u32 = 3600;

/// Additional ticks per position step
///
/// 255 steps span 4845 ticks, giving 0.9 ms to 2.11 ms.
pub const POS2TICK_MULTIPLIER: u32 = 19;

/// Longest pulse in ticks
pub const MAX_PULSE_TICKS: u32 = POS2TICK_OFFSET + POS2TICK_MULTIPLIER * u8::MAX as u32;

/// Convert a servo position to a pulse width in timer ticks
pub const fn position_to_ticks(position: u8) -> u32 {
    POS2TICK_OFFSET + POS2TICK_MULTIPLIER * position as u32
}

/// Snapshot taken when a pulse is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseToken {
    pub slot: TimerSlotId,
    pub channel: u8,
    pub ticks: u32,
}

/// An active slot binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotBinding {
    pub token: PulseToken,
    /// Full-range periods still to run after the current shot
    pub extension: u16,
}

/// Timer bank plus output pins
pub struct PulseEngine<T, P> {
    timers: T,
    pins: [P; NUM_IO],
    slots: [Option<SlotBinding>; TIMER_SLOTS],
}

impl<T: OneShotTimers, P: OutputPin> PulseEngine<T, P> {
    /// Create the engine, all pins low and all slots idle
    pub fn new(timers: T, mut pins: [P; NUM_IO]) -> Self {
        for pin in pins.iter_mut() {
            pin.set_low();
        }
        Self {
            timers,
            pins,
            slots: [None; TIMER_SLOTS],
        }
    }

    /// Start a pulse
    ///
    /// A slot still bound from the previous pass is released first, so a
    /// slot is never bound to two channels.
    pub fn arm(&mut self, token: PulseToken) {
        let slot = token.slot as usize;
        if slot >= TIMER_SLOTS || token.channel as usize >= NUM_IO {
            return;
        }
        self.release(token.slot);

        let (first, extension) = self.timers.width(token.slot).split(token.ticks);
        self.slots[slot] = Some(SlotBinding { token, extension });
        self.pins[token.channel as usize].set_high();
        self.timers.start(token.slot, first);
    }

    /// Handle a completion interrupt of `slot`
    ///
    /// Returns the token once the whole pulse has elapsed and the pin has
    /// been driven low, `None` while extension periods remain or when the
    /// slot was not bound.
    pub fn on_expired(&mut self, slot: TimerSlotId) -> Option<PulseToken> {
        let binding = self.slots.get_mut(slot as usize)?.as_mut()?;
        if binding.extension > 0 {
            binding.extension -= 1;
            if let Some(range) = self.timers.width(slot).full_range() {
                self.timers.start(slot, range);
                return None;
            }
        }
        self.release(slot)
    }

    /// Stop `slot` and drive its pin low
    pub fn release(&mut self, slot: TimerSlotId) -> Option<PulseToken> {
        let binding = self.slots.get_mut(slot as usize)?.take()?;
        self.timers.stop(slot);
        self.pins[binding.token.channel as usize].set_low();
        Some(binding.token)
    }

    /// Current binding of `slot`
    pub fn binding(&self, slot: TimerSlotId) -> Option<&SlotBinding> {
        self.slots.get(slot as usize)?.as_ref()
    }

    /// Number of slots with a pulse in progress
    pub fn armed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn pins(&self) -> &[P; NUM_IO] {
        &self.pins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sim_pins, SimPin, SimTimers};

    fn engine() -> PulseEngine<SimTimers, SimPin> {
        PulseEngine::new(SimTimers::mixed_layout(), sim_pins())
    }

    #[test]
    fn test_position_mapping() {
        assert_eq!(position_to_ticks(0), 3600);
        assert_eq!(position_to_ticks(255), MAX_PULSE_TICKS);
        // 0.9 ms .. 2.11 ms
        assert_eq!(position_to_ticks(0) / TICKS_PER_US, 900);
        assert_eq!(MAX_PULSE_TICKS / TICKS_PER_US, 2111);
    }

    #[test]
    fn test_wide_slot_single_shot() {
        let mut engine = engine();
        let token = PulseToken {
            slot: 0,
            channel: 4,
            ticks: 5000,
        };
        engine.arm(token);
        assert!(engine.pins()[4].is_set_high());
        assert_eq!(engine.timers().loaded(0), &[5000]);

        assert_eq!(engine.on_expired(0), Some(token));
        assert!(engine.pins()[4].is_set_low());
        assert_eq!(engine.armed_count(), 0);
    }

    #[test]
    fn test_narrow_slot_extension() {
        let mut engine = engine();
        let ticks = position_to_ticks(94);
        let token = PulseToken {
            slot: 3,
            channel: 15,
            ticks,
        };
        engine.arm(token);
        assert_eq!(engine.binding(3).map(|b| b.extension), Some((ticks / 256) as u16));

        let mut expiries = 1;
        while engine.on_expired(3).is_none() {
            assert!(engine.pins()[15].is_set_high());
            expiries += 1;
            assert!(expiries < 100);
        }
        assert!(engine.pins()[15].is_set_low());
        assert_eq!(engine.timers().total(3), ticks);
        assert_eq!(expiries as u32, ticks / 256 + 1);
    }

    #[test]
    fn test_rearm_releases_previous_binding() {
        let mut engine = engine();
        engine.arm(PulseToken {
            slot: 1,
            channel: 1,
            ticks: 4000,
        });
        engine.arm(PulseToken {
            slot: 1,
            channel: 5,
            ticks: 4000,
        });
        assert!(engine.pins()[1].is_set_low());
        assert!(engine.pins()[5].is_set_high());
        assert_eq!(engine.binding(1).map(|b| b.token.channel), Some(5));
        assert_eq!(engine.armed_count(), 1);
    }

    #[test]
    fn test_spurious_expiry_ignored() {
        let mut engine = engine();
        assert_eq!(engine.on_expired(2), None);
        assert_eq!(engine.on_expired(9), None);
        assert_eq!(engine.release(2), None);
    }

    #[test]
    fn test_invalid_token_not_armed() {
        let mut engine = engine();
        engine.arm(PulseToken {
            slot: 4,
            channel: 0,
            ticks: 4000,
        });
        engine.arm(PulseToken {
            slot: 0,
            channel: 16,
            ticks: 4000,
        });
        assert_eq!(engine.armed_count(), 0);
    }
}
