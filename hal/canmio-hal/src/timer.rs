//! One-shot pulse timer abstractions
//!
//! The servo outputs are timed by a small bank of hardware one-shot
//! counters. Each counter is started with a tick count, counts it down in
//! hardware and raises a completion interrupt when it expires. Counters do
//! not re-arm on their own.
//!
//! Some counters are narrower than the longest pulse. Those report a
//! [`CounterWidth::Narrow`] width and the caller completes long pulses by
//! re-starting the counter for additional full-range periods.

/// Number of one-shot timers available for servo pulses
pub const TIMER_SLOTS: usize = 4;

/// Index of a timer in the bank (0..TIMER_SLOTS)
pub type TimerSlotId = u8;

/// Native counting range of a one-shot timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterWidth {
    /// Counter covers any pulse width in a single shot
    Wide,
    /// Counter holds at most `bits` bits; longer pulses need extension
    Narrow {
        /// Counter register width in bits (1..=16)
        bits: u8,
    },
}

impl CounterWidth {
    /// Number of ticks in one full-range period of a narrow counter
    ///
    /// Returns `None` for wide counters.
    pub fn full_range(self) -> Option<u32> {
        match self {
            CounterWidth::Wide => None,
            CounterWidth::Narrow { bits } => Some(1u32 << bits.clamp(1, 16)),
        }
    }

    /// Split a pulse into the first load and the number of extra full-range
    /// periods that must follow it
    ///
    /// The sum `first + extension * full_range` is always `ticks`. A narrow
    /// split never loads zero: when the low part is empty the first shot is a
    /// full period instead.
    pub fn split(self, ticks: u32) -> (u32, u16) {
        match self.full_range() {
            None => (ticks, 0),
            Some(range) => {
                let low = ticks % range;
                let high = ticks / range;
                if low == 0 && high > 0 {
                    (range, (high - 1) as u16)
                } else {
                    (low, high as u16)
                }
            }
        }
    }
}

/// Bank of hardware one-shot timers
///
/// Implementations start and stop the counters only. Binding a timer to a
/// channel and driving the output pin is the caller's job.
pub trait OneShotTimers {
    /// Native width of the timer in `slot`
    fn width(&self, slot: TimerSlotId) -> CounterWidth;

    /// Start the timer in `slot` counting `ticks` increments
    ///
    /// `ticks` never exceeds the slot's range. When the count expires the
    /// platform raises the slot's completion interrupt.
    fn start(&mut self, slot: TimerSlotId, ticks: u32);

    /// Stop the timer in `slot`, discarding any pending count
    fn stop(&mut self, slot: TimerSlotId);
}
