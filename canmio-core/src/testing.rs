//! Host test doubles for the timer bank and output pins

use canmio_hal::{CounterWidth, OneShotTimers, OutputPin, TimerSlotId, TIMER_SLOTS};
use heapless::Vec;

use crate::config::NUM_IO;

/// Virtual timer bank recording every load
pub struct SimTimers {
    widths: [CounterWidth; TIMER_SLOTS],
    running: [bool; TIMER_SLOTS],
    loads: [Vec<u32, 64>; TIMER_SLOTS],
}

impl SimTimers {
    pub fn new(widths: [CounterWidth; TIMER_SLOTS]) -> Self {
        Self {
            widths,
            running: [false; TIMER_SLOTS],
            loads: Default::default(),
        }
    }

    /// All slots wide
    pub fn wide() -> Self {
        Self::new([CounterWidth::Wide; TIMER_SLOTS])
    }

    /// Two wide slots and two 8-bit slots
    pub fn mixed_layout() -> Self {
        Self::new([
            CounterWidth::Wide,
            CounterWidth::Wide,
            CounterWidth::Narrow { bits: 8 },
            CounterWidth::Narrow { bits: 8 },
        ])
    }

    pub fn is_running(&self, slot: TimerSlotId) -> bool {
        self.running[slot as usize]
    }

    /// Loads of the latest pulse on `slot`
    pub fn loaded(&self, slot: TimerSlotId) -> &[u32] {
        &self.loads[slot as usize]
    }

    /// Width of the latest pulse on `slot`
    pub fn total(&self, slot: TimerSlotId) -> u32 {
        self.loaded(slot).iter().sum()
    }

    pub fn running_count(&self) -> usize {
        self.running.iter().filter(|r| **r).count()
    }
}

impl OneShotTimers for SimTimers {
    fn width(&self, slot: TimerSlotId) -> CounterWidth {
        self.widths[slot as usize]
    }

    fn start(&mut self, slot: TimerSlotId, ticks: u32) {
        let slot = slot as usize;
        if let Some(range) = self.widths[slot].full_range() {
            assert!(ticks > 0 && ticks <= range, "load {} out of range", ticks);
        }
        // A start on a stopped slot begins a new pulse
        if !self.running[slot] {
            self.loads[slot].clear();
        }
        self.running[slot] = true;
        self.loads[slot].push(ticks).expect("too many loads");
    }

    fn stop(&mut self, slot: TimerSlotId) {
        self.running[slot as usize] = false;
    }
}

/// Output pin recording its level and edge count
#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
    pub rising_edges: u32,
}

impl OutputPin for SimPin {
    fn set_high(&mut self) {
        if !self.high {
            self.rising_edges += 1;
        }
        self.high = true;
    }

    fn set_low(&mut self) {
        self.high = false;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

pub fn sim_pins() -> [SimPin; NUM_IO] {
    core::array::from_fn(|_| SimPin::default())
}
