//! Channel scheduler
//!
//! The 16 lines are served in four blocks of four, one block every 5 ms,
//! so every line gets a pulse opportunity every 20 ms. Line `block * 4 +
//! slot` uses timer slot `slot`.

use canmio_hal::{OneShotTimers, OutputPin, TimerSlotId, TIMER_SLOTS};

use crate::config::NUM_IO;

use super::channel::{Channel, ServoState};
use super::pulse::{position_to_ticks, PulseEngine, PulseToken};

/// Number of blocks in one full sweep
pub const BLOCKS: u8 = (NUM_IO / TIMER_SLOTS) as u8;

/// Receiver of scheduled pulses
///
/// Implemented by [`PulseEngine`]; the firmware wraps it to reach the
/// engine shared with the completion interrupt.
pub trait PulseSink {
    /// Start the pulse described by `token`
    fn arm(&mut self, token: PulseToken);

    /// Stop whatever pulse `slot` is running
    fn release(&mut self, slot: TimerSlotId) -> Option<PulseToken>;
}

impl<T: OneShotTimers, P: OutputPin> PulseSink for PulseEngine<T, P> {
    fn arm(&mut self, token: PulseToken) {
        PulseEngine::arm(self, token)
    }

    fn release(&mut self, slot: TimerSlotId) -> Option<PulseToken> {
        PulseEngine::release(self, slot)
    }
}

/// Result of one scheduling pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockPass {
    /// Block served by this pass
    pub block: u8,
    /// Number of slots armed
    pub armed: u8,
}

/// Rotating block selector
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelScheduler {
    block: u8,
}

impl Default for ChannelScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelScheduler {
    /// Create a scheduler whose first pass serves block 0
    pub const fn new() -> Self {
        Self { block: BLOCKS - 1 }
    }

    /// Block served by the latest pass
    pub fn block(&self) -> u8 {
        self.block
    }

    /// Line served by `slot` while `block` is active
    pub fn channel_for(block: u8, slot: TimerSlotId) -> usize {
        block as usize * TIMER_SLOTS + slot as usize
    }

    /// Serve the next block
    ///
    /// A line no longer of a servo type is parked here, so a reconfigured
    /// line never receives a stale pulse.
    pub fn start_scheduling<S: PulseSink>(
        &mut self,
        channels: &mut [Channel; NUM_IO],
        sink: &mut S,
    ) -> BlockPass {
        self.block = (self.block + 1) % BLOCKS;
        let mut armed = 0;

        for slot in 0..TIMER_SLOTS as TimerSlotId {
            let channel = &mut channels[Self::channel_for(self.block, slot)];

            if !channel.config.is_servo_family() && channel.state != ServoState::Off {
                channel.park();
            }

            if channel.is_schedulable() {
                sink.arm(PulseToken {
                    slot,
                    channel: channel.index,
                    ticks: position_to_ticks(channel.current_pos),
                });
                armed += 1;
            } else {
                sink.release(slot);
            }
        }

        BlockPass {
            block: self.block,
            armed,
        }
    }
}
