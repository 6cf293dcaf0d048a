//! Motion state machine
//!
//! Runs every 20 ms for every servo line:
//!
//! ```text
//!            command              arrival
//!   OFF ───────────────► MOVING ─────────► STOPPED
//!    ▲                     ▲                  │
//!    │                     └──── command ─────┤
//!    └──────────── 1 s after arrival ─────────┘
//! ```

use canmio_protocol::Polarity;

use super::channel::{Channel, EventFlags, ServoState};
use super::milestone::{Milestone, MilestoneKind, MilestoneSink};

/// Time a line holds position after arrival before it is parked
pub const STOPPED_TIMEOUT_MS: u32 = 1000;

/// Motion tick period
pub const MOTION_PERIOD_MS: u32 = 20;

/// Scheduling pass period
pub const SCHEDULE_PERIOD_MS: u32 = 5;

impl Channel {
    /// Advance this line by one motion tick
    ///
    /// Returns true when the line arrived at its target on this tick.
    pub fn advance<S: MilestoneSink>(&mut self, now_ms: u32, sink: &mut S) -> bool {
        match self.state {
            ServoState::Off => false,
            ServoState::Stopped => {
                if now_ms.wrapping_sub(self.stopped_at) >= STOPPED_TIMEOUT_MS {
                    self.state = ServoState::Off;
                }
                false
            }
            ServoState::Moving => self.step(now_ms, sink),
        }
    }

    fn step<S: MilestoneSink>(&mut self, now_ms: u32, sink: &mut S) -> bool {
        if self.current_pos != self.target_pos {
            let speed = self.speed.max(1);
            let midpoint = self.config.travel().map(|travel| travel.midpoint());

            if self.current_pos < self.target_pos {
                let before = midpoint.is_some_and(|mid| self.current_pos < mid);
                self.current_pos = self.current_pos.saturating_add(speed).min(self.target_pos);
                let crossed = midpoint.is_some_and(|mid| self.current_pos >= mid);
                if before && crossed {
                    self.emit_mid(sink);
                }
            } else {
                let before = midpoint.is_some_and(|mid| self.current_pos > mid);
                self.current_pos = self.current_pos.saturating_sub(speed).max(self.target_pos);
                let crossed = midpoint.is_some_and(|mid| self.current_pos <= mid);
                if before && crossed {
                    self.emit_mid(sink);
                }
            }
        }

        if self.current_pos != self.target_pos {
            return false;
        }

        self.state = ServoState::Stopped;
        self.stopped_at = now_ms;

        let kind = if self.flags.contains(EventFlags::ON) {
            Some(MilestoneKind::On)
        } else if self.flags.contains(EventFlags::OFF) {
            Some(MilestoneKind::Off)
        } else {
            None
        };
        self.flags.remove(EventFlags::ON | EventFlags::OFF);

        if let Some(kind) = kind {
            sink.on_milestone(Milestone {
                channel: self.index,
                kind,
                polarity: Polarity::from_bool(kind == MilestoneKind::On),
                position: self.multi_target,
            });
        }
        true
    }

    fn emit_mid<S: MilestoneSink>(&mut self, sink: &mut S) {
        if !self.flags.contains(EventFlags::MID) {
            return;
        }
        self.flags.remove(EventFlags::MID);
        sink.on_milestone(Milestone {
            channel: self.index,
            kind: MilestoneKind::Mid,
            // Midpoint is reported as ON in both directions
            polarity: Polarity::On,
            position: None,
        });
    }
}
