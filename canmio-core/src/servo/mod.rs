//! Servo motion and pulse multiplexing
//!
//! Sixteen lines share four one-shot timers. The [`ServoBank`] owns the
//! line records; the firmware calls [`ServoBank::start_scheduling`] every
//! 5 ms and [`ServoBank::advance_motion`] every 20 ms. Completion
//! interrupts go straight to the [`PulseEngine`].

pub mod bank;
pub mod channel;
pub mod command;
pub mod milestone;
pub mod motion;
pub mod pulse;
pub mod scheduler;

pub use bank::ServoBank;
pub use channel::{Channel, EventFlags, ServoState};
pub use command::{MultiPosition, ServoCommand};
pub use milestone::{Milestone, MilestoneKind, MilestoneSink, MAX_MILESTONES_PER_TICK};
pub use motion::{MOTION_PERIOD_MS, SCHEDULE_PERIOD_MS, STOPPED_TIMEOUT_MS};
pub use pulse::{position_to_ticks, PulseEngine, PulseToken, SlotBinding};
pub use scheduler::{BlockPass, ChannelScheduler, PulseSink, BLOCKS};
