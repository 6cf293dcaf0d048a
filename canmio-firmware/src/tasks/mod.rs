//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod events;
pub mod persist;
pub mod pulse;
pub mod servo;

pub use events::events_task;
pub use persist::persist_task;
pub use pulse::{pulse_task, PulseIrqs, SharedEngine};
pub use servo::servo_task;
