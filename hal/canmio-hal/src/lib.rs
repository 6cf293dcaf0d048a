//! CANMIO Hardware Abstraction Layer
//!
//! This crate defines hardware abstraction traits that can be implemented
//! by chip-specific HALs (RP2040, ...). The servo engine in `canmio-core`
//! is written against these traits only, so it runs unchanged on the host
//! under test and on the target.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (canmio-firmware)          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  canmio-core (servo engine)             │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  canmio-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │  canmio-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`] - Digital outputs driving the servo signal lines
//! - [`timer::OneShotTimers`] - The bank of hardware one-shot pulse timers
//! - [`flash::FlashStorage`] - Persistent storage

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod gpio;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use flash::{FlashError, FlashStorage, StorageKey};
pub use gpio::{HalPin, OutputPin};
pub use timer::{CounterWidth, OneShotTimers, TimerSlotId, TIMER_SLOTS};
