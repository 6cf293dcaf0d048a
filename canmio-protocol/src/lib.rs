//! CBUS protocol definitions for the CANMIO module
//!
//! This crate defines how the module's I/O lines appear on the CBUS:
//! the numbering of the actions that events are taught against, and the
//! accessory event messages that carry them.
//!
//! # Action Overview
//!
//! Every I/O line owns four producer and four consumer action numbers:
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │ Producer actions 0..64       │ Consumer actions 64..128     │
//! │ 4 * io + selector            │ 64 + 4 * io + selector       │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Action 128 is the module-level start of day producer action.
//!
//! What a selector means depends on the line's [`IoType`]. The
//! [`EventTable`] maps taught events to these action numbers in both
//! directions.

#![no_std]
#![deny(unsafe_code)]

pub mod action;
pub mod defaults;
pub mod event;
pub mod table;

pub use action::{Action, ActionId, IoType, Selector, NUM_ACTIONS, NUM_IO, START_OF_DAY};
pub use defaults::{default_events, start_of_day_default, DefaultEvent};
pub use event::{AccessoryEvent, EventError, EventId, Opcode, Polarity, EVENT_MESSAGE_LEN};
pub use table::{EventTable, TableError};
