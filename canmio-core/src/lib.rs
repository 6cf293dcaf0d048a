//! Board-agnostic core logic for the CANMIO firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Servo engine: line records, motion state machine, commands
//! - Pulse multiplexing of 16 lines over 4 one-shot timers
//! - Milestone reporting for the event layer
//! - Configuration type definitions and the TOML module description

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod servo;

#[cfg(test)]
mod testing;
