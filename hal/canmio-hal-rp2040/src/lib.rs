//! RP2040-specific HAL for the CANMIO firmware
//!
//! This crate provides RP2040-specific implementations of the shared
//! `canmio-hal` traits:
//!
//! - PIO-based one-shot pulse timers (implements `canmio_hal::OneShotTimers`)
//! - Flash storage driver (implements `canmio_hal::FlashStorage`)
//!
//! Servo output pins are plain `embassy_rp::gpio::Output`s wrapped in
//! `canmio_hal::HalPin`.

#![no_std]

pub mod flash;
pub mod pio;

// Re-export shared traits from canmio-hal for convenience
pub use canmio_hal::{FlashStorage as FlashStorageTrait, OneShotTimers, StorageKey};
pub use flash::Rp2040FlashStorage;
pub use pio::PioPulseTimers;
