//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Uses embassy-sync primitives for safe async communication.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use canmio_core::config::{ChannelConfig, ModuleConfig, NUM_IO};
use canmio_core::servo::{Milestone, MAX_MILESTONES_PER_TICK};
use canmio_protocol::{AccessoryEvent, Action};

/// Channel capacity for bus traffic in each direction
const BUS_CHANNEL_SIZE: usize = 8;

/// Channel capacity for servo requests
const SERVO_CHANNEL_SIZE: usize = 8;

/// Channel capacity for milestones (the motion tick never yields while reporting)
const MILESTONE_CHANNEL_SIZE: usize = MAX_MILESTONES_PER_TICK;

/// A node variable write for one line
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineConfig {
    pub io: u8,
    pub config: ChannelConfig,
}

/// Work for the servo task
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoRequest {
    /// Consumed action from a received event
    Action(Action),
    /// New configuration for one line
    Reconfigure(LineConfig),
}

/// Accessory events received by the bus transport
pub static BUS_RX: Channel<CriticalSectionRawMutex, AccessoryEvent, BUS_CHANNEL_SIZE> =
    Channel::new();

/// Accessory events for the bus transport to send
pub static BUS_TX: Channel<CriticalSectionRawMutex, AccessoryEvent, BUS_CHANNEL_SIZE> =
    Channel::new();

/// Node variable writes from the bus layer
pub static LINE_CONFIG: Channel<CriticalSectionRawMutex, LineConfig, BUS_CHANNEL_SIZE> =
    Channel::new();

/// Requests from the event task to the servo task
pub static SERVO_REQUESTS: Channel<CriticalSectionRawMutex, ServoRequest, SERVO_CHANNEL_SIZE> =
    Channel::new();

/// Milestones reported by the motion tick
pub static MILESTONES: Channel<CriticalSectionRawMutex, Milestone, MILESTONE_CHANNEL_SIZE> =
    Channel::new();

/// Raised by the servo task once the startup hold has passed
pub static START_OF_DAY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Latest servo positions to persist (updated when a servo comes to rest)
pub static POSITIONS: Signal<CriticalSectionRawMutex, [u8; NUM_IO]> = Signal::new();

/// Module configuration to persist (updated on reconfiguration)
pub static CONFIG_CHANGED: Signal<CriticalSectionRawMutex, ModuleConfig> = Signal::new();
