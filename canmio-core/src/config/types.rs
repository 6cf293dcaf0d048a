//! Configuration type definitions
//!
//! These types represent the module's node variables: the type of each
//! I/O line and the servo parameters that go with it. Configuration is
//! stored in flash as postcard-serialized binary data.

use canmio_protocol::IoType;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of I/O lines on the module
pub const NUM_IO: usize = canmio_protocol::NUM_IO;

/// Maximum discrete positions of a multi-position servo
pub const MAX_MULTI_POSITIONS: usize = 4;

/// Minimum discrete positions of a multi-position servo
pub const MIN_MULTI_POSITIONS: usize = 2;

/// Current node variable layout version
pub const CONFIG_VERSION: u8 = 2;

/// Hold-off after power up before servos run and start of day is sent
pub const STARTUP_DELAY_MS: u32 = 2000;

/// Unit of the start of day delay node variable
pub const SOD_DELAY_UNIT_MS: u32 = 100;

/// Travel configuration for servo and bounce lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServoConfig {
    /// Position for the OFF end of travel
    pub start_pos: u8,
    /// Position for the ON end of travel
    pub end_pos: u8,
    /// Increment per motion tick when moving to the end
    pub on_speed: u8,
    /// Increment per motion tick when moving to the start
    pub off_speed: u8,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            start_pos: 64,
            end_pos: 192,
            on_speed: 4,
            off_speed: 4,
        }
    }
}

impl ServoConfig {
    /// Midpoint of travel, rounded down
    pub fn midpoint(&self) -> u8 {
        ((self.start_pos as u16 + self.end_pos as u16) / 2) as u8
    }
}

/// Configuration for a multi-position servo
///
/// Deserialization goes through [`MultiConfig::new`], so a stored record
/// with a position count outside 2..=4 is rejected rather than loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "StoredMultiConfig"))]
pub struct MultiConfig {
    positions: [u8; MAX_MULTI_POSITIONS],
    count: u8,
    /// Increment per motion tick for every move
    pub speed: u8,
}

impl Default for MultiConfig {
    fn default() -> Self {
        Self {
            positions: [64, 192, 0, 0],
            count: 2,
            speed: 4,
        }
    }
}

impl MultiConfig {
    /// Create from a list of 2 to 4 positions
    pub fn new(positions: &[u8], speed: u8) -> Option<Self> {
        if !(MIN_MULTI_POSITIONS..=MAX_MULTI_POSITIONS).contains(&positions.len()) {
            return None;
        }
        let mut table = [0u8; MAX_MULTI_POSITIONS];
        table[..positions.len()].copy_from_slice(positions);
        Some(Self {
            positions: table,
            count: positions.len() as u8,
            speed,
        })
    }

    /// Number of configured positions
    pub fn count(&self) -> usize {
        self.count as usize
    }

    /// Position for a 0-based index, `None` beyond the configured count
    pub fn position(&self, index: usize) -> Option<u8> {
        self.positions().get(index).copied()
    }

    /// Configured positions
    pub fn positions(&self) -> &[u8] {
        self.positions.get(..self.count()).unwrap_or(&[])
    }
}

/// Wire layout of [`MultiConfig`] before validation
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct StoredMultiConfig {
    positions: [u8; MAX_MULTI_POSITIONS],
    count: u8,
    speed: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<StoredMultiConfig> for MultiConfig {
    type Error = &'static str;

    fn try_from(stored: StoredMultiConfig) -> Result<Self, Self::Error> {
        let positions = stored
            .positions
            .get(..stored.count as usize)
            .ok_or("multi position count out of range")?;
        MultiConfig::new(positions, stored.speed).ok_or("multi position count out of range")
    }
}

/// Configuration of a single I/O line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelConfig {
    #[default]
    Input,
    Output,
    Servo(ServoConfig),
    Bounce(ServoConfig),
    Multi(MultiConfig),
}

impl ChannelConfig {
    /// Line type
    pub fn io_type(&self) -> IoType {
        match self {
            ChannelConfig::Input => IoType::Input,
            ChannelConfig::Output => IoType::Output,
            ChannelConfig::Servo(_) => IoType::Servo,
            ChannelConfig::Bounce(_) => IoType::Bounce,
            ChannelConfig::Multi(_) => IoType::Multi,
        }
    }

    /// Check if the servo engine drives this line
    pub fn is_servo_family(&self) -> bool {
        self.io_type().is_servo_family()
    }

    /// Start/end travel for servo and bounce lines
    pub fn travel(&self) -> Option<&ServoConfig> {
        match self {
            ChannelConfig::Servo(travel) | ChannelConfig::Bounce(travel) => Some(travel),
            _ => None,
        }
    }

    /// Position a servo-family line rests at when nothing was saved
    pub fn home_position(&self) -> Option<u8> {
        match self {
            ChannelConfig::Servo(travel) | ChannelConfig::Bounce(travel) => Some(travel.start_pos),
            ChannelConfig::Multi(multi) => multi.position(0),
            _ => None,
        }
    }
}

/// Complete module configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModuleConfig {
    /// Layout version
    pub version: u8,
    /// Per-line configuration, indexed by line number
    pub channels: [ChannelConfig; NUM_IO],
    /// Extra start of day hold in 100 ms units, 0 disables start of day
    pub sod_delay: u8,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleConfig {
    /// All lines configured as inputs (factory state)
    pub const fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            channels: [ChannelConfig::Input; NUM_IO],
            sod_delay: 0,
        }
    }

    /// Time from power up until servos run
    pub fn startup_hold_ms(&self) -> u32 {
        STARTUP_DELAY_MS + self.sod_delay as u32 * SOD_DELAY_UNIT_MS
    }

    /// Check if the start of day event is announced after the hold
    pub fn sends_start_of_day(&self) -> bool {
        self.sod_delay > 0
    }

    /// Configuration of line `io`
    pub fn channel(&self, io: usize) -> Option<&ChannelConfig> {
        self.channels.get(io)
    }

    /// Resting positions for every line, 0 for non-servo lines
    pub fn home_positions(&self) -> [u8; NUM_IO] {
        core::array::from_fn(|io| self.channels[io].home_position().unwrap_or(0))
    }

    /// Number of lines driven by the servo engine
    pub fn servo_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_servo_family()).count()
    }
}
