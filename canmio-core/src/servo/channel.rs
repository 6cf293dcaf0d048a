//! Per-line servo state

use bitflags::bitflags;

use crate::config::ChannelConfig;

use super::command::MultiPosition;

bitflags! {
    /// Milestones the current motion should report
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventFlags: u8 {
        /// Report arrival as an ON event
        const ON = 0x01;
        /// Report arrival as an OFF event
        const OFF = 0x02;
        /// Report crossing the midpoint of travel
        const MID = 0x04;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EventFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "EventFlags({=u8:#x})", self.bits())
    }
}

/// Motion state of a servo line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoState {
    /// No pulses, servo parked and unpowered
    #[default]
    Off,
    /// At target, pulses still issued to hold position
    Stopped,
    /// Stepping toward the target every motion tick
    Moving,
}

/// One I/O line and its motion state
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    pub(crate) index: u8,
    pub(crate) config: ChannelConfig,
    pub(crate) state: ServoState,
    pub(crate) current_pos: u8,
    pub(crate) target_pos: u8,
    pub(crate) speed: u8,
    pub(crate) flags: EventFlags,
    /// Millisecond timestamp of the last arrival
    pub(crate) stopped_at: u32,
    /// Discrete position being moved to (multi-position lines)
    pub(crate) multi_target: Option<MultiPosition>,
}

impl Channel {
    /// Create a parked line at `position`
    pub fn new(index: u8, config: ChannelConfig, position: u8) -> Self {
        Self {
            index,
            config,
            state: ServoState::Off,
            current_pos: position,
            target_pos: position,
            speed: 0,
            flags: EventFlags::empty(),
            stopped_at: 0,
            multi_target: None,
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn state(&self) -> ServoState {
        self.state
    }

    pub fn current_pos(&self) -> u8 {
        self.current_pos
    }

    pub fn target_pos(&self) -> u8 {
        self.target_pos
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn flags(&self) -> EventFlags {
        self.flags
    }

    pub fn stopped_at(&self) -> u32 {
        self.stopped_at
    }

    /// Check if the scheduler should emit a pulse for this line
    pub fn is_schedulable(&self) -> bool {
        self.config.is_servo_family() && self.state != ServoState::Off
    }

    /// Park the line: no further pulses, motion abandoned
    pub(crate) fn park(&mut self) {
        self.state = ServoState::Off;
        self.target_pos = self.current_pos;
        self.flags = EventFlags::empty();
        self.multi_target = None;
    }
}
