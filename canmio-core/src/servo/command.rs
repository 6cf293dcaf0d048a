//! Motion commands
//!
//! Commands arrive from the event consumption layer as a line index plus
//! an action selector. Each command fixes the target, the speed and the
//! milestones the resulting motion reports.

use canmio_protocol::{action::consumer, IoType, Selector};

use crate::config::ChannelConfig;

use super::channel::EventFlags;

/// One of the four discrete positions of a multi-position line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MultiPosition {
    One,
    Two,
    Three,
    Four,
}

impl MultiPosition {
    /// Create from a 1-based position number
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(MultiPosition::One),
            2 => Some(MultiPosition::Two),
            3 => Some(MultiPosition::Three),
            4 => Some(MultiPosition::Four),
            _ => None,
        }
    }

    /// 1-based position number
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    /// 0-based index into the position table
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A request to move a servo line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoCommand {
    /// Move to the end position, reporting ON
    MoveToEnd,
    /// Move to the start position, reporting OFF
    MoveToStart,
    /// Move to a discrete position of a multi-position line
    MoveToPosition(MultiPosition),
}

impl ServoCommand {
    /// Command requested by a consumed action on a line of `io_type`
    ///
    /// Returns `None` for line types the servo engine does not drive.
    pub fn from_consumed(io_type: IoType, selector: Selector) -> Option<Self> {
        match io_type {
            IoType::Servo => match selector {
                consumer::SERVO_OFF => Some(ServoCommand::MoveToStart),
                consumer::SERVO_ON => Some(ServoCommand::MoveToEnd),
                _ => None,
            },
            IoType::Bounce => match selector {
                consumer::BOUNCE_OFF => Some(ServoCommand::MoveToStart),
                consumer::BOUNCE_ON => Some(ServoCommand::MoveToEnd),
                _ => None,
            },
            IoType::Multi => MultiPosition::from_number(selector.index() + 1)
                .map(ServoCommand::MoveToPosition),
            IoType::Input | IoType::Output => None,
        }
    }
}

/// Motion parameters resolved from a command and a line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MotionPlan {
    pub target: u8,
    pub speed: u8,
    pub flags: EventFlags,
    pub multi_target: Option<MultiPosition>,
}

/// Resolve `command` against `config`
///
/// Returns `None` when the command does not apply: wrong line type, or a
/// multi position beyond the configured count.
pub(crate) fn plan(config: &ChannelConfig, command: ServoCommand) -> Option<MotionPlan> {
    match (config, command) {
        (ChannelConfig::Servo(travel) | ChannelConfig::Bounce(travel), ServoCommand::MoveToEnd) => {
            Some(MotionPlan {
                target: travel.end_pos,
                speed: travel.on_speed,
                flags: EventFlags::ON | EventFlags::MID,
                multi_target: None,
            })
        }
        (
            ChannelConfig::Servo(travel) | ChannelConfig::Bounce(travel),
            ServoCommand::MoveToStart,
        ) => Some(MotionPlan {
            target: travel.start_pos,
            speed: travel.off_speed,
            flags: EventFlags::OFF | EventFlags::MID,
            multi_target: None,
        }),
        (ChannelConfig::Multi(multi), ServoCommand::MoveToPosition(position)) => {
            Some(MotionPlan {
                target: multi.position(position.index())?,
                speed: multi.speed,
                flags: EventFlags::ON,
                multi_target: Some(position),
            })
        }
        _ => None,
    }
}
