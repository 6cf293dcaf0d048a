//! Motion milestones
//!
//! Milestones are reported synchronously from the motion tick. The
//! receiver turns them into bus events and must not block.

use canmio_protocol::{action::producer, Action, IoType, Polarity};

use super::command::MultiPosition;
use crate::config::NUM_IO;

/// Most milestones one motion tick can report
///
/// A line whose step spans the midpoint reports MID and its arrival in
/// the same tick.
pub const MAX_MILESTONES_PER_TICK: usize = 2 * NUM_IO;

/// Which point of the motion was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MilestoneKind {
    /// Arrived at the target of an ON motion
    On,
    /// Arrived at the target of an OFF motion
    Off,
    /// Crossed the midpoint of travel
    Mid,
}

/// A milestone reached by one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Milestone {
    pub channel: u8,
    pub kind: MilestoneKind,
    pub polarity: Polarity,
    /// Discrete position arrived at, for multi-position lines
    pub position: Option<MultiPosition>,
}

impl Milestone {
    /// Producer action raised for this milestone on a line of `io_type`
    ///
    /// Bounce lines have no midpoint action.
    pub fn producer_action(&self, io_type: IoType) -> Option<Action> {
        let selector = match (io_type, self.kind) {
            (IoType::Servo, MilestoneKind::Off) => producer::SERVO_OFF,
            (IoType::Servo, MilestoneKind::Mid) => producer::SERVO_MID,
            (IoType::Servo, MilestoneKind::On) => producer::SERVO_ON,
            (IoType::Bounce, MilestoneKind::On) => producer::BOUNCE_ON,
            (IoType::Bounce, MilestoneKind::Off) => producer::BOUNCE_OFF,
            (IoType::Multi, MilestoneKind::On) => producer::multi_at(self.position?.number())?,
            _ => return None,
        };
        Action::produced(self.channel, selector)
    }
}

/// Receiver of milestones
pub trait MilestoneSink {
    fn on_milestone(&mut self, milestone: Milestone);
}

impl<F: FnMut(Milestone)> MilestoneSink for F {
    fn on_milestone(&mut self, milestone: Milestone) {
        self(milestone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canmio_protocol::ActionId;

    fn milestone(channel: u8, kind: MilestoneKind) -> Milestone {
        Milestone {
            channel,
            kind,
            polarity: Polarity::from_bool(kind != MilestoneKind::Off),
            position: None,
        }
    }

    #[test]
    fn test_servo_actions() {
        let mid = milestone(2, MilestoneKind::Mid).producer_action(IoType::Servo);
        assert_eq!(mid.map(Action::id), Some(ActionId(9)));

        let on = milestone(2, MilestoneKind::On).producer_action(IoType::Servo);
        assert_eq!(on.map(Action::id), Some(ActionId(10)));
    }

    #[test]
    fn test_bounce_has_no_mid() {
        assert!(milestone(0, MilestoneKind::Mid)
            .producer_action(IoType::Bounce)
            .is_none());
        let off = milestone(0, MilestoneKind::Off).producer_action(IoType::Bounce);
        assert_eq!(off.map(Action::id), Some(ActionId(2)));
    }

    #[test]
    fn test_multi_arrival_action() {
        let arrived = Milestone {
            position: Some(MultiPosition::Three),
            ..milestone(1, MilestoneKind::On)
        };
        assert_eq!(
            arrived.producer_action(IoType::Multi).map(Action::id),
            Some(ActionId(4 + 2))
        );
        assert!(milestone(1, MilestoneKind::On)
            .producer_action(IoType::Multi)
            .is_none());
    }

    #[test]
    fn test_closure_sink() {
        let mut count = 0;
        let mut sink = |_: Milestone| count += 1;
        sink.on_milestone(milestone(0, MilestoneKind::On));
        sink.on_milestone(milestone(0, MilestoneKind::Off));
        assert_eq!(count, 2);
    }
}
