//! Default event bindings
//!
//! When a line's type changes, the teaching table is cleared for that line
//! and re-seeded with these defaults. Each default uses the module's own
//! node number and the line number plus one as the event number.
//! The start of day action defaults to its own event number.

use heapless::Vec;

use crate::action::{consumer, producer, Action, ActionId, IoType, START_OF_DAY};
use crate::event::EventId;

/// A default binding between an event and one of the line's actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DefaultEvent {
    pub event: EventId,
    pub action: ActionId,
}

/// Event number announced at start of day until another is taught
pub const DEFAULT_START_OF_DAY_EVENT: u16 = 0x81;

/// Default binding for the start of day action
pub fn start_of_day_default(node: u16) -> DefaultEvent {
    DefaultEvent {
        event: EventId::long(node, DEFAULT_START_OF_DAY_EVENT),
        action: START_OF_DAY,
    }
}

/// Default bindings for line `io` of the given type
///
/// Inputs produce their on/off changes, outputs and servos consume on/off
/// requests. Multi-position lines have no sensible default and get none.
pub fn default_events(node: u16, io: u8, io_type: IoType) -> Vec<DefaultEvent, 2> {
    let mut defaults = Vec::new();
    let event = EventId::long(node, io as u16 + 1);

    let actions = match io_type {
        IoType::Input => [
            Action::produced(io, producer::INPUT_ON_TO_OFF),
            Action::produced(io, producer::INPUT_OFF_TO_ON),
        ],
        IoType::Output => [
            Action::consumed(io, consumer::OUTPUT_ON),
            Action::consumed(io, consumer::OUTPUT_OFF),
        ],
        IoType::Servo => [
            Action::consumed(io, consumer::SERVO_ON),
            Action::consumed(io, consumer::SERVO_OFF),
        ],
        IoType::Bounce => [
            Action::consumed(io, consumer::BOUNCE_ON),
            Action::consumed(io, consumer::BOUNCE_OFF),
        ],
        IoType::Multi => [None, None],
    };

    for action in actions.into_iter().flatten() {
        // Capacity matches the two actions per type
        let _ = defaults.push(DefaultEvent {
            event,
            action: action.id(),
        });
    }
    defaults
}
