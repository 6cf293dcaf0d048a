//! Event teaching table
//!
//! Holds the taught bindings between bus events and the module's actions.
//! Producer actions map to at most one event each (the event announced when
//! the action is raised). Consumer bindings are many-to-many: one event may
//! drive several actions and one action may be driven by several events.
//! The module-level start of day action is held like a producer action.
//!
//! The table lives in RAM. Persisting it and the bus opcodes that teach it
//! belong to the bus layer.

use heapless::Vec;

use crate::action::{Action, ActionId, IoType, NUM_PRODUCER_ACTIONS, START_OF_DAY};
use crate::defaults::{default_events, start_of_day_default};
use crate::event::EventId;

/// Maximum number of consumer bindings
pub const MAX_CONSUMED_BINDINGS: usize = 192;

/// Errors from teaching the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    /// Action number outside the module's range
    InvalidAction,
    /// No room for another consumer binding
    Full,
}

/// A consumer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Binding {
    event: EventId,
    action: ActionId,
}

/// Taught event bindings for all sixteen lines
pub struct EventTable {
    produced: [Option<EventId>; NUM_PRODUCER_ACTIONS as usize],
    start_of_day: Option<EventId>,
    consumed: Vec<Binding, MAX_CONSUMED_BINDINGS>,
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTable {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            produced: [None; NUM_PRODUCER_ACTIONS as usize],
            start_of_day: None,
            consumed: Vec::new(),
        }
    }

    /// Bind `event` to `action`
    ///
    /// Teaching a producer action replaces its previous event. Teaching an
    /// existing consumer binding again is a no-op.
    pub fn teach(&mut self, event: EventId, action: ActionId) -> Result<(), TableError> {
        if action == START_OF_DAY {
            self.start_of_day = Some(event);
            return Ok(());
        }
        match Action::from_id(action).ok_or(TableError::InvalidAction)? {
            Action::Produced { .. } => {
                self.produced[action.0 as usize] = Some(event);
                Ok(())
            }
            Action::Consumed { .. } => {
                let binding = Binding { event, action };
                if self.consumed.contains(&binding) {
                    return Ok(());
                }
                self.consumed.push(binding).map_err(|_| TableError::Full)
            }
        }
    }

    /// Remove the binding between `event` and `action`
    pub fn unlearn(&mut self, event: EventId, action: ActionId) {
        if action == START_OF_DAY {
            if self.start_of_day == Some(event) {
                self.start_of_day = None;
            }
            return;
        }
        match Action::from_id(action) {
            Some(Action::Produced { .. }) => {
                let slot = &mut self.produced[action.0 as usize];
                if *slot == Some(event) {
                    *slot = None;
                }
            }
            Some(Action::Consumed { .. }) => {
                self.consumed
                    .retain(|b| !(b.event == event && b.action == action));
            }
            None => {}
        }
    }

    /// Event announced when `action` is raised
    pub fn produced_event(&self, action: Action) -> Option<EventId> {
        match action {
            Action::Produced { .. } => self.produced[action.id().0 as usize],
            Action::Consumed { .. } => None,
        }
    }

    /// Event announced at start of day
    pub fn start_of_day_event(&self) -> Option<EventId> {
        self.start_of_day
    }

    /// Actions requested by a received `event`, in teaching order
    pub fn consumed_actions(&self, event: EventId) -> impl Iterator<Item = Action> + '_ {
        self.consumed
            .iter()
            .filter(move |b| b.event == event)
            .filter_map(|b| Action::from_id(b.action))
    }

    /// Forget every binding owned by line `io`
    pub fn clear_io(&mut self, io: u8) {
        for (raw, slot) in self.produced.iter_mut().enumerate() {
            if Action::from_id(ActionId(raw as u8)).is_some_and(|a| a.io() == io) {
                *slot = None;
            }
        }
        self.consumed
            .retain(|b| Action::from_id(b.action).is_some_and(|a| a.io() != io));
    }

    /// Replace line `io`'s bindings with the defaults for `io_type`
    pub fn apply_defaults(&mut self, node: u16, io: u8, io_type: IoType) -> Result<(), TableError> {
        self.clear_io(io);
        for default in default_events(node, io, io_type) {
            self.teach(default.event, default.action)?;
        }
        Ok(())
    }

    /// Bind the start of day action to its default event
    pub fn apply_module_defaults(&mut self, node: u16) -> Result<(), TableError> {
        let default = start_of_day_default(node);
        self.teach(default.event, default.action)
    }

    /// Number of consumer bindings
    pub fn consumed_len(&self) -> usize {
        self.consumed.len()
    }
}
