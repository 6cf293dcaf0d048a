//! Action numbering for the module's I/O lines
//!
//! Actions are the stable numbers the event teaching table binds events
//! to. Produced actions are raised by the module (input changes, servo
//! milestones), consumed actions are requested by the bus (drive an output,
//! move a servo).

/// Number of I/O lines on the module
pub const NUM_IO: usize = 16;

/// Producer (and consumer) actions owned by each I/O line
pub const ACTIONS_PER_IO: u8 = 4;

/// Total number of producer actions
pub const NUM_PRODUCER_ACTIONS: u8 = NUM_IO as u8 * ACTIONS_PER_IO;

/// Total number of consumer actions
pub const NUM_CONSUMER_ACTIONS: u8 = NUM_IO as u8 * ACTIONS_PER_IO;

/// Total number of actions
pub const NUM_ACTIONS: u8 = NUM_PRODUCER_ACTIONS + NUM_CONSUMER_ACTIONS;

/// Module-level producer action raised once the startup hold has passed
///
/// It belongs to no I/O line, so it sits after the line actions and does
/// not decode through [`Action::from_id`].
pub const START_OF_DAY: ActionId = ActionId(NUM_ACTIONS);

/// Configured type of an I/O line
///
/// Values are the node variable bytes used in persisted configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IoType {
    /// Digital input, produces events on change
    #[default]
    Input = 0,
    /// Digital output, consumes on/off/flash
    Output = 1,
    /// Servo moving between a start and an end position
    Servo = 2,
    /// Servo that bounces on arrival at the end position
    Bounce = 3,
    /// Servo with up to four discrete positions
    Multi = 4,
}

// Wire format values
const TYPE_INPUT: u8 = 0;
const TYPE_OUTPUT: u8 = 1;
const TYPE_SERVO: u8 = 2;
const TYPE_BOUNCE: u8 = 3;
const TYPE_MULTI: u8 = 4;

impl IoType {
    /// Parse a type from its node variable byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            TYPE_INPUT => Some(IoType::Input),
            TYPE_OUTPUT => Some(IoType::Output),
            TYPE_SERVO => Some(IoType::Servo),
            TYPE_BOUNCE => Some(IoType::Bounce),
            TYPE_MULTI => Some(IoType::Multi),
            _ => None,
        }
    }

    /// Convert to node variable byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Returns true for the types driven by the servo engine
    pub fn is_servo_family(self) -> bool {
        matches!(self, IoType::Servo | IoType::Bounce | IoType::Multi)
    }
}

/// One of the four actions owned by an I/O line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Selector {
    First,
    Second,
    Third,
    Fourth,
}

impl Selector {
    /// Create a selector from its offset (0..4)
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Selector::First),
            1 => Some(Selector::Second),
            2 => Some(Selector::Third),
            3 => Some(Selector::Fourth),
            _ => None,
        }
    }

    /// Offset of this selector within the line's actions
    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Raw action number as stored in the event teaching table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActionId(pub u8);

/// A decoded action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Raised by the module
    Produced { io: u8, selector: Selector },
    /// Requested of the module
    Consumed { io: u8, selector: Selector },
}

impl Action {
    /// Create a producer action, `None` if `io` is out of range
    pub fn produced(io: u8, selector: Selector) -> Option<Self> {
        ((io as usize) < NUM_IO).then_some(Action::Produced { io, selector })
    }

    /// Create a consumer action, `None` if `io` is out of range
    pub fn consumed(io: u8, selector: Selector) -> Option<Self> {
        ((io as usize) < NUM_IO).then_some(Action::Consumed { io, selector })
    }

    /// Decode a raw action number
    pub fn from_id(id: ActionId) -> Option<Self> {
        let raw = id.0;
        if raw < NUM_PRODUCER_ACTIONS {
            let selector = Selector::from_index(raw % ACTIONS_PER_IO)?;
            Some(Action::Produced {
                io: raw / ACTIONS_PER_IO,
                selector,
            })
        } else if raw < NUM_ACTIONS {
            let offset = raw - NUM_PRODUCER_ACTIONS;
            let selector = Selector::from_index(offset % ACTIONS_PER_IO)?;
            Some(Action::Consumed {
                io: offset / ACTIONS_PER_IO,
                selector,
            })
        } else {
            None
        }
    }

    /// Raw action number
    pub fn id(self) -> ActionId {
        match self {
            Action::Produced { io, selector } => ActionId(io * ACTIONS_PER_IO + selector.index()),
            Action::Consumed { io, selector } => {
                ActionId(NUM_PRODUCER_ACTIONS + io * ACTIONS_PER_IO + selector.index())
            }
        }
    }

    /// I/O line owning this action
    pub fn io(self) -> u8 {
        match self {
            Action::Produced { io, .. } | Action::Consumed { io, .. } => io,
        }
    }

    /// Selector within the line's actions
    pub fn selector(self) -> Selector {
        match self {
            Action::Produced { selector, .. } | Action::Consumed { selector, .. } => selector,
        }
    }

    /// Check if this action is requested of the module
    pub fn is_consumed(self) -> bool {
        matches!(self, Action::Consumed { .. })
    }
}

/// Producer selectors by line type
pub mod producer {
    use super::Selector;

    pub const INPUT_ON_TO_OFF: Selector = Selector::First;
    pub const INPUT_OFF_TO_ON: Selector = Selector::Second;

    pub const SERVO_OFF: Selector = Selector::First;
    pub const SERVO_MID: Selector = Selector::Second;
    pub const SERVO_ON: Selector = Selector::Third;

    pub const BOUNCE_ON: Selector = Selector::Second;
    pub const BOUNCE_OFF: Selector = Selector::Third;

    /// Arrival at multi-position `n` (1..=4)
    pub fn multi_at(n: u8) -> Option<Selector> {
        Selector::from_index(n.checked_sub(1)?)
    }
}

/// Consumer selectors by line type
pub mod consumer {
    use super::{IoType, Selector};
    use crate::event::Polarity;

    pub const OUTPUT_ON: Selector = Selector::First;
    pub const OUTPUT_FLASH: Selector = Selector::Second;
    pub const OUTPUT_OFF: Selector = Selector::Third;

    pub const SERVO_OFF: Selector = Selector::First;
    pub const SERVO_ON: Selector = Selector::Second;

    pub const BOUNCE_OFF: Selector = Selector::First;
    pub const BOUNCE_ON: Selector = Selector::Second;

    /// Move to multi-position `n` (1..=4)
    pub fn multi_to(n: u8) -> Option<Selector> {
        Selector::from_index(n.checked_sub(1)?)
    }

    /// Event polarity that triggers a consumer action
    ///
    /// Both the ON and OFF action of a line are usually taught to the same
    /// event; the polarity of the received event picks one of them.
    /// Returns `None` for selectors the line type does not consume.
    pub fn trigger_polarity(io_type: IoType, selector: Selector) -> Option<Polarity> {
        match (io_type, selector) {
            (IoType::Output, OUTPUT_ON | OUTPUT_FLASH) => Some(Polarity::On),
            (IoType::Output, OUTPUT_OFF) => Some(Polarity::Off),
            (IoType::Servo, SERVO_ON) | (IoType::Bounce, BOUNCE_ON) => Some(Polarity::On),
            (IoType::Servo, SERVO_OFF) | (IoType::Bounce, BOUNCE_OFF) => Some(Polarity::Off),
            (IoType::Multi, _) => Some(Polarity::On),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_action_numbering() {
        let off = Action::produced(0, producer::SERVO_OFF).unwrap();
        assert_eq!(off.id(), ActionId(0));

        let on = Action::produced(3, producer::SERVO_ON).unwrap();
        assert_eq!(on.id(), ActionId(14));

        let consumed = Action::consumed(0, consumer::SERVO_OFF).unwrap();
        assert_eq!(consumed.id(), ActionId(64));

        let last = Action::consumed(15, Selector::Fourth).unwrap();
        assert_eq!(last.id(), ActionId(127));
    }

    #[test]
    fn test_out_of_range() {
        assert!(Action::produced(16, Selector::First).is_none());
        assert!(Action::consumed(200, Selector::First).is_none());
        assert!(Action::from_id(ActionId(128)).is_none());
        assert!(Action::from_id(START_OF_DAY).is_none());
        assert!(Action::from_id(ActionId(255)).is_none());
    }

    #[test]
    fn test_decode_consumed() {
        let action = Action::from_id(ActionId(64 + 4 * 5 + 1)).unwrap();
        assert!(action.is_consumed());
        assert_eq!(action.io(), 5);
        assert_eq!(action.selector(), consumer::SERVO_ON);
    }

    #[test]
    fn test_multi_selectors() {
        assert_eq!(producer::multi_at(1), Some(Selector::First));
        assert_eq!(producer::multi_at(4), Some(Selector::Fourth));
        assert_eq!(producer::multi_at(0), None);
        assert_eq!(consumer::multi_to(5), None);
    }

    #[test]
    fn test_trigger_polarity() {
        use crate::event::Polarity;

        let servo_on = consumer::trigger_polarity(IoType::Servo, consumer::SERVO_ON);
        assert_eq!(servo_on, Some(Polarity::On));
        let bounce_off = consumer::trigger_polarity(IoType::Bounce, consumer::BOUNCE_OFF);
        assert_eq!(bounce_off, Some(Polarity::Off));
        let flash = consumer::trigger_polarity(IoType::Output, consumer::OUTPUT_FLASH);
        assert_eq!(flash, Some(Polarity::On));
        assert_eq!(
            consumer::trigger_polarity(IoType::Multi, Selector::Fourth),
            Some(Polarity::On)
        );
        assert_eq!(consumer::trigger_polarity(IoType::Servo, Selector::Third), None);
        assert_eq!(consumer::trigger_polarity(IoType::Input, Selector::First), None);
    }

    #[test]
    fn test_io_type_bytes() {
        assert_eq!(IoType::from_byte(2), Some(IoType::Servo));
        assert_eq!(IoType::Multi.to_byte(), 4);
        assert_eq!(IoType::from_byte(9), None);
        assert_eq!(IoType::default(), IoType::Input);
    }

    #[test]
    fn test_servo_family() {
        assert!(IoType::Servo.is_servo_family());
        assert!(IoType::Bounce.is_servo_family());
        assert!(IoType::Multi.is_servo_family());
        assert!(!IoType::Input.is_servo_family());
        assert!(!IoType::Output.is_servo_family());
    }

    proptest! {
        #[test]
        fn prop_every_valid_id_decodes_to_itself(raw in 0u8..NUM_ACTIONS) {
            let action = Action::from_id(ActionId(raw)).unwrap();
            prop_assert_eq!(action.id(), ActionId(raw));
            prop_assert!((action.io() as usize) < NUM_IO);
            prop_assert_eq!(action.is_consumed(), raw >= NUM_PRODUCER_ACTIONS);
        }
    }
}
