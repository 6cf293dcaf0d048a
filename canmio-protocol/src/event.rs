//! CBUS accessory event messages
//!
//! Message format:
//! - OPCODE (1 byte): ACON/ACOF for long events, ASON/ASOF for short events
//! - NN (2 bytes, big endian): node number of the sender
//! - EN (2 bytes, big endian): event number (device number for short events)
//!
//! A long event is identified by its node and event number together. A
//! short event is identified by the event number alone; the node field
//! still carries the sender's node number on the wire.

/// Length of an encoded accessory event message
pub const EVENT_MESSAGE_LEN: usize = 5;

// Wire format values
const OPC_ACON: u8 = 0x90;
const OPC_ACOF: u8 = 0x91;
const OPC_ASON: u8 = 0x98;
const OPC_ASOF: u8 = 0x99;

/// Errors that can occur encoding or decoding an event message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventError {
    /// Buffer too small for encoding
    BufferTooSmall,
    /// Message is shorter than an accessory event
    Incomplete,
    /// Opcode is not an accessory on/off event
    UnknownOpcode,
}

/// On/off state carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    On,
    Off,
}

impl Polarity {
    /// Convert from a boolean where `true` is on
    pub fn from_bool(on: bool) -> Self {
        if on {
            Polarity::On
        } else {
            Polarity::Off
        }
    }

    /// Returns true for the on polarity
    pub fn is_on(self) -> bool {
        matches!(self, Polarity::On)
    }
}

/// Accessory event opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    /// Long event on
    Acon = OPC_ACON,
    /// Long event off
    Acof = OPC_ACOF,
    /// Short event on
    Ason = OPC_ASON,
    /// Short event off
    Asof = OPC_ASOF,
}

impl Opcode {
    /// Parse an opcode from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            OPC_ACON => Some(Opcode::Acon),
            OPC_ACOF => Some(Opcode::Acof),
            OPC_ASON => Some(Opcode::Ason),
            OPC_ASOF => Some(Opcode::Asof),
            _ => None,
        }
    }

    /// Select the opcode for an event shape and polarity
    pub fn select(short: bool, polarity: Polarity) -> Self {
        match (short, polarity) {
            (false, Polarity::On) => Opcode::Acon,
            (false, Polarity::Off) => Opcode::Acof,
            (true, Polarity::On) => Opcode::Ason,
            (true, Polarity::Off) => Opcode::Asof,
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Returns true for short event opcodes
    pub fn is_short(self) -> bool {
        matches!(self, Opcode::Ason | Opcode::Asof)
    }

    /// Polarity carried by this opcode
    pub fn polarity(self) -> Polarity {
        match self {
            Opcode::Acon | Opcode::Ason => Polarity::On,
            Opcode::Acof | Opcode::Asof => Polarity::Off,
        }
    }
}

/// Identity of a taught event
///
/// Short events are stored with `node == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventId {
    pub node: u16,
    pub event: u16,
}

impl EventId {
    /// Create a long event identity
    pub const fn long(node: u16, event: u16) -> Self {
        Self { node, event }
    }

    /// Create a short event identity
    pub const fn short(event: u16) -> Self {
        Self { node: 0, event }
    }

    /// Returns true if this is a short event
    pub fn is_short(&self) -> bool {
        self.node == 0
    }
}

/// An accessory event message as sent on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessoryEvent {
    pub opcode: Opcode,
    /// Node number field on the wire
    pub node: u16,
    pub event: u16,
}

impl AccessoryEvent {
    /// Build the message that announces `id` from node `own_node`
    pub fn new(id: EventId, polarity: Polarity, own_node: u16) -> Self {
        let short = id.is_short();
        Self {
            opcode: Opcode::select(short, polarity),
            node: if short { own_node } else { id.node },
            event: id.event,
        }
    }

    /// Identity of the event carried by this message
    pub fn id(&self) -> EventId {
        if self.opcode.is_short() {
            EventId::short(self.event)
        } else {
            EventId::long(self.node, self.event)
        }
    }

    /// Polarity carried by this message
    pub fn polarity(&self) -> Polarity {
        self.opcode.polarity()
    }

    /// Encode into a buffer, returning the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, EventError> {
        let out = buffer
            .get_mut(..EVENT_MESSAGE_LEN)
            .ok_or(EventError::BufferTooSmall)?;
        out[0] = self.opcode.to_byte();
        out[1..3].copy_from_slice(&self.node.to_be_bytes());
        out[3..5].copy_from_slice(&self.event.to_be_bytes());
        Ok(EVENT_MESSAGE_LEN)
    }

    /// Decode from a received message
    pub fn decode(data: &[u8]) -> Result<Self, EventError> {
        let opcode = Opcode::from_byte(*data.first().ok_or(EventError::Incomplete)?)
            .ok_or(EventError::UnknownOpcode)?;
        if data.len() < EVENT_MESSAGE_LEN {
            return Err(EventError::Incomplete);
        }
        Ok(Self {
            opcode,
            node: u16::from_be_bytes([data[1], data[2]]),
            event: u16::from_be_bytes([data[3], data[4]]),
        })
    }
}
