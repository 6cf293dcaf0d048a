//! Saved servo positions
//!
//! Last known position of every line, persisted when servos come to rest
//! so that the next boot restores them without a jump.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::types::NUM_IO;

/// Magic number to identify valid position data
pub const POSITIONS_MAGIC: u32 = 0x5352_5650; // "SRVP"

/// Current position data version
pub const POSITIONS_VERSION: u8 = 1;

/// Position data stored in flash
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SavedPositions {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Position of each line
    pub positions: [u8; NUM_IO],
    /// CRC32 checksum (calculated over magic..positions)
    pub crc: u32,
}

impl SavedPositions {
    /// Wrap a position snapshot, computing its CRC
    pub fn new(positions: [u8; NUM_IO]) -> Self {
        let mut saved = Self {
            magic: POSITIONS_MAGIC,
            version: POSITIONS_VERSION,
            positions,
            crc: 0,
        };
        saved.crc = saved.calculate_crc();
        saved
    }

    /// Check the header and checksum
    pub fn is_valid(&self) -> bool {
        self.magic == POSITIONS_MAGIC
            && self.version == POSITIONS_VERSION
            && self.crc == self.calculate_crc()
    }

    /// Positions if the data is valid
    pub fn restore(&self) -> Option<[u8; NUM_IO]> {
        self.is_valid().then_some(self.positions)
    }

    /// Calculate CRC32 for the data (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;
        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);
        crc = crc32_update(crc, &self.positions);
        !crc
    }
}

/// CRC32 update (IEEE 802.3 polynomial)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
