//! Servo position persistence
//!
//! Loads and saves the last known servo positions so a reboot does not
//! make the servos jump.

use defmt::*;

use canmio_core::config::{SavedPositions, NUM_IO};
use canmio_hal_rp2040::flash::{FlashError, StorageKey};
use canmio_hal_rp2040::{FlashStorageTrait, Rp2040FlashStorage};

/// Maximum serialized position record size
const MAX_POSITIONS_SIZE: usize = 64;

/// Position persistence errors
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PositionsError {
    /// Flash operation failed
    Flash(FlashError),
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// Invalid magic, version or CRC
    InvalidFormat,
}

impl From<FlashError> for PositionsError {
    fn from(e: FlashError) -> Self {
        PositionsError::Flash(e)
    }
}

/// Load saved positions from flash
///
/// Returns `home` if nothing is stored or the record is invalid.
pub async fn load_positions(
    storage: &mut Rp2040FlashStorage<'_>,
    home: [u8; NUM_IO],
) -> [u8; NUM_IO] {
    match load_positions_inner(storage).await {
        Ok(positions) => {
            info!("Restored servo positions from flash");
            debug!("  {:?}", positions);
            positions
        }
        Err(PositionsError::Flash(FlashError::NotFound)) => {
            debug!("No saved positions, using home positions");
            home
        }
        Err(e) => {
            warn!("Failed to load positions: {:?}, using home positions", e);
            home
        }
    }
}

async fn load_positions_inner(
    storage: &mut Rp2040FlashStorage<'_>,
) -> Result<[u8; NUM_IO], PositionsError> {
    let mut buffer = [0u8; MAX_POSITIONS_SIZE];
    let len = storage
        .read(StorageKey::ServoPositions, &mut buffer)
        .await?;

    let saved: SavedPositions =
        postcard::from_bytes(&buffer[..len]).map_err(|_| PositionsError::Deserialize)?;

    saved.restore().ok_or(PositionsError::InvalidFormat)
}

/// Save a position snapshot to flash
pub async fn save_positions(
    storage: &mut Rp2040FlashStorage<'_>,
    positions: [u8; NUM_IO],
) -> Result<(), PositionsError> {
    let saved = SavedPositions::new(positions);

    let mut buffer = [0u8; MAX_POSITIONS_SIZE];
    let bytes = postcard::to_slice(&saved, &mut buffer).map_err(|_| PositionsError::Serialize)?;

    storage.write(StorageKey::ServoPositions, bytes).await?;

    debug!("Saved servo positions ({} bytes)", bytes.len());
    Ok(())
}
