//! Node data partition in the RP2040's QSPI flash
//!
//! A `sequential-storage` map over the top 64KB of the 2MB part holds the
//! node variables and the servo positions. Positions are rewritten every
//! time the servos come to rest, and the map spreads those writes over
//! the whole partition.

use core::ops::Range;

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

pub use canmio_hal::flash::{FlashError, StorageKey};

/// Size of the flash part on the Pico
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Space reserved for node data at the top of flash (matches memory.x)
pub const NODE_DATA_SIZE: usize = 64 * 1024;

/// Flash offsets covered by the node data map
pub const NODE_DATA_RANGE: Range<u32> = (FLASH_SIZE - NODE_DATA_SIZE) as u32..FLASH_SIZE as u32;

/// Scratch space for one map item: the TOML node variables plus header
const ITEM_BUFFER_SIZE: usize = 2048;

type NodeFlash<'d> = Flash<'d, FLASH, Async, FLASH_SIZE>;

/// Node data storage on the RP2040
pub struct Rp2040FlashStorage<'d> {
    flash: NodeFlash<'d>,
}

impl<'d> Rp2040FlashStorage<'d> {
    /// Take the flash peripheral, using `dma` for reads
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }
}

impl canmio_hal::FlashStorage for Rp2040FlashStorage<'_> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let mut item = [0u8; ITEM_BUFFER_SIZE];

        let stored = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            NODE_DATA_RANGE,
            &mut NoCache::new(),
            &mut item,
            &key,
        )
        .await
        .map_err(|_| FlashError::Storage)?
        .ok_or(FlashError::NotFound)?;

        let target = buffer
            .get_mut(..stored.len())
            .ok_or(FlashError::BufferTooSmall)?;
        target.copy_from_slice(stored);
        Ok(stored.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        let mut item = [0u8; ITEM_BUFFER_SIZE];

        map::store_item(
            &mut self.flash,
            NODE_DATA_RANGE,
            &mut NoCache::new(),
            &mut item,
            &key,
            &data,
        )
        .await
        .map_err(|e| match e {
            sequential_storage::Error::FullStorage => FlashError::Full,
            sequential_storage::Error::Corrupted { .. } => FlashError::Corrupted,
            _ => FlashError::Storage,
        })
    }
}
