//! Persistence task
//!
//! Owns the flash storage after boot. Servo positions are written once
//! the servos have been at rest for a while, so a sequence of moves costs
//! a single flash write. Configuration changes are written straight away.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::{with_timeout, Duration};

use canmio_hal_rp2040::Rp2040FlashStorage;

use crate::channels::{CONFIG_CHANGED, POSITIONS};
use crate::config::{save_config, save_positions};

/// Quiet time after the last arrival before positions are written
pub const POSITION_SAVE_DELAY_MS: u64 = 2000;

/// Persistence task
#[embassy_executor::task]
pub async fn persist_task(mut storage: Rp2040FlashStorage<'static>) {
    info!("Persist task started");

    loop {
        match select(POSITIONS.wait(), CONFIG_CHANGED.wait()).await {
            Either::First(mut positions) => {
                // Restart the delay on every newer snapshot
                while let Ok(newer) = with_timeout(
                    Duration::from_millis(POSITION_SAVE_DELAY_MS),
                    POSITIONS.wait(),
                )
                .await
                {
                    positions = newer;
                }

                if let Err(e) = save_positions(&mut storage, positions).await {
                    warn!("Failed to save servo positions: {:?}", e);
                }
            }
            Either::Second(config) => {
                if let Err(e) = save_config(&mut storage, &config).await {
                    error!("Failed to save node variables: {:?}", e);
                }
            }
        }
    }
}
