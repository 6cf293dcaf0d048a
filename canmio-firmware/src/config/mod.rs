//! Configuration loading and persistence
//!
//! Loads the module configuration from flash or embedded defaults, and
//! keeps servo positions across reboots.

pub mod loader;
pub mod positions;

pub use loader::{log_config_summary, save_config, ConfigPersistence};
pub use positions::{load_positions, save_positions};
