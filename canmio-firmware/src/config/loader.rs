//! Configuration persistence
//!
//! Loads the module configuration from flash storage.
//! Falls back to embedded defaults if flash is empty.

use core::str;
use defmt::*;

use canmio_core::config::{parse_config, ModuleConfig, CONFIG_VERSION};
use canmio_hal_rp2040::flash::{FlashError, StorageKey};
// Import the FlashStorage trait to bring methods into scope
use canmio_hal_rp2040::{FlashStorageTrait, Rp2040FlashStorage};

/// Maximum serialized config size (binary)
const MAX_CONFIG_SIZE: usize = 256;

/// Maximum TOML config size
const MAX_TOML_SIZE: usize = 2048;

/// Configuration persistence errors
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Flash operation failed
    Flash(FlashError),
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// TOML parsing failed
    TomlParse,
    /// Invalid UTF-8 in TOML data
    InvalidUtf8,
    /// Config version mismatch
    VersionMismatch,
}

impl From<FlashError> for ConfigError {
    fn from(e: FlashError) -> Self {
        ConfigError::Flash(e)
    }
}

/// Configuration persistence manager
///
/// Handles loading and saving the module configuration.
pub struct ConfigPersistence<'d> {
    storage: Rp2040FlashStorage<'d>,
}

impl<'d> ConfigPersistence<'d> {
    /// Create a new config persistence manager
    pub fn new(storage: Rp2040FlashStorage<'d>) -> Self {
        Self { storage }
    }

    /// Consume this persistence manager and return the underlying storage
    ///
    /// The storage is handed on to the persist task afterwards.
    pub fn into_storage(self) -> Rp2040FlashStorage<'d> {
        self.storage
    }

    /// Get the underlying storage
    pub fn storage(&mut self) -> &mut Rp2040FlashStorage<'d> {
        &mut self.storage
    }

    /// Load configuration from flash
    ///
    /// Node variables written at runtime (postcard) come first, then TOML
    /// text. Returns an error if neither is present and valid.
    pub async fn load(&mut self) -> Result<ModuleConfig, ConfigError> {
        info!("Loading configuration from flash...");

        match self.load_binary().await {
            Ok(config) => {
                info!("Loaded node variables");
                return Ok(config);
            }
            Err(ConfigError::Flash(FlashError::NotFound)) => {
                debug!("No node variables found, trying TOML");
            }
            Err(e) => {
                warn!("Failed to load node variables: {:?}, trying TOML", e);
            }
        }

        self.load_toml().await
    }

    /// Load configuration from TOML format
    async fn load_toml(&mut self) -> Result<ModuleConfig, ConfigError> {
        let mut buffer = [0u8; MAX_TOML_SIZE];
        let len = self
            .storage
            .read(StorageKey::NodeVariablesToml, &mut buffer)
            .await?;

        debug!("Read {} bytes of TOML from flash", len);

        let toml_str = str::from_utf8(&buffer[..len]).map_err(|_| ConfigError::InvalidUtf8)?;

        let config = parse_config(toml_str).map_err(|e| {
            warn!("TOML parse error: {:?}", e);
            ConfigError::TomlParse
        })?;

        log_config_summary(&config);
        Ok(config)
    }

    /// Load configuration from binary postcard format
    async fn load_binary(&mut self) -> Result<ModuleConfig, ConfigError> {
        let mut buffer = [0u8; MAX_CONFIG_SIZE];
        let len = self
            .storage
            .read(StorageKey::NodeVariables, &mut buffer)
            .await?;

        debug!("Read {} bytes of node variables from flash", len);

        let config: ModuleConfig =
            postcard::from_bytes(&buffer[..len]).map_err(|_| ConfigError::Deserialize)?;

        if config.version != CONFIG_VERSION {
            warn!(
                "Config version mismatch: found {}, expected {}",
                config.version, CONFIG_VERSION
            );
            return Err(ConfigError::VersionMismatch);
        }

        log_config_summary(&config);
        Ok(config)
    }
}

/// Save the module configuration as node variables
pub async fn save_config(
    storage: &mut Rp2040FlashStorage<'_>,
    config: &ModuleConfig,
) -> Result<(), ConfigError> {
    let mut buffer = [0u8; MAX_CONFIG_SIZE];
    let bytes = postcard::to_slice(config, &mut buffer).map_err(|_| ConfigError::Serialize)?;

    debug!("Saving {} bytes of node variables to flash", bytes.len());

    storage.write(StorageKey::NodeVariables, bytes).await?;

    info!("Saved node variables to flash");
    Ok(())
}

/// Log a summary of the loaded configuration
pub fn log_config_summary(config: &ModuleConfig) {
    info!("Configuration loaded successfully");
    debug!("  {} servo lines", config.servo_count());
    for (io, channel) in config.channels.iter().enumerate() {
        if channel.is_servo_family() {
            debug!("  io {}: {:?}", io, channel);
        }
    }
}
