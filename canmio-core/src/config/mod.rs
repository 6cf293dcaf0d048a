//! Configuration types
//!
//! Board-agnostic line configuration, stored as postcard binary data or
//! parsed from the TOML module description.

pub mod positions;
pub mod toml;
pub mod types;

pub use positions::*;
pub use toml::{parse_config, ParseError};
pub use types::*;
