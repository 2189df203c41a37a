//! # camrelay-settings
//!
//! Configuration for the camera relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Config file**: JSON at `--config` or `CAMRELAY_CONFIG` (deep-merged over defaults)
//! 3. **Environment variables**: `PORT` and `CAMRELAY_*` overrides (highest priority)
//!
//! There is no global instance: the binary loads once at startup and hands
//! the values to the server.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_overrides, deep_merge, load_settings, load_settings_with, settings_path};
pub use types::*;
