//! # docchat-settings
//!
//! Layered configuration for the docchat gateway.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`DocchatSettings::default()`]
//! 2. **User file**: `~/.docchat/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `DOCCHAT_*` plus a few legacy names
//!    (`PORT`, `FRONTEND_URL`, `API_KEY`)
//!
//! The binary validates the result with [`DocchatSettings::validate`] before
//! starting the server.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, home_dir, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;
