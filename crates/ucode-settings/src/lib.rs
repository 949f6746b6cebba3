//! # ucode-settings
//!
//! Configuration management with layered sources for the ucode agent client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`UcodeSettings::default()`]
//! 2. **User file**: `~/.ucode/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `UCODE_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use ucode_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("agent endpoint: {}", settings.endpoint.ws_url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`], or explicitly through
/// [`init_settings`] when the caller loaded settings from a custom path.
static SETTINGS: OnceLock<UcodeSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.ucode/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> &'static UcodeSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns `Err(settings)` if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: UcodeSettings) -> std::result::Result<(), UcodeSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
