//! # huddle-settings
//!
//! Configuration management with layered sources for huddle.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HuddleSettings::default()`]
//! 2. **Settings file**: `~/.huddle/settings.json` or an explicit path, deep-merged over defaults
//! 3. **Environment variables**: `HUDDLE_*` overrides (highest priority)
//!
//! Settings are loaded once at startup and injected; there is no global cache.
//!
//! ```no_run
//! let settings = huddle_settings::load_settings().unwrap_or_default();
//! println!("listening on {}", settings.bind_addr());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, expand_home, load_settings, load_settings_from_path, settings_path};
pub use types::*;
