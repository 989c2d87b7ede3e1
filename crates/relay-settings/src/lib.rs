//! # relay-settings
//!
//! Configuration for the chat relay, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.relay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `RELAY_*` overrides (highest priority)
//!
//! The binary applies its CLI flags on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::{LoggingSettings, RelaySettings, RelayTuning, ServerSettings};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = RelaySettings::default();
        let _path = settings_path();
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = RelaySettings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.chat_path, "/chat");
        assert_eq!(settings.server.static_dir, "../public");
        assert_eq!(settings.server.max_message_size, 1 << 20);
        assert_eq!(settings.relay.write_timeout_ms, 10_000);
        assert!(settings.validate().is_ok());
    }
}
