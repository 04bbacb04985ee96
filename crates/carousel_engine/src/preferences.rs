use carousel_logging::carousel_warn;

use crate::storage::{KeyValueStore, StorageError};

/// Storage key for the theme preference.
pub const DARK_MODE_KEY: &str = "dark_mode";

/// The stored theme preference, or `None` when unset or unreadable.
pub fn load_dark_mode(storage: &dyn KeyValueStore) -> Option<bool> {
    match storage.get(DARK_MODE_KEY) {
        Ok(Some(raw)) => match raw.trim() {
            "true" => Some(true),
            "false" => Some(false),
            other => {
                carousel_warn!("Ignoring unreadable dark mode preference {:?}", other);
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            carousel_warn!("Could not read dark mode preference: {}", err);
            None
        }
    }
}

pub fn save_dark_mode(storage: &mut dyn KeyValueStore, enabled: bool) -> Result<(), StorageError> {
    storage.set(DARK_MODE_KEY, if enabled { "true" } else { "false" })
}
