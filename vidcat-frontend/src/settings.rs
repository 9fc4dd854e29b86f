/* This file is part of the Vidcat project
*
*  Copyright (C) 2025 the Vidcat contributors
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::{num::NonZeroUsize, rc::Rc, time::Duration};

use cloneable_errors::ErrContext;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{constants::SETTINGS_KEY, errors::StorageError, persistence::KeyValueStorage};

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Absolute, or relative to the page origin
    pub api_base_url: Rc<str>,
    pub stale_time_secs: u64,
    pub cache_time_secs: u64,
    pub retry_delay_ms: u64,
    pub progress_flush_interval_secs: u64,
    pub controls_hide_delay_secs: u64,
    pub default_page_size: NonZeroUsize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "/api".into(),
            stale_time_secs: 300,
            cache_time_secs: 300,
            retry_delay_ms: 1000,
            progress_flush_interval_secs: 5,
            controls_hide_delay_secs: 3,
            default_page_size: 10.try_into().unwrap(),
        }
    }
}

impl ClientSettings {
    /// Reads the settings from storage, falling back to the defaults when absent or unreadable
    pub fn load(storage: &dyn KeyValueStorage) -> ClientSettings {
        match storage.get_item(SETTINGS_KEY) {
            Ok(None) => ClientSettings::default(),
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!("Stored settings are malformed, using defaults: {err}");
                ClientSettings::default()
            }),
            Err(err) => {
                warn!("Failed to read stored settings, using defaults: {err}");
                ClientSettings::default()
            },
        }
    }

    pub fn save(&self, storage: &dyn KeyValueStorage) -> Result<(), StorageError> {
        let json = serde_json::to_string(self)
            .map_err(|err| StorageError::Serialize(err.context("Failed to serialize settings")))?;
        storage.set_item(SETTINGS_KEY, &json)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn cache_time(&self) -> Duration {
        Duration::from_secs(self.cache_time_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn progress_flush_interval(&self) -> Duration {
        Duration::from_secs(self.progress_flush_interval_secs)
    }

    pub fn controls_hide_delay(&self) -> Duration {
        Duration::from_secs(self.controls_hide_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::MemoryStorage;

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let storage = MemoryStorage::new();
        storage.set_item(SETTINGS_KEY, r#"{"stale_time_secs": 60, "unknown": true}"#).unwrap();
        let settings = ClientSettings::load(&storage);
        assert_eq!(settings.stale_time(), Duration::from_secs(60));
        assert_eq!(settings.cache_time(), Duration::from_secs(300));
        assert_eq!(&*settings.api_base_url, "/api");
    }

    #[test]
    fn garbage_and_absence_fall_back() {
        let storage = MemoryStorage::new();
        assert_eq!(ClientSettings::load(&storage), ClientSettings::default());
        storage.set_item(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(ClientSettings::load(&storage), ClientSettings::default());
        storage.set_item(SETTINGS_KEY, r#"{"default_page_size": 0}"#).unwrap();
        assert_eq!(ClientSettings::load(&storage), ClientSettings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let storage = MemoryStorage::new();
        let settings = ClientSettings { retry_delay_ms: 250, ..ClientSettings::default() };
        settings.save(&storage).unwrap();
        assert_eq!(ClientSettings::load(&storage), settings);
    }
}
