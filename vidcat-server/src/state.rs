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

use std::{fs, io, path::{Path, PathBuf}, sync::RwLock};

use actix_web::web;
use chrono::{DateTime, Utc};
use cloneable_errors::{bail, ErrContext, ErrorContext, ResContext};
use log::info;
use serde::{Deserialize, Serialize};
use vidcat_catalog::VideoCatalog;

pub type CatalogLock = web::Data<RwLock<VideoCatalog>>;

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub static_content_path: PathBuf,
    pub listen: ListenConfig,
    pub fixtures: FixtureConfig,
    /// Artificial delay added to every API response, in milliseconds
    pub simulated_latency_ms: u64,
    pub enable_timings_header: bool,
    /// Maximum accepted size of an upload request body, in bytes
    pub max_upload_size: usize,
    #[serde(skip)]
    pub startup_timestamp: DateTime<Utc>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            static_content_path: PathBuf::from("./static"),
            listen: ListenConfig::default(),
            fixtures: FixtureConfig::default(),
            simulated_latency_ms: 0,
            enable_timings_header: false,
            max_upload_size: 256 * 1024 * 1024,
            startup_timestamp: Utc::now(),
        }
    }
}

impl AppConfig {
    /// Reads the config file at `path`, writing out the defaults if it does not exist yet
    pub fn load_or_create(path: &Path) -> Result<Self, ErrorContext> {
        let display = path.display();
        let cfg = match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).with_context(|| format!("Failed to deserialize contents of {display}"))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let cfg = Self::default();
                let serialized = toml::to_string(&cfg).context("Failed to serialize default AppConfig as TOML")?;
                fs::write(path, serialized).with_context(|| format!("Failed to write default configuration to {display}"))?;
                info!("Wrote default configuration to {display}");
                cfg
            },
            Err(e) => return Err(e.context(format!("Failed to read {display}"))),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ErrorContext> {
        if self.listen.tcp.is_none() && self.listen.unix.is_none() {
            bail!("Invalid configuration - no tcp port or unix socket path specified");
        }
        if self.max_upload_size == 0 {
            bail!("Invalid configuration - max_upload_size must be greater than 0");
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub seed: String,
    pub count: usize,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            seed: "vidcat".to_owned(),
            count: 48,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ListenConfig {
    pub tcp: Option<(String, u16)>,
    pub unix: Option<String>,
    pub unix_mode: Option<u32>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            tcp: Some(("0.0.0.0".to_owned(), 9393)),
            unix: None,
            unix_mode: None,
        }
    }
}
