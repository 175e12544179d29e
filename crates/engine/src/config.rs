// Hotedit - Active statement tracking for live-edit debugging
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Tracking configuration.
//!
//! The configuration is a small TOML file. It is looked up at the path named by
//! `HOTEDIT_CONFIG`, then at `~/.hotedit.toml`; a missing file means defaults.
//!
//! ```toml
//! track_opened_documents = true
//! notification_capacity = 16
//! baseline_batch_size = 0
//! ```

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use eyre::{Result, WrapErr};
use hotedit_common::env::HOTEDIT_CONFIG;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name of the per-user configuration in the home directory.
pub const CONFIG_FILE_NAME: &str = ".hotedit.toml";

/// Settings of an [`ActiveStatementTrackingService`](crate::ActiveStatementTrackingService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Initialize spans for documents opened after tracking started.
    pub track_opened_documents: bool,
    /// Capacity of the tracking-changed broadcast channel.
    pub notification_capacity: usize,
    /// Maximum number of documents per baseline provider call. Zero means a
    /// single call for all open documents.
    pub baseline_batch_size: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self { track_opened_documents: true, notification_capacity: 16, baseline_batch_size: 0 }
    }
}

impl TrackingConfig {
    /// Disable or enable on-open initialization.
    pub fn with_track_opened_documents(mut self, enabled: bool) -> Self {
        self.track_opened_documents = enabled;
        self
    }

    /// Set the baseline batch size.
    pub fn with_baseline_batch_size(mut self, size: usize) -> Self {
        self.baseline_batch_size = size;
        self
    }

    /// Default configuration path: `$HOTEDIT_CONFIG`, else `~/.hotedit.toml`.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(HOTEDIT_CONFIG).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let home =
            dirs::home_dir().ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, returning defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as TOML: {path:?}"))?;

        if config.notification_capacity == 0 {
            eyre::bail!("notification_capacity must be positive in {path:?}");
        }

        debug!("Loaded tracking configuration from {:?}", path);
        Ok(config)
    }

    /// Load from [`config_path`](Self::config_path).
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::config_path()?)
    }

    /// Write the configuration to `path` as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).wrap_err("Failed to serialize config to TOML")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path:?}"))?;
        debug!("Saved tracking configuration to {:?}", path);
        Ok(())
    }
}
