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

//! Names of the environment variables hotedit reads.
//!
//! - [`HOTEDIT_ASSERT`] selects which modules evaluate the path-gated assertions
//! - [`HOTEDIT_CONFIG`] points at the tracking configuration file
//! - [`HOTEDIT_LOG_DIR`] overrides where log files are written

/// Selects the modules whose `hotedit_assert!` family of macros is evaluated.
///
/// The value is a comma-separated list of module path prefixes, or `*`/`all`.
///
/// ```bash
/// HOTEDIT_ASSERT=hotedit_engine::tracking cargo test
/// HOTEDIT_ASSERT=* hotedit replay scenario.toml
/// ```
///
/// When unset or empty, those assertions are disabled. See [`crate::macros`].
pub const HOTEDIT_ASSERT: &str = "HOTEDIT_ASSERT";

/// Path of the TOML tracking configuration.
///
/// When unset, `~/.hotedit.toml` is used if it exists. The CLI's `--config`
/// argument takes precedence over both.
pub const HOTEDIT_CONFIG: &str = "HOTEDIT_CONFIG";

/// Directory for rolling log files.
///
/// Defaults to `hotedit-logs` under the system temp directory.
pub const HOTEDIT_LOG_DIR: &str = "HOTEDIT_LOG_DIR";
