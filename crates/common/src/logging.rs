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

//! Logging setup shared by the hotedit binary and the test suites.
//!
//! Console output goes to stderr, pretty-printed and filtered through `RUST_LOG` (default
//! `info`). The binary additionally writes a daily-rolling plain-text log under
//! [`HOTEDIT_LOG_DIR`](crate::env::HOTEDIT_LOG_DIR), or `<tmp>/hotedit-logs/<component>`.

use std::{env, fs, path::PathBuf, sync::Once};

use eyre::{eyre, Result, WrapErr};
use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::env::HOTEDIT_LOG_DIR;

/// Keeps the non-blocking file writer flushing for the life of the process.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn default_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err("Failed to create environment filter")
}

/// Initializes console logging and, optionally, rolling file logging.
///
/// Fails if a global subscriber is already installed.
///
/// ```rust,no_run
/// hotedit_common::logging::init_logging("hotedit", true)?;
/// tracing::info!("ready");
/// # Ok::<(), eyre::Report>(())
/// ```
pub fn init_logging(component_name: &str, enable_file_logging: bool) -> Result<()> {
    let env_filter = default_filter("info")?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .pretty();

    if enable_file_logging {
        let log_dir = create_log_directory(component_name)?;
        let file_appender = rolling::daily(&log_dir, format!("{component_name}.log"));
        let (writer, guard) = non_blocking(file_appender);
        let _ = FILE_GUARD.set(guard);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(LocalTime::rfc_3339())
            .with_ansi(false)
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer.with_filter(EnvFilter::from_default_env()))
            .try_init()
            .map_err(|e| eyre!("Failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(
            component = component_name,
            log_dir = %log_dir.display(),
            "Logging initialized with console and file output"
        );
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()
            .map_err(|e| eyre!("Failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(component = component_name, "Logging initialized with console output only");
    }

    tracing::debug!(
        component = component_name,
        rust_log = %env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        args = ?env::args().collect::<Vec<_>>(),
        "Environment information"
    );

    Ok(())
}

fn log_root() -> PathBuf {
    env::var_os(HOTEDIT_LOG_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("hotedit-logs"))
}

fn create_log_directory(component_name: &str) -> Result<PathBuf> {
    let log_dir = log_root().join(component_name);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    Ok(log_dir)
}

/// Compact console-only logging at `level` unless `RUST_LOG` says otherwise.
pub fn init_simple_logging(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter(level.as_str())?)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| eyre!("Failed to initialize simple logging: {e}"))
}

static TEST_LOGGING_INIT: Once = Once::new();

/// Idempotent logging setup for tests.
///
/// Safe to call from every test; only the first call installs a subscriber and
/// an already installed subscriber is left alone.
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        let _ = init_simple_logging(default_level.unwrap_or(Level::INFO));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_logging_is_idempotent() {
        ensure_test_logging(None);
        ensure_test_logging(Some(Level::DEBUG));
        tracing::info!("logging works");
        // a subscriber is already installed by now
        assert!(init_logging("hotedit-test", false).is_err());
    }

    #[test]
    #[serial]
    fn test_log_directory_respects_env() {
        let dir = env::temp_dir().join(format!("hotedit-log-test-{}", std::process::id()));
        env::set_var(HOTEDIT_LOG_DIR, &dir);
        let log_dir = create_log_directory("component").unwrap();
        env::remove_var(HOTEDIT_LOG_DIR);

        assert_eq!(log_dir, dir.join("component"));
        assert!(log_dir.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    #[serial]
    fn test_default_log_directory() {
        env::remove_var(HOTEDIT_LOG_DIR);
        assert_eq!(log_root(), env::temp_dir().join("hotedit-logs"));
    }
}
