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

//! Path-gated assertion macros.
//!
//! Some invariants of the span table are too expensive to check on every call in
//! release builds (for example ordinal uniqueness over a whole file). The macros in
//! this module evaluate their assertion only when the calling module is selected by
//! the [`HOTEDIT_ASSERT`](crate::env::HOTEDIT_ASSERT) environment variable, in the
//! same spirit as `RUST_LOG` for logging:
//!
//! - `HOTEDIT_ASSERT=*` or `HOTEDIT_ASSERT=all` enables every assertion
//! - `HOTEDIT_ASSERT=hotedit_engine` enables the engine crate and its submodules
//! - `HOTEDIT_ASSERT=hotedit_engine::tracking,hotedit_common::text` enables several prefixes
//!
//! The variable is read once per process.
//!
//! ```ignore
//! use hotedit_common::hotedit_assert;
//!
//! fn insert(spans: &[u32]) {
//!     hotedit_assert!(spans.windows(2).all(|w| w[0] < w[1]), "ordinals must be sorted");
//! }
//! ```

use once_cell::sync::Lazy;
use std::env;

use crate::env::HOTEDIT_ASSERT;

static ASSERTION_TARGETS: Lazy<Vec<String>> =
    Lazy::new(|| parse_targets(env::var(HOTEDIT_ASSERT).ok().as_deref().unwrap_or_default()));

fn parse_targets(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn matches_any(targets: &[String], module_path: &str) -> bool {
    targets
        .iter()
        .any(|target| target == "*" || target == "all" || module_path.starts_with(target.as_str()))
}

/// Whether assertions are enabled for `module_path` (usually `module_path!()`).
pub fn is_assertion_enabled(module_path: &str) -> bool {
    matches_any(&ASSERTION_TARGETS, module_path)
}

/// Marks the enabled-assertion branch as unlikely.
#[cold]
#[inline(never)]
pub fn cold_path() {}

/// `assert!` evaluated only when the calling module is selected by `HOTEDIT_ASSERT`.
#[macro_export]
macro_rules! hotedit_assert {
    ($($arg:tt)*) => {
        if $crate::macros::is_assertion_enabled(module_path!()) {
            $crate::macros::cold_path();
            assert!($($arg)*);
        }
    };
}
