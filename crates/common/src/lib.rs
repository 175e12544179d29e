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

//! Hotedit Common - shared data model for active statement tracking
//!
//! This crate holds everything the tracking engine, the CLI and the test suites
//! agree on: source positions, active statement spans reported by the debugger,
//! versioned text buffers, the host workspace contract, and the logging and
//! assertion utilities used across the workspace.

/// Positions, documents and active statement spans
pub mod types;

/// Names of the environment variables hotedit reads
pub mod env;
/// Logging setup for the binary and tests
pub mod logging;
/// Path-gated assertion macros
pub mod macros;
/// Versioned text buffers and forward position mapping
pub mod text;
/// Documents, solutions and the host workspace contract
pub mod workspace;

pub use text::*;
pub use types::*;
pub use workspace::*;
