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

//! Hotedit Engine - active statement tracking for live-edit debugging
//!
//! While a debuggee is stopped, the debugger backend reports where each thread is
//! executing. The engine keeps those active statement positions correct while the
//! user edits the source, reconciles them with positions the backend recomputes,
//! and answers "where is active statement N right now" for any open file.
//!
//! The entry point is [`ActiveStatementTrackingService`]. The backend plugs in
//! through [`ActiveStatementSpanProvider`], the host editor through
//! [`hotedit_common::HostWorkspace`].

pub mod config;
pub use config::*;

pub mod errors;
pub use errors::*;

pub mod fault;
pub use fault::{FaultReporter, TracingFaultReporter};

pub mod provider;
pub use provider::*;

pub mod tracking;
pub use tracking::*;
