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

//! Active statement tracking.
//!
//! # Components
//!
//! - [`TrackingSpan`] - an active statement range that follows text edits
//! - [`reconcile`] - merges recomputed spans into tracked spans without losing identity
//! - [`TrackingSession`] - the file to spans table of one debugging session
//! - [`ActiveStatementTrackingService`] - owns at most one session per workspace

mod reconcile;
mod service;
mod session;
mod span;

pub use reconcile::*;
pub use service::*;
pub use session::*;
pub use span::*;
