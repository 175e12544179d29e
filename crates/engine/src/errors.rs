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

use thiserror::Error;

/// Errors raised by tracking background work.
///
/// None of these reach readers of the span table: they are handed to a
/// [`FaultReporter`](crate::FaultReporter) and the affected operation falls back to
/// an empty or unchanged result.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The span provider failed
    #[error("active statement provider failed: {0}")]
    Provider(eyre::Report),

    /// The provider returned a different number of span arrays than documents requested
    #[error("provider returned {actual} baseline span arrays for {expected} documents")]
    MisalignedBaseline {
        /// Number of documents requested
        expected: usize,
        /// Number of span arrays returned
        actual: usize,
    },

    /// The tracking session ended while the operation was in flight
    #[error("tracking session ended")]
    Cancelled,
}

impl TrackingError {
    /// Whether the error is a silent abort rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<eyre::Report> for TrackingError {
    fn from(report: eyre::Report) -> Self {
        Self::Provider(report)
    }
}

/// Result alias for tracking operations.
pub type TrackingResult<T> = std::result::Result<T, TrackingError>;
