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

//! Reporting of unexpected background failures.

use crate::TrackingError;

/// Receives failures of tracking work that has no caller to return them to.
///
/// Cancellation is never reported.
pub trait FaultReporter: Send + Sync {
    /// Report a failure that occurred in `operation`.
    fn report(&self, operation: &'static str, error: &TrackingError);
}

/// Logs faults through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultReporter;

impl FaultReporter for TracingFaultReporter {
    fn report(&self, operation: &'static str, error: &TrackingError) {
        tracing::error!(operation, error = %error, "active statement tracking failed");
    }
}

/// Sends `error` to `reporter` unless it is a cancellation.
pub(crate) fn report_unless_cancelled(
    reporter: &dyn FaultReporter,
    operation: &'static str,
    error: TrackingError,
) {
    if error.is_cancelled() {
        tracing::trace!(operation, "tracking work cancelled");
    } else {
        reporter.report(operation, &error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collecting(Mutex<Vec<String>>);

    impl FaultReporter for Collecting {
        fn report(&self, operation: &'static str, error: &TrackingError) {
            self.0.lock().push(format!("{operation}: {error}"));
        }
    }

    #[test]
    fn test_cancellation_is_not_reported() {
        hotedit_common::logging::ensure_test_logging(None);
        let reporter = Collecting::default();
        report_unless_cancelled(&reporter, "start", TrackingError::Cancelled);
        report_unless_cancelled(
            &reporter,
            "start",
            TrackingError::MisalignedBaseline { expected: 2, actual: 1 },
        );
        TracingFaultReporter.report("open", &TrackingError::Provider(eyre::eyre!("boom")));

        assert_eq!(
            *reporter.0.lock(),
            vec!["start: provider returned 1 baseline span arrays for 2 documents".to_string()]
        );
    }
}
