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

use std::path::Path;

use eyre::Result;

use crate::scenario::Scenario;

/// Parses and validates a scenario.
pub fn run(path: &Path) -> Result<()> {
    let scenario = Scenario::load(path)?;
    println!(
        "{}: ok ({} documents, {} steps)",
        path.display(),
        scenario.documents.len(),
        scenario.steps.len()
    );
    Ok(())
}
