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

use std::{collections::HashMap, path::Path, sync::Arc};

use eyre::{eyre, Result};
use hotedit_common::{ActiveStatementSpan, DocumentId, HostWorkspace, InMemoryWorkspace, TextChange};
use hotedit_engine::{ActiveStatementTrackingService, ScriptedSpanProvider, TrackingConfig};
use serde::Serialize;
use tracing::{debug, info};

use crate::scenario::{Scenario, Step};

/// Spans printed for a `query` or `adjust` step.
#[derive(Debug, Serialize)]
struct StepReport<'a> {
    step: usize,
    action: &'static str,
    path: &'a Path,
    spans: Vec<ActiveStatementSpan>,
}

impl StepReport<'_> {
    fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string(self)?);
            return Ok(());
        }
        println!(
            "step {} {} {}: {} active statement(s)",
            self.step,
            self.action,
            self.path.display(),
            self.spans.len()
        );
        for span in &self.spans {
            println!("  {span}");
        }
        Ok(())
    }
}

/// Builds the scenario's workspace and provider, tracks it and replays its steps.
pub async fn run(path: &Path, config: TrackingConfig, json: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;

    let workspace = Arc::new(InMemoryWorkspace::new());
    let provider = Arc::new(ScriptedSpanProvider::new());
    provider.set_break_state(scenario.break_state);

    let mut ids: HashMap<&Path, DocumentId> = HashMap::new();
    for document in &scenario.documents {
        let name = document
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = workspace.add_document(
            name,
            Some(document.path.clone()),
            document.kind,
            document.text.as_deref(),
        );
        provider.set_baseline(&document.path, document.spans.iter().map(Into::into).collect());
        ids.insert(document.path.as_path(), id);
    }
    let id_of =
        |path: &Path| ids.get(path).copied().ok_or_else(|| eyre!("Unknown document {path:?}"));

    for document in &scenario.documents {
        if let Some(target) = &document.maps_to {
            workspace.map_design_time_document(id_of(&document.path)?, id_of(target)?);
        }
        if document.open {
            workspace.open_document(id_of(&document.path)?)?;
        }
    }

    let service = ActiveStatementTrackingService::new(workspace.clone(), config);
    service.start_tracking(workspace.current_solution(), provider.clone());
    service.wait_for_background_work().await;
    info!(files = service.tracked_files().len(), "tracking started");

    for (index, step) in scenario.steps.iter().enumerate() {
        debug!(step = index, action = step.action(), "replaying step");
        match step {
            Step::Edit { path, span, text } => {
                let id = id_of(path)?;
                let buffer = workspace
                    .buffer(id)
                    .ok_or_else(|| eyre!("Document {path:?} has no text"))?;
                let span = buffer.current_snapshot().text_span(*span);
                workspace.edit_document(id, vec![TextChange::replace(span, text.as_str())])?;
            }
            Step::Open { path } => {
                workspace.open_document(id_of(path)?)?;
                service.wait_for_background_work().await;
            }
            Step::Close { path } => workspace.close_document(id_of(path)?)?,
            Step::Adjust { path, spans } => {
                if !spans.is_empty() {
                    provider.push_adjustment(path, spans.iter().map(Into::into).collect());
                }
                let document = workspace
                    .document(id_of(path)?)
                    .ok_or_else(|| eyre!("Unknown document {path:?}"))?;
                let spans = match document.text.as_ref() {
                    Some(snapshot) => service.get_adjusted_spans(&document, snapshot).await,
                    None => Vec::new(),
                };
                StepReport { step: index, action: step.action(), path, spans }.print(json)?;
            }
            Step::Query { path } => {
                let spans =
                    service.get_spans(&workspace.current_solution(), Some(id_of(path)?), path);
                StepReport { step: index, action: step.action(), path, spans }.print(json)?;
            }
            Step::End => service.end_tracking(),
        }
    }

    if service.is_tracking() {
        service.end_tracking();
    }
    Ok(())
}
