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

//! Scenario files.
//!
//! A scenario describes the documents of a workspace, the active statements the
//! debugger reports for them, and a sequence of steps to replay:
//!
//! ```toml
//! [[documents]]
//! path = "/src/A.cs"
//! text = "..."
//! spans = [{ ordinal = 0, span = "10:4-10:21", flags = "leaf-frame" }]
//!
//! [[steps]]
//! action = "edit"
//! path = "/src/A.cs"
//! span = "5:0-5:0"
//! text = "\n"
//!
//! [[steps]]
//! action = "adjust"
//! path = "/src/A.cs"
//! spans = [{ ordinal = 0, span = "11:4-11:21", flags = "leaf-frame" }]
//! ```

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use eyre::{bail, ensure, Result, WrapErr};
use hotedit_common::{ActiveStatementFlags, ActiveStatementSpan, DocumentKind, LinePositionSpan};
use serde::{Deserialize, Deserializer};

/// A replayable debugging scenario.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Whether the debuggee is stopped when tracking starts.
    #[serde(default = "default_true")]
    pub break_state: bool,
    /// Documents of the workspace.
    #[serde(default)]
    pub documents: Vec<ScenarioDocument>,
    /// Steps to replay after tracking started.
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

/// A document of the scenario's workspace.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDocument {
    /// File path, also the document's key in steps.
    pub path: PathBuf,
    /// Text of the document. Omitted means not loaded.
    pub text: Option<String>,
    /// Whether the document is open when tracking starts.
    #[serde(default = "default_true")]
    pub open: bool,
    /// Kind of the document.
    #[serde(default)]
    pub kind: DocumentKind,
    /// Compile-time document a design-time document projects onto.
    pub maps_to: Option<PathBuf>,
    /// Baseline active statements reported by the debugger.
    #[serde(default)]
    pub spans: Vec<ScenarioSpan>,
}

/// An active statement as written in a scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpan {
    /// Ordinal of the statement.
    pub ordinal: u32,
    /// `line:col-line:col`
    #[serde(deserialize_with = "deserialize_line_span")]
    pub span: LinePositionSpan,
    /// Flag names, e.g. `leaf-frame|method-up-to-date`.
    #[serde(default)]
    pub flags: ActiveStatementFlags,
}

impl From<&ScenarioSpan> for ActiveStatementSpan {
    fn from(entry: &ScenarioSpan) -> Self {
        Self::new(entry.ordinal, entry.span, entry.flags)
    }
}

/// One replay step.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Replace `span` of the document's current text with `text`.
    Edit {
        /// Document path
        path: PathBuf,
        /// Replaced range
        #[serde(deserialize_with = "deserialize_line_span")]
        span: LinePositionSpan,
        /// Inserted text
        #[serde(default)]
        text: String,
    },
    /// Open the document.
    Open {
        /// Document path
        path: PathBuf,
    },
    /// Close the document.
    Close {
        /// Document path
        path: PathBuf,
    },
    /// Ask for adjusted spans. The debugger answers with `spans`; no spans means
    /// it cannot determine them.
    Adjust {
        /// Document path
        path: PathBuf,
        /// Spans the debugger reports
        #[serde(default)]
        spans: Vec<ScenarioSpan>,
    },
    /// Print the tracked spans of the document.
    Query {
        /// Document path
        path: PathBuf,
    },
    /// End tracking.
    End,
}

impl Step {
    /// Name of the step's action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Edit { .. } => "edit",
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::Adjust { .. } => "adjust",
            Self::Query { .. } => "query",
            Self::End => "end",
        }
    }

    /// Document the step refers to.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Edit { path, .. }
            | Self::Open { path }
            | Self::Close { path }
            | Self::Adjust { path, .. }
            | Self::Query { path } => Some(path),
            Self::End => None,
        }
    }
}

fn deserialize_line_span<'de, D>(
    deserializer: D,
) -> std::result::Result<LinePositionSpan, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value.parse().map_err(serde::de::Error::custom)
}

impl Scenario {
    /// Reads and validates a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {path:?}"))?;
        let scenario = Self::parse(&content)
            .with_context(|| format!("Invalid scenario file: {path:?}"))?;
        Ok(scenario)
    }

    /// Parses and validates a scenario.
    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(content).wrap_err("Failed to parse scenario as TOML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Checks references between documents and steps.
    pub fn validate(&self) -> Result<()> {
        let mut documents = HashMap::new();
        for document in &self.documents {
            if documents.insert(document.path.as_path(), document).is_some() {
                bail!("Duplicate document {:?}", document.path);
            }
            let mut ordinals = HashSet::new();
            for span in &document.spans {
                ensure!(
                    ordinals.insert(span.ordinal),
                    "Duplicate active statement ordinal {} in {:?}",
                    span.ordinal,
                    document.path
                );
            }
        }

        for document in &self.documents {
            let Some(target) = &document.maps_to else {
                continue;
            };
            ensure!(
                document.kind == DocumentKind::DesignTime,
                "Only design-time documents can map to another document: {:?}",
                document.path
            );
            ensure!(
                documents.contains_key(target.as_path()),
                "{:?} maps to unknown document {:?}",
                document.path,
                target
            );
        }

        // statement count, ordinals and flags of a file are fixed for the whole session
        let mut shapes: HashMap<&Path, &[ScenarioSpan]> = self
            .documents
            .iter()
            .filter(|document| !document.spans.is_empty())
            .map(|document| (document.path.as_path(), document.spans.as_slice()))
            .collect();

        let mut ended = false;
        for (index, step) in self.steps.iter().enumerate() {
            if let Some(path) = step.path() {
                ensure!(
                    documents.contains_key(path),
                    "Step {index} ({}) refers to unknown document {path:?}",
                    step.action()
                );
            }
            match step {
                Step::End => {
                    ensure!(!ended, "Step {index}: tracking already ended");
                    ended = true;
                }
                Step::Edit { path, .. } => ensure!(
                    documents[path.as_path()].text.is_some(),
                    "Step {index}: cannot edit unloaded document {path:?}"
                ),
                Step::Adjust { path, spans } if !spans.is_empty() => {
                    match shapes.get(path.as_path()) {
                        Some(expected) => check_same_statements(index, path, expected, spans)?,
                        None => {
                            let mut ordinals = HashSet::new();
                            ensure!(
                                spans.iter().all(|span| ordinals.insert(span.ordinal)),
                                "Step {index}: duplicate active statement ordinals for {path:?}"
                            );
                            shapes.insert(path.as_path(), spans.as_slice());
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Fails unless `actual` lists the statements of `expected` in the same order.
fn check_same_statements(
    index: usize,
    path: &Path,
    expected: &[ScenarioSpan],
    actual: &[ScenarioSpan],
) -> Result<()> {
    ensure!(
        expected.len() == actual.len(),
        "Step {index}: {path:?} has {} active statement(s), the adjustment reports {}",
        expected.len(),
        actual.len()
    );
    for (position, (old, new)) in expected.iter().zip(actual).enumerate() {
        ensure!(
            old.ordinal == new.ordinal,
            "Step {index}: active statement {position} of {path:?} changed ordinal from {} to {}",
            old.ordinal,
            new.ordinal
        );
        ensure!(
            old.flags == new.flags,
            "Step {index}: active statement {position} of {path:?} changed flags from {} to {}",
            old.flags,
            new.flags
        );
    }
    Ok(())
}
