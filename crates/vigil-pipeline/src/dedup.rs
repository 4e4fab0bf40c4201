use std::collections::HashSet;

use anyhow::Result;

use crate::artifact_store::ArtifactStore;
use crate::scenario::{normalize_title, parse_scenario_document, ScenarioBlock, ScenarioRecord};

/// What already exists for a document key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingScenarios {
    /// Normalized titles in document order.
    pub titles: Vec<String>,
    /// Every block in the document, malformed ones included, so numbering
    /// never reuses an id.
    pub record_count: usize,
}

impl ExistingScenarios {
    pub fn from_document(text: &str) -> Self {
        let blocks = parse_scenario_document(text);
        let titles = blocks
            .iter()
            .filter_map(|block| match block {
                ScenarioBlock::Parsed(record) => Some(record.normalized_title()),
                ScenarioBlock::Malformed { .. } => None,
            })
            .collect();
        Self {
            titles,
            record_count: blocks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    pub fn next_id(&self) -> u32 {
        u32::try_from(self.record_count)
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }

    pub fn contains_title(&self, title: &str) -> bool {
        let normalized = normalize_title(title);
        self.titles.iter().any(|existing| *existing == normalized)
    }
}

/// Read-only view of the scenario document stored under `key`.
pub fn load_existing(store: &ArtifactStore, key: &str) -> Result<ExistingScenarios> {
    Ok(store
        .read_scenario_document(key)?
        .map(|text| ExistingScenarios::from_document(&text))
        .unwrap_or_default())
}

/// Outcome of filtering a generated batch against existing scenarios.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredBatch {
    pub accepted: Vec<ScenarioRecord>,
    pub malformed: usize,
    pub duplicates: usize,
}

/// Drops malformed blocks and titles already present, in the document or
/// earlier in the batch, then renumbers the survivors after the existing
/// records.
pub fn filter_new_scenarios(
    existing: &ExistingScenarios,
    generated: Vec<ScenarioBlock>,
) -> FilteredBatch {
    let mut seen = existing.titles.iter().cloned().collect::<HashSet<_>>();
    let mut batch = FilteredBatch::default();
    let mut next_id = existing.next_id();

    for block in generated {
        match block {
            ScenarioBlock::Parsed(mut record) => {
                if !seen.insert(record.normalized_title()) {
                    tracing::debug!(title = %record.title, "dropping duplicate scenario");
                    batch.duplicates += 1;
                    continue;
                }
                record.id = next_id;
                next_id = next_id.saturating_add(1);
                batch.accepted.push(record);
            }
            ScenarioBlock::Malformed { reason, .. } => {
                tracing::warn!(%reason, "dropping malformed scenario block");
                batch.malformed += 1;
            }
        }
    }
    batch
}
