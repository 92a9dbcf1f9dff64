//! models2pathways TSV ingestion
//!
//! Each line maps one BioModels model to one pathway:
//!
//! ```text
//! BIOMD0000000001<TAB>R-HSA-100
//! ```
//!
//! Lines whose model id lacks the `BIOMD` prefix, whose stable id is not of
//! the form `R-XXX-<digits>`, or that have fewer than two fields are skipped
//! with a warning. They never fail the parse.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

pub const MODEL_ID_PREFIX: &str = "BIOMD";

/// Pathway stable id -> model ids. Pathways iterate in lexical order; each
/// pathway's model ids keep the order they first appear in the file, without
/// repeats.
pub type PathwayModels = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingField,
    MalformedModelId,
    MalformedStableId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField => write!(f, "line has fewer than two tab-separated fields"),
            SkipReason::MalformedModelId => write!(f, "line has improperly formatted BioModels id"),
            SkipReason::MalformedStableId => write!(f, "line has improperly formatted stable id"),
        }
    }
}

/// A line that contributed nothing to the mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based
    pub line_number: usize,
    pub reason: SkipReason,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelsMapping {
    pub pathways: PathwayModels,
    pub skipped: Vec<SkippedLine>,
}

impl ModelsMapping {
    pub fn model_count(&self) -> usize {
        self.pathways.values().map(Vec::len).sum()
    }

    pub fn into_pathway_models(self) -> PathwayModels {
        self.pathways
    }
}

pub fn is_model_id(s: &str) -> bool {
    s.starts_with(MODEL_ID_PREFIX)
}

pub fn is_stable_id(s: &str) -> bool {
    static STABLE_ID: OnceLock<Regex> = OnceLock::new();
    STABLE_ID
        .get_or_init(|| Regex::new(r"^R-[A-Za-z0-9_]{3}-[0-9]+$").expect("valid stable id regex"))
        .is_match(s)
}

/// Parse TSV text into a pathway -> models mapping.
pub fn parse_models_tsv(text: &str) -> ModelsMapping {
    let mut mapping = ModelsMapping::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let model_id = fields.next().unwrap_or_default();
        let reason = match fields.next() {
            None => SkipReason::MissingField,
            Some(_) if !is_model_id(model_id) => SkipReason::MalformedModelId,
            Some(stable_id) if !is_stable_id(stable_id) => SkipReason::MalformedStableId,
            Some(stable_id) => {
                let models = mapping.pathways.entry(stable_id.to_string()).or_default();
                if models.iter().any(|m| m == model_id) {
                    tracing::debug!(line = idx + 1, model_id, stable_id, "repeated mapping line");
                } else {
                    models.push(model_id.to_string());
                }
                continue;
            }
        };

        tracing::warn!(line = idx + 1, %reason, "skipping models2pathways line");
        mapping.skipped.push(SkippedLine {
            line_number: idx + 1,
            reason,
            content: line.to_string(),
        });
    }

    mapping
}

/// Read and parse a models2pathways file.
pub fn read_models_tsv(path: &Path) -> Result<ModelsMapping> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read models2pathways file {}", path.display()))?;
    let mapping = parse_models_tsv(&text);
    tracing::info!(
        path = %path.display(),
        pathways = mapping.pathways.len(),
        models = mapping.model_count(),
        skipped = mapping.skipped.len(),
        "parsed models2pathways file"
    );
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_id_pattern() {
        assert!(is_stable_id("R-HSA-123"));
        assert!(is_stable_id("R-MMU-1"));
        assert!(is_stable_id("R-a_1-42"));
        assert!(!is_stable_id("R-HSA-"));
        assert!(!is_stable_id("R-HS-123"));
        assert!(!is_stable_id("R-HSA-123.1"));
        assert!(!is_stable_id("notAStableId"));
        assert!(!is_stable_id(" R-HSA-123"));
    }

    #[test]
    fn test_model_id_prefix_is_case_sensitive() {
        assert!(is_model_id("BIOMD0000000001"));
        assert!(!is_model_id("biomd0000000001"));
        assert!(!is_model_id("BADID"));
    }
}
