//! Labeled benchmark dataset for validator scoring.

use crate::models::Severity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One hand-verified issue in the benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthIssue {
    /// Stable identifier, used for deterministic tie-breaking.
    pub id: String,
    /// File the issue lives in (relative path).
    pub file: String,
    pub category: String,
    pub severity: Severity,
    /// Human-readable location note (function or region).
    #[serde(default)]
    pub location: String,
    /// Line number, when the label pins one (1-indexed).
    #[serde(default)]
    pub line: Option<usize>,
    /// Issues every competent analysis is expected to find.
    #[serde(default)]
    pub mandatory: bool,
    /// Label difficulty (e.g. "easy", "medium", "hard").
    #[serde(default)]
    pub difficulty: String,
}

/// A named, versioned collection of labeled files and issues.
///
/// Loaded once from disk as a value object; the validator never touches
/// the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthDataset {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Files the benchmark covers (relative paths).
    #[serde(default)]
    pub files: Vec<String>,
    pub issues: Vec<GroundTruthIssue>,
}

impl GroundTruthDataset {
    /// Load a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ground-truth dataset: {}", path.display()))?;
        let dataset: GroundTruthDataset = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid ground-truth JSON: {}", path.display()))?;
        Ok(dataset)
    }

    /// Issues labeled in a given file (case-insensitive path match).
    pub fn issues_in_file(&self, file: &str) -> Vec<&GroundTruthIssue> {
        let needle = file.trim().to_lowercase();
        self.issues
            .iter()
            .filter(|i| i.file.trim().to_lowercase() == needle)
            .collect()
    }
}
