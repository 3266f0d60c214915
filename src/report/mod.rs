//! Report shapes and rendering.

mod generator;

pub use generator::{generate_json_report, generate_markdown_report};

use crate::cache::CacheStats;
use crate::models::TeamAnalysisResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Report header metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path that was analyzed.
    pub target: String,
    pub analysis_date: DateTime<Utc>,
    pub model_used: String,
    pub files_analyzed: usize,
    pub duration_seconds: f64,
}

/// The complete rendered result of one council run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilReport {
    pub metadata: ReportMetadata,
    pub analysis: TeamAnalysisResult,
    /// Present when caching was enabled for the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}
