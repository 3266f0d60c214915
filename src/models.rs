//! Data models for the analysis council.
//!
//! This module contains the core data structures shared across the
//! orchestrator, review stages, synthesis, and the evaluation harnesses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Sentinel finding category marking a failed specialist analysis.
pub const ANALYSIS_ERROR_CATEGORY: &str = "Analysis Error";

/// Severity of a finding; recommendations use the same scale as priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low severity - style issues, minor suggestions
    Low,
    /// Medium severity - code quality issues, potential bugs
    Medium,
    /// High severity - bugs, security concerns
    High,
    /// Critical severity - security vulnerabilities, major bugs
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Parse a severity from free-form model output (case-insensitive).
    pub fn parse(s: &str) -> Option<Severity> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Numeric rank used for severity-distance comparisons.
    pub fn rank(&self) -> i32 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }

    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }
}

/// The closed set of specialist analyses the council can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specialty {
    Security,
    Performance,
    Architecture,
    Quality,
}

impl Specialty {
    /// All specialties, in dispatch order.
    pub fn all() -> &'static [Specialty] {
        &[
            Specialty::Security,
            Specialty::Performance,
            Specialty::Architecture,
            Specialty::Quality,
        ]
    }

    /// Parse a specialty name from CLI or config input.
    pub fn parse(s: &str) -> Option<Specialty> {
        match s.trim().to_lowercase().as_str() {
            "security" => Some(Specialty::Security),
            "performance" => Some(Specialty::Performance),
            "architecture" => Some(Specialty::Architecture),
            "quality" | "code-quality" => Some(Specialty::Quality),
            _ => None,
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specialty::Security => write!(f, "Security"),
            Specialty::Performance => write!(f, "Performance"),
            Specialty::Architecture => write!(f, "Architecture"),
            Specialty::Quality => write!(f, "Quality"),
        }
    }
}

/// A single issue reported by a specialist. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Issue category (e.g. "SQL Injection", "N+1 Query").
    pub category: String,
    /// Detailed description of the issue.
    pub description: String,
    /// Severity of the finding.
    pub severity: Severity,
    /// File or symbol where the issue lives (relative path).
    pub location: String,
    /// Line number, when the specialist reported one (1-indexed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Supporting evidence snippets.
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Finding {
    /// Sentinel finding representing a failed agent analysis.
    pub fn analysis_error(detail: &str) -> Self {
        Self {
            category: ANALYSIS_ERROR_CATEGORY.to_string(),
            description: detail.to_string(),
            severity: Severity::Low,
            location: String::new(),
            line: None,
            evidence: Vec::new(),
        }
    }

    /// Identity fingerprint used for cross-run comparison.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}::{}",
            self.category.trim().to_lowercase(),
            self.location.trim().to_lowercase()
        )
    }
}

/// An actionable recommendation produced by a specialist.
///
/// `priority` is kept as raw model output: bucketing is case-insensitive
/// and unrecognized or missing priorities default to the medium bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Short title.
    pub title: String,
    /// What should change and why.
    pub description: String,
    /// Concrete implementation note.
    #[serde(default)]
    pub implementation: String,
    /// Estimated effort in hours.
    #[serde(default)]
    pub estimated_hours: f64,
    /// Priority on the severity scale, as reported (may be absent or junk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Titles of recommendations this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// The complete output of one specialist for one request.
///
/// Owned by the orchestrator until all agents settle; shared read-only
/// by the downstream stages afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistAnalysisResult {
    /// Registered agent name (e.g. "security-specialist").
    pub agent_name: String,
    /// The specialty that produced this result.
    pub specialty: Specialty,
    /// When the analysis finished.
    pub timestamp: DateTime<Utc>,
    /// Self-reported confidence, 0.0 - 1.0.
    pub confidence: f64,
    /// Issues found.
    pub findings: Vec<Finding>,
    /// Actionable recommendations.
    pub recommendations: Vec<Recommendation>,
    /// Free-text risk assessment.
    pub risk_assessment: String,
    /// Specialty-specific metric bag (e.g. "endpoints_reviewed": 12.0).
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

impl SpecialistAnalysisResult {
    /// Placeholder result for an agent whose call failed or timed out.
    pub fn analysis_error(agent_name: &str, specialty: Specialty, detail: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            specialty,
            timestamp: Utc::now(),
            confidence: 0.0,
            findings: vec![Finding::analysis_error(detail)],
            recommendations: Vec::new(),
            risk_assessment: format!("Analysis unavailable: {}", detail),
            metrics: HashMap::new(),
        }
    }

    /// True when this result is the failure sentinel.
    pub fn is_error(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.category == ANALYSIS_ERROR_CATEGORY)
    }

    /// Declared priority of the specialist: the highest recommendation
    /// priority, falling back to the highest finding severity.
    pub fn declared_priority(&self) -> Severity {
        let from_recommendations = self
            .recommendations
            .iter()
            .filter_map(|r| r.priority.as_deref().and_then(Severity::parse))
            .max();

        from_recommendations
            .or_else(|| self.findings.iter().map(|f| f.severity).max())
            .unwrap_or(Severity::Medium)
    }
}

/// Message type within an agent conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Analysis,
    Review,
    Synthesis,
    Status,
}

/// Conversation lifecycle status. Terminal once it leaves `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Completed,
    Paused,
    Failed,
}

/// One message in the shared analysis conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub from_agent: String,
    pub message_type: MessageType,
    pub subject: String,
    pub content: String,
    /// Ordering priority; lower sorts earlier. Synthesis messages use 0.
    pub priority: u8,
    pub timestamp: DateTime<Utc>,
}

/// Ordered record of inter-agent messages for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConversation {
    pub id: Uuid,
    pub messages: Vec<AgentMessage>,
    pub status: ConversationStatus,
}

impl AgentConversation {
    /// Start a new active conversation.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            status: ConversationStatus::Active,
        }
    }

    /// Append a message. No-op once the conversation is terminal.
    pub fn append(&mut self, message: AgentMessage) -> bool {
        if self.status != ConversationStatus::Active {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Close the conversation with a terminal status.
    pub fn close(&mut self, status: ConversationStatus) {
        if self.status == ConversationStatus::Active {
            self.status = status;
        }
    }

    /// Discussion duration from first to last message, in seconds.
    pub fn discussion_duration_secs(&self) -> f64 {
        match (self.messages.first(), self.messages.last()) {
            (Some(first), Some(last)) => {
                let delta = last.timestamp.signed_duration_since(first.timestamp);
                (delta.num_milliseconds() as f64 / 1000.0).max(0.0)
            }
            _ => 0.0,
        }
    }
}

impl Default for AgentConversation {
    fn default() -> Self {
        Self::new()
    }
}

/// One cross-review of a reviewee's result by a reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerReview {
    pub reviewer: String,
    pub reviewee: String,
    pub comments: String,
    pub approved: bool,
    pub timestamp: DateTime<Utc>,
}

/// A priority disagreement between specialists, with its resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConflict {
    /// The contested priority level.
    pub priority: Severity,
    /// Agents that declared this priority.
    pub agents: Vec<String>,
    /// Engine-generated resolution narrative.
    pub resolution: String,
    /// False when narrative generation itself failed.
    pub resolved: bool,
}

/// Recommendations merged across all non-failed specialists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedRecommendations {
    pub high_priority: Vec<Recommendation>,
    pub medium_priority: Vec<Recommendation>,
    pub long_term: Vec<Recommendation>,
    pub resolved_conflicts: Vec<ResolvedConflict>,
    /// Sum of estimated hours across all three buckets.
    pub total_estimated_hours: f64,
    /// Human-readable synthesis summary.
    pub summary: String,
}

impl ConsolidatedRecommendations {
    /// Total number of recommendations across all buckets.
    pub fn len(&self) -> usize {
        self.high_priority.len() + self.medium_priority.len() + self.long_term.len()
    }

    /// True when every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Agreement and participation metrics derived from review and conflict data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusMetrics {
    /// Approved reviews / total reviews, 0 - 100.
    pub agreement_pct: f64,
    pub total_reviews: usize,
    pub approved_reviews: usize,
    pub conflict_count: usize,
    pub resolved_conflict_count: usize,
    /// Reviews authored per agent.
    pub participation: HashMap<String, usize>,
    /// First-to-last conversation message span, in seconds.
    pub discussion_duration_secs: f64,
}

/// Per-stage wall-clock timings for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub agent_analysis_ms: u64,
    pub peer_review_ms: u64,
    pub conflict_resolution_ms: u64,
    pub synthesis_ms: u64,
    pub total_ms: u64,
}

/// The final result of one orchestrated analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAnalysisResult {
    pub objective: String,
    pub started_at: DateTime<Utc>,
    pub results: Vec<SpecialistAnalysisResult>,
    pub reviews: Vec<PeerReview>,
    pub conversation: AgentConversation,
    pub consolidated: ConsolidatedRecommendations,
    pub consensus: ConsensusMetrics,
    pub timings: StageTimings,
}

/// A source artifact submitted for analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the analyzed root.
    pub path: String,
    /// Full file content.
    pub content: String,
}

/// Metadata about the analyzed source, recorded on cache entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFileMeta {
    pub file_count: usize,
    pub total_lines: usize,
    pub total_bytes: usize,
}

impl SourceFileMeta {
    /// Summarize a file set for cache bookkeeping.
    pub fn from_files(files: &[SourceFile]) -> Self {
        Self {
            file_count: files.len(),
            total_lines: files.iter().map(|f| f.content.lines().count()).sum(),
            total_bytes: files.iter().map(|f| f.content.len()).sum(),
        }
    }
}
