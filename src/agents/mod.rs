//! Specialist analysis agents.
//!
//! Each agent wraps the inference engine with a specialty-specific system
//! prompt and parses the JSON body of the response into a structured
//! result. Engine failures and malformed payloads surface as typed errors;
//! the orchestrator converts those into sentinel results.

mod registry;

pub use registry::AgentRegistry;

use crate::engine::InferenceClient;
use crate::error::{CouncilError, Result};
use crate::facts::StructuralFacts;
use crate::models::{
    Finding, Recommendation, Severity, SourceFile, Specialty, SpecialistAnalysisResult,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One specialist analyzer bound to a specialty and an engine.
pub struct SpecialistAgent {
    name: String,
    specialty: Specialty,
    engine: Arc<dyn InferenceClient>,
}

impl SpecialistAgent {
    /// Create the agent for a specialty.
    pub fn new(specialty: Specialty, engine: Arc<dyn InferenceClient>) -> Self {
        Self {
            name: format!("{}-specialist", specialty.to_string().to_lowercase()),
            specialty,
            engine,
        }
    }

    /// Registered agent name (e.g. "security-specialist").
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The specialty this agent analyzes.
    pub fn specialty(&self) -> Specialty {
        self.specialty
    }

    /// Run one analysis over the file set.
    pub async fn analyze(
        &self,
        files: &[SourceFile],
        objective: &str,
        facts: &[StructuralFacts],
    ) -> Result<SpecialistAnalysisResult> {
        let user_prompt = build_user_prompt(files, objective, facts);
        debug!(
            "Agent {} analyzing {} file(s), prompt {} chars",
            self.name,
            files.len(),
            user_prompt.len()
        );

        let response = self
            .engine
            .infer(system_prompt(self.specialty), &user_prompt)
            .await?;

        let mut result = parse_analysis_response(&response)?;
        result.agent_name = self.name.clone();
        result.specialty = self.specialty;
        result.timestamp = Utc::now();
        Ok(result)
    }
}

/// System prompt for a specialty.
fn system_prompt(specialty: Specialty) -> &'static str {
    match specialty {
        Specialty::Security => SECURITY_SYSTEM_PROMPT,
        Specialty::Performance => PERFORMANCE_SYSTEM_PROMPT,
        Specialty::Architecture => ARCHITECTURE_SYSTEM_PROMPT,
        Specialty::Quality => QUALITY_SYSTEM_PROMPT,
    }
}

/// Build the user prompt: objective, structural context, then file bodies.
fn build_user_prompt(files: &[SourceFile], objective: &str, facts: &[StructuralFacts]) -> String {
    let mut prompt = String::new();
    prompt.push_str("Analyze the following code and respond with ONE JSON object:\n");
    prompt.push_str(ANALYSIS_SCHEMA_HINT);
    prompt.push_str("\n\nObjective: ");
    prompt.push_str(if objective.trim().is_empty() {
        "general code review"
    } else {
        objective
    });
    prompt.push('\n');

    if !facts.is_empty() {
        prompt.push_str("\n=== STRUCTURAL CONTEXT ===\n");
        for fact in facts {
            prompt.push_str(&fact.summary_line());
            prompt.push('\n');
        }
    }

    prompt.push_str("\n=== FILES TO ANALYZE ===\n\n");
    for file in files {
        prompt.push_str(&format!("### FILE: {}\n```\n{}\n```\n\n", file.path, file.content));
    }
    prompt.push_str("=== END OF FILES ===\n\nRespond with the JSON object only.");
    prompt
}

const ANALYSIS_SCHEMA_HINT: &str = r#"{"confidence": 0.0-1.0, "risk_assessment": "...", "findings": [{"category": "...", "description": "...", "severity": "low|medium|high|critical", "location": "path", "line": 1, "evidence": ["..."]}], "recommendations": [{"title": "...", "description": "...", "implementation": "...", "estimated_hours": 1.0, "priority": "low|medium|high|critical", "dependencies": []}], "metrics": {}}"#;

const SECURITY_SYSTEM_PROMPT: &str = r#"You are a senior application security engineer.
Review the provided code for vulnerabilities: injection, broken auth,
hardcoded secrets, unsafe deserialization, missing input validation.
Respond with a single JSON object matching the requested schema.
Only output valid JSON, no explanations or markdown."#;

const PERFORMANCE_SYSTEM_PROMPT: &str = r#"You are a performance engineer.
Review the provided code for inefficiencies: N+1 queries, unbounded
allocations, blocking calls on hot paths, missing caching, quadratic loops.
Respond with a single JSON object matching the requested schema.
Only output valid JSON, no explanations or markdown."#;

const ARCHITECTURE_SYSTEM_PROMPT: &str = r#"You are a software architect.
Review the provided code for structural problems: tight coupling, missing
abstraction boundaries, layering violations, poor error propagation.
Respond with a single JSON object matching the requested schema.
Only output valid JSON, no explanations or markdown."#;

const QUALITY_SYSTEM_PROMPT: &str = r#"You are a code quality reviewer.
Review the provided code for maintainability issues: duplication, dead
code, unclear naming, missing tests, overly complex functions.
Respond with a single JSON object matching the requested schema.
Only output valid JSON, no explanations or markdown."#;

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    risk_assessment: Option<String>,
    #[serde(default)]
    findings: Vec<RawFinding>,
    #[serde(default)]
    recommendations: Vec<RawRecommendation>,
    #[serde(default)]
    metrics: Option<HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    line: Option<usize>,
    #[serde(default)]
    evidence: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    implementation: Option<String>,
    #[serde(default)]
    estimated_hours: Option<f64>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    dependencies: Option<Vec<String>>,
}

/// Parse the engine's response body into a result skeleton.
///
/// Models wrap JSON in prose or code fences often enough that we extract
/// the outermost object before deserializing.
pub(crate) fn parse_analysis_response(response: &str) -> Result<SpecialistAnalysisResult> {
    let body = extract_json_object(response).ok_or_else(|| {
        CouncilError::MalformedResponse("no JSON object in engine response".to_string())
    })?;

    let raw: RawAnalysis = serde_json::from_str(body)
        .map_err(|e| CouncilError::MalformedResponse(format!("invalid analysis JSON: {}", e)))?;

    let findings = raw
        .findings
        .into_iter()
        .map(|f| {
            let severity = f
                .severity
                .as_deref()
                .and_then(Severity::parse)
                .unwrap_or_else(|| {
                    warn!("Unrecognized finding severity; defaulting to medium");
                    Severity::Medium
                });
            Finding {
                category: f.category,
                description: f.description,
                severity,
                location: f.location.unwrap_or_default(),
                line: f.line,
                evidence: f.evidence.unwrap_or_default(),
            }
        })
        .collect();

    let recommendations = raw
        .recommendations
        .into_iter()
        .map(|r| Recommendation {
            title: r.title,
            description: r.description,
            implementation: r.implementation.unwrap_or_default(),
            estimated_hours: r.estimated_hours.unwrap_or(0.0),
            priority: r.priority,
            dependencies: r.dependencies.unwrap_or_default(),
        })
        .collect();

    Ok(SpecialistAnalysisResult {
        agent_name: String::new(),
        specialty: Specialty::Quality,
        timestamp: Utc::now(),
        confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        findings,
        recommendations,
        risk_assessment: raw.risk_assessment.unwrap_or_default(),
        metrics: raw.metrics.unwrap_or_default(),
    })
}

/// Slice out the outermost `{ ... }` of a response, if any.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
