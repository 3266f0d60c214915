//! Priority-conflict detection and resolution.
//!
//! Specialists are grouped by declared priority; a group of two or more at
//! High or Critical is a conflict. Detection is purely priority-based and
//! deliberately ignores finding content and location.

use crate::engine::InferenceClient;
use crate::models::{
    AgentConversation, AgentMessage, MessageType, ResolvedConflict, Severity,
    SpecialistAnalysisResult,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

const RESOLUTION_SYSTEM_PROMPT: &str = r#"You are moderating a disagreement between code-analysis specialists
who each claim their area carries the same top priority. Weigh their
findings and produce a short narrative ordering the work. Plain text."#;

/// Detects priority disagreements and produces resolution narratives.
pub struct ConflictResolver {
    engine: Arc<dyn InferenceClient>,
}

impl ConflictResolver {
    pub fn new(engine: Arc<dyn InferenceClient>) -> Self {
        Self { engine }
    }

    /// Group specialists by declared priority; conflicting groups are the
    /// ones with more than one member at High or Critical.
    pub fn detect(results: &[SpecialistAnalysisResult]) -> Vec<(Severity, Vec<String>)> {
        let mut groups: BTreeMap<Severity, Vec<String>> = BTreeMap::new();
        for result in results {
            groups
                .entry(result.declared_priority())
                .or_default()
                .push(result.agent_name.clone());
        }

        groups
            .into_iter()
            .rev()
            .filter(|(priority, agents)| {
                agents.len() > 1 && *priority >= Severity::High
            })
            .collect()
    }

    /// Resolve every detected conflict, appending one synthesis message per
    /// group to the conversation with elevated ordering priority.
    pub async fn resolve_conflicts(
        &self,
        conversation: &mut AgentConversation,
        results: &[SpecialistAnalysisResult],
    ) -> Vec<ResolvedConflict> {
        let conflicts = Self::detect(results);
        if conflicts.is_empty() {
            return Vec::new();
        }
        info!("Detected {} priority conflict group(s)", conflicts.len());

        let mut resolved = Vec::new();
        for (priority, agents) in conflicts {
            let (narrative, ok) = match self.resolve(&agents, priority, results).await {
                Ok(text) => (text, true),
                Err(e) => {
                    warn!("Conflict resolution failed for {:?}: {}", agents, e);
                    (format!("resolution unavailable: {}", e), false)
                }
            };

            conversation.append(AgentMessage {
                from_agent: "conflict-resolver".to_string(),
                message_type: MessageType::Synthesis,
                subject: format!("{} priority conflict: {}", priority, agents.join(", ")),
                content: narrative.clone(),
                priority: 0,
                timestamp: Utc::now(),
            });

            resolved.push(ResolvedConflict {
                priority,
                agents,
                resolution: narrative,
                resolved: ok,
            });
        }

        resolved
    }

    /// Generate one resolution narrative via the engine.
    async fn resolve(
        &self,
        conflicting_agents: &[String],
        priority: Severity,
        all_results: &[SpecialistAnalysisResult],
    ) -> crate::error::Result<String> {
        let mut prompt = format!(
            "The following specialists all declared {} priority: {}.\n\nTheir positions:\n",
            priority,
            conflicting_agents.join(", ")
        );
        for result in all_results {
            if !conflicting_agents.contains(&result.agent_name) {
                continue;
            }
            prompt.push_str(&format!(
                "\n{} ({} findings): {}\n",
                result.agent_name,
                result.findings.len(),
                result.risk_assessment
            ));
            for finding in result.findings.iter().take(5) {
                prompt.push_str(&format!(
                    "  - [{}] {}: {}\n",
                    finding.severity, finding.category, finding.description
                ));
            }
        }
        prompt.push_str("\nProduce a short resolution narrative ordering the work.");

        self.engine.infer(RESOLUTION_SYSTEM_PROMPT, &prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{FailingEngine, ScriptedEngine};
    use crate::models::{Finding, Specialty};
    use std::collections::HashMap;

    fn result_with_priority(agent: &str, specialty: Specialty, severity: Severity) -> SpecialistAnalysisResult {
        SpecialistAnalysisResult {
            agent_name: agent.to_string(),
            specialty,
            timestamp: Utc::now(),
            confidence: 0.8,
            findings: vec![Finding {
                category: "Issue".to_string(),
                description: "detail".to_string(),
                severity,
                location: "a.rs".to_string(),
                line: None,
                evidence: vec![],
            }],
            recommendations: Vec::new(),
            risk_assessment: format!("{} risk", severity),
            metrics: HashMap::new(),
        }
    }

    #[test]
    fn test_two_highs_trigger_one_conflict_group() {
        let results = vec![
            result_with_priority("sec", Specialty::Security, Severity::High),
            result_with_priority("perf", Specialty::Performance, Severity::High),
            result_with_priority("arch", Specialty::Architecture, Severity::Low),
        ];
        let conflicts = ConflictResolver::detect(&results);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].0, Severity::High);
        assert_eq!(conflicts[0].1.len(), 2);
    }

    #[test]
    fn test_distinct_priorities_trigger_no_conflict() {
        let results = vec![
            result_with_priority("sec", Specialty::Security, Severity::High),
            result_with_priority("perf", Specialty::Performance, Severity::Medium),
            result_with_priority("arch", Specialty::Architecture, Severity::Low),
        ];
        assert!(ConflictResolver::detect(&results).is_empty());
    }

    #[test]
    fn test_shared_medium_is_not_a_conflict() {
        let results = vec![
            result_with_priority("sec", Specialty::Security, Severity::Medium),
            result_with_priority("perf", Specialty::Performance, Severity::Medium),
        ];
        assert!(ConflictResolver::detect(&results).is_empty());
    }

    #[tokio::test]
    async fn test_resolution_appends_synthesis_message() {
        let engine = Arc::new(ScriptedEngine::new(["Security work goes first."]));
        let resolver = ConflictResolver::new(engine);
        let results = vec![
            result_with_priority("sec", Specialty::Security, Severity::Critical),
            result_with_priority("perf", Specialty::Performance, Severity::Critical),
        ];

        let mut conversation = AgentConversation::new();
        let resolved = resolver
            .resolve_conflicts(&mut conversation, &results)
            .await;

        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].resolved);
        assert_eq!(resolved[0].resolution, "Security work goes first.");

        assert_eq!(conversation.messages.len(), 1);
        let msg = &conversation.messages[0];
        assert_eq!(msg.message_type, MessageType::Synthesis);
        assert_eq!(msg.priority, 0);
    }

    #[tokio::test]
    async fn test_failed_narrative_is_recorded_unresolved() {
        let resolver = ConflictResolver::new(Arc::new(FailingEngine));
        let results = vec![
            result_with_priority("sec", Specialty::Security, Severity::High),
            result_with_priority("perf", Specialty::Performance, Severity::High),
        ];

        let mut conversation = AgentConversation::new();
        let resolved = resolver
            .resolve_conflicts(&mut conversation, &results)
            .await;

        assert_eq!(resolved.len(), 1);
        assert!(!resolved[0].resolved);
        assert!(resolved[0].resolution.contains("resolution unavailable"));
    }
}
