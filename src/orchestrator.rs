//! Orchestration of the full analysis pipeline.
//!
//! One `analyze` call runs every requested specialist concurrently (cache
//! and rate limiter in front of each engine call), then the downstream
//! stages in order: peer review, conflict resolution, synthesis, consensus.
//! Agent failures are isolated into sentinel results; cancellation stops
//! dispatch and skips the downstream stages.

use crate::agents::{AgentRegistry, SpecialistAgent};
use crate::cache::ContentCache;
use crate::engine::InferenceClient;
use crate::error::{CouncilError, Result};
use crate::facts::{self, StructuralFacts};
use crate::models::{
    AgentConversation, AgentMessage, ConsolidatedRecommendations, ConversationStatus,
    MessageType, SourceFile, SourceFileMeta, Specialty, SpecialistAnalysisResult,
    StageTimings, TeamAnalysisResult,
};
use crate::ratelimit::RateLimiter;
use crate::review::{calculate_consensus, ConflictResolver, PeerReviewCoordinator};
use crate::synthesis::RecommendationSynthesizer;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Rough token estimate for local models with no usage reporting.
const CHARS_PER_TOKEN: usize = 4;
/// Nominal unit cost per 1K tokens, used for cache-savings accounting.
const NOMINAL_COST_PER_1K_TOKENS: f64 = 0.01;

/// Coordinates the specialist council for one or more analysis requests.
pub struct Orchestrator {
    registry: AgentRegistry,
    cache: Arc<ContentCache>,
    limiter: Arc<RateLimiter>,
    engine: Arc<dyn InferenceClient>,
    model_name: String,
    max_concurrent: usize,
}

impl Orchestrator {
    /// Build an orchestrator over the configured specialties.
    pub fn new(
        engine: Arc<dyn InferenceClient>,
        cache: Arc<ContentCache>,
        limiter: Arc<RateLimiter>,
        specialties: &[Specialty],
        model_name: String,
        max_concurrent: usize,
    ) -> Self {
        Self {
            registry: AgentRegistry::new(Arc::clone(&engine), specialties),
            cache,
            limiter,
            engine,
            model_name,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run the full pipeline over the file set.
    pub async fn analyze(
        &self,
        files: &[SourceFile],
        specialties: &[Specialty],
        objective: &str,
        cancel: &CancellationToken,
    ) -> Result<TeamAnalysisResult> {
        let started_at = Utc::now();
        let total_timer = Instant::now();

        // Resolve every agent up front; an unconfigured specialty is a
        // request-fatal configuration error, not a per-agent failure.
        let mut agents = Vec::with_capacity(specialties.len());
        for &specialty in specialties {
            agents.push(self.registry.by_specialty(specialty)?);
        }

        let content = combined_content(files);
        let file_meta = SourceFileMeta::from_files(files);
        let structural_facts = facts::parse_all(files);

        let mut conversation = AgentConversation::new();
        conversation.append(AgentMessage {
            from_agent: "orchestrator".to_string(),
            message_type: MessageType::Status,
            subject: "analysis started".to_string(),
            content: format!(
                "{} specialist(s) over {} file(s)",
                agents.len(),
                files.len()
            ),
            priority: 5,
            timestamp: started_at,
        });

        info!(
            "Dispatching {} specialist(s) over {} file(s)",
            agents.len(),
            files.len()
        );

        let stage_timer = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let pending = agents.iter().map(|agent| {
            self.run_agent(
                Arc::clone(agent),
                files,
                objective,
                &structural_facts,
                &content,
                &file_meta,
                Arc::clone(&semaphore),
                cancel,
            )
        });
        let results: Vec<SpecialistAnalysisResult> = join_all(pending).await;
        let agent_analysis_ms = stage_timer.elapsed().as_millis() as u64;

        for result in &results {
            let subject = if result.is_error() {
                format!("{} analysis failed", result.agent_name)
            } else {
                format!("{} completed analysis", result.agent_name)
            };
            conversation.append(AgentMessage {
                from_agent: result.agent_name.clone(),
                message_type: MessageType::Analysis,
                subject,
                content: result.risk_assessment.clone(),
                priority: 5,
                timestamp: result.timestamp,
            });
        }

        if cancel.is_cancelled() {
            warn!("Analysis cancelled; skipping review and synthesis stages");
            conversation.close(ConversationStatus::Failed);
            return Ok(TeamAnalysisResult {
                objective: objective.to_string(),
                started_at,
                results,
                reviews: Vec::new(),
                conversation,
                consolidated: cancelled_consolidation(),
                consensus: Default::default(),
                timings: StageTimings {
                    agent_analysis_ms,
                    total_ms: total_timer.elapsed().as_millis() as u64,
                    ..Default::default()
                },
            });
        }

        let stage_timer = Instant::now();
        let reviewer = PeerReviewCoordinator::new(Arc::clone(&self.engine));
        let reviews = reviewer.review(&results).await;
        let peer_review_ms = stage_timer.elapsed().as_millis() as u64;

        let stage_timer = Instant::now();
        let resolver = ConflictResolver::new(Arc::clone(&self.engine));
        let resolved_conflicts = resolver
            .resolve_conflicts(&mut conversation, &results)
            .await;
        let conflict_resolution_ms = stage_timer.elapsed().as_millis() as u64;

        let stage_timer = Instant::now();
        let consolidated = RecommendationSynthesizer::synthesize(&results, resolved_conflicts);
        let synthesis_ms = stage_timer.elapsed().as_millis() as u64;

        let consensus = calculate_consensus(
            &reviews,
            &consolidated.resolved_conflicts,
            &conversation,
        );
        conversation.close(ConversationStatus::Completed);

        info!(
            "Analysis complete: {} finding(s), {} recommendation(s), {:.0}% agreement",
            results.iter().map(|r| r.findings.len()).sum::<usize>(),
            consolidated.len(),
            consensus.agreement_pct
        );

        Ok(TeamAnalysisResult {
            objective: objective.to_string(),
            started_at,
            results,
            reviews,
            conversation,
            consolidated,
            consensus,
            timings: StageTimings {
                agent_analysis_ms,
                peer_review_ms,
                conflict_resolution_ms,
                synthesis_ms,
                total_ms: total_timer.elapsed().as_millis() as u64,
            },
        })
    }

    /// Run one specialist with cache, rate limit, and cancellation in
    /// front of the engine call. Never fails: errors become the sentinel.
    #[allow(clippy::too_many_arguments)]
    async fn run_agent(
        &self,
        agent: Arc<SpecialistAgent>,
        files: &[SourceFile],
        objective: &str,
        structural_facts: &[StructuralFacts],
        content: &str,
        file_meta: &SourceFileMeta,
        semaphore: Arc<Semaphore>,
        cancel: &CancellationToken,
    ) -> SpecialistAnalysisResult {
        let _permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return SpecialistAnalysisResult::analysis_error(
                    agent.name(),
                    agent.specialty(),
                    "dispatch queue closed",
                )
            }
        };

        if cancel.is_cancelled() {
            return SpecialistAnalysisResult::analysis_error(
                agent.name(),
                agent.specialty(),
                "analysis cancelled",
            );
        }

        if let Some(cached) = self
            .cache
            .get(agent.name(), content, objective, &self.model_name)
            .await
        {
            info!("Cache hit for {}; skipping engine call", agent.name());
            return cached;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return SpecialistAnalysisResult::analysis_error(
                    agent.name(),
                    agent.specialty(),
                    "analysis cancelled",
                );
            }
            _ = self.limiter.admit(agent.name()) => {}
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(CouncilError::Cancelled),
            result = agent.analyze(files, objective, structural_facts) => result,
        };

        match outcome {
            Ok(result) => {
                let token_count = (content.len() / CHARS_PER_TOKEN) as u64;
                let cost = token_count as f64 / 1000.0 * NOMINAL_COST_PER_1K_TOKENS;
                self.cache
                    .put(
                        agent.name(),
                        agent.specialty(),
                        content,
                        objective,
                        &self.model_name,
                        result.clone(),
                        token_count,
                        cost,
                        file_meta.clone(),
                    )
                    .await;
                result
            }
            Err(e) => {
                warn!("Agent {} failed: {}", agent.name(), e);
                SpecialistAnalysisResult::analysis_error(
                    agent.name(),
                    agent.specialty(),
                    &e.to_string(),
                )
            }
        }
    }
}

/// Canonical content string for cache keying: paths and bodies in order.
fn combined_content(files: &[SourceFile]) -> String {
    let mut combined = String::new();
    for file in files {
        combined.push_str(&file.path);
        combined.push('\n');
        combined.push_str(&file.content);
        combined.push('\n');
    }
    combined
}

fn cancelled_consolidation() -> ConsolidatedRecommendations {
    ConsolidatedRecommendations {
        high_priority: Vec::new(),
        medium_priority: Vec::new(),
        long_term: Vec::new(),
        resolved_conflicts: Vec::new(),
        total_estimated_hours: 0.0,
        summary: "Analysis cancelled before synthesis.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::engine::test_support::{FailingEngine, ScriptedEngine};
    use crate::ratelimit::RateLimitConfig;

    const ANALYSIS_RESPONSE: &str = r#"{
        "confidence": 0.9,
        "risk_assessment": "moderate",
        "findings": [
            {"category": "Hardcoded Secret", "description": "api key in source",
             "severity": "high", "location": "config.py"}
        ],
        "recommendations": [
            {"title": "Move secret to env", "description": "",
             "estimated_hours": 1.0, "priority": "high"}
        ]
    }"#;

    fn sample_files() -> Vec<SourceFile> {
        vec![SourceFile {
            path: "config.py".to_string(),
            content: "API_KEY = \"sk-123\"".to_string(),
        }]
    }

    fn orchestrator(engine: Arc<dyn InferenceClient>) -> Orchestrator {
        Orchestrator::new(
            engine,
            Arc::new(ContentCache::new(CacheConfig::default())),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            Specialty::all(),
            "llama3.2:latest".to_string(),
            4,
        )
    }

    #[tokio::test]
    async fn test_full_pipeline_produces_all_stages() {
        let engine = Arc::new(ScriptedEngine::new([ANALYSIS_RESPONSE]));
        let orch = orchestrator(engine);
        let cancel = CancellationToken::new();

        let result = orch
            .analyze(
                &sample_files(),
                &[Specialty::Security, Specialty::Performance],
                "find secrets",
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(result.results.len(), 2);
        assert!(result.results.iter().all(|r| !r.is_error()));
        // Two specialists: 2 ordered review pairs.
        assert_eq!(result.reviews.len(), 2);
        assert_eq!(result.conversation.status, ConversationStatus::Completed);
        assert!(result.timings.total_ms >= result.timings.agent_analysis_ms);
    }

    #[tokio::test]
    async fn test_agent_failures_become_sentinels_not_aborts() {
        let orch = orchestrator(Arc::new(FailingEngine));
        let cancel = CancellationToken::new();

        let result = orch
            .analyze(
                &sample_files(),
                &[Specialty::Security, Specialty::Quality],
                "",
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(result.results.len(), 2);
        assert!(result.results.iter().all(|r| r.is_error()));
        // Downstream stages still run over sentinel results.
        assert_eq!(result.reviews.len(), 2);
        assert!(result
            .consolidated
            .summary
            .contains("unable to generate implementation strategy"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_engine_call() {
        let engine = Arc::new(ScriptedEngine::new([ANALYSIS_RESPONSE]));
        let orch = orchestrator(Arc::clone(&engine) as Arc<dyn InferenceClient>);
        let cancel = CancellationToken::new();

        // Single specialist: no peer reviews, so only the analysis calls
        // the engine.
        orch.analyze(&sample_files(), &[Specialty::Security], "audit", &cancel)
            .await
            .unwrap();
        assert_eq!(engine.call_count(), 1);

        let second = orch
            .analyze(&sample_files(), &[Specialty::Security], "audit", &cancel)
            .await
            .unwrap();
        assert_eq!(engine.call_count(), 1);
        assert!(!second.results[0].is_error());
    }

    #[tokio::test]
    async fn test_failed_analysis_is_not_cached() {
        let orch = orchestrator(Arc::new(FailingEngine));
        let cancel = CancellationToken::new();

        orch.analyze(&sample_files(), &[Specialty::Security], "", &cancel)
            .await
            .unwrap();

        let stats = orch.cache.stats().await;
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_cancellation_skips_downstream_stages() {
        let engine = Arc::new(ScriptedEngine::new([ANALYSIS_RESPONSE]));
        let orch = orchestrator(Arc::clone(&engine) as Arc<dyn InferenceClient>);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orch
            .analyze(
                &sample_files(),
                &[Specialty::Security, Specialty::Performance],
                "",
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(engine.call_count(), 0);
        assert!(result.results.iter().all(|r| r.is_error()));
        assert!(result.reviews.is_empty());
        assert_eq!(result.conversation.status, ConversationStatus::Failed);
        assert!(result.consolidated.summary.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_unconfigured_specialty_is_request_fatal() {
        let engine: Arc<dyn InferenceClient> = Arc::new(FailingEngine);
        let orch = Orchestrator::new(
            engine,
            Arc::new(ContentCache::new(CacheConfig::default())),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            &[Specialty::Security],
            "llama3.2:latest".to_string(),
            4,
        );
        let cancel = CancellationToken::new();

        let err = orch
            .analyze(&sample_files(), &[Specialty::Architecture], "", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CouncilError::UnknownSpecialty(_)));
    }
}
