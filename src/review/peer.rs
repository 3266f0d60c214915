//! All-pairs peer review over the collected specialist results.
//!
//! For n specialists this produces n(n-1) review records, one per ordered
//! (reviewer, reviewee) pair. Reviews run concurrently and a failed
//! pairwise review still yields its record, so siblings are unaffected.

use crate::agents::extract_json_object;
use crate::engine::InferenceClient;
use crate::models::{PeerReview, SpecialistAnalysisResult};
use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

const REVIEW_SYSTEM_PROMPT: &str = r#"You are reviewing a peer specialist's code analysis.
Judge whether their findings and recommendations are sound and complete.
Respond with one JSON object: {"approved": true|false, "comments": "..."}.
Only output valid JSON."#;

#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(default)]
    approved: bool,
    #[serde(default)]
    comments: String,
}

/// Runs the all-pairs cross-review pass.
pub struct PeerReviewCoordinator {
    engine: Arc<dyn InferenceClient>,
}

impl PeerReviewCoordinator {
    pub fn new(engine: Arc<dyn InferenceClient>) -> Self {
        Self { engine }
    }

    /// Produce one review per ordered (reviewer, reviewee) pair.
    pub async fn review(&self, results: &[SpecialistAnalysisResult]) -> Vec<PeerReview> {
        let mut pending = Vec::new();
        for reviewer in results {
            for reviewee in results {
                if reviewer.agent_name != reviewee.agent_name {
                    pending.push(self.review_pair(reviewer, reviewee));
                }
            }
        }

        debug!("Running {} pairwise reviews", pending.len());
        join_all(pending).await
    }

    async fn review_pair(
        &self,
        reviewer: &SpecialistAnalysisResult,
        reviewee: &SpecialistAnalysisResult,
    ) -> PeerReview {
        let prompt = build_review_prompt(reviewer, reviewee);

        let (approved, comments) = match self.engine.infer(REVIEW_SYSTEM_PROMPT, &prompt).await {
            Ok(response) => parse_review(&response),
            Err(e) => {
                warn!(
                    "Peer review {} -> {} failed: {}",
                    reviewer.agent_name, reviewee.agent_name, e
                );
                (false, format!("review unavailable: {}", e))
            }
        };

        PeerReview {
            reviewer: reviewer.agent_name.clone(),
            reviewee: reviewee.agent_name.clone(),
            comments,
            approved,
            timestamp: Utc::now(),
        }
    }
}

fn build_review_prompt(
    reviewer: &SpecialistAnalysisResult,
    reviewee: &SpecialistAnalysisResult,
) -> String {
    let mut prompt = format!(
        "You are the {} specialist. Review the {} specialist's analysis.\n\nTheir findings:\n",
        reviewer.specialty, reviewee.specialty
    );
    if reviewee.findings.is_empty() {
        prompt.push_str("- (none reported)\n");
    }
    for finding in &reviewee.findings {
        prompt.push_str(&format!(
            "- [{}] {} at {}: {}\n",
            finding.severity, finding.category, finding.location, finding.description
        ));
    }
    prompt.push_str("\nTheir recommendations:\n");
    for rec in &reviewee.recommendations {
        prompt.push_str(&format!(
            "- {} ({} h, priority {})\n",
            rec.title,
            rec.estimated_hours,
            rec.priority.as_deref().unwrap_or("unset")
        ));
    }
    prompt.push_str(&format!(
        "\nTheir risk assessment: {}\n",
        reviewee.risk_assessment
    ));
    prompt
}

/// Degrades malformed output to an unapproved review carrying the raw text.
fn parse_review(response: &str) -> (bool, String) {
    if let Some(body) = extract_json_object(response) {
        if let Ok(raw) = serde_json::from_str::<RawReview>(body) {
            return (raw.approved, raw.comments);
        }
    }
    (false, response.trim().to_string())
}
