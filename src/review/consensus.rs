//! Agreement and participation metrics over the review stage.

use crate::models::{AgentConversation, ConsensusMetrics, PeerReview, ResolvedConflict};
use std::collections::HashMap;

/// Derive consensus metrics from peer reviews, conflicts, and the
/// conversation timeline.
pub fn calculate_consensus(
    reviews: &[PeerReview],
    conflicts: &[ResolvedConflict],
    conversation: &AgentConversation,
) -> ConsensusMetrics {
    let total_reviews = reviews.len();
    let approved_reviews = reviews.iter().filter(|r| r.approved).count();
    let agreement_pct = if total_reviews == 0 {
        0.0
    } else {
        approved_reviews as f64 / total_reviews as f64 * 100.0
    };

    let mut participation: HashMap<String, usize> = HashMap::new();
    for review in reviews {
        *participation.entry(review.reviewer.clone()).or_insert(0) += 1;
    }

    ConsensusMetrics {
        agreement_pct,
        total_reviews,
        approved_reviews,
        conflict_count: conflicts.len(),
        resolved_conflict_count: conflicts.iter().filter(|c| c.resolved).count(),
        participation,
        discussion_duration_secs: conversation.discussion_duration_secs(),
    }
}
