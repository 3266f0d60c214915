//! Consolidation of specialist recommendations into priority buckets.
//!
//! Sentinel-error results are excluded before bucketing. Priorities are
//! compared case-insensitively; a missing, blank, or unrecognized priority
//! lands in the medium bucket rather than being dropped.

use crate::models::{
    ConsolidatedRecommendations, Recommendation, ResolvedConflict, SpecialistAnalysisResult,
};
use tracing::{debug, info};

/// Merges per-specialist recommendations into one consolidated plan.
pub struct RecommendationSynthesizer;

impl RecommendationSynthesizer {
    /// Bucket every recommendation from the non-failed specialists and
    /// attach the conflict resolutions.
    pub fn synthesize(
        results: &[SpecialistAnalysisResult],
        resolved_conflicts: Vec<ResolvedConflict>,
    ) -> ConsolidatedRecommendations {
        let errored = results.iter().filter(|r| r.is_error()).count();
        let successful: Vec<&SpecialistAnalysisResult> =
            results.iter().filter(|r| !r.is_error()).collect();

        let mut high_priority = Vec::new();
        let mut medium_priority = Vec::new();
        let mut long_term = Vec::new();

        for result in &successful {
            for rec in &result.recommendations {
                bucket_for(rec).push(rec.clone(), &mut high_priority, &mut medium_priority, &mut long_term);
            }
        }

        let total_estimated_hours: f64 = high_priority
            .iter()
            .chain(&medium_priority)
            .chain(&long_term)
            .map(|r: &Recommendation| r.estimated_hours)
            .sum();

        let summary = build_summary(
            successful.len(),
            errored,
            high_priority.len(),
            medium_priority.len(),
            long_term.len(),
            total_estimated_hours,
        );

        debug!(
            "Synthesized {} recommendation(s) from {} specialist(s)",
            high_priority.len() + medium_priority.len() + long_term.len(),
            successful.len()
        );
        if errored > 0 {
            info!("{} agent(s) excluded from synthesis due to errors", errored);
        }

        ConsolidatedRecommendations {
            high_priority,
            medium_priority,
            long_term,
            resolved_conflicts,
            total_estimated_hours,
            summary,
        }
    }
}

enum Bucket {
    High,
    Medium,
    LongTerm,
}

impl Bucket {
    fn push(
        self,
        rec: Recommendation,
        high: &mut Vec<Recommendation>,
        medium: &mut Vec<Recommendation>,
        long_term: &mut Vec<Recommendation>,
    ) {
        match self {
            Bucket::High => high.push(rec),
            Bucket::Medium => medium.push(rec),
            Bucket::LongTerm => long_term.push(rec),
        }
    }
}

/// Bucket selection: CRITICAL/HIGH -> high, LOW -> long-term, everything
/// else (including absent or junk priorities) -> medium.
fn bucket_for(rec: &Recommendation) -> Bucket {
    match rec
        .priority
        .as_deref()
        .map(|p| p.trim().to_lowercase())
        .as_deref()
    {
        Some("critical") | Some("high") => Bucket::High,
        Some("low") => Bucket::LongTerm,
        _ => Bucket::Medium,
    }
}

fn build_summary(
    successful: usize,
    errored: usize,
    high: usize,
    medium: usize,
    long_term: usize,
    total_hours: f64,
) -> String {
    if successful == 0 {
        let mut s = String::from(
            "No specialist analyses completed; unable to generate implementation strategy.",
        );
        if errored > 0 {
            s.push_str(&format!(" {} agent(s) encountered errors.", errored));
        }
        return s;
    }

    let mut s = format!(
        "Consolidated plan from {} specialist(s): {} high-priority, {} medium-priority, {} long-term recommendation(s); estimated effort {:.1} hours.",
        successful, high, medium, long_term, total_hours
    );
    if errored > 0 {
        s.push_str(&format!(" {} agent(s) encountered errors.", errored));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Specialty, SpecialistAnalysisResult};
    use chrono::Utc;
    use std::collections::HashMap;

    fn rec(title: &str, priority: Option<&str>, hours: f64) -> Recommendation {
        Recommendation {
            title: title.to_string(),
            description: String::new(),
            implementation: String::new(),
            estimated_hours: hours,
            priority: priority.map(str::to_string),
            dependencies: Vec::new(),
        }
    }

    fn result_with(recs: Vec<Recommendation>) -> SpecialistAnalysisResult {
        SpecialistAnalysisResult {
            agent_name: "security-specialist".to_string(),
            specialty: Specialty::Security,
            timestamp: Utc::now(),
            confidence: 0.9,
            findings: Vec::new(),
            recommendations: recs,
            risk_assessment: String::new(),
            metrics: HashMap::new(),
        }
    }

    #[test]
    fn test_bucketing_is_case_insensitive() {
        let results = vec![result_with(vec![
            rec("fix injection", Some("CRITICAL"), 3.0),
            rec("add index", Some("High"), 2.0),
            rec("refactor module", Some("medium"), 5.0),
            rec("rename vars", Some("LOW"), 1.0),
        ])];
        let consolidated = RecommendationSynthesizer::synthesize(&results, Vec::new());

        assert_eq!(consolidated.high_priority.len(), 2);
        assert_eq!(consolidated.medium_priority.len(), 1);
        assert_eq!(consolidated.long_term.len(), 1);
        assert!((consolidated.total_estimated_hours - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_and_missing_priorities_land_in_medium() {
        let results = vec![result_with(vec![
            rec("a", None, 1.0),
            rec("b", Some(""), 1.0),
            rec("c", Some("urgent!!"), 1.0),
        ])];
        let consolidated = RecommendationSynthesizer::synthesize(&results, Vec::new());

        assert!(consolidated.high_priority.is_empty());
        assert!(consolidated.long_term.is_empty());
        assert_eq!(consolidated.medium_priority.len(), 3);
    }

    #[test]
    fn test_error_sentinels_are_excluded() {
        let mut errored = SpecialistAnalysisResult::analysis_error(
            "performance-specialist",
            Specialty::Performance,
            "timed out",
        );
        errored.recommendations = vec![rec("should never appear", Some("critical"), 99.0)];

        let results = vec![
            result_with(vec![rec("real work", Some("high"), 2.0)]),
            errored,
        ];
        let consolidated = RecommendationSynthesizer::synthesize(&results, Vec::new());

        assert_eq!(consolidated.len(), 1);
        assert_eq!(consolidated.high_priority[0].title, "real work");
        assert!(consolidated.summary.contains("1 agent(s) encountered errors"));
    }

    #[test]
    fn test_all_agents_failed_yields_explicit_summary() {
        let results = vec![SpecialistAnalysisResult::analysis_error(
            "security-specialist",
            Specialty::Security,
            "connection refused",
        )];
        let consolidated = RecommendationSynthesizer::synthesize(&results, Vec::new());

        assert!(consolidated.is_empty());
        assert_eq!(consolidated.total_estimated_hours, 0.0);
        assert!(consolidated
            .summary
            .contains("unable to generate implementation strategy"));
    }

    #[test]
    fn test_every_priority_spelling_lands_in_one_bucket() {
        let results = vec![result_with(vec![
            rec("a", Some("CRITICAL"), 1.0),
            rec("b", Some("HIGH"), 2.0),
            rec("c", Some("MEDIUM"), 3.0),
            rec("d", Some("LOW"), 4.0),
            rec("e", Some(""), 5.0),
            rec("f", None, 6.0),
        ])];
        let consolidated = RecommendationSynthesizer::synthesize(&results, Vec::new());

        assert_eq!(consolidated.high_priority.len(), 2);
        assert_eq!(consolidated.medium_priority.len(), 3);
        assert_eq!(consolidated.long_term.len(), 1);
        assert_eq!(consolidated.len(), 6);
        assert!((consolidated.total_estimated_hours - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_hours_equals_bucket_sums() {
        let results = vec![result_with(vec![
            rec("a", Some("high"), 1.5),
            rec("b", Some("medium"), 2.5),
            rec("c", Some("low"), 4.0),
        ])];
        let consolidated = RecommendationSynthesizer::synthesize(&results, Vec::new());

        let bucket_sum: f64 = consolidated
            .high_priority
            .iter()
            .chain(&consolidated.medium_priority)
            .chain(&consolidated.long_term)
            .map(|r| r.estimated_hours)
            .sum();
        assert!((consolidated.total_estimated_hours - bucket_sum).abs() < 1e-9);
    }
}
