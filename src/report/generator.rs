//! Markdown and JSON report generation.
//!
//! Renders a `CouncilReport` into a comprehensive Markdown document or a
//! pretty-printed JSON payload.

use crate::config::ReportConfig;
use crate::models::{
    ConsensusMetrics, ConsolidatedRecommendations, PeerReview, Recommendation, Severity,
    SpecialistAnalysisResult, StageTimings,
};
use crate::report::{CouncilReport, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &CouncilReport, config: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("# CodeCouncil Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_consensus_section(&report.analysis.consensus));
    output.push_str(&generate_findings_section(&report.analysis.results));

    if config.include_reviews {
        output.push_str(&generate_reviews_section(&report.analysis.reviews));
    }

    output.push_str(&generate_recommendations_section(
        &report.analysis.consolidated,
    ));

    if config.include_cache_stats {
        if let Some(ref cache) = report.cache {
            output.push_str("## Cache\n\n");
            output.push_str(&format!(
                "- **Hits / Misses:** {} / {} ({:.0}% hit rate)\n",
                cache.hits, cache.misses, cache.hit_rate
            ));
            output.push_str(&format!(
                "- **Cost Saved:** ${:.4} | **Tokens Saved:** {}\n\n",
                cache.cost_saved, cache.tokens_saved
            ));
        }
    }

    output.push_str(&generate_timings_section(&report.analysis.timings));

    if config.include_conversation && !report.analysis.conversation.messages.is_empty() {
        output.push_str("## Discussion Transcript\n\n");
        for msg in &report.analysis.conversation.messages {
            output.push_str(&format!(
                "- `{}` **{}**: {}\n",
                msg.timestamp.format("%H:%M:%S"),
                msg.from_agent,
                msg.subject
            ));
        }
        output.push('\n');
    }

    output.push_str("---\n\n*Report generated by CodeCouncil*\n");
    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Target:** `{}`\n", metadata.target));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Files Analyzed:** {}\n",
        metadata.files_analyzed
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

/// Generate the consensus section.
fn generate_consensus_section(consensus: &ConsensusMetrics) -> String {
    let mut section = String::new();

    section.push_str("## Consensus\n\n");
    section.push_str(&format!(
        "- **Agreement:** {:.0}% ({} of {} reviews approved)\n",
        consensus.agreement_pct, consensus.approved_reviews, consensus.total_reviews
    ));
    section.push_str(&format!(
        "- **Conflicts:** {} detected, {} resolved\n",
        consensus.conflict_count, consensus.resolved_conflict_count
    ));
    section.push_str(&format!(
        "- **Discussion Duration:** {:.1}s\n\n",
        consensus.discussion_duration_secs
    ));

    section
}

/// Findings grouped per specialist, sorted severity-first.
fn generate_findings_section(results: &[SpecialistAnalysisResult]) -> String {
    let mut section = String::new();
    section.push_str("## Findings by Specialist\n\n");

    for result in results {
        section.push_str(&format!(
            "### {} ({:.0}% confidence)\n\n",
            result.agent_name,
            result.confidence * 100.0
        ));

        if !result.risk_assessment.is_empty() {
            section.push_str(&format!("*{}*\n\n", result.risk_assessment));
        }

        if result.findings.is_empty() {
            section.push_str("No findings reported.\n\n");
            continue;
        }

        let mut findings = result.findings.clone();
        findings.sort_by(|a, b| b.severity.cmp(&a.severity));

        for finding in &findings {
            section.push_str(&format!(
                "- {} **{}** `{}`{}: {}\n",
                finding.severity.emoji(),
                finding.category,
                finding.location,
                finding
                    .line
                    .map(|l| format!(":{}", l))
                    .unwrap_or_default(),
                finding.description
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the peer-review table.
fn generate_reviews_section(reviews: &[PeerReview]) -> String {
    if reviews.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Peer Reviews\n\n");
    section.push_str("| Reviewer | Reviewee | Verdict | Comments |\n");
    section.push_str("|:---|:---|:---:|:---|\n");

    for review in reviews {
        let verdict = if review.approved { "✅" } else { "❌" };
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            review.reviewer,
            review.reviewee,
            verdict,
            truncate(&review.comments, 120)
        ));
    }
    section.push('\n');

    section
}

/// Generate the consolidated recommendation buckets and conflicts.
fn generate_recommendations_section(consolidated: &ConsolidatedRecommendations) -> String {
    let mut section = String::new();

    section.push_str("## Recommendations\n\n");
    section.push_str(&format!("{}\n\n", consolidated.summary));

    section.push_str(&generate_bucket(
        &format!("{} High Priority", Severity::Critical.emoji()),
        &consolidated.high_priority,
    ));
    section.push_str(&generate_bucket(
        &format!("{} Medium Priority", Severity::Medium.emoji()),
        &consolidated.medium_priority,
    ));
    section.push_str(&generate_bucket(
        &format!("{} Long Term", Severity::Low.emoji()),
        &consolidated.long_term,
    ));

    section.push_str(&format!(
        "**Total Estimated Effort:** {:.1} hours\n\n",
        consolidated.total_estimated_hours
    ));

    if !consolidated.resolved_conflicts.is_empty() {
        section.push_str("### Resolved Conflicts\n\n");
        for conflict in &consolidated.resolved_conflicts {
            let status = if conflict.resolved { "resolved" } else { "unresolved" };
            section.push_str(&format!(
                "- **{} priority** ({}, {}): {}\n",
                conflict.priority,
                conflict.agents.join(", "),
                status,
                truncate(&conflict.resolution, 200)
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_bucket(title: &str, recommendations: &[Recommendation]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = format!("### {}\n\n", title);
    for rec in recommendations {
        section.push_str(&format!(
            "- **{}** ({:.1}h): {}\n",
            rec.title, rec.estimated_hours, rec.description
        ));
        if !rec.implementation.is_empty() {
            section.push_str(&format!("  - *Implementation:* {}\n", rec.implementation));
        }
    }
    section.push('\n');
    section
}

/// Generate the stage-timings table.
fn generate_timings_section(timings: &StageTimings) -> String {
    let mut section = String::new();

    section.push_str("## Timings\n\n");
    section.push_str("| Stage | Duration |\n");
    section.push_str("|:---|---:|\n");
    section.push_str(&format!(
        "| Agent analysis | {} ms |\n",
        timings.agent_analysis_ms
    ));
    section.push_str(&format!("| Peer review | {} ms |\n", timings.peer_review_ms));
    section.push_str(&format!(
        "| Conflict resolution | {} ms |\n",
        timings.conflict_resolution_ms
    ));
    section.push_str(&format!("| Synthesis | {} ms |\n", timings.synthesis_ms));
    section.push_str(&format!("| **Total** | **{} ms** |\n\n", timings.total_ms));

    section
}

fn truncate(text: &str, max: usize) -> String {
    let clean = text.replace('\n', " ");
    if clean.chars().count() <= max {
        clean
    } else {
        let cut: String = clean.chars().take(max).collect();
        format!("{}…", cut)
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &CouncilReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AgentConversation, Finding, Specialty, TeamAnalysisResult,
    };
    use chrono::Utc;
    use std::collections::HashMap;

    fn create_test_report() -> CouncilReport {
        let result = SpecialistAnalysisResult {
            agent_name: "security-specialist".to_string(),
            specialty: Specialty::Security,
            timestamp: Utc::now(),
            confidence: 0.85,
            findings: vec![Finding {
                category: "SQL Injection".to_string(),
                description: "string-built query".to_string(),
                severity: Severity::Critical,
                location: "user_service.py".to_string(),
                line: Some(42),
                evidence: vec![],
            }],
            recommendations: Vec::new(),
            risk_assessment: "high risk".to_string(),
            metrics: HashMap::new(),
        };

        let consolidated = ConsolidatedRecommendations {
            high_priority: vec![Recommendation {
                title: "Parameterize queries".to_string(),
                description: "use placeholders".to_string(),
                implementation: "switch to prepared statements".to_string(),
                estimated_hours: 3.0,
                priority: Some("high".to_string()),
                dependencies: vec![],
            }],
            medium_priority: Vec::new(),
            long_term: Vec::new(),
            resolved_conflicts: Vec::new(),
            total_estimated_hours: 3.0,
            summary: "Consolidated plan from 1 specialist(s).".to_string(),
        };

        CouncilReport {
            metadata: ReportMetadata {
                target: "./my-project".to_string(),
                analysis_date: Utc::now(),
                model_used: "llama3.2:latest".to_string(),
                files_analyzed: 3,
                duration_seconds: 12.5,
            },
            analysis: TeamAnalysisResult {
                objective: "audit".to_string(),
                started_at: Utc::now(),
                results: vec![result],
                reviews: vec![PeerReview {
                    reviewer: "performance-specialist".to_string(),
                    reviewee: "security-specialist".to_string(),
                    comments: "solid analysis".to_string(),
                    approved: true,
                    timestamp: Utc::now(),
                }],
                conversation: AgentConversation::new(),
                consolidated,
                consensus: ConsensusMetrics {
                    agreement_pct: 100.0,
                    total_reviews: 1,
                    approved_reviews: 1,
                    ..Default::default()
                },
                timings: StageTimings {
                    agent_analysis_ms: 900,
                    peer_review_ms: 300,
                    conflict_resolution_ms: 0,
                    synthesis_ms: 1,
                    total_ms: 1201,
                },
            },
            cache: None,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("# CodeCouncil Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Consensus"));
        assert!(markdown.contains("## Findings by Specialist"));
        assert!(markdown.contains("SQL Injection"));
        assert!(markdown.contains("user_service.py"));
        assert!(markdown.contains("Parameterize queries"));
        assert!(markdown.contains("## Peer Reviews"));
        assert!(markdown.contains("## Timings"));
    }

    #[test]
    fn test_reviews_can_be_excluded() {
        let report = create_test_report();
        let config = ReportConfig {
            include_reviews: false,
            ..ReportConfig::default()
        };
        let markdown = generate_markdown_report(&report, &config);
        assert!(!markdown.contains("## Peer Reviews"));
    }

    #[test]
    fn test_findings_sorted_severity_first() {
        let mut report = create_test_report();
        report.analysis.results[0].findings.push(Finding {
            category: "Style".to_string(),
            description: "naming".to_string(),
            severity: Severity::Low,
            location: "a.py".to_string(),
            line: None,
            evidence: vec![],
        });
        report.analysis.results[0].findings.rotate_left(1);

        let markdown = generate_markdown_report(&report, &ReportConfig::default());
        let critical_pos = markdown.find("SQL Injection").unwrap();
        let low_pos = markdown.find("Style").unwrap();
        assert!(critical_pos < low_pos);
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"model_used\""));
        assert!(json.contains("\"findings\""));
        assert!(json.contains("\"consensus\""));
        assert!(json.contains("\"timings\""));
    }

    #[test]
    fn test_truncate_handles_long_comments() {
        let long = "x".repeat(300);
        let short = truncate(&long, 120);
        assert!(short.chars().count() <= 121);
        assert!(short.ends_with('…'));
    }
}
