//! Ground-truth scoring of analysis output against a labeled benchmark.
//!
//! Matching is greedy and one-to-one: AI findings are processed in input
//! order, each claiming at most one unmatched issue in the same file, with
//! ties broken by highest confidence and then by ground-truth id. The
//! policy is order-dependent but keeps matching correct under duplicate
//! findings in the same file.

mod dataset;

pub use dataset::{GroundTruthDataset, GroundTruthIssue};

use crate::models::{Finding, Severity, SpecialistAnalysisResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Validator knobs, loaded from the `[validation]` config section.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Minimum weighted confidence (0-100) for a true positive.
    pub min_match_confidence: f64,
    pub category_weight: f64,
    pub severity_weight: f64,
    pub location_weight: f64,
    /// Severity levels of slack that still earn partial credit.
    pub allowed_severity_difference: i32,
    /// Line-number slack that still earns partial credit.
    pub allowed_line_difference: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_match_confidence: 70.0,
            category_weight: 0.5,
            severity_weight: 0.3,
            location_weight: 0.2,
            allowed_severity_difference: 1,
            allowed_line_difference: 5,
        }
    }
}

/// Strength bands for an accepted or attempted match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchClassification {
    Exact,
    Partial,
    Weak,
    None,
}

impl MatchClassification {
    /// Band for a weighted confidence on the 0-100 scale.
    pub fn classify(confidence: f64) -> Self {
        if confidence >= 95.0 {
            MatchClassification::Exact
        } else if confidence >= 70.0 {
            MatchClassification::Partial
        } else if confidence >= 40.0 {
            MatchClassification::Weak
        } else {
            MatchClassification::None
        }
    }
}

/// One AI finding paired with the ground-truth issue it claimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingMatch {
    pub agent_name: String,
    pub finding_category: String,
    pub issue_id: String,
    /// Weighted match confidence, 0-100.
    pub confidence: f64,
    pub category_matched: bool,
    pub severity_matched: bool,
    pub location_matched: bool,
    pub classification: MatchClassification,
}

/// Retrieval-quality counters with derived metrics on a 0-100 scale.
///
/// True negatives are not modeled; there is no natural universe of
/// correct absences.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
}

impl QualityMetrics {
    /// Derive every metric from the counts; zero on zero denominators.
    pub fn calculate(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        let accuracy = ratio(tp, tp + fp + fn_);

        Self {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            precision,
            recall,
            f1,
            accuracy,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

/// Full scoring output for one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthValidationResult {
    pub dataset_name: String,
    pub findings_evaluated: usize,
    pub issues_total: usize,
    pub matches: Vec<FindingMatch>,
    /// Ground-truth issues no finding claimed.
    pub missed_issue_ids: Vec<String>,
    pub overall: QualityMetrics,
    pub per_agent: HashMap<String, QualityMetrics>,
    pub per_category: HashMap<String, QualityMetrics>,
    pub per_severity: HashMap<String, QualityMetrics>,
}

/// Scores AI findings against a labeled benchmark.
pub struct GroundTruthValidator {
    config: ValidationConfig,
}

struct Candidate {
    index: usize,
    confidence: f64,
    category_matched: bool,
    severity_matched: bool,
    location_matched: bool,
}

impl GroundTruthValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Score every non-sentinel finding against the dataset.
    pub fn validate(
        &self,
        results: &[SpecialistAnalysisResult],
        dataset: &GroundTruthDataset,
    ) -> GroundTruthValidationResult {
        // Findings tagged with their producing agent, sentinels excluded.
        let findings: Vec<(&str, &Finding)> = results
            .iter()
            .filter(|r| !r.is_error())
            .flat_map(|r| r.findings.iter().map(move |f| (r.agent_name.as_str(), f)))
            .collect();

        if dataset.issues.is_empty() {
            warn!("Ground-truth dataset {} has no issues", dataset.name);
            return self.zeroed_result(dataset, findings.len());
        }

        let mut claimed: HashSet<usize> = HashSet::new();
        let mut matches: Vec<FindingMatch> = Vec::new();
        // (agent, AI category, AI severity, matched) per finding, for the
        // breakdowns.
        let mut evaluated: Vec<(String, String, Severity, bool)> = Vec::new();

        for (agent, finding) in &findings {
            let candidate = self.best_candidate(finding, dataset, &claimed);
            let accepted = match candidate {
                Some(c) if c.confidence >= self.config.min_match_confidence => {
                    claimed.insert(c.index);
                    let issue = &dataset.issues[c.index];
                    debug!(
                        "Matched '{}' to {} at {:.0}%",
                        finding.category, issue.id, c.confidence
                    );
                    matches.push(FindingMatch {
                        agent_name: agent.to_string(),
                        finding_category: finding.category.clone(),
                        issue_id: issue.id.clone(),
                        confidence: c.confidence,
                        category_matched: c.category_matched,
                        severity_matched: c.severity_matched,
                        location_matched: c.location_matched,
                        classification: MatchClassification::classify(c.confidence),
                    });
                    true
                }
                _ => false,
            };
            evaluated.push((
                agent.to_string(),
                finding.category.clone(),
                finding.severity,
                accepted,
            ));
        }

        let missed: Vec<&GroundTruthIssue> = dataset
            .issues
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed.contains(i))
            .map(|(_, issue)| issue)
            .collect();

        let tp = matches.len();
        let fp = evaluated.iter().filter(|(_, _, _, m)| !m).count();
        let fn_ = missed.len();

        GroundTruthValidationResult {
            dataset_name: dataset.name.clone(),
            findings_evaluated: evaluated.len(),
            issues_total: dataset.issues.len(),
            overall: QualityMetrics::calculate(tp, fp, fn_),
            per_agent: breakdown(&evaluated, &missed, |e| e.0.clone(), |_| None),
            per_category: breakdown(
                &evaluated,
                &missed,
                |e| normalize(&e.1),
                |i| Some(normalize(&i.category)),
            ),
            per_severity: breakdown(
                &evaluated,
                &missed,
                |e| e.2.to_string(),
                |i| Some(i.severity.to_string()),
            ),
            missed_issue_ids: missed.iter().map(|i| i.id.clone()).collect(),
            matches,
        }
    }

    /// Highest-confidence unclaimed issue in the finding's file, ties
    /// broken by ground-truth id.
    fn best_candidate(
        &self,
        finding: &Finding,
        dataset: &GroundTruthDataset,
        claimed: &HashSet<usize>,
    ) -> Option<Candidate> {
        let file = finding.location.trim().to_lowercase();
        let mut best: Option<(Candidate, &str)> = None;

        for (index, issue) in dataset.issues.iter().enumerate() {
            if claimed.contains(&index) || issue.file.trim().to_lowercase() != file {
                continue;
            }

            let category_score = if normalize(&finding.category) == normalize(&issue.category) {
                1.0
            } else {
                0.0
            };
            let severity_score = self.severity_score(finding.severity, issue.severity);
            let location_score = self.location_score(finding.line, issue.line);

            let confidence = 100.0
                * (self.config.category_weight * category_score
                    + self.config.severity_weight * severity_score
                    + self.config.location_weight * location_score);

            let candidate = Candidate {
                index,
                confidence,
                category_matched: category_score == 1.0,
                severity_matched: severity_score > 0.0,
                location_matched: location_score > 0.0,
            };

            let better = match &best {
                None => true,
                Some((current, current_id)) => {
                    candidate.confidence > current.confidence
                        || (candidate.confidence == current.confidence
                            && issue.id.as_str() < *current_id)
                }
            };
            if better {
                best = Some((candidate, issue.id.as_str()));
            }
        }

        best.map(|(candidate, _)| candidate)
    }

    /// Exact severity scores full credit; within the allowed difference
    /// scores half.
    fn severity_score(&self, found: Severity, labeled: Severity) -> f64 {
        let distance = (found.rank() - labeled.rank()).abs();
        if distance == 0 {
            1.0
        } else if distance <= self.config.allowed_severity_difference {
            0.5
        } else {
            0.0
        }
    }

    /// Exact line scores full credit; within the allowed difference scores
    /// half. A missing line on either side is a file-level match only.
    fn location_score(&self, found: Option<usize>, labeled: Option<usize>) -> f64 {
        match (found, labeled) {
            (Some(f), Some(l)) => {
                let distance = f.abs_diff(l);
                if distance == 0 {
                    1.0
                } else if distance <= self.config.allowed_line_difference {
                    0.5
                } else {
                    0.0
                }
            }
            _ => 0.5,
        }
    }

    fn zeroed_result(
        &self,
        dataset: &GroundTruthDataset,
        findings_evaluated: usize,
    ) -> GroundTruthValidationResult {
        GroundTruthValidationResult {
            dataset_name: dataset.name.clone(),
            findings_evaluated,
            issues_total: 0,
            matches: Vec::new(),
            missed_issue_ids: Vec::new(),
            overall: QualityMetrics::default(),
            per_agent: HashMap::new(),
            per_category: HashMap::new(),
            per_severity: HashMap::new(),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Metrics per slice. TP/FP come from the evaluated findings; FN from the
/// missed issues, attributed only when the slice applies to an issue
/// (agents never own misses).
fn breakdown(
    evaluated: &[(String, String, Severity, bool)],
    missed: &[&GroundTruthIssue],
    finding_key: impl Fn(&(String, String, Severity, bool)) -> String,
    issue_key: impl Fn(&GroundTruthIssue) -> Option<String>,
) -> HashMap<String, QualityMetrics> {
    let mut counts: HashMap<String, (usize, usize, usize)> = HashMap::new();

    for entry in evaluated {
        let slot = counts.entry(finding_key(entry)).or_default();
        if entry.3 {
            slot.0 += 1;
        } else {
            slot.1 += 1;
        }
    }
    for issue in missed {
        if let Some(key) = issue_key(issue) {
            counts.entry(key).or_default().2 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(key, (tp, fp, fn_))| (key, QualityMetrics::calculate(tp, fp, fn_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Specialty;
    use chrono::Utc;

    fn finding(category: &str, severity: Severity, file: &str, line: Option<usize>) -> Finding {
        Finding {
            category: category.to_string(),
            description: String::new(),
            severity,
            location: file.to_string(),
            line,
            evidence: Vec::new(),
        }
    }

    fn result(agent: &str, findings: Vec<Finding>) -> SpecialistAnalysisResult {
        SpecialistAnalysisResult {
            agent_name: agent.to_string(),
            specialty: Specialty::Security,
            timestamp: Utc::now(),
            confidence: 0.9,
            findings,
            recommendations: Vec::new(),
            risk_assessment: String::new(),
            metrics: HashMap::new(),
        }
    }

    fn issue(id: &str, category: &str, severity: Severity, line: Option<usize>) -> GroundTruthIssue {
        GroundTruthIssue {
            id: id.to_string(),
            file: "svc.py".to_string(),
            category: category.to_string(),
            severity,
            location: String::new(),
            line,
            mandatory: false,
            difficulty: String::new(),
        }
    }

    fn dataset(issues: Vec<GroundTruthIssue>) -> GroundTruthDataset {
        GroundTruthDataset {
            name: "test".to_string(),
            version: "1".to_string(),
            description: String::new(),
            files: vec!["svc.py".to_string()],
            issues,
        }
    }

    #[test]
    fn test_metrics_from_counts() {
        let m = QualityMetrics::calculate(8, 2, 2);
        assert!((m.precision - 80.0).abs() < 1e-9);
        assert!((m.recall - 80.0).abs() < 1e-9);
        // Exact harmonic-mean equality when P == R.
        assert!((m.f1 - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_counts_yield_zero_metrics() {
        let m = QualityMetrics::calculate(0, 0, 0);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.accuracy, 0.0);
    }

    #[test]
    fn test_exact_match_is_a_true_positive() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        let results = vec![result(
            "security-specialist",
            vec![finding("SQL Injection", Severity::Critical, "svc.py", Some(42))],
        )];
        let ds = dataset(vec![issue("GT-1", "sql injection", Severity::Critical, Some(42))]);

        let out = validator.validate(&results, &ds);
        assert_eq!(out.overall.true_positives, 1);
        assert_eq!(out.overall.false_positives, 0);
        assert_eq!(out.overall.false_negatives, 0);
        assert_eq!(out.matches[0].classification, MatchClassification::Exact);
        assert!((out.matches[0].confidence - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_category_alone_falls_below_threshold() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        // Category matches (0.5) but severity is 3 levels off and the line
        // is far away: confidence 50 < 70.
        let results = vec![result(
            "security-specialist",
            vec![finding("SQL Injection", Severity::Low, "svc.py", Some(500))],
        )];
        let ds = dataset(vec![issue("GT-1", "SQL Injection", Severity::Critical, Some(42))]);

        let out = validator.validate(&results, &ds);
        assert_eq!(out.overall.true_positives, 0);
        assert_eq!(out.overall.false_positives, 1);
        assert_eq!(out.overall.false_negatives, 1);
        assert_eq!(out.missed_issue_ids, vec!["GT-1".to_string()]);
    }

    #[test]
    fn test_partial_credit_within_tolerances() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        // Category exact (0.5), severity one level off (0.3 * 0.5),
        // line within 5 (0.2 * 0.5): confidence 75, a partial match.
        let results = vec![result(
            "security-specialist",
            vec![finding("XSS", Severity::High, "svc.py", Some(10))],
        )];
        let ds = dataset(vec![issue("GT-1", "XSS", Severity::Critical, Some(12))]);

        let out = validator.validate(&results, &ds);
        assert_eq!(out.overall.true_positives, 1);
        assert!((out.matches[0].confidence - 75.0).abs() < 1e-9);
        assert_eq!(out.matches[0].classification, MatchClassification::Partial);
        assert!(out.matches[0].category_matched);
        assert!(out.matches[0].severity_matched);
        assert!(out.matches[0].location_matched);
    }

    #[test]
    fn test_matching_is_greedy_and_one_to_one() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        // Two identical findings competing for one issue: the first claims
        // it, the second becomes a false positive.
        let f = finding("SQL Injection", Severity::Critical, "svc.py", Some(42));
        let results = vec![result("security-specialist", vec![f.clone(), f])];
        let ds = dataset(vec![issue("GT-1", "SQL Injection", Severity::Critical, Some(42))]);

        let out = validator.validate(&results, &ds);
        assert_eq!(out.overall.true_positives, 1);
        assert_eq!(out.overall.false_positives, 1);
        assert_eq!(out.overall.false_negatives, 0);
    }

    #[test]
    fn test_ties_break_by_ground_truth_id() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        let results = vec![result(
            "security-specialist",
            vec![finding("SQL Injection", Severity::Critical, "svc.py", None)],
        )];
        // Two equally-scoring candidates; the lower id wins.
        let ds = dataset(vec![
            issue("GT-2", "SQL Injection", Severity::Critical, None),
            issue("GT-1", "SQL Injection", Severity::Critical, None),
        ]);

        let out = validator.validate(&results, &ds);
        assert_eq!(out.matches[0].issue_id, "GT-1");
    }

    #[test]
    fn test_different_file_never_matches() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        let results = vec![result(
            "security-specialist",
            vec![finding("SQL Injection", Severity::Critical, "other.py", Some(42))],
        )];
        let ds = dataset(vec![issue("GT-1", "SQL Injection", Severity::Critical, Some(42))]);

        let out = validator.validate(&results, &ds);
        assert_eq!(out.overall.true_positives, 0);
        assert_eq!(out.overall.false_positives, 1);
        assert_eq!(out.overall.false_negatives, 1);
    }

    #[test]
    fn test_empty_dataset_yields_zeroed_result() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        let results = vec![result(
            "security-specialist",
            vec![finding("SQL Injection", Severity::Critical, "svc.py", Some(42))],
        )];
        let ds = dataset(Vec::new());

        let out = validator.validate(&results, &ds);
        assert_eq!(out.findings_evaluated, 1);
        assert_eq!(out.issues_total, 0);
        assert_eq!(out.overall.true_positives, 0);
        assert!(out.matches.is_empty());
    }

    #[test]
    fn test_sentinel_results_are_excluded() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        let results = vec![SpecialistAnalysisResult::analysis_error(
            "security-specialist",
            Specialty::Security,
            "timed out",
        )];
        let ds = dataset(vec![issue("GT-1", "SQL Injection", Severity::Critical, Some(42))]);

        let out = validator.validate(&results, &ds);
        assert_eq!(out.findings_evaluated, 0);
        assert_eq!(out.overall.false_negatives, 1);
    }

    #[test]
    fn test_classification_bands() {
        assert_eq!(MatchClassification::classify(100.0), MatchClassification::Exact);
        assert_eq!(MatchClassification::classify(95.0), MatchClassification::Exact);
        assert_eq!(MatchClassification::classify(80.0), MatchClassification::Partial);
        assert_eq!(MatchClassification::classify(50.0), MatchClassification::Weak);
        assert_eq!(MatchClassification::classify(10.0), MatchClassification::None);
    }

    #[test]
    fn test_per_category_breakdown() {
        let validator = GroundTruthValidator::new(ValidationConfig::default());
        let results = vec![result(
            "security-specialist",
            vec![
                finding("SQL Injection", Severity::Critical, "svc.py", Some(42)),
                finding("XSS", Severity::High, "svc.py", Some(900)),
            ],
        )];
        let ds = dataset(vec![issue("GT-1", "SQL Injection", Severity::Critical, Some(42))]);

        let out = validator.validate(&results, &ds);
        let sqli = &out.per_category["sql injection"];
        assert_eq!(sqli.true_positives, 1);
        let xss = &out.per_category["xss"];
        assert_eq!(xss.false_positives, 1);
    }
}
