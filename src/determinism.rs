//! Output-stability measurement across repeated analysis runs.
//!
//! The same request is executed N times and findings are fingerprinted by
//! (category, location) for cross-run identity. A finding appearing in all
//! runs is consistent; one appearing in a strict subset is inconsistent and
//! carries the run indices it appeared in.

use crate::error::Result;
use crate::models::SpecialistAnalysisResult;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Tester knobs, loaded from the `[determinism]` config section.
#[derive(Debug, Clone)]
pub struct DeterminismConfig {
    /// How many times the analysis is repeated.
    pub run_count: usize,
    /// Appearance rate (0-100) a finding must meet to count as consistent.
    pub consistency_threshold: f64,
    /// Run in bounded parallel instead of sequentially.
    pub parallel: bool,
    /// Parallelism bound when `parallel` is set.
    pub max_parallel: usize,
    /// Pause between sequential runs.
    pub inter_run_delay: Duration,
}

impl Default for DeterminismConfig {
    fn default() -> Self {
        Self {
            run_count: 10,
            consistency_threshold: 80.0,
            parallel: false,
            max_parallel: 2,
            inter_run_delay: Duration::ZERO,
        }
    }
}

/// One executed run, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    /// 1-based run index.
    pub index: usize,
    pub finding_count: usize,
    pub succeeded: bool,
    pub duration_ms: u64,
}

/// A finding that appeared in every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistentFinding {
    pub category: String,
    pub location: String,
    pub agent_name: String,
}

/// A finding that appeared in a strict subset of runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InconsistentFinding {
    pub category: String,
    pub location: String,
    pub agent_name: String,
    /// 1-based indices of the runs it appeared in.
    pub run_indices: Vec<usize>,
    /// Appearances / run count, 0-100.
    pub appearance_rate: f64,
}

/// Stability bands over the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyBand {
    Excellent,
    Good,
    Moderate,
    Fair,
    Poor,
}

impl ConsistencyBand {
    pub fn classify(score: f64) -> Self {
        if score >= 90.0 {
            ConsistencyBand::Excellent
        } else if score >= 80.0 {
            ConsistencyBand::Good
        } else if score >= 70.0 {
            ConsistencyBand::Moderate
        } else if score >= 60.0 {
            ConsistencyBand::Fair
        } else {
            ConsistencyBand::Poor
        }
    }
}

/// Full output of one determinism test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeterminismResult {
    pub run_count: usize,
    pub failed_runs: usize,
    pub runs: Vec<AnalysisRun>,
    pub consistent: Vec<ConsistentFinding>,
    pub inconsistent: Vec<InconsistentFinding>,
    /// Fraction of unique findings meeting the threshold, 0-100.
    pub overall_score: f64,
    pub classification: ConsistencyBand,
    pub per_agent: HashMap<String, f64>,
    pub per_category: HashMap<String, f64>,
}

/// Repeats an analysis and measures how stable its findings are.
pub struct DeterminismTester {
    config: DeterminismConfig,
}

struct Occurrence {
    category: String,
    location: String,
    agent_name: String,
    runs: BTreeSet<usize>,
}

impl DeterminismTester {
    pub fn new(config: DeterminismConfig) -> Self {
        Self { config }
    }

    /// Execute the analysis `run_count` times and score stability. The
    /// caller is responsible for running with caching disabled.
    pub async fn run<F, Fut>(&self, analysis: F) -> DeterminismResult
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<Vec<SpecialistAnalysisResult>>>,
    {
        let run_count = self.config.run_count.max(1);
        info!(
            "Determinism test: {} run(s), {}",
            run_count,
            if self.config.parallel { "parallel" } else { "sequential" }
        );

        let outcomes = if self.config.parallel {
            let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
            let pending = (1..=run_count).map(|index| {
                let semaphore = Arc::clone(&semaphore);
                let fut = analysis(index);
                async move {
                    let _permit = semaphore.acquire().await;
                    execute_run(index, fut).await
                }
            });
            join_all(pending).await
        } else {
            let mut outcomes = Vec::with_capacity(run_count);
            for index in 1..=run_count {
                outcomes.push(execute_run(index, analysis(index)).await);
                if index < run_count && !self.config.inter_run_delay.is_zero() {
                    tokio::time::sleep(self.config.inter_run_delay).await;
                }
            }
            outcomes
        };

        self.score(outcomes)
    }

    fn score(
        &self,
        outcomes: Vec<(AnalysisRun, Vec<SpecialistAnalysisResult>)>,
    ) -> DeterminismResult {
        let run_count = outcomes.len();
        let mut runs = Vec::with_capacity(run_count);
        let mut occurrences: HashMap<String, Occurrence> = HashMap::new();

        for (run, results) in outcomes {
            for result in &results {
                for finding in &result.findings {
                    let entry = occurrences
                        .entry(finding.fingerprint())
                        .or_insert_with(|| Occurrence {
                            category: finding.category.clone(),
                            location: finding.location.clone(),
                            agent_name: result.agent_name.clone(),
                            runs: BTreeSet::new(),
                        });
                    entry.runs.insert(run.index);
                }
            }
            runs.push(run);
        }

        let failed_runs = runs.iter().filter(|r| !r.succeeded).count();
        if failed_runs > 0 {
            warn!("{} of {} determinism run(s) failed", failed_runs, run_count);
        }

        let mut consistent = Vec::new();
        let mut inconsistent = Vec::new();
        // (agent, category, meets threshold) per unique finding.
        let mut slices: Vec<(String, String, bool)> = Vec::new();

        for occurrence in occurrences.into_values() {
            let appearances = occurrence.runs.len();
            let rate = appearances as f64 / run_count as f64 * 100.0;
            slices.push((
                occurrence.agent_name.clone(),
                occurrence.category.trim().to_lowercase(),
                rate >= self.config.consistency_threshold,
            ));

            if appearances == run_count {
                consistent.push(ConsistentFinding {
                    category: occurrence.category,
                    location: occurrence.location,
                    agent_name: occurrence.agent_name,
                });
            } else {
                inconsistent.push(InconsistentFinding {
                    category: occurrence.category,
                    location: occurrence.location,
                    agent_name: occurrence.agent_name,
                    run_indices: occurrence.runs.into_iter().collect(),
                    appearance_rate: rate,
                });
            }
        }

        let overall_score = slice_score(slices.iter().map(|(_, _, ok)| *ok));
        let per_agent = grouped_scores(&slices, |s| s.0.clone());
        let per_category = grouped_scores(&slices, |s| s.1.clone());

        DeterminismResult {
            run_count,
            failed_runs,
            runs,
            consistent,
            inconsistent,
            overall_score,
            classification: ConsistencyBand::classify(overall_score),
            per_agent,
            per_category,
        }
    }
}

async fn execute_run<Fut>(
    index: usize,
    fut: Fut,
) -> (AnalysisRun, Vec<SpecialistAnalysisResult>)
where
    Fut: Future<Output = Result<Vec<SpecialistAnalysisResult>>>,
{
    let started = Instant::now();
    match fut.await {
        Ok(results) => {
            let finding_count = results.iter().map(|r| r.findings.len()).sum();
            (
                AnalysisRun {
                    index,
                    finding_count,
                    succeeded: true,
                    duration_ms: started.elapsed().as_millis() as u64,
                },
                results,
            )
        }
        Err(e) => {
            warn!("Determinism run {} failed: {}", index, e);
            (
                AnalysisRun {
                    index,
                    finding_count: 0,
                    succeeded: false,
                    duration_ms: started.elapsed().as_millis() as u64,
                },
                Vec::new(),
            )
        }
    }
}

/// A run set with no findings at all is perfectly stable.
fn slice_score(meets: impl Iterator<Item = bool>) -> f64 {
    let mut total = 0usize;
    let mut passing = 0usize;
    for ok in meets {
        total += 1;
        if ok {
            passing += 1;
        }
    }
    if total == 0 {
        100.0
    } else {
        passing as f64 / total as f64 * 100.0
    }
}

fn grouped_scores(
    slices: &[(String, String, bool)],
    key: impl Fn(&(String, String, bool)) -> String,
) -> HashMap<String, f64> {
    let mut groups: HashMap<String, Vec<bool>> = HashMap::new();
    for slice in slices {
        groups.entry(key(slice)).or_default().push(slice.2);
    }
    groups
        .into_iter()
        .map(|(k, v)| (k, slice_score(v.into_iter())))
        .collect()
}
