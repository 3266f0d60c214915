//! CodeCouncil - multi-specialist AI code analysis
//!
//! A CLI tool that runs a council of specialist analyzers over a local
//! codebase using Ollama, cross-reviews their results, resolves priority
//! conflicts, and synthesizes one consolidated plan.
//!
//! Exit codes:
//!   0 - Success (no issues above threshold, or no --fail-on set)
//!   1 - Runtime error (connection, config, invalid input, etc.)
//!   2 - Issues found above --fail-on threshold

mod agents;
mod cache;
mod cli;
mod config;
mod determinism;
mod engine;
mod error;
mod facts;
mod models;
mod orchestrator;
mod ratelimit;
mod report;
mod review;
mod scanner;
mod synthesis;
mod validation;

use anyhow::{Context, Result};
use cache::ContentCache;
use chrono::Utc;
use cli::{Args, FailOnLevel, OutputFormat};
use config::Config;
use determinism::{DeterminismConfig, DeterminismTester};
use engine::{EngineConfig, InferenceClient, OllamaClient};
use models::{Severity, SourceFile, Specialty};
use orchestrator::Orchestrator;
use ratelimit::RateLimiter;
use report::{CouncilReport, ReportMetadata};
use scanner::{FileScanner, ScanConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use validation::{GroundTruthDataset, GroundTruthValidator};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("CodeCouncil v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the council
    match run_council(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .codecouncil.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".codecouncil.toml");

    if path.exists() {
        eprintln!("⚠️  .codecouncil.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .codecouncil.toml")?;

    println!("✅ Created .codecouncil.toml with default settings.");
    println!("   Edit it to customize specialists, cache, rate limits, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete council workflow. Returns exit code (0 or 2).
async fn run_council(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let specialties = parse_specialties(&config.general.specialties)?;

    // Step 1: Collect the file set
    let target = args.path.clone().expect("path validated above");
    println!("📂 Collecting files from: {}", target.display());
    let files = collect_files(&target, &config)?;
    if files.is_empty() {
        anyhow::bail!("No analyzable source files found under {}", target.display());
    }
    info!("Collected {} file(s)", files.len());

    // Step 2: Wire up the council
    let cache_enabled = config.cache.enabled && !args.determinism;
    let cache = Arc::new(ContentCache::new(cache::CacheConfig {
        // Determinism testing forces caching off so every run hits the
        // engine.
        enabled: cache_enabled,
        ..(&config.cache).into()
    }));
    let limiter = Arc::new(RateLimiter::new((&config.rate_limit).into()));
    let engine: Arc<dyn InferenceClient> = Arc::new(OllamaClient::new(EngineConfig {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })?);

    let orchestrator = Orchestrator::new(
        engine,
        Arc::clone(&cache),
        limiter,
        &specialties,
        config.model.name.clone(),
        config.general.concurrency,
    );

    println!("🤖 Council: {} specialist(s)", specialties.len());
    println!("   Model: {}", config.model.name);
    println!("   Ollama: {}", config.model.ollama_url);
    println!("   Cache: {}", if cache_enabled { "enabled" } else { "disabled" });

    // Cooperative cancellation on Ctrl-C.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; cancelling analysis");
                cancel.cancel();
            }
        });
    }

    // Step 3: Determinism mode runs the harness instead of one analysis
    if args.determinism {
        return run_determinism(
            &orchestrator,
            &files,
            &specialties,
            &config,
            &args,
            &cancel,
        )
        .await;
    }

    // Step 4: Run the analysis pipeline
    println!("\n🔬 Running council analysis...\n");
    let mut analysis = orchestrator
        .analyze(&files, &specialties, &config.general.objective, &cancel)
        .await?;

    // Apply --min-severity filter to reported findings
    if let Some(min_level) = args.min_severity {
        let min_severity = fail_on_to_severity(min_level);
        for result in &mut analysis.results {
            if !result.is_error() {
                result.findings.retain(|f| f.severity >= min_severity);
            }
        }
    }

    // Step 5: Optional ground-truth scoring
    if let Some(ref gt_path) = args.ground_truth {
        score_against_ground_truth(gt_path, &analysis.results, &config)?;
    }

    // Step 6: Build and save the report
    println!("\n📝 Generating report...");
    let duration = start_time.elapsed().as_secs_f64();
    let council_report = CouncilReport {
        metadata: ReportMetadata {
            target: target.display().to_string(),
            analysis_date: Utc::now(),
            model_used: config.model.name.clone(),
            files_analyzed: files.len(),
            duration_seconds: duration,
        },
        cache: if cache_enabled {
            Some(cache.stats().await)
        } else {
            None
        },
        analysis,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&council_report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&council_report, &config.report)
        }
    };
    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    print_summary(&council_report, duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        args.output.display()
    );

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        let threshold = fail_on_to_severity(fail_level);
        let has_findings_above = council_report
            .analysis
            .results
            .iter()
            .filter(|r| !r.is_error())
            .flat_map(|r| &r.findings)
            .any(|f| f.severity >= threshold);

        if has_findings_above {
            eprintln!(
                "\n⛔ Findings at or above {:?} severity. Failing (exit code 2).",
                fail_level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Run the determinism harness and write its JSON result.
async fn run_determinism(
    orchestrator: &Orchestrator,
    files: &[SourceFile],
    specialties: &[Specialty],
    config: &Config,
    args: &Args,
    cancel: &CancellationToken,
) -> Result<i32> {
    let det_config: DeterminismConfig = (&config.determinism).into();
    println!(
        "\n🔁 Determinism test: {} run(s) at threshold {:.0}%...\n",
        det_config.run_count, det_config.consistency_threshold
    );

    let tester = DeterminismTester::new(det_config);
    let objective = config.general.objective.clone();
    let result = tester
        .run(|index| {
            let objective = objective.clone();
            async move {
                debug!("Determinism run {}", index);
                let analysis = orchestrator
                    .analyze(files, specialties, &objective, cancel)
                    .await?;
                Ok(analysis.results)
            }
        })
        .await;

    println!("📊 Determinism Summary:");
    println!(
        "   Score: {:.1}% ({:?})",
        result.overall_score, result.classification
    );
    println!(
        "   Consistent findings: {} | Inconsistent: {}",
        result.consistent.len(),
        result.inconsistent.len()
    );
    if result.failed_runs > 0 {
        println!("   ⚠️  Failed runs: {}", result.failed_runs);
    }
    for finding in &result.inconsistent {
        println!(
            "   ~ {} at {} ({:.0}% of runs)",
            finding.category, finding.location, finding.appearance_rate
        );
    }

    let output = serde_json::to_string_pretty(&result)?;
    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write result to {}", args.output.display()))?;
    println!("\n✅ Determinism result saved to: {}", args.output.display());

    Ok(0)
}

/// Score the analysis against a labeled dataset and print the metrics.
fn score_against_ground_truth(
    path: &Path,
    results: &[models::SpecialistAnalysisResult],
    config: &Config,
) -> Result<()> {
    let dataset = GroundTruthDataset::load(path)?;
    let validator = GroundTruthValidator::new((&config.validation).into());
    let scored = validator.validate(results, &dataset);

    println!("\n🎯 Ground Truth ({}):", scored.dataset_name);
    println!(
        "   Precision: {:.1}% | Recall: {:.1}% | F1: {:.1}%",
        scored.overall.precision, scored.overall.recall, scored.overall.f1
    );
    println!(
        "   TP: {} | FP: {} | FN: {}",
        scored.overall.true_positives,
        scored.overall.false_positives,
        scored.overall.false_negatives
    );
    for (agent, metrics) in &scored.per_agent {
        println!(
            "   {}: precision {:.1}%, {} match(es)",
            agent, metrics.precision, metrics.true_positives
        );
    }
    if !scored.missed_issue_ids.is_empty() {
        println!("   Missed: {}", scored.missed_issue_ids.join(", "));
    }

    Ok(())
}

/// Print the console summary for one analysis run.
fn print_summary(report: &CouncilReport, duration: f64) {
    let analysis = &report.analysis;
    let total_findings: usize = analysis
        .results
        .iter()
        .filter(|r| !r.is_error())
        .map(|r| r.findings.len())
        .sum();
    let errored = analysis.results.iter().filter(|r| r.is_error()).count();

    println!("\n📊 Analysis Summary:");
    println!(
        "   Specialists: {} ({} errored)",
        analysis.results.len(),
        errored
    );
    println!("   Findings: {}", total_findings);
    println!(
        "   Recommendations: {} ({:.1}h estimated)",
        analysis.consolidated.len(),
        analysis.consolidated.total_estimated_hours
    );
    println!(
        "   Agreement: {:.0}% | Conflicts resolved: {}/{}",
        analysis.consensus.agreement_pct,
        analysis.consensus.resolved_conflict_count,
        analysis.consensus.conflict_count
    );
    if let Some(ref cache) = report.cache {
        println!(
            "   Cache: {:.0}% hit rate, ${:.4} saved",
            cache.hit_rate, cache.cost_saved
        );
    }
    println!("   Duration: {:.1}s", duration);
}

/// Convert FailOnLevel to Severity for comparison.
fn fail_on_to_severity(level: FailOnLevel) -> Severity {
    match level {
        FailOnLevel::Low => Severity::Low,
        FailOnLevel::Medium => Severity::Medium,
        FailOnLevel::High => Severity::High,
        FailOnLevel::Critical => Severity::Critical,
    }
}

/// Parse the configured specialty names into the closed enum.
fn parse_specialties(names: &[String]) -> Result<Vec<Specialty>> {
    if names.is_empty() {
        return Ok(Specialty::all().to_vec());
    }
    names
        .iter()
        .map(|name| {
            Specialty::parse(name)
                .with_context(|| format!("Unknown specialty: {}", name))
        })
        .collect()
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .codecouncil.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Collect the analyzable file set from a directory or single file.
fn collect_files(target: &Path, config: &Config) -> Result<Vec<SourceFile>> {
    if target.is_file() {
        return FileScanner::collect_single(target);
    }
    let scanner = FileScanner::new(target.to_path_buf(), ScanConfig::from(&config.scanner));
    scanner.collect()
}
