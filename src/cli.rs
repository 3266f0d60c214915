//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// CodeCouncil - multi-specialist AI code analysis
///
/// Runs a council of specialist analyzers (security, performance,
/// architecture, quality) over a local codebase using a local model,
/// cross-reviews their results, and synthesizes one plan.
///
/// Examples:
///   codecouncil ./my-project
///   codecouncil ./my-project --specialties security,performance
///   codecouncil ./my-project --objective "audit auth flows" --format json
///   codecouncil ./my-project --determinism --runs 5
///   codecouncil ./my-project --ground-truth fixtures/ground_truth.json
///   codecouncil --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory or file to analyze
    ///
    /// Not required when using --init-config.
    #[arg(value_name = "PATH", required_unless_present = "init_config")]
    pub path: Option<PathBuf>,

    /// Specialists to run (comma-separated)
    ///
    /// Values: security, performance, architecture, quality.
    /// Defaults to all four.
    #[arg(short, long, value_name = "NAMES", value_delimiter = ',')]
    pub specialties: Option<Vec<String>>,

    /// Analysis objective passed to every specialist
    ///
    /// Example: --objective "audit the payment flow for injection bugs"
    #[arg(long, value_name = "TEXT")]
    pub objective: Option<String>,

    /// Ollama model to use for analysis
    ///
    /// Can also be set via CODECOUNCIL_MODEL env var or .codecouncil.toml.
    #[arg(
        short,
        long,
        default_value = "llama3.2:latest",
        env = "CODECOUNCIL_MODEL"
    )]
    pub model: String,

    /// Ollama API endpoint URL
    #[arg(long, default_value = "http://localhost:11434", env = "OLLAMA_URL")]
    pub ollama_url: String,

    /// Output file path for the report
    #[arg(
        short,
        long,
        default_value = "council_report.md",
        value_name = "FILE"
    )]
    pub output: PathBuf,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Disable the response cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Run the determinism test instead of a single analysis
    ///
    /// Repeats the analysis N times with caching disabled and reports
    /// how stable the findings are.
    #[arg(long)]
    pub determinism: bool,

    /// Number of determinism runs
    #[arg(long, value_name = "COUNT", requires = "determinism")]
    pub runs: Option<usize>,

    /// Score results against a labeled ground-truth dataset (JSON)
    #[arg(long, value_name = "FILE")]
    pub ground_truth: Option<PathBuf>,

    /// Fail if high-priority work at or above this severity is found
    ///
    /// Useful for CI pipelines. Exit code 2 when the threshold is hit.
    /// Values: critical, high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Minimum severity to include in the report
    ///
    /// Findings below this level are filtered out. Values: critical, high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub min_severity: Option<FailOnLevel>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Temperature for LLM responses (0.0 - 1.0)
    ///
    /// Lower values produce more consistent/deterministic output
    #[arg(long, default_value = "0.1")]
    pub temperature: f32,

    /// Maximum concurrent specialist calls
    #[arg(long, default_value = "4", value_name = "NUM")]
    pub concurrency: usize,

    /// Maximum number of files to analyze
    #[arg(long, default_value = "50", value_name = "COUNT")]
    pub max_files: usize,

    /// File extensions to include (comma-separated)
    ///
    /// Example: --extensions rs,py,js
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Patterns to exclude from analysis (comma-separated)
    ///
    /// Example: --exclude "tests,vendor"
    #[arg(long, value_name = "PATTERNS", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .codecouncil.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .codecouncil.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Severity level for --fail-on and --min-severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate the analysis path
        match self.path {
            Some(ref path) if !path.exists() => {
                return Err(format!("Path does not exist: {}", path.display()));
            }
            None => return Err("An analysis path is required".to_string()),
            _ => {}
        }

        // Validate Ollama URL format
        if !self.ollama_url.starts_with("http://") && !self.ollama_url.starts_with("https://") {
            return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        // Validate concurrency
        if self.concurrency == 0 {
            return Err("Concurrency must be at least 1".to_string());
        }

        // Validate max files
        if self.max_files == 0 {
            return Err("Max files must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate determinism run count if provided
        if let Some(runs) = self.runs {
            if runs < 2 {
                return Err("Determinism testing needs at least 2 runs".to_string());
            }
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Validate ground-truth dataset path if provided
        if let Some(ref gt) = self.ground_truth {
            if !gt.is_file() {
                return Err(format!(
                    "Ground-truth dataset not found: {}",
                    gt.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
