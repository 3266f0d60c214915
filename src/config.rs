//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.codecouncil.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Engine rate-limit settings.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Ground-truth validation settings.
    #[serde(default)]
    pub validation: ValidationSettings,

    /// Determinism test settings.
    #[serde(default)]
    pub determinism: DeterminismSettings,

    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Maximum concurrent specialist calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Default analysis objective.
    #[serde(default)]
    pub objective: String,

    /// Specialists to run by default.
    #[serde(default = "default_specialties")]
    pub specialties: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
            objective: String::new(),
            specialties: default_specialties(),
        }
    }
}

fn default_output() -> String {
    "council_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_specialties() -> Vec<String> {
    vec!["security", "performance", "architecture", "quality"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    300
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry time-to-live in minutes.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,

    /// Push expiry forward on every hit.
    #[serde(default)]
    pub sliding_expiration: bool,

    /// Upper bound on stored entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_minutes: default_ttl_minutes(),
            sliding_expiration: false,
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_minutes() -> i64 {
    60
}

fn default_max_entries() -> usize {
    500
}

impl From<&CacheSettings> for crate::cache::CacheConfig {
    fn from(s: &CacheSettings) -> Self {
        Self {
            enabled: s.enabled,
            ttl_minutes: s.ttl_minutes,
            sliding_expiration: s.sliding_expiration,
            max_entries: s.max_entries,
        }
    }
}

/// Engine rate-limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum calls per agent inside one window.
    #[serde(default = "default_calls_per_window")]
    pub calls_per_window: usize,

    /// Window width in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            calls_per_window: default_calls_per_window(),
            window_seconds: default_window_seconds(),
        }
    }
}

fn default_calls_per_window() -> usize {
    10
}

fn default_window_seconds() -> u64 {
    60
}

impl From<&RateLimitSettings> for crate::ratelimit::RateLimitConfig {
    fn from(s: &RateLimitSettings) -> Self {
        Self {
            calls_per_window: s.calls_per_window,
            window: Duration::from_secs(s.window_seconds.max(1)),
        }
    }
}

/// Ground-truth validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Minimum weighted confidence (0-100) for a true positive.
    #[serde(default = "default_min_match_confidence")]
    pub min_match_confidence: f64,

    #[serde(default = "default_category_weight")]
    pub category_weight: f64,

    #[serde(default = "default_severity_weight")]
    pub severity_weight: f64,

    #[serde(default = "default_location_weight")]
    pub location_weight: f64,

    /// Severity levels of slack that still earn partial credit.
    #[serde(default = "default_severity_difference")]
    pub allowed_severity_difference: i32,

    /// Line-number slack that still earns partial credit.
    #[serde(default = "default_line_difference")]
    pub allowed_line_difference: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_match_confidence: default_min_match_confidence(),
            category_weight: default_category_weight(),
            severity_weight: default_severity_weight(),
            location_weight: default_location_weight(),
            allowed_severity_difference: default_severity_difference(),
            allowed_line_difference: default_line_difference(),
        }
    }
}

fn default_min_match_confidence() -> f64 {
    70.0
}

fn default_category_weight() -> f64 {
    0.5
}

fn default_severity_weight() -> f64 {
    0.3
}

fn default_location_weight() -> f64 {
    0.2
}

fn default_severity_difference() -> i32 {
    1
}

fn default_line_difference() -> usize {
    5
}

impl From<&ValidationSettings> for crate::validation::ValidationConfig {
    fn from(s: &ValidationSettings) -> Self {
        Self {
            min_match_confidence: s.min_match_confidence,
            category_weight: s.category_weight,
            severity_weight: s.severity_weight,
            location_weight: s.location_weight,
            allowed_severity_difference: s.allowed_severity_difference,
            allowed_line_difference: s.allowed_line_difference,
        }
    }
}

/// Determinism test settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeterminismSettings {
    /// How many times the analysis is repeated.
    #[serde(default = "default_run_count")]
    pub run_count: usize,

    /// Appearance rate (0-100) a finding must meet to count as consistent.
    #[serde(default = "default_consistency_threshold")]
    pub consistency_threshold: f64,

    /// Run in bounded parallel instead of sequentially.
    #[serde(default)]
    pub parallel: bool,

    /// Parallelism bound when `parallel` is set.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Pause between sequential runs, in milliseconds.
    #[serde(default)]
    pub inter_run_delay_ms: u64,
}

impl Default for DeterminismSettings {
    fn default() -> Self {
        Self {
            run_count: default_run_count(),
            consistency_threshold: default_consistency_threshold(),
            parallel: false,
            max_parallel: default_max_parallel(),
            inter_run_delay_ms: 0,
        }
    }
}

fn default_run_count() -> usize {
    10
}

fn default_consistency_threshold() -> f64 {
    80.0
}

fn default_max_parallel() -> usize {
    2
}

impl From<&DeterminismSettings> for crate::determinism::DeterminismConfig {
    fn from(s: &DeterminismSettings) -> Self {
        Self {
            run_count: s.run_count,
            consistency_threshold: s.consistency_threshold,
            parallel: s.parallel,
            max_parallel: s.max_parallel,
            inter_run_delay: Duration::from_millis(s.inter_run_delay_ms),
        }
    }
}

/// File scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Maximum files to analyze.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// File extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Patterns to exclude.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Maximum file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            extensions: default_extensions(),
            excludes: default_excludes(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_max_files() -> usize {
    50
}

fn default_extensions() -> Vec<String> {
    vec![
        "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "c", "cpp", "h", "hpp", "cs", "rb",
        "php", "swift", "kt",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excludes() -> Vec<String> {
    vec![
        ".git",
        "target",
        "node_modules",
        "vendor",
        "dist",
        "build",
        "__pycache__",
        ".venv",
        "venv",
        ".idea",
        ".vscode",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_file_size() -> usize {
    100 * 1024 // 100KB
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the inter-agent conversation transcript.
    #[serde(default = "default_true")]
    pub include_conversation: bool,

    /// Include the peer-review table.
    #[serde(default = "default_true")]
    pub include_reviews: bool,

    /// Include cache statistics.
    #[serde(default = "default_true")]
    pub include_cache_stats: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_conversation: true,
            include_reviews: true,
            include_cache_stats: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".codecouncil.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Model settings - always override since they have defaults in CLI
        self.model.name = args.model.clone();
        self.model.ollama_url = args.ollama_url.clone();
        self.model.temperature = args.temperature;

        // Timeout - only override if explicitly provided via CLI
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        // Caching
        if args.no_cache {
            self.cache.enabled = false;
        }

        // Determinism run count - only override if provided
        if let Some(runs) = args.runs {
            self.determinism.run_count = runs;
        }

        // Analysis selection - only override if provided
        if let Some(ref specialties) = args.specialties {
            self.general.specialties = specialties.clone();
        }
        if let Some(ref objective) = args.objective {
            self.general.objective = objective.clone();
        }

        // Scanner settings
        self.scanner.max_files = args.max_files;
        if let Some(ref extensions) = args.extensions {
            self.scanner.extensions = extensions.clone();
        }
        if let Some(ref excludes) = args.exclude {
            self.scanner.excludes = excludes.clone();
        }

        // General settings
        self.general.concurrency = args.concurrency;
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.cache.ttl_minutes, 60);
        assert_eq!(config.rate_limit.calls_per_window, 10);
        assert_eq!(config.determinism.run_count, 10);
        assert!((config.validation.min_match_confidence - 70.0).abs() < 1e-9);
        assert_eq!(config.general.specialties.len(), 4);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
verbose = true
specialties = ["security", "performance"]

[model]
name = "codellama:34b"
temperature = 0.2

[cache]
enabled = false
ttl_minutes = 120

[rate_limit]
calls_per_window = 5

[determinism]
run_count = 5
parallel = true
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.general.specialties, vec!["security", "performance"]);
        assert_eq!(config.model.name, "codellama:34b");
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_minutes, 120);
        assert_eq!(config.rate_limit.calls_per_window, 5);
        assert_eq!(config.determinism.run_count, 5);
        assert!(config.determinism.parallel);
        // Untouched sections keep their defaults.
        assert_eq!(config.scanner.max_files, 50);
    }

    #[test]
    fn test_settings_convert_to_component_configs() {
        let config = Config::default();

        let cache: crate::cache::CacheConfig = (&config.cache).into();
        assert!(cache.enabled);
        assert_eq!(cache.max_entries, 500);

        let limits: crate::ratelimit::RateLimitConfig = (&config.rate_limit).into();
        assert_eq!(limits.window, Duration::from_secs(60));

        let det: crate::determinism::DeterminismConfig = (&config.determinism).into();
        assert_eq!(det.run_count, 10);
        assert!((det.consistency_threshold - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[cache]"));
        assert!(toml_str.contains("[rate_limit]"));
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("[determinism]"));
    }
}
