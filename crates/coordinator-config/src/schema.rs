//! The contract-shape declaration and environment-derived settings (spec
//! §4.5, §6). One `CoordinatorConfig` is loaded at startup and never
//! mutated; workers hold an `Arc<CoordinatorConfig>`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_crunch_id")]
    pub crunch_id: String,
    #[serde(default)]
    pub feed: FeedScopeConfig,
    #[serde(default)]
    pub model_runner: ModelRunnerConfig,
    #[serde(default)]
    pub eviction: EvictionConfig,
    #[serde(default)]
    pub score: ScoreConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub callables: CallableConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub ensembles: Vec<EnsembleConfig>,
}

fn default_crunch_id() -> String {
    "default-crunch".to_string()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            crunch_id: default_crunch_id(),
            feed: FeedScopeConfig::default(),
            model_runner: ModelRunnerConfig::default(),
            eviction: EvictionConfig::default(),
            score: ScoreConfig::default(),
            checkpoint: CheckpointConfig::default(),
            api: ApiConfig::default(),
            callables: CallableConfig::default(),
            aggregation: AggregationConfig::default(),
            metrics: Vec::new(),
            ensembles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedScopeConfig {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_granularity")]
    pub granularity: String,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_source_timeout_seconds")]
    pub source_timeout_seconds: u64,
}

fn default_source() -> String {
    "pyth".to_string()
}
fn default_kind() -> String {
    "price".to_string()
}
fn default_granularity() -> String {
    "1m".to_string()
}
fn default_poll_interval_seconds() -> u64 {
    60
}
fn default_source_timeout_seconds() -> u64 {
    10
}

impl Default for FeedScopeConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            subjects: Vec::new(),
            kind: default_kind(),
            granularity: default_granularity(),
            poll_interval_seconds: default_poll_interval_seconds(),
            source_timeout_seconds: default_source_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRunnerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_predict_timeout_ms")]
    pub predict_timeout_ms: u64,
    #[serde(default = "default_tick_timeout_ms")]
    pub tick_timeout_ms: u64,
    /// Model IDs registered live at startup. The spec treats the model
    /// runtime itself as an external collaborator with no enumeration API
    /// of its own, so the initial roster has to come from somewhere;
    /// quarantine eviction and `Tick`-based recovery take it from there.
    #[serde(default)]
    pub participants: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7000
}
fn default_predict_timeout_ms() -> u64 {
    1_000
}
fn default_tick_timeout_ms() -> u64 {
    50_000
}

impl Default for ModelRunnerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            predict_timeout_ms: default_predict_timeout_ms(),
            tick_timeout_ms: default_tick_timeout_ms(),
            participants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    #[serde(default = "default_failure_limit")]
    pub consecutive_failure_limit: u32,
    #[serde(default = "default_timeout_limit")]
    pub consecutive_timeout_limit: u32,
}

fn default_failure_limit() -> u32 {
    5
}
fn default_timeout_limit() -> u32 {
    5
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            consecutive_failure_limit: default_failure_limit(),
            consecutive_timeout_limit: default_timeout_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    #[serde(default = "default_score_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_resolution_grace_seconds")]
    pub resolution_grace_seconds: u64,
    #[serde(default = "default_resolution_ttl_seconds")]
    pub resolution_ttl_seconds: i64,
    #[serde(default = "default_heartbeat_ttl_seconds")]
    pub heartbeat_ttl_seconds: i64,
}

fn default_score_interval_seconds() -> u64 {
    60
}
fn default_resolution_grace_seconds() -> u64 {
    30
}
fn default_resolution_ttl_seconds() -> i64 {
    24 * 3_600
}
fn default_heartbeat_ttl_seconds() -> i64 {
    120
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_score_interval_seconds(),
            resolution_grace_seconds: default_resolution_grace_seconds(),
            resolution_ttl_seconds: default_resolution_ttl_seconds(),
            heartbeat_ttl_seconds: default_heartbeat_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_cron")]
    pub cron: String,
    #[serde(default)]
    pub compute_provider_pubkeys: Vec<String>,
    #[serde(default)]
    pub data_provider_pubkeys: Vec<String>,
}

fn default_checkpoint_cron() -> String {
    "0 0 * * 0".to_string() // weekly, Sunday midnight
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            cron: default_checkpoint_cron(),
            compute_provider_pubkeys: Vec::new(),
            data_provider_pubkeys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    #[serde(default)]
    pub read_auth: bool,
    #[serde(default)]
    pub public_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallableConfig {
    pub scoring_function: String,
    pub inference_input_builder: String,
    pub inference_output_validator: String,
    pub resolve_ground_truth: String,
    pub aggregate_snapshot: Option<String>,
    pub build_emission: Option<String>,
}

impl Default for CallableConfig {
    fn default() -> Self {
        Self {
            scoring_function: String::new(),
            inference_input_builder: String::new(),
            inference_output_validator: String::new(),
            resolve_ground_truth: String::new(),
            aggregate_snapshot: None,
            build_emission: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_ranking_key")]
    pub ranking_key: String,
    #[serde(default = "default_ranking_direction")]
    pub ranking_direction: RankingDirection,
}

fn default_ranking_key() -> String {
    "ic".to_string()
}
fn default_ranking_direction() -> RankingDirection {
    RankingDirection::Descending
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            ranking_key: default_ranking_key(),
            ranking_direction: default_ranking_direction(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleStrategy {
    InverseVariance,
    EqualWeight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub name: String,
    pub strategy: EnsembleStrategy,
    /// e.g. `top_n(5)` or `min_metric(ic,0.01)`; parsed by `coordinator-score`.
    pub model_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),
    #[error("failed to parse configuration: {0}")]
    ParseError(String),
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
    #[error("io error: {0}")]
    IoError(String),
}
