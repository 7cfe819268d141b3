//! Immutable pipeline configuration.
//!
//! One [`PipelineConfig`] is constructed at process start and shared by
//! `Arc` with every component that needs it. Nothing in the pipeline reads
//! ambient global settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_DOMAIN_ORDER, DEFAULT_TICKER_CHUNK_SIZE};
use crate::silver::ChunkStrategy;

/// API endpoint and credential configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.finprices.example`.
    pub base_url: String,
    /// API key, injected into the query and redacted in persisted snapshots.
    pub api_key: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// Throttle window settings, forwarded to the fetch executor.
#[derive(Clone, Copy, Debug)]
pub struct ThrottleSettings {
    pub max_calls: usize,
    pub period: Duration,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            max_calls: 300,
            period: Duration::from_secs(60),
        }
    }
}

/// Retry settings, forwarded to the fetch executor.
#[derive(Clone, Copy, Debug)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Watermark filtering mode for promotion.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WatermarkMode {
    /// Drop projected rows whose row-date is not strictly greater than the
    /// prior Silver watermark for the identity.
    #[default]
    Strict,
    /// Disable watermark filtering entirely.
    None,
}

/// Where the discovery variant resolves its key universe from.
#[derive(Clone, Debug)]
pub struct KeyCatalogSource {
    /// Silver table holding the instrument dimension.
    pub table: String,
    /// Column holding the ticker-like key.
    pub column: String,
}

impl Default for KeyCatalogSource {
    fn default() -> Self {
        Self {
            table: "silver_instrument_list".to_string(),
            column: "ticker".to_string(),
        }
    }
}

/// Run-level switches and bounds.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Domains enabled for this run; `None` enables every domain in
    /// `domain_order`.
    pub enabled_domains: Option<Vec<String>>,
    /// Bronze layer switch.
    pub fetch_enabled: bool,
    /// Silver layer switch.
    pub promote_enabled: bool,
    /// Upper bound on keys processed by the discovery variant.
    pub key_limit: Option<usize>,
    /// Only run recipes of this plan tier when set.
    pub plan_filter: Option<String>,
    /// Concurrent fetch workers inside one keyed-recipe batch.
    pub concurrency: usize,
    /// Keys per orchestrator chunk.
    pub ticker_chunk_size: usize,
    pub watermark_mode: WatermarkMode,
    pub chunk_strategy: ChunkStrategy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            enabled_domains: None,
            fetch_enabled: true,
            promote_enabled: true,
            key_limit: None,
            plan_filter: None,
            concurrency: 4,
            ticker_chunk_size: DEFAULT_TICKER_CHUNK_SIZE,
            watermark_mode: WatermarkMode::Strict,
            chunk_strategy: ChunkStrategy::Month,
        }
    }
}

/// Filesystem layout of the stores.
#[derive(Clone, Debug, Default)]
pub struct StorePaths {
    /// Root directory of the Bronze payload file store.
    pub payload_root: PathBuf,
    /// SQLite database file holding the ledger and the Silver tables.
    pub db_path: PathBuf,
}

/// The one configuration object of a pipeline process.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub api: ApiConfig,
    pub throttle: ThrottleSettings,
    pub retry: RetrySettings,
    pub run: RunOptions,
    pub paths: StorePaths,
    /// Domain execution order; discovery must come first.
    pub domain_order: Vec<String>,
    /// Prefix of Silver target tables, e.g. `silver`.
    pub silver_table_prefix: String,
    pub key_catalog: KeyCatalogSource,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            throttle: ThrottleSettings::default(),
            retry: RetrySettings::default(),
            run: RunOptions::default(),
            paths: StorePaths::default(),
            domain_order: DEFAULT_DOMAIN_ORDER.iter().map(|d| d.to_string()).collect(),
            silver_table_prefix: "silver".to_string(),
            key_catalog: KeyCatalogSource::default(),
        }
    }
}

impl PipelineConfig {
    /// Whether a domain participates in this run.
    pub fn domain_enabled(&self, domain: &str) -> bool {
        match &self.run.enabled_domains {
            Some(enabled) => enabled.iter().any(|d| d == domain),
            None => true,
        }
    }

    /// Fully-qualified Silver table name for a dataset, e.g.
    /// `silver_company_market_cap`.
    pub fn silver_table_name(&self, dataset: &str) -> String {
        let sanitized: String = dataset
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("{}_{}", self.silver_table_prefix, sanitized)
    }
}
