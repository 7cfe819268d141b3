//! Environment-driven process configuration.

use std::path::PathBuf;
use std::time::Duration;

use tidemark_core::config::{PipelineConfig, WatermarkMode};
use tidemark_core::silver::ChunkStrategy;

/// Raw process configuration read from the environment.
///
/// Every knob has a default so `tidemark` runs against a local layout out
/// of the box; deployments override via env vars or a `.env` file.
pub struct Config {
    pub recipes_path: PathBuf,
    pub contracts_path: PathBuf,
    pub pipeline: PipelineConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let recipes_path = PathBuf::from(env_or("TIDEMARK_RECIPES", "config/recipes.json"));
        let contracts_path =
            PathBuf::from(env_or("TIDEMARK_CONTRACTS", "config/contracts.json"));

        let mut pipeline = PipelineConfig::default();
        pipeline.paths.db_path = PathBuf::from(env_or("TIDEMARK_DB_PATH", "data/tidemark.db"));
        pipeline.paths.payload_root =
            PathBuf::from(env_or("TIDEMARK_PAYLOAD_ROOT", "data/bronze"));
        pipeline.api.base_url = env_or("TIDEMARK_API_BASE_URL", "");
        pipeline.api.api_key = env_or("TIDEMARK_API_KEY", "");
        if let Some(secs) = env_parse::<u64>("TIDEMARK_CONNECT_TIMEOUT_SECS") {
            pipeline.api.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("TIDEMARK_READ_TIMEOUT_SECS") {
            pipeline.api.read_timeout = Duration::from_secs(secs);
        }

        if let Some(calls) = env_parse::<usize>("TIDEMARK_MAX_CALLS_PER_MINUTE") {
            pipeline.throttle.max_calls = calls;
            pipeline.throttle.period = Duration::from_secs(60);
        }
        if let Some(attempts) = env_parse::<u32>("TIDEMARK_RETRY_ATTEMPTS") {
            pipeline.retry.max_attempts = attempts;
        }

        if let Ok(domains) = std::env::var("TIDEMARK_DOMAINS") {
            let enabled: Vec<String> = domains
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
            if !enabled.is_empty() {
                pipeline.run.enabled_domains = Some(enabled);
            }
        }
        pipeline.run.fetch_enabled = env_flag("TIDEMARK_FETCH", true);
        pipeline.run.promote_enabled = env_flag("TIDEMARK_PROMOTE", true);
        pipeline.run.key_limit = env_parse("TIDEMARK_KEY_LIMIT");
        pipeline.run.plan_filter = std::env::var("TIDEMARK_PLAN").ok();
        if let Some(concurrency) = env_parse::<usize>("TIDEMARK_CONCURRENCY") {
            pipeline.run.concurrency = concurrency.max(1);
        }
        if let Some(chunk) = env_parse::<usize>("TIDEMARK_TICKER_CHUNK_SIZE") {
            pipeline.run.ticker_chunk_size = chunk.max(1);
        }
        pipeline.run.watermark_mode =
            match env_or("TIDEMARK_WATERMARK", "strict").to_ascii_lowercase().as_str() {
                "none" | "off" => WatermarkMode::None,
                _ => WatermarkMode::Strict,
            };
        pipeline.run.chunk_strategy =
            match env_or("TIDEMARK_CHUNK_STRATEGY", "month").to_ascii_lowercase().as_str() {
                "none" => ChunkStrategy::None,
                "year" => ChunkStrategy::Year,
                _ => ChunkStrategy::Month,
            };

        Self {
            recipes_path,
            contracts_path,
            pipeline,
        }
    }
}
