//! Pipeline orchestrator.
//!
//! Sequences domains in the configured order, splits work into non-keyed
//! and keyed batches, bounds keyed fetches by the ticker chunk size, and
//! interleaves promotion after each chunk that accepted Bronze files.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tidemark_fetch::RequestExecutor;

use crate::bronze::FetchCoordinator;
use crate::config::PipelineConfig;
use crate::constants::{DOMAIN_INSTRUMENTS, INVALID_KEY_MARKER};
use crate::errors::{Error, Result};
use crate::ledger::LedgerRepositoryTrait;
use crate::recipes::{Recipe, RecipeCatalog};
use crate::silver::{KeyCatalogTrait, PromotionEngine};

use super::run_context::RunContext;
use super::summary::RunSummary;

/// Process-local, read-mostly cache over the key catalog.
///
/// Invalidated after any promotion pass that changes the instrument
/// dimension, so re-resolution sees newly discovered keys.
pub struct KeyCache {
    provider: Arc<dyn KeyCatalogTrait>,
    cached: RwLock<Option<Vec<String>>>,
}

impl KeyCache {
    pub fn new(provider: Arc<dyn KeyCatalogTrait>) -> Self {
        Self {
            provider,
            cached: RwLock::new(None),
        }
    }

    /// The full key universe, loaded once and served from cache until
    /// invalidated.
    pub async fn keys(&self) -> Result<Vec<String>> {
        if let Some(keys) = self.cached.read().await.as_ref() {
            return Ok(keys.clone());
        }
        let keys = self.provider.list_keys(None).await?;
        *self.cached.write().await = Some(keys.clone());
        Ok(keys)
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

/// Sequences a full pipeline run.
pub struct PipelineOrchestrator {
    config: Arc<PipelineConfig>,
    catalog: Arc<RecipeCatalog>,
    fetcher: Arc<FetchCoordinator>,
    promoter: Arc<PromotionEngine>,
    ledger: Arc<dyn LedgerRepositoryTrait>,
    executor: Arc<RequestExecutor>,
    keys: KeyCache,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<PipelineConfig>,
        catalog: Arc<RecipeCatalog>,
        fetcher: Arc<FetchCoordinator>,
        promoter: Arc<PromotionEngine>,
        ledger: Arc<dyn LedgerRepositoryTrait>,
        executor: Arc<RequestExecutor>,
        key_catalog: Arc<dyn KeyCatalogTrait>,
    ) -> Self {
        Self {
            config,
            catalog,
            fetcher,
            promoter,
            ledger,
            executor,
            keys: KeyCache::new(key_catalog),
        }
    }

    /// Standard run: every enabled domain against the given keys.
    pub async fn run(&self, keys: &[String]) -> Result<RunSummary> {
        let ctx = Arc::new(RunContext::new());
        info!(run_id = %ctx.run_id, keys = keys.len(), "pipeline run starting");

        let domains = self.enabled_domains();
        self.run_domains(&ctx, &domains, keys).await?;

        let summary = self.summarize(&ctx);
        info!(run_id = %ctx.run_id, status = ?summary.status, "pipeline run finished");
        Ok(summary)
    }

    /// Discovery variant: ingest all not-yet-seen keys.
    ///
    /// Loads the discovery recipe first, re-resolves the key universe
    /// after discovery populates the catalog, drops keys with a permanent
    /// invalid-key failure (backfilling replacements up to the limit), and
    /// runs the remaining domains for the survivors.
    pub async fn run_discovery(&self, limit: Option<usize>) -> Result<RunSummary> {
        let ctx = Arc::new(RunContext::new());
        let initial = self.keys.keys().await.unwrap_or_default();
        info!(
            run_id = %ctx.run_id,
            known_keys = initial.len(),
            "discovery run starting"
        );

        let discovery = self
            .catalog
            .discovery_recipe()
            .ok_or_else(|| Error::Catalog("no discovery recipe declared".to_string()))?
            .clone();

        if self.config.run.fetch_enabled {
            self.fetcher.run_batch(&ctx, &[&discovery], &[]).await?;
        }
        if self.config.run.promote_enabled {
            self.promote_domain(&ctx, &discovery.domain).await;
        }

        // Re-resolve against the refreshed dimension, then keep only keys
        // never successfully ingested, skipping permanently invalid ones.
        // Filtering before the limit backfills replacements for the
        // dropped keys.
        let all_keys = self.keys.keys().await?;
        let seen: HashSet<String> = self.ledger.list_seen_keys().await?.into_iter().collect();
        let failed: HashSet<String> = self
            .ledger
            .list_failed_keys(INVALID_KEY_MARKER)
            .await?
            .into_iter()
            .collect();

        let limit = limit.or(self.config.run.key_limit).unwrap_or(usize::MAX);
        let surviving: Vec<String> = all_keys
            .into_iter()
            .filter(|key| !seen.contains(key) && !failed.contains(key))
            .take(limit)
            .collect();
        info!(
            run_id = %ctx.run_id,
            surviving = surviving.len(),
            "discovery resolved key set"
        );

        let domains: Vec<String> = self
            .enabled_domains()
            .into_iter()
            .filter(|domain| domain != &discovery.domain)
            .collect();
        self.run_domains(&ctx, &domains, &surviving).await?;

        let summary = self.summarize(&ctx);
        info!(run_id = %ctx.run_id, status = ?summary.status, "discovery run finished");
        Ok(summary)
    }

    fn enabled_domains(&self) -> Vec<String> {
        self.config
            .domain_order
            .iter()
            .filter(|domain| self.config.domain_enabled(domain))
            .cloned()
            .collect()
    }

    async fn run_domains(
        &self,
        ctx: &Arc<RunContext>,
        domains: &[String],
        keys: &[String],
    ) -> Result<()> {
        for domain in domains {
            let recipes = self
                .catalog
                .for_domain(domain, self.config.run.plan_filter.as_deref());
            if recipes.is_empty() {
                debug!(run_id = %ctx.run_id, domain = %domain, "no recipes, skipping domain");
                continue;
            }

            if !self.config.run.fetch_enabled {
                if self.config.run.promote_enabled {
                    self.promote_domain(ctx, domain).await;
                }
                continue;
            }

            let (keyed, global): (Vec<&Recipe>, Vec<&Recipe>) =
                recipes.into_iter().partition(|r| r.per_key);

            if !global.is_empty() {
                self.fetcher.run_batch(ctx, &global, &[]).await?;
                if self.config.run.promote_enabled {
                    self.promote_domain(ctx, domain).await;
                }
            }

            if !keyed.is_empty() {
                let chunk_size = self.config.run.ticker_chunk_size.max(1);
                for chunk in keys.chunks(chunk_size) {
                    let stats = self.fetcher.run_batch(ctx, &keyed, chunk).await?;
                    // Promotion after a chunk only pays off when the chunk
                    // accepted at least one Bronze file.
                    if self.config.run.promote_enabled && stats.accepted > 0 {
                        self.promote_domain(ctx, domain).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// One promotion pass for a domain. Failures are logged and recorded,
    /// never propagated - a broken promotion pass must not stop the run.
    async fn promote_domain(&self, ctx: &Arc<RunContext>, domain: &str) {
        match self.promoter.promote(ctx, Some(domain)).await {
            Ok((file_ids, rows)) => {
                debug!(
                    run_id = %ctx.run_id,
                    domain = %domain,
                    files = file_ids.len(),
                    rows,
                    "promotion pass done"
                );
                // A promotion that changed the instrument dimension makes
                // the cached key universe stale.
                if domain == DOMAIN_INSTRUMENTS && rows > 0 {
                    self.keys.invalidate().await;
                }
            }
            Err(e) => {
                warn!(run_id = %ctx.run_id, domain = %domain, "promotion pass failed: {e}");
                ctx.counters.entry_failed();
            }
        }
    }

    fn summarize(&self, ctx: &RunContext) -> RunSummary {
        RunSummary::build(
            ctx.run_id.clone(),
            ctx.started.elapsed().as_secs_f64(),
            ctx.counters.snapshot(),
            self.executor.throttle_stats(),
        )
    }
}
