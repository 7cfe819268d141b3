//! Bronze fetch coordinator.
//!
//! Drives one batch of fetch requests: duplicate-ingestion guard,
//! watermark-resolved incremental windows, the pre-flight gate, the
//! throttled/retried network call, payload archival and ledger upserts.
//!
//! Request state machine:
//! `Pending -> {Skipped(TooSoon) | Skipped(DuplicateToday) |
//! Fetched -> {AcceptedAsFailure | AcceptedAsSuccess}}`

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tidemark_fetch::{HttpTransport, RequestExecutor};

use crate::config::PipelineConfig;
use crate::errors::Result;
use crate::identity::UnitIdentity;
use crate::ledger::{LedgerEntry, LedgerRepositoryTrait, Stage};
use crate::pipeline::RunContext;
use crate::recipes::{FetchRequest, Recipe, RequestGate};

use super::payload_model::{RawPayload, RequestSnapshot};
use super::payload_store::PayloadStore;

/// Outcome of one request after the coordinator is done with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Cooldown miss: nothing persisted, nothing ledgered.
    SkippedTooSoon,
    /// Already ingested today: nothing persisted, nothing ledgered.
    SkippedDuplicate,
    /// Payload archived, Bronze record written, promotable gate evaluated.
    AcceptedSuccess { file_id: String },
    /// Payload archived as a failure record.
    AcceptedFailure { file_id: String },
}

/// Aggregate of one `run_batch` call.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchStats {
    pub accepted: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchStats {
    fn absorb(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::AcceptedSuccess { .. } => self.accepted += 1,
            FetchOutcome::AcceptedFailure { .. } => self.failed += 1,
            FetchOutcome::SkippedTooSoon | FetchOutcome::SkippedDuplicate => self.skipped += 1,
        }
    }
}

/// The Bronze service: builds requests from recipes, applies the gates,
/// persists raw payloads, and records ledger entries.
///
/// Cloning is cheap (all dependencies are shared handles); workers of a
/// keyed batch each own a clone.
#[derive(Clone)]
pub struct FetchCoordinator {
    config: Arc<PipelineConfig>,
    transport: Arc<dyn HttpTransport>,
    executor: Arc<RequestExecutor>,
    ledger: Arc<dyn LedgerRepositoryTrait>,
    payloads: Arc<PayloadStore>,
}

impl FetchCoordinator {
    pub fn new(
        config: Arc<PipelineConfig>,
        transport: Arc<dyn HttpTransport>,
        executor: Arc<RequestExecutor>,
        ledger: Arc<dyn LedgerRepositoryTrait>,
        payloads: Arc<PayloadStore>,
    ) -> Self {
        Self {
            config,
            transport,
            executor,
            ledger,
            payloads,
        }
    }

    /// Runs every recipe of a batch against the given keys.
    ///
    /// Non-keyed recipes have exactly one request and take the single
    /// path. Keyed recipes fan their per-key requests out over a bounded
    /// worker pool sharing the one executor; a failing worker never aborts
    /// its siblings.
    pub async fn run_batch(
        &self,
        ctx: &Arc<RunContext>,
        recipes: &[&Recipe],
        keys: &[String],
    ) -> Result<BatchStats> {
        let mut stats = BatchStats::default();

        for recipe in recipes {
            if !recipe.per_key {
                let request = FetchRequest::build(recipe, &ctx.run_id, ctx.ingestion_date, "");
                match self.fetch_one(ctx, request).await {
                    Ok(outcome) => stats.absorb(&outcome),
                    Err(e) => {
                        error!(run_id = %ctx.run_id, dataset = %recipe.dataset, "fetch failed: {e}");
                        ctx.counters.file_failed();
                        stats.failed += 1;
                    }
                }
                continue;
            }

            let concurrency = self.config.run.concurrency.max(1);
            let semaphore = Arc::new(Semaphore::new(concurrency));
            let mut workers: JoinSet<Result<FetchOutcome>> = JoinSet::new();

            for key in keys {
                let coordinator = self.clone();
                let ctx = Arc::clone(ctx);
                let semaphore = Arc::clone(&semaphore);
                let request =
                    FetchRequest::build(recipe, &ctx.run_id, ctx.ingestion_date, key);
                workers.spawn(async move {
                    // The semaphore is never closed while workers exist.
                    let _permit = semaphore.acquire_owned().await.ok();
                    coordinator.fetch_one(&ctx, request).await
                });
            }

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(Ok(outcome)) => stats.absorb(&outcome),
                    Ok(Err(e)) => {
                        warn!(run_id = %ctx.run_id, dataset = %recipe.dataset, "fetch worker failed: {e}");
                        ctx.counters.file_failed();
                        stats.failed += 1;
                    }
                    Err(join_error) => {
                        error!(run_id = %ctx.run_id, "fetch worker panicked: {join_error}");
                        ctx.counters.file_failed();
                        stats.failed += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Processes one request through the full state machine.
    async fn fetch_one(&self, ctx: &RunContext, mut request: FetchRequest) -> Result<FetchOutcome> {
        let identity = request.identity();

        // Duplicate-ingestion guard: consult the ledger before any network
        // call or persistence.
        if let Some(last) = self.ledger.latest_ingestion_ts(&identity).await? {
            if last.date_naive() >= ctx.ingestion_date {
                debug!(run_id = %ctx.run_id, unit = %identity, "already ingested today, skipping");
                ctx.counters.file_skipped();
                return Ok(FetchOutcome::SkippedDuplicate);
            }
        }

        // Incremental window: a Bronze watermark overrides the recipe
        // default from-date.
        if let Some(watermark) = self
            .ledger
            .latest_watermark(&identity, Stage::Bronze)
            .await?
        {
            request.from_date = watermark + Duration::days(1);
        }

        match request.gate() {
            RequestGate::TooSoon {
                elapsed_days,
                min_age_days,
            } => {
                debug!(
                    run_id = %ctx.run_id,
                    unit = %identity,
                    elapsed_days,
                    min_age_days,
                    "window too young, skipping"
                );
                ctx.counters.file_skipped();
                Ok(FetchOutcome::SkippedTooSoon)
            }
            RequestGate::Invalid(validation) => {
                // Validation failures are recorded, never silently dropped:
                // archive an error payload without touching the network.
                let payload = RawPayload::from_failure(
                    self.snapshot(&request),
                    self.new_file_id(&request),
                    format!("validation failure: {validation}"),
                    Utc::now(),
                );
                self.archive(ctx, &identity, &request, payload).await
            }
            RequestGate::Runnable => self.fetch_and_archive(ctx, &identity, &request).await,
        }
    }

    /// The network leg: throttled, retried, and archived whatever happens.
    async fn fetch_and_archive(
        &self,
        ctx: &RunContext,
        identity: &UnitIdentity,
        request: &FetchRequest,
    ) -> Result<FetchOutcome> {
        let url = request.resolved_url(&self.config.api.base_url);
        let query = request.resolved_query(&self.config.api.api_key);
        let fetched_at = Utc::now();

        let transport = Arc::clone(&self.transport);
        let reply = self
            .executor
            .execute(|| {
                let transport = Arc::clone(&transport);
                let url = url.clone();
                let query = query.clone();
                async move { transport.get(&url, &query).await }
            })
            .await;

        let payload = match reply {
            Ok(reply) => RawPayload::from_reply(
                request,
                self.snapshot(request),
                self.new_file_id(request),
                &reply,
                fetched_at,
            ),
            Err(transport_error) => RawPayload::from_failure(
                self.snapshot(request),
                self.new_file_id(request),
                format!("transport failure: {transport_error}"),
                fetched_at,
            ),
        };

        self.archive(ctx, identity, request, payload).await
    }

    /// Persists the payload, upserts the Bronze ledger row, and updates the
    /// run counters. Ledger failures propagate: losing a Bronze record is
    /// data loss.
    async fn archive(
        &self,
        ctx: &RunContext,
        identity: &UnitIdentity,
        request: &FetchRequest,
        payload: RawPayload,
    ) -> Result<FetchOutcome> {
        let relative_path = self.payloads.write(identity, &payload)?;

        let mut entry = LedgerEntry::new(&request.run_id, &payload.file_id, identity);
        entry.bronze_file = Some(relative_path);
        entry.bronze_error = payload.error.clone();
        entry.bronze_rows = Some(payload.row_count() as i64);
        entry.bronze_from_date = payload.first_date;
        entry.bronze_to_date = payload.last_date;
        entry.bronze_started_at = Some(payload.fetched_at);
        entry.bronze_finished_at = Some(Utc::now());
        entry.bronze_can_promote =
            Some(payload.is_promotable(request.recipe.allows_empty_content));

        self.ledger.upsert(entry).await?;

        let file_id = payload.file_id.clone();
        if payload.error.is_none() {
            info!(
                run_id = %ctx.run_id,
                unit = %identity,
                file_id = %file_id,
                rows = payload.row_count(),
                "bronze accepted"
            );
            ctx.counters.file_passed();
            Ok(FetchOutcome::AcceptedSuccess { file_id })
        } else {
            warn!(
                run_id = %ctx.run_id,
                unit = %identity,
                file_id = %file_id,
                error = payload.error.as_deref().unwrap_or(""),
                "bronze archived as failure"
            );
            ctx.counters.file_failed();
            Ok(FetchOutcome::AcceptedFailure { file_id })
        }
    }

    fn snapshot(&self, request: &FetchRequest) -> RequestSnapshot {
        RequestSnapshot::from_request(
            request,
            request.resolved_url(&self.config.api.base_url),
            request.redacted_query(&self.config.api.api_key),
        )
    }

    /// Unique file id: a uuid, suffixed with the run-scoped discriminator
    /// when one exists.
    fn new_file_id(&self, request: &FetchRequest) -> String {
        let base = Uuid::new_v4().to_string();
        let discriminator = request.discriminator();
        if discriminator.is_empty() {
            base
        } else {
            format!("{base}-{discriminator}")
        }
    }
}
