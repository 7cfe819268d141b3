mod config;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use tidemark_core::bronze::{FetchCoordinator, PayloadStore};
use tidemark_core::pipeline::PipelineOrchestrator;
use tidemark_core::recipes::RecipeCatalog;
use tidemark_core::rows::{ContractCatalog, MapperRegistry};
use tidemark_core::silver::PromotionEngine;
use tidemark_fetch::{ReqwestTransport, RequestExecutor, RetryPolicy, ThrottleConfig};
use tidemark_storage_sqlite::{
    init, open, spawn_writer, KeyCatalogRepository, LedgerRepository, SilverTableRepository,
};

use config::Config;

fn init_tracing() {
    let log_format = std::env::var("TIDEMARK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true))
            .init();
    }
}

/// `tidemark [--discover [LIMIT]] [TICKER...]`
enum Invocation {
    Run { tickers: Vec<String> },
    Discover { limit: Option<usize> },
}

fn parse_args() -> anyhow::Result<Invocation> {
    let mut args = std::env::args().skip(1).peekable();
    match args.peek().map(String::as_str) {
        Some("--discover") => {
            args.next();
            let limit = match args.next() {
                Some(raw) => Some(raw.parse()?),
                None => None,
            };
            Ok(Invocation::Discover { limit })
        }
        _ => Ok(Invocation::Run {
            tickers: args.map(|t| t.to_ascii_uppercase()).collect(),
        }),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();
    let invocation = parse_args()?;

    let pipeline = Arc::new(config.pipeline.clone());

    // Storage: one connection, one writer actor.
    let conn = open(&pipeline.paths.db_path)?;
    init(&conn)?;
    let store = spawn_writer(conn);
    let ledger = Arc::new(LedgerRepository::new(store.clone()));
    let tables = Arc::new(SilverTableRepository::new(store.clone()));
    let key_catalog = Arc::new(KeyCatalogRepository::new(
        store.clone(),
        pipeline.key_catalog.clone(),
    ));
    let payloads = Arc::new(PayloadStore::new(&pipeline.paths.payload_root));

    // Catalog and contracts are configuration, loaded once.
    let recipes = Arc::new(RecipeCatalog::load_from_file(
        &config.recipes_path,
        &pipeline.domain_order,
    )?);
    let contracts = Arc::new(ContractCatalog::load_from_file(&config.contracts_path)?);
    let mappers = Arc::new(MapperRegistry::new());

    // Transport under the shared throttle/retry executor.
    let transport = Arc::new(ReqwestTransport::new(
        pipeline.api.connect_timeout,
        pipeline.api.read_timeout,
    )?);
    let executor = Arc::new(RequestExecutor::new(
        ThrottleConfig {
            max_calls: pipeline.throttle.max_calls,
            period: pipeline.throttle.period,
        },
        RetryPolicy {
            max_attempts: pipeline.retry.max_attempts,
            base_delay: pipeline.retry.base_delay,
        },
    ));

    let coordinator = Arc::new(FetchCoordinator::new(
        Arc::clone(&pipeline),
        transport,
        Arc::clone(&executor),
        ledger.clone(),
        Arc::clone(&payloads),
    ));
    let promoter = Arc::new(PromotionEngine::new(
        Arc::clone(&pipeline),
        ledger.clone(),
        Arc::clone(&payloads),
        contracts,
        mappers,
        tables,
    ));
    let orchestrator = PipelineOrchestrator::new(
        Arc::clone(&pipeline),
        recipes,
        coordinator,
        promoter,
        ledger,
        executor,
        key_catalog,
    );

    let summary = match invocation {
        Invocation::Discover { limit } => orchestrator.run_discovery(limit).await?,
        Invocation::Run { tickers } => orchestrator.run(&tickers).await?,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    match summary.status {
        tidemark_core::pipeline::RunStatus::Failure => std::process::exit(1),
        _ => Ok(()),
    }
}
