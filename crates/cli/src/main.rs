mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

use contentflow_backend::HttpBackendClient;
use contentflow_core::config::{self, Config};
use contentflow_core::{AccessContext, MaxTaskSize, SearchFilters, TaskResponse};
use contentflow_events::BroadcastPublisher;
use contentflow_search::{FederatedSearchCoordinator, SimilarityQuery};
use contentflow_store::{MemoryStore, StaticRegistry};
use contentflow_tasks::{partition, IngestError, QueuedScheduler, TaskOrchestrator};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    config::load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let output = match cli.command {
        Command::Backends { capabilities } => {
            let registry = load_registry(cli.backends.as_deref(), &config)?;
            let listed: Vec<_> = registry
                .all()
                .iter()
                .filter(|b| b.has_capabilities(&capabilities))
                .collect();
            serde_json::to_value(listed)?
        }

        Command::Search {
            seed,
            kind,
            user,
            user_filter,
            limits,
        } => {
            let registry = load_registry(cli.backends.as_deref(), &config)?;
            let store = load_store(&cli.store)?;
            let client = HttpBackendClient::new(config.search.timeout()).context("failed to build HTTP client")?;
            let coordinator = FederatedSearchCoordinator::new(
                Arc::new(registry),
                store,
                Arc::new(client),
                config.search.clone(),
            );

            let access = user.map_or_else(AccessContext::anonymous, AccessContext::user);
            let filters = SearchFilters {
                user_ids: user_filter,
                limits,
                ..SearchFilters::default()
            };
            let query = SimilarityQuery::by_id(seed, kind).with_filters(filters);
            let items = coordinator.search(&access, &query).await.context("search failed")?;
            info!(results = items.len(), "search finished");
            serde_json::to_value(items)?
        }

        Command::Ingest { file } => {
            let registry = load_registry(cli.backends.as_deref(), &config)?;
            let store = load_store(&cli.store)?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read result file {}", file.display()))?;
            let response: TaskResponse = serde_json::from_str(&raw).context("result file is not a task response")?;

            let client = HttpBackendClient::new(config.search.timeout()).context("failed to build HTTP client")?;
            let scheduler = Arc::new(QueuedScheduler::new());
            let orchestrator = TaskOrchestrator::new(
                Arc::new(registry),
                store.clone(),
                store.clone(),
                scheduler.clone(),
                Arc::new(BroadcastPublisher::new()),
                Arc::new(client),
                config.tasks.clone(),
            );

            let result = orchestrator.ingest_result(response).await;
            // A result that failed validation still left an ERROR status behind.
            if result.as_ref().map_or_else(IngestError::is_validation, |_| true) {
                store
                    .save_snapshot(&cli.store)
                    .await
                    .with_context(|| format!("failed to write snapshot {}", cli.store.display()))?;
            }
            let report = result.context("result rejected")?;

            let pending = scheduler.len().await;
            if pending > 0 {
                warn!(pending, "created tasks are stored but not dispatched by this tool");
            }
            json!({
                "task_id": report.task_id,
                "backend_id": report.backend_id,
                "status": report.status.to_string(),
                "inserted": report.inserted,
                "updated": report.updated,
                "dropped": report.dropped,
                "feedback_task": report.feedback_task,
                "combined_status": orchestrator.combined_status(report.task_id).await?.to_string(),
            })
        }

        Command::Partition { count, max } => {
            let max = max.map_or(config.tasks.max_task_size, MaxTaskSize::from_config);
            let items = vec![(); count];
            let sizes: Vec<usize> = partition(&items, max).map(|batch| batch.len()).collect();
            json!({
                "items": count,
                "max_task_size": max.as_config(),
                "batches": sizes.len(),
                "sizes": sizes,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_registry(path: Option<&Path>, config: &Config) -> Result<StaticRegistry> {
    let registry = match path {
        Some(path) => StaticRegistry::from_file(path),
        None => StaticRegistry::from_config(&config.registry),
    };
    registry.context("failed to load backend registry")
}

fn load_store(path: &Path) -> Result<Arc<MemoryStore>> {
    let store = MemoryStore::load_snapshot(path)
        .with_context(|| format!("failed to load snapshot {}", path.display()))?;
    Ok(Arc::new(store))
}
