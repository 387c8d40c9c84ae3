use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use footy_tipping::config::Config;
use footy_tipping::domain::{MatchStatus, Score};
use footy_tipping::metrics::{self, Metrics};
use footy_tipping::projection::{ProjectionWorker, Projector};
use footy_tipping::storage;
use footy_tipping::{Consistency, TippingService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,footy_tipping=debug")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(backend = ?config.storage_backend, "Starting footy tipping core");

    // === 1. Storage ===
    let stores = storage::connect(&config).await?;

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    if let Some(port) = config.metrics_port {
        // actix-web runs on its own runtime, off the main one
        let registry = metrics.registry().clone();
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Metrics runtime error: {}", e);
                    return;
                }
            };
            rt.block_on(async {
                if let Err(e) = metrics::start_metrics_server(registry, port).await {
                    tracing::error!("Metrics server error: {}", e);
                }
            });
        });
    }

    // === 3. Projection ===
    let projector = Arc::new(Projector::new(
        stores.events.clone(),
        stores.read_model.clone(),
        metrics.clone(),
    ));
    let worker = ProjectionWorker::new(
        stores.events.clone(),
        projector.clone(),
        metrics.clone(),
        config.worker_config(),
    );
    let caught_up = worker.catch_up().await?;
    tracing::info!(events = caught_up, "Read model caught up with the event log");
    let worker = worker.spawn();

    // === 4. A round of tipping ===
    let service = TippingService::new(
        stores.events.clone(),
        projector,
        metrics.clone(),
        config.operation_timeout,
    );

    // a durable backend keeps these accounts from earlier runs
    let ada = service
        .ensure_user("google-ada", "ada@example.com", "Ada", "")
        .await?;
    let bob = service
        .ensure_user("google-bob", "bob@example.com", "Bob", "")
        .await?;
    let fixture = service
        .create_match("Carlton", "Collingwood", Utc::now() + Duration::days(2), "AFL")
        .await?
        .aggregate
        .id;

    service.make_prediction(&ada, &fixture, Score::new(92, 78)).await?;
    service.make_prediction(&bob, &fixture, Score::new(70, 85)).await?;

    service.change_status(&fixture, MatchStatus::Live).await?;
    service.update_score(&fixture, Score::new(88, 80)).await?;
    service.change_status(&fixture, MatchStatus::Finished).await?;

    let settlement = service.settle_match(&fixture).await?;
    tracing::info!(
        match_id = %settlement.match_id,
        final_score = %settlement.final_score,
        awarded = settlement.awarded.len(),
        "Round settled"
    );

    let result = service.get_match(&fixture, Consistency::Strong).await?;
    tracing::info!(
        "{} v {}: {:?} ({})",
        result.home_team,
        result.away_team,
        result.score,
        result.status
    );

    for entry in service.leaderboard().await? {
        tracing::info!(
            rank = entry.stats.current_rank,
            name = %entry.name,
            points = entry.stats.total_points,
            success_rate = entry.success_rate,
            "Leaderboard"
        );
    }

    // === 5. Shutdown ===
    worker.shutdown().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
