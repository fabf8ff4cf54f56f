use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use syndicate::config::AppConfig;
use syndicate::db::{self, PgStore};
use syndicate::sim::{
    GameContext, IncomeJob, MarketJob, OperationsRefreshJob, OperationsSweepJob, Supervisor,
    territory,
};
use syndicate::{SeededDice, SystemClock};

const DEFAULT_CONFIG: &str = "config/game.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = AppConfig::load(&path).with_context(|| format!("loading {path}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("connecting to postgres")?;
    db::migrate(&pool).await.context("applying schema")?;

    let ctx = GameContext::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(SeededDice::from_entropy()),
        Arc::new(SystemClock),
        config.game,
    );
    territory::refresh_illegal(&ctx).await?;

    let mut supervisor = Supervisor::new(ctx);
    supervisor.spawn(IncomeJob);
    supervisor.spawn(MarketJob);
    supervisor.spawn(OperationsSweepJob);
    supervisor.spawn(OperationsRefreshJob);
    tracing::info!(jobs = supervisor.job_count(), config = %path, "game core running");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    supervisor.shutdown().await;
    Ok(())
}
