use std::future::Future;
use std::time::Duration;

use super::context::GameContext;
use super::{income, market, operations};
use crate::config::GameConfig;
use crate::db::Store;
use crate::error::GameResult;

/// A periodic background task driven by the [`Supervisor`](super::Supervisor).
///
/// Jobs run one tick at a time; a slow tick delays the next one instead of
/// overlapping it.
pub trait BackgroundJob<S: Store>: Send + 'static {
    fn name(&self) -> &'static str;
    fn period(&self, config: &GameConfig) -> Duration;

    /// Fire once immediately instead of waiting a full period first.
    fn run_on_start(&self) -> bool {
        false
    }

    fn tick(&mut self, ctx: &GameContext<S>) -> impl Future<Output = GameResult<()>> + Send;
}

/// Accrues hotspot income.
pub struct IncomeJob;

impl<S: Store> BackgroundJob<S> for IncomeJob {
    fn name(&self) -> &'static str {
        "income"
    }

    fn period(&self, config: &GameConfig) -> Duration {
        config.income_tick()
    }

    async fn tick(&mut self, ctx: &GameContext<S>) -> GameResult<()> {
        let summary = income::accrue(ctx).await?;
        if summary.failed > 0 {
            tracing::warn!(failed = summary.failed, "income tick skipped hotspots");
        }
        Ok(())
    }
}

/// Moves market prices.
pub struct MarketJob;

impl<S: Store> BackgroundJob<S> for MarketJob {
    fn name(&self) -> &'static str {
        "market"
    }

    fn period(&self, config: &GameConfig) -> Duration {
        config.market.interval()
    }

    async fn tick(&mut self, ctx: &GameContext<S>) -> GameResult<()> {
        market::update_prices(ctx).await?;
        Ok(())
    }
}

/// Tells players when an operation has finished its timer.
pub struct OperationsSweepJob;

impl<S: Store> BackgroundJob<S> for OperationsSweepJob {
    fn name(&self) -> &'static str {
        "operations-sweep"
    }

    fn period(&self, config: &GameConfig) -> Duration {
        config.operations_sweep()
    }

    async fn tick(&mut self, ctx: &GameContext<S>) -> GameResult<()> {
        let sent = operations::sweep_ready(ctx).await?;
        if sent > 0 {
            tracing::debug!(sent, "operation completion notices sent");
        }
        Ok(())
    }
}

/// Rotates the daily operation pool.
pub struct OperationsRefreshJob;

impl<S: Store> BackgroundJob<S> for OperationsRefreshJob {
    fn name(&self) -> &'static str {
        "operations-refresh"
    }

    fn period(&self, config: &GameConfig) -> Duration {
        config.operations_refresh()
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn tick(&mut self, ctx: &GameContext<S>) -> GameResult<()> {
        operations::refresh_pool(ctx).await?;
        Ok(())
    }
}
