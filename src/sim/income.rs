//! Passive income: whole hours since `last_income_time` accrue into
//! `pending_collection`, and the clock advances by exactly those hours so a
//! partial hour carries over to the next tick.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::context::GameContext;
use crate::db::Store;
use crate::error::GameResult;
use crate::model::{EventKind, Hotspot, NotificationCategory};

const HOUR_SECS: i64 = 3600;

/// One hotspot's accrual in a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeUpdate {
    pub hotspot_id: Uuid,
    pub hotspot_name: String,
    pub accrued: i64,
    pub hours: i64,
    pub pending_collection: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IncomeSummary {
    /// Hotspots seen for the first time and stamped with `now`.
    pub initialized: usize,
    pub accrued: Vec<IncomeUpdate>,
    /// Hotspots skipped because a write failed.
    pub failed: usize,
}

enum Step {
    Initialized,
    Idle,
    Accrued(IncomeUpdate),
}

/// Whole hours between `last` and `now`. Never negative.
pub fn whole_hours(last: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    ((now - last).num_seconds() / HOUR_SECS).max(0)
}

async fn accrue_one<S: Store>(
    ctx: &GameContext<S>,
    hotspot: &Hotspot,
    now: DateTime<Utc>,
) -> GameResult<Step> {
    let Some(last) = hotspot.last_income_time else {
        ctx.store.update_hotspot_last_income_time(hotspot.id, now).await?;
        return Ok(Step::Initialized);
    };
    let hours = whole_hours(last, now);
    if hours == 0 {
        return Ok(Step::Idle);
    }

    let accrual = hotspot.income * hours;
    ctx.store
        .update_hotspot_pending_collection(hotspot.id, accrual)
        .await?;
    let advanced = last + Duration::seconds(hours * HOUR_SECS);
    if let Err(e) = ctx
        .store
        .update_hotspot_last_income_time(hotspot.id, advanced)
        .await
    {
        // clock unchanged: undo so the same hours are not credited twice
        tracing::error!(hotspot_id = %hotspot.id, accrual, error = %e, "income clock not advanced");
        if let Err(undo) = ctx
            .store
            .update_hotspot_pending_collection(hotspot.id, -accrual)
            .await
        {
            tracing::error!(hotspot_id = %hotspot.id, accrual, error = %undo, "accrual could not be reverted");
        }
        return Err(e.into());
    }

    Ok(Step::Accrued(IncomeUpdate {
        hotspot_id: hotspot.id,
        hotspot_name: hotspot.name.clone(),
        accrued: accrual,
        hours,
        pending_collection: hotspot.pending_collection + accrual,
    }))
}

/// One income tick over every controlled legal hotspot.
pub async fn accrue<S: Store>(ctx: &GameContext<S>) -> GameResult<IncomeSummary> {
    let now = ctx.now();
    let hotspots = ctx.store.get_all_controlled_legal_hotspots().await?;

    let mut by_controller: BTreeMap<Uuid, Vec<&Hotspot>> = BTreeMap::new();
    for h in &hotspots {
        if let Some(controller) = h.controller_id {
            by_controller.entry(controller).or_default().push(h);
        }
    }

    let mut summary = IncomeSummary::default();
    for (player_id, owned) in by_controller {
        let mut updates = Vec::new();
        let mut total_pending = 0;
        for h in owned {
            match accrue_one(ctx, h, now).await {
                Ok(Step::Accrued(update)) => {
                    if update.accrued > ctx.config.collection_ready_threshold {
                        ctx.bus.notify(
                            player_id,
                            NotificationCategory::Collection,
                            "Collection ready",
                            &format!(
                                "{} has ${} ready for collection.",
                                update.hotspot_name, update.pending_collection
                            ),
                        );
                    }
                    total_pending += update.pending_collection;
                    updates.push(update);
                }
                Ok(Step::Initialized) => {
                    total_pending += h.pending_collection;
                    summary.initialized += 1;
                }
                Ok(Step::Idle) => total_pending += h.pending_collection,
                Err(e) => {
                    tracing::warn!(hotspot_id = %h.id, player_id = %player_id, error = %e, "skipping hotspot this tick");
                    total_pending += h.pending_collection;
                    summary.failed += 1;
                }
            }
        }

        if !updates.is_empty() {
            ctx.bus.publish_player(
                player_id,
                EventKind::IncomeGenerated,
                json!({
                    "updates": updates,
                    "totalPending": total_pending,
                    "timestamp": now.to_rfc3339(),
                }),
            );
            summary.accrued.extend(updates);
        }
    }

    if !summary.accrued.is_empty() {
        tracing::debug!(hotspots = summary.accrued.len(), "income accrued");
    }
    Ok(summary)
}
