use serde_json::json;
use uuid::Uuid;

use super::context::GameContext;
use super::ledger;
use crate::config::TravelConfig;
use crate::db::Store;
use crate::error::{GameError, GameResult};
use crate::model::{
    Deltas, EventKind, NotificationCategory, Player, ResourceKind, TravelAttempt, TravelOutcome,
};

/// Percent chance of being stopped at the border with `heat`.
pub fn catch_chance(cfg: &TravelConfig, heat: i64) -> f64 {
    (cfg.base_catch_chance + heat as f64 * cfg.heat_multiplier).min(cfg.max_catch_chance)
}

/// Fine for a player carrying `money`: a share of it, raised to the minimum,
/// then capped by the maximum share and by what the player has.
pub fn fine_for(cfg: &TravelConfig, money: i64) -> i64 {
    let base = (money as f64 * cfg.base_fine_factor).floor() as i64;
    let cap = (money as f64 * cfg.max_fine_percent).floor() as i64;
    base.max(cfg.minimum_fine).min(cap).min(money).max(0)
}

async fn record<S: Store>(ctx: &GameContext<S>, attempt: &TravelAttempt) {
    if let Err(e) = ctx.store.create_travel_attempt(attempt).await {
        tracing::error!(player_id = %attempt.player_id, error = %e, "travel attempt not recorded");
    }
}

/// Move a player to another region, risking a fine on the way.
pub async fn travel<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    region_id: Uuid,
) -> GameResult<TravelOutcome> {
    let region = ctx
        .store
        .get_region(region_id)
        .await?
        .ok_or_else(|| GameError::not_found("region", region_id))?;
    let player: Player = ctx
        .store
        .get_player(player_id)
        .await?
        .ok_or_else(|| GameError::not_found("player", player_id))?;

    if player.current_region_id == Some(region_id) {
        return Ok(TravelOutcome {
            success: true,
            region_id,
            region_name: region.name.clone(),
            travel_cost: 0,
            caught: false,
            fine: 0,
            heat_increase: 0,
            heat_reduction: 0,
            message: format!("You are already in {}.", region.name),
        });
    }

    let cfg = &ctx.config.travel;
    if player.money < cfg.base_cost {
        return Err(GameError::invalid(format!(
            "travel costs ${} and you have ${}",
            cfg.base_cost, player.money
        )));
    }

    let now = ctx.now();
    let chance = catch_chance(cfg, player.heat);
    let caught = ctx.dice.unit() * 100.0 < chance;

    if caught {
        let fine = fine_for(cfg, player.money);
        let deltas = Deltas::new()
            .with(ResourceKind::Money, -fine)
            .with(ResourceKind::Heat, cfg.caught_heat_increase);
        ledger::apply(ctx, player_id, &deltas).await?;
        record(
            ctx,
            &TravelAttempt {
                id: Uuid::new_v4(),
                player_id,
                from_region_id: player.current_region_id,
                to_region_id: region_id,
                success: false,
                caught: true,
                fine: Some(fine),
                heat_delta: cfg.caught_heat_increase,
                cost: 0,
                timestamp: now,
            },
        )
        .await;

        let message = format!(
            "You were stopped by the police on the way to {}. You paid a ${fine} fine.",
            region.name
        );
        ctx.bus
            .notify(player_id, NotificationCategory::Travel, "Caught travelling", &message);
        tracing::info!(player_id = %player_id, region_id = %region_id, fine, "caught while travelling");
        return Ok(TravelOutcome {
            success: false,
            region_id,
            region_name: region.name,
            travel_cost: 0,
            caught: true,
            fine,
            heat_increase: cfg.caught_heat_increase,
            heat_reduction: 0,
            message,
        });
    }

    let reduction = cfg.success_heat_reduction.min(player.heat).max(0);
    let deltas = Deltas::new()
        .with(ResourceKind::Money, -cfg.base_cost)
        .with(ResourceKind::Heat, -reduction);
    ledger::apply(ctx, player_id, &deltas).await?;
    if let Err(e) = ctx.store.set_player_region(player_id, region_id, now).await {
        tracing::error!(player_id = %player_id, region_id = %region_id, error = %e, "region not updated after payment");
        ledger::refund(ctx, player_id, &deltas.negated(), "region not updated").await;
        return Err(e.into());
    }
    record(
        ctx,
        &TravelAttempt {
            id: Uuid::new_v4(),
            player_id,
            from_region_id: player.current_region_id,
            to_region_id: region_id,
            success: true,
            caught: false,
            fine: None,
            heat_delta: -reduction,
            cost: cfg.base_cost,
            timestamp: now,
        },
    )
    .await;

    ctx.bus.publish_player(
        player_id,
        EventKind::PlayerRegionChanged,
        json!({
            "playerId": player_id,
            "regionId": region_id,
            "regionName": region.name,
            "timestamp": now.to_rfc3339(),
        }),
    );
    tracing::info!(player_id = %player_id, region_id = %region_id, "travelled");
    Ok(TravelOutcome {
        success: true,
        region_id,
        message: format!("You arrived safely in {}.", region.name),
        region_name: region.name,
        travel_cost: cfg.base_cost,
        caught: false,
        fine: 0,
        heat_increase: 0,
        heat_reduction: reduction,
    })
}

pub async fn travel_history<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    limit: i64,
) -> GameResult<Vec<TravelAttempt>> {
    if limit <= 0 {
        return Err(GameError::invalid("limit must be positive"));
    }
    Ok(ctx.store.travel_history(player_id, limit).await?)
}
