//! Territory actions: extortion, takeover, collection and defense of hotspots.
//!
//! [`perform`] follows a fixed commit order so a failure midway has a
//! well-defined compensation:
//!
//! 1. debit the committed forces
//! 2. roll the outcome
//! 3. persist the hotspot change
//! 4. apply rewards and losses
//! 5. record the action
//! 6. publish events
//!
//! A failure in step 3 or 4 refunds the debit. Later failures are logged only.

use serde_json::json;
use uuid::Uuid;

use super::context::GameContext;
use super::ledger;
use super::odds::{roll_loss, rolls_under, success_chance};
use crate::db::Store;
use crate::dice::Dice;
use crate::error::{GameError, GameResult};
use crate::model::{
    ActionKind, ActionResult, CollectAllResponse, CollectResponse, Deltas, EventKind, Forces,
    Hotspot, NotificationCategory, Player, ResourceKind, TerritoryAction,
};

const EXTORT_BASE_CHANCE: i64 = 70;
const TAKEOVER_CONTESTED_CHANCE: i64 = 50;
const TAKEOVER_OPEN_CHANCE: i64 = 75;
const COLLECT_BASE_CHANCE: i64 = 95;
const COLLECT_MIN_BASE_CHANCE: i64 = 60;
/// Pending money per point the collect chance drops.
const COLLECT_RISK_STEP: i64 = 1000;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// How a resolved action changes the hotspot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HotspotChange {
    Unchanged,
    Seize { previous: Option<Uuid> },
    Reinforce,
    TakePending,
    LosePending(i64),
}

struct Resolution {
    result: ActionResult,
    change: HotspotChange,
}

impl Resolution {
    fn new(success: bool, change: HotspotChange) -> Self {
        Self {
            result: ActionResult {
                success,
                ..ActionResult::default()
            },
            change,
        }
    }
}

fn check_preconditions(kind: ActionKind, hotspot: &Hotspot, player_id: Uuid) -> GameResult<()> {
    match kind {
        ActionKind::Extortion => {
            if hotspot.is_legal {
                return Err(GameError::invalid("cannot extort a legal business"));
            }
        }
        ActionKind::Takeover => {
            if !hotspot.is_legal {
                return Err(GameError::invalid("cannot take over an illegal business"));
            }
            if hotspot.is_controlled_by(player_id) {
                return Err(GameError::invalid("you already control this business"));
            }
        }
        ActionKind::Collection => {
            if !hotspot.is_legal {
                return Err(GameError::invalid("cannot collect from an illegal business"));
            }
            if !hotspot.is_controlled_by(player_id) {
                return Err(GameError::invalid("you do not control this business"));
            }
            if hotspot.pending_collection <= 0 {
                return Err(GameError::invalid("no pending collections available"));
            }
        }
        ActionKind::Defend => {
            if !hotspot.is_legal {
                return Err(GameError::invalid("cannot defend an illegal business"));
            }
            if !hotspot.is_controlled_by(player_id) {
                return Err(GameError::invalid("you do not control this business"));
            }
        }
    }
    Ok(())
}

fn resolve(dice: &dyn Dice, kind: ActionKind, hotspot: &Hotspot, committed: &Forces) -> Resolution {
    match kind {
        ActionKind::Extortion => resolve_extortion(dice, hotspot, committed),
        ActionKind::Takeover => resolve_takeover(dice, hotspot, committed),
        ActionKind::Collection => resolve_collection(dice, hotspot, committed),
        ActionKind::Defend => {
            let mut r = Resolution::new(true, HotspotChange::Reinforce);
            let defense = hotspot.allocated.plus(committed).strength();
            r.result.message = format!(
                "Defense reinforced at {}. Defense strength is now {defense}.",
                hotspot.name
            );
            r
        }
    }
}

fn resolve_extortion(dice: &dyn Dice, hotspot: &Hotspot, c: &Forces) -> Resolution {
    // extortion targets unowned businesses; there is no defender to weigh against
    let chance = success_chance(c, EXTORT_BASE_CHANCE, 0);
    let success = rolls_under(dice, chance);
    let mut r = Resolution::new(success, HotspotChange::Unchanged);
    let out = &mut r.result;

    if success {
        let base = 500 + dice.below(11) * 100;
        // floor(base * (1 + weight/20)) in exact integer arithmetic
        out.money_gained = base * (20 + c.crew + 2 * c.weapons + 3 * c.vehicles) / 20;
        if dice.chance(20.0) {
            if dice.chance(30.0) {
                out.crew_gained = dice.below(2) + 1;
            }
            if dice.chance(20.0) {
                out.weapons_gained = dice.below(2) + 1;
            }
            if dice.chance(5.0) {
                out.vehicles_gained = 1;
            }
        }
        out.heat_generated = 5 + dice.below(6);
        out.respect_gained = 1 + dice.below(3);
        out.message = format!(
            "Extortion successful. You collected ${} from {}.",
            out.money_gained, hotspot.name
        );
    } else {
        out.crew_lost = roll_loss(dice, 30.0, c.crew);
        out.weapons_lost = roll_loss(dice, 20.0, c.weapons);
        if dice.chance(10.0) && c.vehicles > 0 {
            out.vehicles_lost = 1;
        }
        out.heat_generated = 8 + dice.below(8);
        out.message = format!(
            "Extortion failed. The owners of {} called the police.",
            hotspot.name
        );
    }
    r
}

fn resolve_takeover(dice: &dyn Dice, hotspot: &Hotspot, c: &Forces) -> Resolution {
    let (base, opponent) = match hotspot.controller_id {
        Some(_) => (TAKEOVER_CONTESTED_CHANCE, hotspot.defense_strength),
        None => (TAKEOVER_OPEN_CHANCE, 0),
    };
    let chance = success_chance(c, base, opponent);
    let success = rolls_under(dice, chance);

    if success {
        let mut r = Resolution::new(
            true,
            HotspotChange::Seize {
                previous: hotspot.controller_id,
            },
        );
        let out = &mut r.result;
        out.respect_gained = 3 + dice.below(3);
        out.influence_gained = 2 + dice.below(3);
        out.heat_generated = 3 + dice.below(5);
        out.message = format!("Takeover successful. You now control {}.", hotspot.name);
        r
    } else {
        let mut r = Resolution::new(false, HotspotChange::Unchanged);
        let out = &mut r.result;
        out.crew_lost = roll_loss(dice, 40.0, c.crew);
        out.weapons_lost = roll_loss(dice, 30.0, c.weapons);
        if dice.chance(20.0) && c.vehicles > 0 {
            out.vehicles_lost = 1;
        }
        out.heat_generated = 5 + dice.below(6);
        out.respect_lost = 1 + dice.below(2);
        out.message = if hotspot.controller_id.is_some() {
            format!("Takeover failed. The defenders of {} held.", hotspot.name)
        } else {
            format!(
                "Takeover failed. The police moved in before you could secure {}.",
                hotspot.name
            )
        };
        r
    }
}

fn resolve_collection(dice: &dyn Dice, hotspot: &Hotspot, c: &Forces) -> Resolution {
    let base = (COLLECT_BASE_CHANCE - hotspot.pending_collection / COLLECT_RISK_STEP)
        .max(COLLECT_MIN_BASE_CHANCE);
    let chance = success_chance(c, base, 0);
    let success = rolls_under(dice, chance);

    if success {
        let mut r = Resolution::new(true, HotspotChange::TakePending);
        r.result.heat_generated = 1 + dice.below(3);
        r
    } else {
        let percent = 30 + dice.below(41);
        let lost = hotspot.pending_collection * percent / 100;
        let mut r = Resolution::new(false, HotspotChange::LosePending(lost));
        let out = &mut r.result;
        out.money_lost = lost;
        out.crew_lost = roll_loss(dice, 30.0, c.crew);
        out.heat_generated = 5 + dice.below(6);
        out.message = format!("Collection interrupted by police. ${lost} was lost.");
        r
    }
}

/// Player-side deltas of a result. Money lost on a collection comes out of
/// the hotspot, not the player.
fn reward_deltas(r: &ActionResult) -> Deltas {
    Deltas::new()
        .with(ResourceKind::Money, r.money_gained)
        .with(ResourceKind::Crew, r.crew_gained - r.crew_lost)
        .with(ResourceKind::Weapons, r.weapons_gained - r.weapons_lost)
        .with(ResourceKind::Vehicles, r.vehicles_gained - r.vehicles_lost)
        .with(ResourceKind::Respect, r.respect_gained - r.respect_lost)
        .with(ResourceKind::Influence, r.influence_gained)
        .with(ResourceKind::Heat, r.heat_generated)
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

async fn load_player<S: Store>(ctx: &GameContext<S>, player_id: Uuid) -> GameResult<Player> {
    ctx.store
        .get_player(player_id)
        .await?
        .ok_or_else(|| GameError::not_found("player", player_id))
}

async fn load_hotspot<S: Store>(ctx: &GameContext<S>, hotspot_id: Uuid) -> GameResult<Hotspot> {
    ctx.store
        .get_hotspot(hotspot_id)
        .await?
        .ok_or_else(|| GameError::not_found("hotspot", hotspot_id))
}

/// Step 3. Fills in `money_gained` for a successful collection.
async fn persist_change<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    hotspot: &Hotspot,
    committed: &Forces,
    resolution: &mut Resolution,
) -> GameResult<()> {
    match resolution.change {
        HotspotChange::Unchanged => {}
        HotspotChange::Seize { previous } => {
            if !ctx
                .store
                .seize_hotspot(hotspot.id, previous, player_id, *committed)
                .await?
            {
                return Err(GameError::conflict(
                    "the business changed hands during the takeover",
                ));
            }
        }
        HotspotChange::Reinforce => {
            // increments land in storage so concurrent defends add up
            if !ctx
                .store
                .reinforce_hotspot(hotspot.id, player_id, *committed)
                .await?
            {
                return Err(GameError::conflict("you no longer control this business"));
            }
        }
        HotspotChange::TakePending => {
            let taken = ctx
                .store
                .take_pending_collection(hotspot.id, player_id, ctx.now())
                .await?
                .ok_or_else(|| GameError::conflict("you no longer control this business"))?;
            resolution.result.money_gained = taken;
            resolution.result.message =
                format!("Collection successful. ${taken} added to your account.");
        }
        HotspotChange::LosePending(lost) => {
            ctx.store
                .update_hotspot_pending_collection(hotspot.id, -lost)
                .await?;
        }
    }
    Ok(())
}

/// Resolve one territory action against a hotspot.
pub async fn perform<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    kind: ActionKind,
    hotspot_id: Uuid,
    committed: Forces,
) -> GameResult<ActionResult> {
    if committed.is_negative() {
        return Err(GameError::invalid("committed resources cannot be negative"));
    }
    let player = load_player(ctx, player_id).await?;
    if player.crew < committed.crew {
        return Err(GameError::invalid("not enough crew members"));
    }
    if player.weapons < committed.weapons {
        return Err(GameError::invalid("not enough weapons"));
    }
    if player.vehicles < committed.vehicles {
        return Err(GameError::invalid("not enough vehicles"));
    }
    let hotspot = load_hotspot(ctx, hotspot_id).await?;
    check_preconditions(kind, &hotspot, player_id)?;

    // 1. debit
    let debit = Deltas::debit(&committed);
    if !debit.is_empty() {
        ledger::apply(ctx, player_id, &debit).await?;
    }

    // 2. roll
    let mut resolution = resolve(ctx.dice.as_ref(), kind, &hotspot, &committed);

    // 3. hotspot
    if let Err(e) = persist_change(ctx, player_id, &hotspot, &committed, &mut resolution).await {
        tracing::error!(
            player_id = %player_id,
            hotspot_id = %hotspot_id,
            action = %kind,
            error = %e,
            "hotspot write failed after debit"
        );
        ledger::refund(ctx, player_id, &debit.negated(), "hotspot write failed").await;
        return Err(e);
    }

    // 4. rewards and losses
    let rewards = reward_deltas(&resolution.result);
    if !rewards.is_empty()
        && let Err(e) = ledger::apply(ctx, player_id, &rewards).await
    {
        tracing::error!(
            player_id = %player_id,
            hotspot_id = %hotspot_id,
            action = %kind,
            error = %e,
            "reward write failed after hotspot write"
        );
        ledger::refund(ctx, player_id, &debit.negated(), "reward write failed").await;
        return Err(e);
    }

    // 5. record
    let result = resolution.result;
    let action = TerritoryAction {
        id: Uuid::new_v4(),
        kind,
        player_id,
        hotspot_id,
        resources: committed,
        result: result.clone(),
        timestamp: ctx.now(),
    };
    if let Err(e) = ctx.store.create_territory_action(&action).await {
        tracing::error!(
            player_id = %player_id,
            hotspot_id = %hotspot_id,
            error = %e,
            "failed to record territory action"
        );
    }

    // 6. publish
    let current = match ctx.store.get_hotspot(hotspot_id).await {
        Ok(Some(h)) => h,
        _ => hotspot.clone(),
    };
    ctx.bus.publish_player(
        player_id,
        EventKind::HotspotUpdated,
        json!({ "hotspot": current, "action": kind }),
    );
    match resolution.change {
        HotspotChange::Seize {
            previous: Some(previous),
        } => {
            ctx.bus.publish_player(
                previous,
                EventKind::TerritoryLost,
                json!({
                    "hotspot": current,
                    "takenBy": player.name,
                    "message": format!("{} has been taken over by {}!", hotspot.name, player.name),
                }),
            );
        }
        HotspotChange::Unchanged if kind == ActionKind::Takeover => {
            if let Some(defender) = hotspot.controller_id {
                ctx.bus.publish_player(
                    defender,
                    EventKind::TerritoryDefended,
                    json!({
                        "hotspot": current,
                        "attacker": player.name,
                        "message": format!(
                            "You defended {} from a takeover attempt by {}!",
                            hotspot.name, player.name
                        ),
                    }),
                );
            }
        }
        _ => {}
    }

    tracing::debug!(
        player_id = %player_id,
        hotspot_id = %hotspot_id,
        action = %kind,
        success = result.success,
        "territory action resolved"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Income collection
// ---------------------------------------------------------------------------

/// Collect one hotspot's pending income. Deterministic: no roll, no heat.
pub async fn collect_hotspot<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    hotspot_id: Uuid,
) -> GameResult<CollectResponse> {
    let hotspot = load_hotspot(ctx, hotspot_id).await?;
    if !hotspot.is_controlled_by(player_id) {
        return Err(GameError::invalid("you do not control this hotspot"));
    }
    if hotspot.pending_collection <= 0 {
        return Err(GameError::invalid("no income available to collect"));
    }
    let taken = ctx
        .store
        .take_pending_collection(hotspot_id, player_id, ctx.now())
        .await?
        .ok_or_else(|| GameError::conflict("you no longer control this hotspot"))?;
    if taken <= 0 {
        return Err(GameError::invalid("no income available to collect"));
    }

    let credit = Deltas::new().with(ResourceKind::Money, taken);
    if let Err(e) = ledger::apply(ctx, player_id, &credit).await {
        tracing::error!(player_id = %player_id, hotspot_id = %hotspot_id, error = %e, "credit failed after collection");
        restore_pending(ctx, hotspot_id, taken).await;
        return Err(e);
    }

    let message = format!("Collected ${taken} from {}.", hotspot.name);
    if let Ok(Some(current)) = ctx.store.get_hotspot(hotspot_id).await {
        ctx.bus.publish_player(
            player_id,
            EventKind::HotspotUpdated,
            json!({ "hotspot": current }),
        );
    }
    ctx.bus
        .notify(player_id, NotificationCategory::Collection, "Income collected", &message);
    Ok(CollectResponse {
        hotspot_id,
        hotspot_name: hotspot.name,
        collected_amount: taken,
        message,
    })
}

/// Collect from every controlled hotspot with pending income. Hotspots whose
/// write fails are skipped.
pub async fn collect_all<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
) -> GameResult<CollectAllResponse> {
    let hotspots = ctx.store.get_controlled_hotspots(player_id).await?;
    let now = ctx.now();
    let mut taken_from = Vec::new();
    let mut total = 0;
    for h in hotspots.iter().filter(|h| h.pending_collection > 0) {
        match ctx.store.take_pending_collection(h.id, player_id, now).await {
            Ok(Some(amount)) if amount > 0 => {
                total += amount;
                taken_from.push((h.id, amount));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(player_id = %player_id, hotspot_id = %h.id, error = %e, "skipping hotspot");
            }
        }
    }

    if total == 0 {
        return Ok(CollectAllResponse {
            collected_amount: 0,
            hotspots_count: 0,
            message: "No income available to collect at this time.".to_string(),
        });
    }

    let credit = Deltas::new().with(ResourceKind::Money, total);
    if let Err(e) = ledger::apply(ctx, player_id, &credit).await {
        tracing::error!(player_id = %player_id, error = %e, "credit failed after collecting all");
        for (id, amount) in taken_from {
            restore_pending(ctx, id, amount).await;
        }
        return Err(e);
    }

    let count = taken_from.len() as i64;
    let message = format!("Collected ${total} from {count} businesses.");
    let current = ctx
        .store
        .get_controlled_hotspots(player_id)
        .await
        .unwrap_or(hotspots);
    ctx.bus.publish_player(
        player_id,
        EventKind::HotspotsUpdated,
        json!({ "hotspots": current, "totalCollected": total }),
    );
    ctx.bus
        .notify(player_id, NotificationCategory::Collection, "Income collected", &message);
    Ok(CollectAllResponse {
        collected_amount: total,
        hotspots_count: count,
        message,
    })
}

async fn restore_pending<S: Store>(ctx: &GameContext<S>, hotspot_id: Uuid, amount: i64) {
    if let Err(e) = ctx
        .store
        .update_hotspot_pending_collection(hotspot_id, amount)
        .await
    {
        tracing::error!(
            hotspot_id = %hotspot_id,
            amount,
            error = %e,
            "failed to restore pending collection, income lost"
        );
    }
}

// ---------------------------------------------------------------------------
// Queries and maintenance
// ---------------------------------------------------------------------------

pub async fn recent_actions<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    limit: i64,
) -> GameResult<Vec<TerritoryAction>> {
    if limit <= 0 {
        return Err(GameError::invalid("limit must be positive"));
    }
    Ok(ctx.store.recent_territory_actions(player_id, limit).await?)
}

/// Clear controller and allocations on every illegal hotspot.
pub async fn refresh_illegal<S: Store>(ctx: &GameContext<S>) -> GameResult<u64> {
    let cleared = ctx.store.refresh_illegal_hotspots().await?;
    tracing::info!(cleared, "illegal hotspots reset");
    Ok(cleared)
}
