//! Operations: timed jobs a player starts with committed resources and
//! collects once the duration has elapsed.
//!
//! Attempt states: `in_progress -> completed | failed | cancelled`. The roll
//! happens at collect time; the sweeper only announces that an attempt is
//! ready and never resolves it.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use super::context::GameContext;
use super::ledger;
use super::odds::{operation_chance, rolls_under};
use crate::config::{IntRange, OperationTemplate, PlaceholderConfig};
use crate::db::Store;
use crate::dice::Dice;
use crate::error::{GameError, GameResult};
use crate::model::{
    AttemptStatus, Deltas, EventKind, NotificationCategory, Operation, OperationAttempt,
    OperationKind, OperationOffer, OperationResources, OperationResult, Player, Requirements,
    ResourceKind, Rewards, Risks,
};

/// How long a freshly offered operation stays available.
const OFFER_WINDOW_HOURS: i64 = 24;

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// Why `player` may not start an operation with `req`, if anything.
/// Zero influence/heat and a missing title mean no requirement.
pub fn unmet_requirement(req: &Requirements, player: &Player) -> Option<String> {
    if req.min_influence > 0 && player.influence < req.min_influence {
        return Some("insufficient influence for this operation".to_string());
    }
    if req.max_heat > 0 && player.heat > req.max_heat {
        return Some("heat level too high for this operation".to_string());
    }
    if let Some(title) = req.min_title
        && !player.title.meets(title)
    {
        return Some(format!("requires the title of {title} or higher"));
    }
    None
}

fn commitment_debit(committed: &OperationResources) -> Deltas {
    Deltas::debit(&committed.forces()).with(ResourceKind::Money, -committed.money)
}

fn refund_of(resources: &OperationResources) -> Deltas {
    commitment_debit(resources).negated()
}

async fn load_player<S: Store>(ctx: &GameContext<S>, player_id: Uuid) -> GameResult<Player> {
    ctx.store
        .get_player(player_id)
        .await?
        .ok_or_else(|| GameError::not_found("player", player_id))
}

async fn load_operation<S: Store>(ctx: &GameContext<S>, id: Uuid) -> GameResult<Operation> {
    ctx.store
        .get_operation(id)
        .await?
        .ok_or_else(|| GameError::not_found("operation", id))
}

/// An attempt owned by `player_id` that is still in progress.
async fn live_attempt<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    attempt_id: Uuid,
) -> GameResult<OperationAttempt> {
    let attempt = ctx
        .store
        .get_operation_attempt(attempt_id)
        .await?
        .ok_or_else(|| GameError::not_found("operation attempt", attempt_id))?;
    if attempt.player_id != player_id {
        return Err(GameError::invalid("this operation belongs to another player"));
    }
    if attempt.status != AttemptStatus::InProgress {
        return Err(GameError::conflict(format!(
            "operation is already {}",
            attempt.status
        )));
    }
    Ok(attempt)
}

// ---------------------------------------------------------------------------
// Start / collect / cancel
// ---------------------------------------------------------------------------

pub async fn start<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    operation_id: Uuid,
    committed: OperationResources,
) -> GameResult<OperationAttempt> {
    if committed.is_negative() {
        return Err(GameError::invalid("committed resources cannot be negative"));
    }
    let now = ctx.now();
    let operation = load_operation(ctx, operation_id).await?;
    if !operation.is_available(now) {
        return Err(GameError::conflict("operation is no longer available"));
    }
    let running = ctx
        .store
        .player_attempts(player_id, &[AttemptStatus::InProgress])
        .await?;
    if running.iter().any(|a| a.operation_id == operation_id) {
        return Err(GameError::conflict("you already have this operation in progress"));
    }
    if (operation.available_until - now).num_seconds() < operation.duration_secs {
        return Err(GameError::conflict(
            "insufficient time remaining to complete this operation",
        ));
    }

    let player = load_player(ctx, player_id).await?;
    if let Some(reason) = unmet_requirement(&operation.requirements, &player) {
        return Err(GameError::InvalidRequest(reason));
    }
    if player.crew < committed.crew {
        return Err(GameError::invalid("not enough crew members"));
    }
    if player.weapons < committed.weapons {
        return Err(GameError::invalid("not enough weapons"));
    }
    if player.vehicles < committed.vehicles {
        return Err(GameError::invalid("not enough vehicles"));
    }
    if player.money < committed.money {
        return Err(GameError::invalid("not enough money"));
    }

    let debit = commitment_debit(&committed);
    if !debit.is_empty() {
        ledger::apply(ctx, player_id, &debit).await?;
    }
    let attempt = OperationAttempt::start(operation_id, player_id, committed, now);
    if let Err(e) = ctx.store.create_operation_attempt(&attempt).await {
        tracing::error!(player_id = %player_id, operation_id = %operation_id, error = %e, "attempt not recorded after debit");
        ledger::refund(ctx, player_id, &debit.negated(), "attempt not recorded").await;
        return Err(e.into());
    }

    tracing::info!(
        player_id = %player_id,
        operation_id = %operation_id,
        attempt_id = %attempt.id,
        "operation started"
    );
    ctx.bus.notify(
        player_id,
        NotificationCategory::Operation,
        "Operation started",
        &format!(
            "Operation '{}' started. Check back in {} for results.",
            operation.name,
            format_duration(operation.duration_secs)
        ),
    );
    Ok(attempt)
}

/// Roll an operation outcome. Success pays the fixed rewards; failure rolls
/// `d(risk)+1` for each unit loss and applies the fixed money and heat risks.
fn roll_outcome(dice: &dyn Dice, op: &Operation, committed: &OperationResources) -> OperationResult {
    let chance = operation_chance(op.success_rate, committed, &op.resources);
    let mut result = OperationResult {
        success: rolls_under(dice, chance),
        ..OperationResult::default()
    };
    if result.success {
        let r: &Rewards = &op.rewards;
        result.money_gained = r.money;
        result.crew_gained = r.crew;
        result.weapons_gained = r.weapons;
        result.vehicles_gained = r.vehicles;
        result.respect_gained = r.respect;
        result.influence_gained = r.influence;
        result.heat_reduced = r.heat_reduction;
        result.message = format!("Operation successful! {}", success_line(&op.kind));
    } else {
        let k: &Risks = &op.risks;
        let unit_loss = |risk: i64| if risk > 0 { dice.below(risk) + 1 } else { 0 };
        result.crew_lost = unit_loss(k.crew_loss);
        result.weapons_lost = unit_loss(k.weapons_loss);
        result.vehicles_lost = unit_loss(k.vehicles_loss);
        result.money_lost = k.money_loss.max(0);
        result.heat_generated = k.heat_increase.max(0);
        result.message = format!("Operation failed! {}", failure_line(&op.kind));
    }
    result
}

fn outcome_deltas(r: &OperationResult) -> Deltas {
    Deltas::new()
        .with(ResourceKind::Money, r.money_gained - r.money_lost)
        .with(ResourceKind::Crew, r.crew_gained - r.crew_lost)
        .with(ResourceKind::Weapons, r.weapons_gained - r.weapons_lost)
        .with(ResourceKind::Vehicles, r.vehicles_gained - r.vehicles_lost)
        .with(ResourceKind::Respect, r.respect_gained)
        .with(ResourceKind::Influence, r.influence_gained)
        .with(ResourceKind::Heat, r.heat_generated - r.heat_reduced)
}

/// Resolve a finished attempt and apply its outcome.
///
/// The terminal status is written before resources move, and only while the
/// attempt is still in progress, so whichever of two racing collects (or a
/// collect and a cancel) lands second gets a conflict and pays nothing. If the
/// resource write then fails, the attempt is put back in progress.
pub async fn collect<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    attempt_id: Uuid,
) -> GameResult<OperationResult> {
    let attempt = live_attempt(ctx, player_id, attempt_id).await?;
    let operation = load_operation(ctx, attempt.operation_id).await?;
    let now = ctx.now();
    if attempt.elapsed_secs(now) < operation.duration_secs {
        return Err(GameError::conflict("operation is still in progress"));
    }

    let result = roll_outcome(ctx.dice.as_ref(), &operation, &attempt.resources);
    let mut resolved = attempt.clone();
    resolved.status = if result.success {
        AttemptStatus::Completed
    } else {
        AttemptStatus::Failed
    };
    resolved.result = Some(result.clone());
    resolved.completion_time = Some(now);
    resolved.notified = true;
    if !ctx.store.finish_operation_attempt(&resolved).await? {
        return Err(GameError::conflict("operation was already resolved"));
    }

    let deltas = outcome_deltas(&result);
    if !deltas.is_empty()
        && let Err(e) = ledger::apply(ctx, player_id, &deltas).await
    {
        tracing::error!(player_id = %player_id, attempt_id = %attempt_id, error = %e, "outcome not applied, reopening attempt");
        match ctx.store.reopen_operation_attempt(attempt_id, resolved.status).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(attempt_id = %attempt_id, "attempt changed before it could be reopened")
            }
            Err(undo) => {
                tracing::error!(attempt_id = %attempt_id, error = %undo, "attempt stuck in terminal state without payout")
            }
        }
        return Err(e);
    }

    tracing::info!(
        player_id = %player_id,
        attempt_id = %attempt_id,
        success = result.success,
        "operation collected"
    );
    ctx.bus.notify(
        player_id,
        NotificationCategory::Operation,
        &operation.name,
        &result.message,
    );
    Ok(result)
}

/// Cancel a running attempt and return half of every committed resource,
/// rounding down.
pub async fn cancel<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    attempt_id: Uuid,
) -> GameResult<OperationAttempt> {
    let mut attempt = live_attempt(ctx, player_id, attempt_id).await?;
    attempt.status = AttemptStatus::Cancelled;
    attempt.completion_time = Some(ctx.now());
    if !ctx.store.finish_operation_attempt(&attempt).await? {
        return Err(GameError::conflict("operation was already resolved"));
    }

    let refund = refund_of(&attempt.resources.halved());
    if !refund.is_empty()
        && let Err(e) = ledger::apply(ctx, player_id, &refund).await
    {
        tracing::error!(player_id = %player_id, attempt_id = %attempt_id, error = %e, "cancellation refund failed");
    }

    let name = match ctx.store.get_operation(attempt.operation_id).await {
        Ok(Some(op)) => op.name,
        _ => "Unknown operation".to_string(),
    };
    ctx.bus.notify(
        player_id,
        NotificationCategory::Operation,
        "Operation cancelled",
        &format!("Operation '{name}' cancelled. 50% of committed resources have been returned."),
    );
    Ok(attempt)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Every offered operation, annotated with whether `player_id` may start it.
pub async fn available_operations<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
) -> GameResult<Vec<OperationOffer>> {
    let player = load_player(ctx, player_id).await?;
    let offers = ctx
        .store
        .active_operations(ctx.now())
        .await?
        .into_iter()
        .map(|operation| {
            let lock_reason = unmet_requirement(&operation.requirements, &player);
            OperationOffer {
                operation,
                is_locked: lock_reason.is_some(),
                lock_reason,
            }
        })
        .collect();
    Ok(offers)
}

pub async fn current_attempts<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
) -> GameResult<Vec<OperationAttempt>> {
    Ok(ctx
        .store
        .player_attempts(player_id, &[AttemptStatus::InProgress])
        .await?)
}

pub async fn completed_attempts<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
) -> GameResult<Vec<OperationAttempt>> {
    Ok(ctx
        .store
        .player_attempts(
            player_id,
            &[
                AttemptStatus::Completed,
                AttemptStatus::Failed,
                AttemptStatus::Cancelled,
            ],
        )
        .await?)
}

// ---------------------------------------------------------------------------
// Background work
// ---------------------------------------------------------------------------

/// Announce every in-progress attempt whose duration has elapsed, once.
/// Returns the number of notices sent.
pub async fn sweep_ready<S: Store>(ctx: &GameContext<S>) -> GameResult<usize> {
    let now = ctx.now();
    let mut sent = 0;
    for attempt in ctx.store.in_progress_attempts().await? {
        if attempt.notified {
            continue;
        }
        let operation = match ctx.store.get_operation(attempt.operation_id).await {
            Ok(Some(op)) => op,
            Ok(None) => {
                tracing::warn!(attempt_id = %attempt.id, operation_id = %attempt.operation_id, "attempt references a missing operation");
                continue;
            }
            Err(e) => {
                tracing::warn!(attempt_id = %attempt.id, error = %e, "operation lookup failed");
                continue;
            }
        };
        if attempt.elapsed_secs(now) < operation.duration_secs {
            continue;
        }

        // a collect or cancel may have landed since the snapshot
        match ctx.store.mark_attempt_notified(attempt.id).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!(attempt_id = %attempt.id, error = %e, "ready flag not saved, will retry");
                continue;
            }
        }
        ctx.bus.notify(
            attempt.player_id,
            NotificationCategory::Operation,
            "Operation ready",
            &format!("Operation '{}' is ready to collect!", operation.name),
        );
        sent += 1;
    }
    if sent > 0 {
        tracing::info!(count = sent, "operations ready to collect");
    }
    Ok(sent)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub deactivated: u64,
    pub created: usize,
    pub placeholders: usize,
    pub active: usize,
}

fn from_template(t: &OperationTemplate, is_special: bool, until: DateTime<Utc>) -> Operation {
    Operation {
        id: Uuid::new_v4(),
        name: t.name.clone(),
        description: t.description.clone(),
        kind: t.kind.clone(),
        is_special,
        is_active: true,
        requirements: t.requirements.clone(),
        resources: t.resources,
        rewards: t.rewards,
        risks: t.risks,
        duration_secs: t.duration_secs,
        success_rate: t.success_rate,
        available_until: until,
    }
}

/// A randomly parameterized operation used when the configured pool runs dry.
pub fn placeholder(
    dice: &dyn Dice,
    cfg: &PlaceholderConfig,
    is_special: bool,
    until: DateTime<Utc>,
) -> Operation {
    let roll = |r: IntRange| dice.range(r.min, r.max);
    let kinds = OperationKind::standard();
    let kind = kinds[dice.below(kinds.len() as i64) as usize].clone();
    let name = format!(
        "{}{}",
        if is_special { "Special: " } else { "" },
        placeholder_name(&kind)
    );
    Operation {
        id: Uuid::new_v4(),
        description: format!("A {} job put together on short notice.", kind.as_str().replace('_', " ")),
        name,
        kind,
        is_special,
        is_active: true,
        requirements: Requirements::default(),
        resources: OperationResources {
            crew: roll(cfg.crew_cost),
            weapons: roll(cfg.weapons_cost),
            vehicles: roll(cfg.vehicles_cost),
            money: roll(cfg.money_cost),
        },
        rewards: Rewards {
            money: roll(cfg.money_reward),
            respect: roll(cfg.respect_reward),
            influence: roll(cfg.influence_reward),
            ..Rewards::default()
        },
        risks: Risks {
            crew_loss: roll(cfg.resource_loss),
            weapons_loss: roll(cfg.resource_loss),
            vehicles_loss: roll(cfg.resource_loss),
            money_loss: roll(cfg.money_loss),
            heat_increase: roll(cfg.heat_increase),
        },
        duration_secs: roll(cfg.duration_secs),
        success_rate: roll(cfg.success_rate),
        available_until: until,
    }
}

async fn fill_quota<S: Store>(
    ctx: &GameContext<S>,
    templates: &[OperationTemplate],
    active: &[Operation],
    is_special: bool,
    quota: usize,
    until: DateTime<Utc>,
    summary: &mut RefreshSummary,
) -> GameResult<()> {
    let mut have = active.iter().filter(|op| op.is_special == is_special).count();
    let unused = templates
        .iter()
        .filter(|t| !active.iter().any(|op| op.name == t.name));
    for t in unused {
        if have >= quota {
            return Ok(());
        }
        ctx.store
            .insert_operation(&from_template(t, is_special, until))
            .await?;
        have += 1;
        summary.created += 1;
    }
    while have < quota {
        let op = placeholder(ctx.dice.as_ref(), &ctx.config.placeholders, is_special, until);
        ctx.store.insert_operation(&op).await?;
        have += 1;
        summary.created += 1;
        summary.placeholders += 1;
    }
    Ok(())
}

/// Retire expired operations and top the pool back up to the configured quotas.
pub async fn refresh_pool<S: Store>(ctx: &GameContext<S>) -> GameResult<RefreshSummary> {
    let now = ctx.now();
    let mut summary = RefreshSummary {
        deactivated: ctx.store.deactivate_expired_operations(now).await?,
        ..RefreshSummary::default()
    };
    let active = ctx.store.active_operations(now).await?;
    let until = now + Duration::hours(OFFER_WINDOW_HOURS);
    let pool = &ctx.config.operation_pool;

    fill_quota(
        ctx,
        &pool.basic,
        &active,
        false,
        ctx.config.daily_operations_count,
        until,
        &mut summary,
    )
    .await?;
    fill_quota(
        ctx,
        &pool.special,
        &active,
        true,
        ctx.config.special_operations_count,
        until,
        &mut summary,
    )
    .await?;

    let operations = ctx.store.active_operations(now).await?;
    summary.active = operations.len();
    let interval = ctx.config.operations_refresh();
    let next = now + Duration::seconds(interval.as_secs() as i64);
    ctx.bus.publish_all(
        EventKind::OperationsRefreshed,
        json!({
            "operations": operations,
            "timestamp": now.to_rfc3339(),
            "refreshInfo": {
                "refreshInterval": interval.as_secs() / 60,
                "lastRefreshTime": now.to_rfc3339(),
                "nextRefreshTime": next.to_rfc3339(),
            },
        }),
    );
    tracing::info!(
        deactivated = summary.deactivated,
        created = summary.created,
        placeholders = summary.placeholders,
        active = summary.active,
        "operations refreshed"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn placeholder_name(kind: &OperationKind) -> String {
    match kind {
        OperationKind::Carjacking => "Boost a Ride".to_string(),
        OperationKind::GoodsSmuggling => "Move Contraband".to_string(),
        OperationKind::DrugTrafficking => "Run Product Uptown".to_string(),
        OperationKind::OfficialBribing => "Grease a Palm".to_string(),
        OperationKind::IntelligenceGathering => "Case a Rival".to_string(),
        OperationKind::CrewRecruitment => "Recruit Muscle".to_string(),
        OperationKind::Custom(s) => s.replace('_', " "),
    }
}

fn success_line(kind: &OperationKind) -> &'static str {
    match kind {
        OperationKind::Carjacking => "The cars are in the garage and the plates are already swapped.",
        OperationKind::GoodsSmuggling => "The shipment made it through without a second look.",
        OperationKind::DrugTrafficking => "The product moved and the money came back clean.",
        OperationKind::OfficialBribing => "The official is now a friend of the family.",
        OperationKind::IntelligenceGathering => "Your people came back with everything you needed.",
        OperationKind::CrewRecruitment => "New faces have joined the crew.",
        OperationKind::Custom(_) => "The job went off without a hitch.",
    }
}

fn failure_line(kind: &OperationKind) -> &'static str {
    match kind {
        OperationKind::Carjacking => "The owner came back early and the cops were right behind him.",
        OperationKind::GoodsSmuggling => "Customs seized the shipment at the docks.",
        OperationKind::DrugTrafficking => "A rival crew hit the handoff.",
        OperationKind::OfficialBribing => "The official refused and reported the offer.",
        OperationKind::IntelligenceGathering => "Your people were spotted and had to run.",
        OperationKind::CrewRecruitment => "Word got out and the recruits never showed.",
        OperationKind::Custom(_) => "Something went wrong and everyone scattered.",
    }
}

fn format_duration(secs: i64) -> String {
    match secs {
        s if s < 60 => format!("{s} seconds"),
        s if s < 3600 => format!("{} minutes", s / 60),
        s => format!("{} hours {} minutes", s / 3600, (s % 3600) / 60),
    }
}
