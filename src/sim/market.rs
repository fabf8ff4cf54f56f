//! Market price walk and resource trading.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use super::context::GameContext;
use super::ledger;
use crate::config::PriceBounds;
use crate::db::Store;
use crate::dice::Dice;
use crate::error::{GameError, GameResult};
use crate::model::{
    Deltas, EventKind, MarketListing, MarketTransaction, PriceHistory, ResourceKind,
    TransactionKind, Trend,
};

// ---------------------------------------------------------------------------
// Price walk
// ---------------------------------------------------------------------------

/// Price after one fluctuation step, with its trend and rounded percentage.
pub fn fluctuate(price: i64, fraction: f64, bounds: PriceBounds) -> (i64, Trend, i64) {
    let moved = (price as f64 * (1.0 + fraction)).round() as i64;
    let next = moved.clamp(bounds.min, bounds.max);
    let pct = (fraction.abs() * 100.0).round() as i64;
    (next, Trend::from_change(fraction), pct)
}

fn draw_fraction(dice: &dyn Dice, range_pct: i64) -> f64 {
    let span = range_pct as f64 / 100.0;
    dice.uniform(-span, span)
}

async fn seed_listings<S: Store>(
    ctx: &GameContext<S>,
    now: DateTime<Utc>,
) -> GameResult<Vec<MarketListing>> {
    let mut created = Vec::new();
    for kind in ResourceKind::TRADABLE {
        let Some(bounds) = ctx.config.market.bounds(kind) else {
            continue;
        };
        let listing = MarketListing {
            id: Uuid::new_v4(),
            resource: kind,
            price: bounds.base,
            trend: Trend::Stable,
            trend_percentage: 0,
            updated_at: now,
        };
        ctx.store.create_listing(&listing).await?;
        ctx.store
            .create_price_history(&PriceHistory::record(kind, bounds.base, now))
            .await?;
        created.push(listing);
    }
    tracing::info!(listings = created.len(), "market listings created");
    Ok(created)
}

/// One market tick: seed listings if none exist, then move every price.
pub async fn update_prices<S: Store>(ctx: &GameContext<S>) -> GameResult<Vec<MarketListing>> {
    let now = ctx.now();
    let mut listings = ctx.store.get_all_listings().await?;
    if listings.is_empty() {
        listings = seed_listings(ctx, now).await?;
    }

    let range = ctx.config.market.price_fluctuation_range;
    let mut updated = Vec::with_capacity(listings.len());
    for mut listing in listings {
        let Some(bounds) = ctx.config.market.bounds(listing.resource) else {
            tracing::warn!(resource = %listing.resource, "no configured prices, listing left as is");
            updated.push(listing);
            continue;
        };
        let fraction = draw_fraction(ctx.dice.as_ref(), range);
        let (price, trend, pct) = fluctuate(listing.price, fraction, bounds);
        listing.price = price;
        listing.trend = trend;
        listing.trend_percentage = pct;
        listing.updated_at = now;

        if let Err(e) = ctx.store.update_listing(&listing).await {
            tracing::warn!(resource = %listing.resource, error = %e, "listing update failed");
            continue;
        }
        if let Err(e) = ctx
            .store
            .create_price_history(&PriceHistory::record(listing.resource, price, now))
            .await
        {
            tracing::error!(resource = %listing.resource, error = %e, "price history not recorded");
        }
        updated.push(listing);
    }

    ctx.bus.publish_all(
        EventKind::MarketUpdated,
        json!({ "listings": updated, "timestamp": now.to_rfc3339() }),
    );
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

fn check_order(kind: ResourceKind, quantity: i64) -> GameResult<()> {
    if !kind.is_tradable() {
        return Err(GameError::invalid(format!("{kind} is not traded on the market")));
    }
    if quantity <= 0 {
        return Err(GameError::invalid("quantity must be positive"));
    }
    Ok(())
}

async fn current_listing<S: Store>(
    ctx: &GameContext<S>,
    kind: ResourceKind,
) -> GameResult<MarketListing> {
    ctx.store
        .get_listing(kind)
        .await?
        .ok_or_else(|| GameError::invalid(format!("no market listing for {kind}")))
}

async fn settle<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    deltas: Deltas,
    tx: MarketTransaction,
) -> GameResult<MarketTransaction> {
    ledger::apply(ctx, player_id, &deltas).await?;
    if let Err(e) = ctx.store.create_transaction(&tx).await {
        tracing::error!(player_id = %player_id, resource = %tx.resource, error = %e, "transaction not recorded");
        ledger::refund(ctx, player_id, &deltas.negated(), "transaction not recorded").await;
        return Err(e.into());
    }
    tracing::debug!(
        player_id = %player_id,
        resource = %tx.resource,
        quantity = tx.quantity,
        total = tx.total,
        kind = %tx.kind,
        "market trade"
    );
    Ok(tx)
}

pub async fn buy<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    kind: ResourceKind,
    quantity: i64,
) -> GameResult<MarketTransaction> {
    check_order(kind, quantity)?;
    let listing = current_listing(ctx, kind).await?;
    let player = ctx
        .store
        .get_player(player_id)
        .await?
        .ok_or_else(|| GameError::not_found("player", player_id))?;

    let cost = listing
        .price
        .checked_mul(quantity)
        .ok_or_else(|| GameError::invalid("quantity out of range"))?;
    if player.money < cost {
        return Err(GameError::invalid("not enough money"));
    }
    if let Some(cap) = player.capacity(kind)
        && player
            .amount(kind)
            .checked_add(quantity)
            .ok_or_else(|| GameError::invalid("quantity out of range"))?
            > cap
    {
        return Err(GameError::invalid(format!(
            "purchase would exceed your {kind} capacity of {cap}"
        )));
    }

    let deltas = Deltas::new()
        .with(ResourceKind::Money, -cost)
        .with(kind, quantity);
    let tx = MarketTransaction {
        id: Uuid::new_v4(),
        player_id,
        resource: kind,
        quantity,
        price: listing.price,
        total: cost,
        kind: TransactionKind::Buy,
        timestamp: ctx.now(),
    };
    settle(ctx, player_id, deltas, tx).await
}

pub async fn sell<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    kind: ResourceKind,
    quantity: i64,
) -> GameResult<MarketTransaction> {
    check_order(kind, quantity)?;
    let listing = current_listing(ctx, kind).await?;
    let player = ctx
        .store
        .get_player(player_id)
        .await?
        .ok_or_else(|| GameError::not_found("player", player_id))?;
    if player.amount(kind) < quantity {
        return Err(GameError::invalid(format!("not enough {kind} to sell")));
    }

    let value = listing
        .price
        .checked_mul(quantity)
        .ok_or_else(|| GameError::invalid("quantity out of range"))?;
    let deltas = Deltas::new()
        .with(ResourceKind::Money, value)
        .with(kind, -quantity);
    let tx = MarketTransaction {
        id: Uuid::new_v4(),
        player_id,
        resource: kind,
        quantity,
        price: listing.price,
        total: value,
        kind: TransactionKind::Sell,
        timestamp: ctx.now(),
    };
    settle(ctx, player_id, deltas, tx).await
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub async fn listings<S: Store>(ctx: &GameContext<S>) -> GameResult<Vec<MarketListing>> {
    Ok(ctx.store.get_all_listings().await?)
}

/// Price records from the last `days` days, oldest first. `None` covers every resource.
pub async fn price_history<S: Store>(
    ctx: &GameContext<S>,
    kind: Option<ResourceKind>,
    days: i64,
) -> GameResult<Vec<PriceHistory>> {
    if days <= 0 {
        return Err(GameError::invalid("days must be positive"));
    }
    let since = ctx.now() - Duration::days(days);
    Ok(ctx.store.price_history(kind, since).await?)
}

pub async fn transactions<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
) -> GameResult<Vec<MarketTransaction>> {
    Ok(ctx.store.player_transactions(player_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FailPoint;
    use crate::dice::SeededDice;
    use crate::testutil::{TestWorld, add_player, test_world};

    const CREW: PriceBounds = PriceBounds {
        base: 1000,
        min: 500,
        max: 2000,
    };

    #[test]
    fn fluctuation_rounds_and_labels() {
        assert_eq!(fluctuate(1000, 0.034, CREW), (1034, Trend::Up, 3));
        assert_eq!(fluctuate(1000, -0.046, CREW), (954, Trend::Down, 5));
        assert_eq!(fluctuate(1000, 0.0, CREW), (1000, Trend::Stable, 0));
    }

    #[test]
    fn fluctuation_clamps_to_bounds() {
        assert_eq!(fluctuate(1990, 0.05, CREW).0, 2000);
        assert_eq!(fluctuate(510, -0.05, CREW).0, 500);
    }

    #[test]
    fn long_walk_stays_in_bounds() {
        let dice = SeededDice::new(17);
        let mut price = CREW.base;
        for _ in 0..10_000 {
            let before = price;
            price = fluctuate(price, draw_fraction(&dice, 5), CREW).0;
            assert!((CREW.min..=CREW.max).contains(&price));
            let step = (price - before).abs() as f64;
            assert!(step <= before as f64 * 0.05 + 0.5);
        }
    }

    #[tokio::test]
    async fn first_tick_seeds_listings_and_history() {
        let TestWorld { ctx, store, .. } = test_world();
        let updated = update_prices(&ctx).await.unwrap();
        assert_eq!(updated.len(), 3);
        for l in &updated {
            let b = ctx.config.market.bounds(l.resource).unwrap();
            assert!((b.min..=b.max).contains(&l.price));
        }
        // seed record plus one per tick
        let since = ctx.now() - Duration::seconds(1);
        let history = store.price_history(None, since).await.unwrap();
        assert_eq!(history.len(), 6);
    }

    #[tokio::test]
    async fn tick_publishes_to_everyone() {
        let TestWorld { ctx, .. } = test_world();
        let a = add_player(&ctx, "Luca").await;
        let b = add_player(&ctx, "Paulie").await;
        let mut sa = ctx.bus.subscribe(a.id);
        let mut sb = ctx.bus.subscribe(b.id);
        update_prices(&ctx).await.unwrap();
        for sub in [&mut sa, &mut sb] {
            assert!(sub.drain().iter().any(|e| e.kind == EventKind::MarketUpdated));
        }
    }

    #[tokio::test]
    async fn buy_debits_money_and_credits_units() {
        let TestWorld { ctx, dice, .. } = test_world();
        dice.set_fallback(0.5); // zero move
        update_prices(&ctx).await.unwrap();
        let p = add_player(&ctx, "Rocco").await;

        let tx = buy(&ctx, p.id, ResourceKind::Weapons, 4).await.unwrap();
        assert_eq!(tx.price, 500);
        assert_eq!(tx.total, 2000);
        let after = ctx.store.get_player(p.id).await.unwrap().unwrap();
        assert_eq!(after.money, p.money - 2000);
        assert_eq!(after.weapons, p.weapons + 4);
        assert_eq!(transactions(&ctx, p.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn buy_respects_money_and_capacity() {
        let TestWorld { ctx, .. } = test_world();
        update_prices(&ctx).await.unwrap();
        let p = add_player(&ctx, "Rocco").await;

        let broke = buy(&ctx, p.id, ResourceKind::Vehicles, 100).await;
        assert!(matches!(broke, Err(GameError::InvalidRequest(_))));

        ctx.store
            .apply_resources(p.id, &Deltas::new().with(ResourceKind::Money, 1_000_000), ctx.now())
            .await
            .unwrap();
        let over = buy(&ctx, p.id, ResourceKind::Crew, p.max_crew).await;
        assert!(matches!(over, Err(GameError::InvalidRequest(m)) if m.contains("capacity")));
    }

    #[tokio::test]
    async fn oversized_buy_is_rejected_without_charge() {
        let TestWorld { ctx, .. } = test_world();
        update_prices(&ctx).await.unwrap();
        let p = add_player(&ctx, "Rocco").await;

        for quantity in [i64::MAX / 2, i64::MAX] {
            let err = buy(&ctx, p.id, ResourceKind::Crew, quantity).await;
            assert!(matches!(err, Err(GameError::InvalidRequest(m)) if m.contains("out of range")));
        }
        let after = ctx.store.get_player(p.id).await.unwrap().unwrap();
        assert_eq!(after.money, p.money);
        assert_eq!(after.crew, p.crew);
        assert!(transactions(&ctx, p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sell_requires_holdings() {
        let TestWorld { ctx, .. } = test_world();
        update_prices(&ctx).await.unwrap();
        let p = add_player(&ctx, "Rocco").await;
        assert!(sell(&ctx, p.id, ResourceKind::Crew, p.crew + 1).await.is_err());
        let tx = sell(&ctx, p.id, ResourceKind::Crew, 1).await.unwrap();
        let after = ctx.store.get_player(p.id).await.unwrap().unwrap();
        assert_eq!(after.crew, p.crew - 1);
        assert_eq!(after.money, p.money + tx.total);
    }

    #[tokio::test]
    async fn unrecorded_trade_is_reversed() {
        let TestWorld { ctx, store, .. } = test_world();
        update_prices(&ctx).await.unwrap();
        let p = add_player(&ctx, "Rocco").await;

        store.fail_next(FailPoint::CreateTransaction);
        let err = buy(&ctx, p.id, ResourceKind::Weapons, 1).await.unwrap_err();
        assert!(matches!(err, GameError::Storage(_)));
        let after = store.get_player(p.id).await.unwrap().unwrap();
        assert_eq!(after.money, p.money);
        assert_eq!(after.weapons, p.weapons);
    }

    #[tokio::test]
    async fn orders_are_validated() {
        let TestWorld { ctx, .. } = test_world();
        let p = add_player(&ctx, "Rocco").await;
        assert!(buy(&ctx, p.id, ResourceKind::Crew, 1).await.is_err()); // no listings yet
        update_prices(&ctx).await.unwrap();
        assert!(buy(&ctx, p.id, ResourceKind::Crew, 0).await.is_err());
        assert!(buy(&ctx, p.id, ResourceKind::Respect, 1).await.is_err());
        assert!(price_history(&ctx, None, 0).await.is_err());
        assert_eq!(
            price_history(&ctx, Some(ResourceKind::Crew), 1).await.unwrap().len(),
            2
        );
    }
}
