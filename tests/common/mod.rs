#![allow(dead_code)]

use syndicate::config::GameConfig;
use syndicate::db::{MemoryStore, Store};
use syndicate::model::{AttemptStatus, Envelope, EventKind, Forces, Player, ResourceKind};
use syndicate::sim::GameContext;
use syndicate::testutil::TestWorld;
use uuid::Uuid;

/// Assert every whole-world invariant the game core promises.
pub async fn assert_invariants(ctx: &GameContext<MemoryStore>) {
    let now = ctx.now();

    for p in ctx.store.players() {
        for &kind in ResourceKind::ALL {
            assert!(p.amount(kind) >= 0, "{} has negative {kind}", p.name);
        }
        assert_eq!(p.title, p.derived_title(), "{} has a stale title", p.name);
    }

    for h in ctx.store.hotspots() {
        assert_eq!(h.defense_strength, h.allocated.strength(), "{}", h.name);
        if !h.is_legal {
            assert_eq!(h.controller_id, None, "{}", h.name);
            assert_eq!(h.allocated, Forces::default(), "{}", h.name);
        }
        if let Some(t) = h.last_income_time {
            assert!(t <= now, "{} income clock is in the future", h.name);
        }
        assert!(h.pending_collection >= 0, "{}", h.name);
    }

    let config: &GameConfig = &ctx.config;
    for listing in syndicate::sim::market::listings(ctx).await.unwrap() {
        let b = config.market.bounds(listing.resource).unwrap();
        assert!(
            (b.min..=b.max).contains(&listing.price),
            "{} price {} outside bounds",
            listing.resource,
            listing.price
        );
    }

    for a in ctx.store.attempts() {
        if a.status == AttemptStatus::InProgress {
            assert!(a.completion_time.is_none());
        } else {
            let done = a.completion_time.expect("terminal attempt without completion time");
            assert!(done >= a.start_time);
        }
    }
}

pub async fn reload_by_id(w: &TestWorld, id: Uuid) -> Player {
    w.store.get_player(id).await.unwrap().unwrap()
}

pub fn kinds(events: &[Envelope]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}
