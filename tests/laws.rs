mod common;

use chrono::Duration;
use syndicate::db::Store;
use syndicate::error::GameError;
use syndicate::model::{
    AttemptStatus, Deltas, EventKind, Forces, OperationResources, ResourceKind, Title,
};
use syndicate::scenario::Scenario;
use syndicate::sim::{income, ledger, operations};

#[tokio::test]
async fn second_cancel_conflicts_without_mutation() {
    let mut s = Scenario::new();
    let player = s.player("Fredo").id();
    let committed = OperationResources {
        crew: 3,
        weapons: 1,
        vehicles: 0,
        money: 801,
    };
    let op = s.operation("Case a Rival").resources(committed).id();
    let w = s.build().await.unwrap();

    let attempt = operations::start(&w.ctx, player, op, committed).await.unwrap();
    operations::cancel(&w.ctx, player, attempt.id).await.unwrap();
    let after_first = w.store.get_player(player).await.unwrap().unwrap();

    let second = operations::cancel(&w.ctx, player, attempt.id).await;
    assert!(matches!(second, Err(GameError::Conflict(_))));

    let after_second = w.store.get_player(player).await.unwrap().unwrap();
    assert_eq!(after_first, after_second);
    let stored = w.store.get_operation_attempt(attempt.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AttemptStatus::Cancelled);
    // floor(801 / 2)
    assert_eq!(after_second.money, 10_000 - 801 + 400);
}

#[tokio::test]
async fn plus_then_minus_leaves_the_player_unchanged() {
    let mut s = Scenario::new();
    let player = s.player("Luca").money(5000).crew(4).heat(12).respect(30).id();
    let w = s.build().await.unwrap();
    let before = w.store.get_player(player).await.unwrap().unwrap();

    for kind in [
        ResourceKind::Money,
        ResourceKind::Crew,
        ResourceKind::Heat,
        ResourceKind::Respect,
    ] {
        let x = before.amount(kind) / 2 + 1;
        ledger::apply(&w.ctx, player, &Deltas::new().with(kind, x))
            .await
            .unwrap();
        ledger::apply(&w.ctx, player, &Deltas::new().with(kind, -x))
            .await
            .unwrap();
    }

    let after = w.store.get_player(player).await.unwrap().unwrap();
    for &kind in ResourceKind::ALL {
        assert_eq!(after.amount(kind), before.amount(kind), "{kind}");
    }
    assert_eq!(after.title, before.title);
}

#[tokio::test]
async fn income_accrues_whole_hours_only() {
    for elapsed_secs in [3600, 9000, 7 * 3600 + 3599, 24 * 3600] {
        let mut s = Scenario::new();
        let now = s.now();
        let owner = s.player("Clemenza").id();
        let last = now - Duration::seconds(elapsed_secs);
        let h = s
            .hotspot("Olive Oil Depot", 350)
            .controlled_by(owner, Forces::default())
            .last_income(last)
            .id();
        let w = s.build().await.unwrap();

        income::accrue(&w.ctx).await.unwrap();

        let whole = elapsed_secs / 3600;
        let hotspot = w.store.get_hotspot(h).await.unwrap().unwrap();
        assert_eq!(hotspot.pending_collection, whole * 350, "{elapsed_secs}s");
        assert_eq!(
            hotspot.last_income_time,
            Some(last + Duration::hours(whole)),
            "{elapsed_secs}s"
        );
    }
}

#[tokio::test]
async fn titles_follow_the_band_table() {
    let mut s = Scenario::new();
    let player = s.player("Vito").id();
    let w = s.build().await.unwrap();
    let mut sub = w.ctx.bus.subscribe(player);
    sub.drain();

    let bands = [
        (19, Title::Associate),
        (1, Title::Soldier),
        (20, Title::Capo),
        (20, Title::Underboss),
        (20, Title::Consigliere),
        (20, Title::Boss),
        (49, Title::Boss),
        (1, Title::Godfather),
    ];
    for (gain, expected) in bands {
        let p = ledger::apply(&w.ctx, player, &Deltas::new().with(ResourceKind::Respect, gain))
            .await
            .unwrap();
        assert_eq!(p.title, expected, "at score {}", p.score());
        let stored = w.store.get_player(player).await.unwrap().unwrap();
        assert_eq!(stored.title, expected);
    }

    // six promotions, one notice each
    let notices = sub
        .drain()
        .into_iter()
        .filter(|e| e.kind == EventKind::Notification)
        .count();
    assert_eq!(notices, 6);

    // influence counts toward the score too, and demotion works
    let p = ledger::apply(
        &w.ctx,
        player,
        &Deltas::new()
            .with(ResourceKind::Respect, -150)
            .with(ResourceKind::Influence, 45),
    )
    .await
    .unwrap();
    assert_eq!(p.title, Title::Capo);
}
