use std::time::Duration;

use syndicate::config::AppConfig;
use syndicate::model::{OperationKind, ResourceKind, Title};

fn shipped() -> AppConfig {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/game.yaml");
    let text = std::fs::read_to_string(path).unwrap();
    AppConfig::from_yaml(&text).unwrap()
}

#[test]
fn shipped_config_parses_and_validates() {
    let config = shipped();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.database.max_connections, 10);

    let game = &config.game;
    assert_eq!(game.daily_operations_count, 5);
    assert_eq!(game.special_operations_count, 2);
    assert_eq!(game.operations_refresh(), Duration::from_secs(1440 * 60));
    assert_eq!(game.income_tick(), Duration::from_secs(1));
    assert_eq!(game.market.interval(), Duration::from_secs(3600));

    let vehicles = game.market.bounds(ResourceKind::Vehicles).unwrap();
    assert_eq!((vehicles.base, vehicles.min, vehicles.max), (5000, 2500, 10000));
    assert_eq!(game.resource_limit.initial_money, 10_000);
    assert_eq!(game.travel.minimum_fine, 500);
}

#[test]
fn shipped_pool_has_basic_and_special_templates() {
    let pool = shipped().game.operation_pool;
    assert_eq!(pool.basic.len(), 4);
    assert_eq!(pool.special.len(), 1);
    assert_eq!(pool.basic[0].kind, OperationKind::Carjacking);

    let bribe = &pool.special[0];
    assert_eq!(bribe.kind, OperationKind::OfficialBribing);
    assert_eq!(bribe.requirements.min_title, Some(Title::Capo));
    assert_eq!(bribe.requirements.min_influence, 20);
    assert_eq!(bribe.resources.money, 5000);
    assert_eq!(bribe.rewards.heat_reduction, 10);
}

#[test]
fn every_template_has_a_sane_rate_and_duration() {
    let pool = shipped().game.operation_pool;
    for t in pool.basic.iter().chain(&pool.special) {
        assert!((0..=100).contains(&t.success_rate), "{}", t.name);
        assert!(t.duration_secs > 0, "{}", t.name);
    }
}
