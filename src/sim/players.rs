use uuid::Uuid;

use super::context::GameContext;
use crate::db::Store;
use crate::error::{GameError, GameResult};
use crate::model::{Player, PlayerView};

/// Create a player with the configured starting resources.
pub async fn register<S: Store>(ctx: &GameContext<S>, name: &str) -> GameResult<Player> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::invalid("player name cannot be empty"));
    }
    let player = Player::starting(name, &ctx.config.resource_limit, ctx.now());
    ctx.store.insert_player(&player).await?;
    tracing::info!(player_id = %player.id, name, "player registered");
    Ok(player)
}

/// A player plus the territory aggregates derived from the hotspots they control.
pub async fn get_player<S: Store>(ctx: &GameContext<S>, player_id: Uuid) -> GameResult<PlayerView> {
    let player = ctx
        .store
        .get_player(player_id)
        .await?
        .ok_or_else(|| GameError::not_found("player", player_id))?;
    let hotspots = ctx.store.get_controlled_hotspots(player_id).await?;

    let hourly_revenue = hotspots.iter().filter(|h| h.is_legal).map(|h| h.income).sum();
    let pending_collections = hotspots.iter().map(|h| h.pending_collection).sum();
    Ok(PlayerView {
        player,
        controlled_hotspots: hotspots.len() as i64,
        hourly_revenue,
        pending_collections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Forces, Hotspot};
    use crate::testutil::{TestWorld, test_world};

    #[tokio::test]
    async fn view_sums_controlled_hotspots() {
        let TestWorld { ctx, store, .. } = test_world();
        let player = register(&ctx, "Sonny").await.unwrap();

        let mut bakery = Hotspot::new("Corleone Bakery", "New York", "bakery", true, 300);
        bakery.seize(player.id, Forces::new(1, 0, 0));
        bakery.pending_collection = 900;
        let mut bar = Hotspot::new("Havana Bar", "New York", "bar", true, 200);
        bar.seize(player.id, Forces::default());
        bar.pending_collection = 100;
        let rival = Hotspot::new("Tattaglia Club", "New York", "club", true, 1000);
        for h in [&bakery, &bar, &rival] {
            store.insert_hotspot(h).await.unwrap();
        }

        let view = get_player(&ctx, player.id).await.unwrap();
        assert_eq!(view.controlled_hotspots, 2);
        assert_eq!(view.hourly_revenue, 500);
        assert_eq!(view.pending_collections, 1000);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["name"], "Sonny");
        assert_eq!(json["hourlyRevenue"], 500);
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let TestWorld { ctx, .. } = test_world();
        assert!(matches!(
            register(&ctx, "   ").await,
            Err(GameError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let TestWorld { ctx, .. } = test_world();
        assert!(matches!(
            get_player(&ctx, Uuid::new_v4()).await,
            Err(GameError::NotFound { entity: "player", .. })
        ));
    }
}
