//! Player resource mutations.
//!
//! Every change to a player's counters goes through [`apply`], which clamps
//! at zero inside the store and keeps the rank title in step with
//! `respect + influence`.

use uuid::Uuid;

use super::context::GameContext;
use crate::db::Store;
use crate::error::{GameError, GameResult};
use crate::model::{Deltas, NotificationCategory, Player};

/// Apply `deltas` atomically and return the post-state.
///
/// A title change is persisted and announced with a `notification` event.
/// Title bookkeeping failures are logged rather than surfaced: the resource
/// write has already committed and callers must not compensate for it.
pub async fn apply<S: Store>(
    ctx: &GameContext<S>,
    player_id: Uuid,
    deltas: &Deltas,
) -> GameResult<Player> {
    let mut player = ctx
        .store
        .apply_resources(player_id, deltas, ctx.now())
        .await?
        .ok_or_else(|| GameError::not_found("player", player_id))?;

    let derived = player.derived_title();
    if derived != player.title {
        let previous = player.title;
        match ctx.store.update_player_title(player_id, derived).await {
            Ok(()) => {
                player.title = derived;
                let verb = if derived > previous { "promoted" } else { "demoted" };
                tracing::info!(player_id = %player_id, from = %previous, to = %derived, "title changed");
                ctx.bus.notify(
                    player_id,
                    NotificationCategory::Progression,
                    "Title changed",
                    &format!("You have been {verb} to {derived}"),
                );
            }
            Err(e) => {
                tracing::error!(player_id = %player_id, error = %e, "failed to persist title");
            }
        }
    }
    Ok(player)
}

/// Compensating apply used on failure paths. Errors are logged, never surfaced.
pub async fn refund<S: Store>(ctx: &GameContext<S>, player_id: Uuid, deltas: &Deltas, reason: &str) {
    if deltas.is_empty() {
        return;
    }
    match apply(ctx, player_id, deltas).await {
        Ok(_) => {
            tracing::warn!(player_id = %player_id, reason, "committed resources refunded");
        }
        Err(e) => {
            tracing::error!(
                player_id = %player_id,
                reason,
                error = %e,
                "refund failed, player state is inconsistent"
            );
        }
    }
}
