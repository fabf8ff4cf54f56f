use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::clock::ManualClock;
use crate::config::GameConfig;
use crate::db::{MemoryStore, Store};
use crate::dice::Dice;
use crate::model::Player;
use crate::sim::GameContext;

/// 2023-11-14T22:13:20Z. Every test world starts here.
pub const T0_SECS: i64 = 1_700_000_000;

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(T0_SECS, 0).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Scripted dice
// ---------------------------------------------------------------------------

/// Dice that replay a queue of unit rolls, then fall back to a fixed value.
pub struct ScriptedDice {
    rolls: Mutex<VecDeque<f64>>,
    fallback: Mutex<f64>,
    consumed: Mutex<usize>,
}

impl ScriptedDice {
    pub fn new(rolls: impl IntoIterator<Item = f64>) -> Self {
        Self {
            rolls: Mutex::new(rolls.into_iter().collect()),
            fallback: Mutex::new(0.5),
            consumed: Mutex::new(0),
        }
    }

    pub fn push(&self, rolls: impl IntoIterator<Item = f64>) {
        self.rolls.lock().unwrap().extend(rolls);
    }

    /// Value returned once the queue is empty.
    pub fn set_fallback(&self, v: f64) {
        *self.fallback.lock().unwrap() = v;
    }

    pub fn remaining(&self) -> usize {
        self.rolls.lock().unwrap().len()
    }

    /// Rolls drawn so far, queued or fallback.
    pub fn consumed(&self) -> usize {
        *self.consumed.lock().unwrap()
    }
}

impl Dice for ScriptedDice {
    fn unit(&self) -> f64 {
        *self.consumed.lock().unwrap() += 1;
        match self.rolls.lock().unwrap().pop_front() {
            Some(v) => v,
            None => *self.fallback.lock().unwrap(),
        }
    }
}

/// The unit roll that makes `d(sides)` land on `face`.
pub fn die(face: i64, sides: i64) -> f64 {
    (face as f64 + 0.5) / sides as f64
}

// ---------------------------------------------------------------------------
// Worlds
// ---------------------------------------------------------------------------

/// An in-memory game with handles to every injected collaborator.
pub struct TestWorld {
    pub ctx: GameContext<MemoryStore>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub dice: Arc<ScriptedDice>,
}

pub fn test_world() -> TestWorld {
    test_world_with(GameConfig::default())
}

pub fn test_world_with(config: GameConfig) -> TestWorld {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(fixed_time()));
    let dice = Arc::new(ScriptedDice::new([]));
    let ctx = GameContext::new(store.clone(), dice.clone(), clock.clone(), config);
    TestWorld {
        ctx,
        store,
        clock,
        dice,
    }
}

/// Register a player with the configured starting resources.
pub async fn add_player<S: Store>(ctx: &GameContext<S>, name: &str) -> Player {
    let player = Player::starting(name, &ctx.config.resource_limit, ctx.now());
    ctx.store.insert_player(&player).await.unwrap();
    player
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn die_maps_to_the_requested_face() {
        let dice = ScriptedDice::new([die(0, 11), die(10, 11), die(3, 4)]);
        assert_eq!(dice.below(11), 0);
        assert_eq!(dice.below(11), 10);
        assert_eq!(dice.below(4), 3);
    }

    #[test]
    fn falls_back_when_empty() {
        let dice = ScriptedDice::new([0.1]);
        assert_eq!(dice.unit(), 0.1);
        assert_eq!(dice.unit(), 0.5);
        dice.set_fallback(0.99);
        assert_eq!(dice.unit(), 0.99);
        assert_eq!(dice.consumed(), 3);
    }
}
