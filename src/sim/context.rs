use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::config::GameConfig;
use crate::db::Store;
use crate::dice::Dice;

/// Everything a resolver or background job needs, bundled so new
/// collaborators can be added without touching every signature.
pub struct GameContext<S: Store> {
    pub store: Arc<S>,
    pub bus: Arc<EventBus>,
    pub dice: Arc<dyn Dice>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<GameConfig>,
}

impl<S: Store> GameContext<S> {
    pub fn new(
        store: Arc<S>,
        dice: Arc<dyn Dice>,
        clock: Arc<dyn Clock>,
        config: GameConfig,
    ) -> Self {
        let bus = Arc::new(EventBus::new(&config.events, clock.clone()));
        Self {
            store,
            bus,
            dice,
            clock,
            config: Arc::new(config),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

// Manual impl: `S` itself need not be `Clone`.
impl<S: Store> Clone for GameContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
            dice: self.dice.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}
