pub mod bus;
pub mod clock;
pub mod config;
pub mod db;
pub mod dice;
pub mod error;
pub mod model;
pub mod scenario;
pub mod sim;
pub mod testutil;

pub use bus::EventBus;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, GameConfig};
pub use db::{MemoryStore, PgStore, Store};
pub use dice::{Dice, SeededDice};
pub use error::{GameError, GameResult, StoreError};
pub use sim::{GameContext, Supervisor};
