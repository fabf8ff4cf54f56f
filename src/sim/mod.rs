//! The game core: resolvers players call directly, plus the background jobs
//! that move the world between requests.

mod context;
mod job;
mod runner;

pub mod income;
pub mod ledger;
pub mod market;
pub mod odds;
pub mod operations;
pub mod players;
pub mod territory;
pub mod travel;

pub use context::GameContext;
pub use job::{BackgroundJob, IncomeJob, MarketJob, OperationsRefreshJob, OperationsSweepJob};
pub use runner::Supervisor;
