#[macro_use]
mod macros;

pub mod event;
pub mod hotspot;
pub mod market;
pub mod operation;
pub mod player;
pub mod travel;

pub use event::{Envelope, EventKind, NotificationCategory};
pub use hotspot::{
    ActionKind, ActionResult, CollectAllResponse, CollectResponse, Forces, Hotspot,
    TerritoryAction,
};
pub use market::{MarketListing, MarketTransaction, PriceHistory, TransactionKind, Trend};
pub use operation::{
    AttemptStatus, Operation, OperationAttempt, OperationKind, OperationOffer, OperationResources,
    OperationResult, Requirements, Rewards, Risks,
};
pub use player::{Deltas, Player, PlayerView, ResourceKind, Title};
pub use travel::{Region, TravelAttempt, TravelOutcome};
