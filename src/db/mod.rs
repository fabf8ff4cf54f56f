pub mod memory;
pub mod migrate;
pub mod postgres;

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::{FailPoint, MemoryStore};
pub use migrate::migrate;
pub use postgres::PgStore;

use crate::error::StoreError;
use crate::model::{
    AttemptStatus, Deltas, Forces, Hotspot, MarketListing, MarketTransaction, Operation,
    OperationAttempt, Player, PriceHistory, Region, ResourceKind, TerritoryAction, Title,
    TravelAttempt,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary of the game core.
///
/// Counter mutations (`apply_resources`, `update_player_resource`,
/// `update_hotspot_pending_collection`) are expressed as storage-side
/// increments, never read-modify-write, so concurrent callers serialize on the
/// row. Lookups return `Ok(None)` for missing rows; only infrastructure
/// failures are errors.
pub trait Store: Send + Sync + 'static {
    // -- players --

    fn insert_player(&self, player: &Player) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_player(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<Player>>> + Send;

    /// Apply every delta as `max(0, current + delta)` in one atomic write and
    /// stamp `last_active`. Returns the post-state, or `None` for an unknown player.
    fn apply_resources(
        &self,
        id: Uuid,
        deltas: &Deltas,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<Player>>> + Send;

    /// Single-counter form of [`Store::apply_resources`]. Returns false for an unknown player.
    fn update_player_resource(
        &self,
        id: Uuid,
        kind: ResourceKind,
        delta: i64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    fn update_player_title(
        &self,
        id: Uuid,
        title: Title,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn set_player_region(
        &self,
        id: Uuid,
        region_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    // -- regions --

    fn insert_region(&self, region: &Region) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_region(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<Region>>> + Send;

    // -- hotspots --

    fn insert_hotspot(&self, hotspot: &Hotspot) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_hotspot(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<Hotspot>>> + Send;

    /// Hand the hotspot to `controller` with `forces` as its whole allocation,
    /// provided the controller is still `expected`. Returns false when someone
    /// else changed hands first. Defense strength is derived on write.
    fn seize_hotspot(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        controller: Uuid,
        forces: Forces,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Add `forces` to the allocation as a storage-side increment, provided
    /// `controller` still holds the hotspot. Returns false otherwise.
    fn reinforce_hotspot(
        &self,
        id: Uuid,
        controller: Uuid,
        forces: Forces,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Zero `pending_collection` and stamp `last_collection_time` in one write,
    /// provided `player_id` controls the hotspot. Returns the amount taken.
    fn take_pending_collection(
        &self,
        id: Uuid,
        player_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<i64>>> + Send;

    fn update_hotspot_pending_collection(
        &self,
        id: Uuid,
        delta: i64,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn update_hotspot_last_income_time(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_all_controlled_legal_hotspots(
        &self,
    ) -> impl Future<Output = StoreResult<Vec<Hotspot>>> + Send;

    fn get_controlled_hotspots(
        &self,
        player_id: Uuid,
    ) -> impl Future<Output = StoreResult<Vec<Hotspot>>> + Send;

    /// Clear controller and allocation on every illegal hotspot. Returns rows touched.
    fn refresh_illegal_hotspots(&self) -> impl Future<Output = StoreResult<u64>> + Send;

    fn create_territory_action(
        &self,
        action: &TerritoryAction,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Newest first.
    fn recent_territory_actions(
        &self,
        player_id: Uuid,
        limit: i64,
    ) -> impl Future<Output = StoreResult<Vec<TerritoryAction>>> + Send;

    // -- operations --

    fn insert_operation(&self, op: &Operation) -> impl Future<Output = StoreResult<()>> + Send;

    fn get_operation(&self, id: Uuid)
    -> impl Future<Output = StoreResult<Option<Operation>>> + Send;

    /// Active operations with `available_until > now`.
    fn active_operations(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Vec<Operation>>> + Send;

    /// Mark operations with `available_until < now` inactive. Returns rows touched.
    fn deactivate_expired_operations(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn create_operation_attempt(
        &self,
        attempt: &OperationAttempt,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Write the terminal status, result, completion time and notified flag,
    /// provided the attempt is still in progress. Returns false when another
    /// caller resolved it first.
    fn finish_operation_attempt(
        &self,
        attempt: &OperationAttempt,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Put an attempt in `from` back in progress and clear its result.
    fn reopen_operation_attempt(
        &self,
        id: Uuid,
        from: AttemptStatus,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Set only the notified flag, and only on an in-progress attempt.
    fn mark_attempt_notified(&self, id: Uuid) -> impl Future<Output = StoreResult<bool>> + Send;

    fn get_operation_attempt(
        &self,
        id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<OperationAttempt>>> + Send;

    fn in_progress_attempts(&self) -> impl Future<Output = StoreResult<Vec<OperationAttempt>>> + Send;

    /// A player's attempts whose status is in `statuses`, newest first.
    fn player_attempts(
        &self,
        player_id: Uuid,
        statuses: &[AttemptStatus],
    ) -> impl Future<Output = StoreResult<Vec<OperationAttempt>>> + Send;

    // -- market --

    fn get_all_listings(&self) -> impl Future<Output = StoreResult<Vec<MarketListing>>> + Send;

    fn get_listing(
        &self,
        resource: ResourceKind,
    ) -> impl Future<Output = StoreResult<Option<MarketListing>>> + Send;

    fn create_listing(
        &self,
        listing: &MarketListing,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn update_listing(
        &self,
        listing: &MarketListing,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn create_price_history(
        &self,
        record: &PriceHistory,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Oldest first. `None` returns every resource.
    fn price_history(
        &self,
        resource: Option<ResourceKind>,
        since: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Vec<PriceHistory>>> + Send;

    fn create_transaction(
        &self,
        tx: &MarketTransaction,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Newest first.
    fn player_transactions(
        &self,
        player_id: Uuid,
    ) -> impl Future<Output = StoreResult<Vec<MarketTransaction>>> + Send;

    // -- travel --

    fn create_travel_attempt(
        &self,
        attempt: &TravelAttempt,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Newest first.
    fn travel_history(
        &self,
        player_id: Uuid,
        limit: i64,
    ) -> impl Future<Output = StoreResult<Vec<TravelAttempt>>> + Send;
}
