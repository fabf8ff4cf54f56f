use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::error::StoreError;
use crate::model::{
    AttemptStatus, Deltas, Forces, Hotspot, MarketListing, MarketTransaction, Operation,
    OperationAttempt, Player, PriceHistory, Region, ResourceKind, TerritoryAction, Title,
    TravelAttempt,
};

/// Store calls that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ApplyResources,
    UpdateHotspot,
    TakePendingCollection,
    UpdatePendingCollection,
    UpdateLastIncomeTime,
    CreateTerritoryAction,
    CreateOperationAttempt,
    UpdateOperationAttempt,
    UpdateListing,
    CreateTransaction,
    CreateTravelAttempt,
    SetPlayerRegion,
}

impl FailPoint {
    fn label(self) -> &'static str {
        match self {
            FailPoint::ApplyResources => "apply_resources",
            FailPoint::UpdateHotspot => "hotspot_control",
            FailPoint::TakePendingCollection => "take_pending_collection",
            FailPoint::UpdatePendingCollection => "update_hotspot_pending_collection",
            FailPoint::UpdateLastIncomeTime => "update_hotspot_last_income_time",
            FailPoint::CreateTerritoryAction => "create_territory_action",
            FailPoint::CreateOperationAttempt => "create_operation_attempt",
            FailPoint::UpdateOperationAttempt => "operation_attempt_status",
            FailPoint::UpdateListing => "update_listing",
            FailPoint::CreateTransaction => "create_transaction",
            FailPoint::CreateTravelAttempt => "create_travel_attempt",
            FailPoint::SetPlayerRegion => "set_player_region",
        }
    }
}

#[derive(Default)]
struct Tables {
    players: HashMap<Uuid, Player>,
    regions: HashMap<Uuid, Region>,
    hotspots: HashMap<Uuid, Hotspot>,
    actions: Vec<TerritoryAction>,
    operations: HashMap<Uuid, Operation>,
    attempts: Vec<OperationAttempt>,
    listings: BTreeMap<ResourceKind, MarketListing>,
    history: Vec<PriceHistory>,
    transactions: Vec<MarketTransaction>,
    travel: Vec<TravelAttempt>,
}

/// In-process [`Store`] used by tests and scenario runs.
///
/// Every method takes the table lock once and releases it before returning,
/// so each call is atomic the way a single SQL statement is.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Remaining successful calls before the armed fault fires.
    faults: Mutex<HashMap<FailPoint, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call at `point` fail.
    pub fn fail_next(&self, point: FailPoint) {
        self.fail_after(point, 0);
    }

    /// Let `skip` calls at `point` succeed, then fail the one after.
    pub fn fail_after(&self, point: FailPoint, skip: usize) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(point, skip);
    }

    fn check(&self, point: FailPoint) -> StoreResult<()> {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        match faults.get_mut(&point) {
            Some(0) => {
                faults.remove(&point);
                Err(StoreError::Injected(point.label()))
            }
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of every hotspot, ordered by name.
    pub fn hotspots(&self) -> Vec<Hotspot> {
        let mut all: Vec<Hotspot> = self.tables().hotspots.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Snapshot of every territory action in insertion order.
    pub fn territory_actions(&self) -> Vec<TerritoryAction> {
        self.tables().actions.clone()
    }

    /// Snapshot of every operation, active or not.
    pub fn operations(&self) -> Vec<Operation> {
        let mut all: Vec<Operation> = self.tables().operations.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn travel_attempts(&self) -> Vec<TravelAttempt> {
        self.tables().travel.clone()
    }

    pub fn players(&self) -> Vec<Player> {
        self.tables().players.values().cloned().collect()
    }

    /// Snapshot of every operation attempt in insertion order.
    pub fn attempts(&self) -> Vec<OperationAttempt> {
        self.tables().attempts.clone()
    }
}

fn newest_first<T>(mut rows: Vec<T>, at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.reverse();
    rows.sort_by_key(|r| std::cmp::Reverse(at(r)));
    rows
}

fn check_hotspot(h: &Hotspot) -> StoreResult<()> {
    if h.allocated.is_negative() || h.pending_collection < 0 {
        return Err(StoreError::Constraint(format!(
            "hotspot {} has negative counters",
            h.id
        )));
    }
    if !h.is_legal && (h.controller_id.is_some() || !h.allocated.is_zero()) {
        return Err(StoreError::Constraint(format!(
            "illegal hotspot {} cannot be controlled",
            h.id
        )));
    }
    Ok(())
}

fn duplicate(entity: &str, id: Uuid) -> StoreError {
    StoreError::Constraint(format!("duplicate {entity} {id}"))
}

impl Store for MemoryStore {
    async fn insert_player(&self, player: &Player) -> StoreResult<()> {
        let mut t = self.tables();
        if t.players.contains_key(&player.id) {
            return Err(duplicate("player", player.id));
        }
        t.players.insert(player.id, player.clone());
        Ok(())
    }

    async fn get_player(&self, id: Uuid) -> StoreResult<Option<Player>> {
        Ok(self.tables().players.get(&id).cloned())
    }

    async fn apply_resources(
        &self,
        id: Uuid,
        deltas: &Deltas,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Player>> {
        self.check(FailPoint::ApplyResources)?;
        let mut t = self.tables();
        let Some(player) = t.players.get_mut(&id) else {
            return Ok(None);
        };
        player.apply_clamped(deltas);
        player.last_active = Some(now);
        Ok(Some(player.clone()))
    }

    async fn update_player_resource(
        &self,
        id: Uuid,
        kind: ResourceKind,
        delta: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut t = self.tables();
        let Some(player) = t.players.get_mut(&id) else {
            return Ok(false);
        };
        player.apply_clamped(&Deltas::new().with(kind, delta));
        player.last_active = Some(now);
        Ok(true)
    }

    async fn update_player_title(&self, id: Uuid, title: Title) -> StoreResult<()> {
        if let Some(player) = self.tables().players.get_mut(&id) {
            player.title = title;
        }
        Ok(())
    }

    async fn set_player_region(
        &self,
        id: Uuid,
        region_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check(FailPoint::SetPlayerRegion)?;
        if let Some(player) = self.tables().players.get_mut(&id) {
            player.current_region_id = Some(region_id);
            player.last_travel_time = Some(now);
            player.last_active = Some(now);
        }
        Ok(())
    }

    async fn insert_region(&self, region: &Region) -> StoreResult<()> {
        let mut t = self.tables();
        if t.regions.values().any(|r| r.name == region.name) {
            return Err(StoreError::Constraint(format!(
                "duplicate region name {}",
                region.name
            )));
        }
        t.regions.insert(region.id, region.clone());
        Ok(())
    }

    async fn get_region(&self, id: Uuid) -> StoreResult<Option<Region>> {
        Ok(self.tables().regions.get(&id).cloned())
    }

    async fn insert_hotspot(&self, hotspot: &Hotspot) -> StoreResult<()> {
        check_hotspot(hotspot)?;
        let mut t = self.tables();
        if t.hotspots.contains_key(&hotspot.id) {
            return Err(duplicate("hotspot", hotspot.id));
        }
        let mut stored = hotspot.clone();
        stored.recompute_defense();
        t.hotspots.insert(stored.id, stored);
        Ok(())
    }

    async fn get_hotspot(&self, id: Uuid) -> StoreResult<Option<Hotspot>> {
        Ok(self.tables().hotspots.get(&id).cloned())
    }

    async fn seize_hotspot(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        controller: Uuid,
        forces: Forces,
    ) -> StoreResult<bool> {
        self.check(FailPoint::UpdateHotspot)?;
        let mut t = self.tables();
        let Some(stored) = t.hotspots.get_mut(&id) else {
            return Ok(false);
        };
        if stored.controller_id != expected {
            return Ok(false);
        }
        let mut next = stored.clone();
        next.seize(controller, forces);
        check_hotspot(&next)?;
        *stored = next;
        Ok(true)
    }

    async fn reinforce_hotspot(
        &self,
        id: Uuid,
        controller: Uuid,
        forces: Forces,
    ) -> StoreResult<bool> {
        self.check(FailPoint::UpdateHotspot)?;
        let mut t = self.tables();
        let Some(stored) = t.hotspots.get_mut(&id) else {
            return Ok(false);
        };
        if !stored.is_controlled_by(controller) {
            return Ok(false);
        }
        let mut next = stored.clone();
        next.reinforce(forces);
        check_hotspot(&next)?;
        *stored = next;
        Ok(true)
    }

    async fn take_pending_collection(
        &self,
        id: Uuid,
        player_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<i64>> {
        self.check(FailPoint::TakePendingCollection)?;
        let mut t = self.tables();
        let Some(h) = t.hotspots.get_mut(&id) else {
            return Ok(None);
        };
        if !h.is_controlled_by(player_id) {
            return Ok(None);
        }
        let taken = std::mem::take(&mut h.pending_collection);
        h.last_collection_time = Some(at);
        Ok(Some(taken))
    }

    async fn update_hotspot_pending_collection(&self, id: Uuid, delta: i64) -> StoreResult<()> {
        self.check(FailPoint::UpdatePendingCollection)?;
        if let Some(h) = self.tables().hotspots.get_mut(&id) {
            h.pending_collection = (h.pending_collection + delta).max(0);
        }
        Ok(())
    }

    async fn update_hotspot_last_income_time(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check(FailPoint::UpdateLastIncomeTime)?;
        if let Some(h) = self.tables().hotspots.get_mut(&id) {
            h.last_income_time = Some(at);
        }
        Ok(())
    }

    async fn get_all_controlled_legal_hotspots(&self) -> StoreResult<Vec<Hotspot>> {
        let mut rows: Vec<Hotspot> = self
            .tables()
            .hotspots
            .values()
            .filter(|h| h.is_legal && h.controller_id.is_some())
            .cloned()
            .collect();
        rows.sort_by_key(|h| (h.controller_id, h.id));
        Ok(rows)
    }

    async fn get_controlled_hotspots(&self, player_id: Uuid) -> StoreResult<Vec<Hotspot>> {
        let mut rows: Vec<Hotspot> = self
            .tables()
            .hotspots
            .values()
            .filter(|h| h.is_controlled_by(player_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn refresh_illegal_hotspots(&self) -> StoreResult<u64> {
        let mut touched = 0;
        for h in self.tables().hotspots.values_mut().filter(|h| !h.is_legal) {
            h.release();
            touched += 1;
        }
        Ok(touched)
    }

    async fn create_territory_action(&self, action: &TerritoryAction) -> StoreResult<()> {
        self.check(FailPoint::CreateTerritoryAction)?;
        self.tables().actions.push(action.clone());
        Ok(())
    }

    async fn recent_territory_actions(
        &self,
        player_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<TerritoryAction>> {
        let rows: Vec<TerritoryAction> = self
            .tables()
            .actions
            .iter()
            .filter(|a| a.player_id == player_id)
            .cloned()
            .collect();
        let mut rows = newest_first(rows, |a| a.timestamp);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_operation(&self, op: &Operation) -> StoreResult<()> {
        let mut t = self.tables();
        if t.operations.contains_key(&op.id) {
            return Err(duplicate("operation", op.id));
        }
        t.operations.insert(op.id, op.clone());
        Ok(())
    }

    async fn get_operation(&self, id: Uuid) -> StoreResult<Option<Operation>> {
        Ok(self.tables().operations.get(&id).cloned())
    }

    async fn active_operations(&self, now: DateTime<Utc>) -> StoreResult<Vec<Operation>> {
        let mut rows: Vec<Operation> = self
            .tables()
            .operations
            .values()
            .filter(|op| op.is_available(now))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.is_special, a.available_until, &a.name).cmp(&(
                b.is_special,
                b.available_until,
                &b.name,
            ))
        });
        Ok(rows)
    }

    async fn deactivate_expired_operations(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut touched = 0;
        for op in self.tables().operations.values_mut() {
            if op.is_active && op.available_until < now {
                op.is_active = false;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn create_operation_attempt(&self, attempt: &OperationAttempt) -> StoreResult<()> {
        self.check(FailPoint::CreateOperationAttempt)?;
        let mut t = self.tables();
        if t.attempts.iter().any(|a| a.id == attempt.id) {
            return Err(duplicate("operation attempt", attempt.id));
        }
        t.attempts.push(attempt.clone());
        Ok(())
    }

    async fn finish_operation_attempt(&self, attempt: &OperationAttempt) -> StoreResult<bool> {
        self.check(FailPoint::UpdateOperationAttempt)?;
        if let Some(completion) = attempt.completion_time
            && completion < attempt.start_time
        {
            return Err(StoreError::Constraint(format!(
                "attempt {} completes before it starts",
                attempt.id
            )));
        }
        let mut t = self.tables();
        let Some(stored) = t
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt.id && a.status == AttemptStatus::InProgress)
        else {
            return Ok(false);
        };
        stored.status = attempt.status;
        stored.result = attempt.result.clone();
        stored.completion_time = attempt.completion_time;
        stored.notified = attempt.notified;
        Ok(true)
    }

    async fn reopen_operation_attempt(&self, id: Uuid, from: AttemptStatus) -> StoreResult<bool> {
        self.check(FailPoint::UpdateOperationAttempt)?;
        let mut t = self.tables();
        let Some(stored) = t
            .attempts
            .iter_mut()
            .find(|a| a.id == id && a.status == from)
        else {
            return Ok(false);
        };
        stored.status = AttemptStatus::InProgress;
        stored.result = None;
        stored.completion_time = None;
        Ok(true)
    }

    async fn mark_attempt_notified(&self, id: Uuid) -> StoreResult<bool> {
        self.check(FailPoint::UpdateOperationAttempt)?;
        let mut t = self.tables();
        let Some(stored) = t
            .attempts
            .iter_mut()
            .find(|a| a.id == id && a.status == AttemptStatus::InProgress)
        else {
            return Ok(false);
        };
        stored.notified = true;
        Ok(true)
    }

    async fn get_operation_attempt(&self, id: Uuid) -> StoreResult<Option<OperationAttempt>> {
        Ok(self.tables().attempts.iter().find(|a| a.id == id).cloned())
    }

    async fn in_progress_attempts(&self) -> StoreResult<Vec<OperationAttempt>> {
        Ok(self
            .tables()
            .attempts
            .iter()
            .filter(|a| a.status == AttemptStatus::InProgress)
            .cloned()
            .collect())
    }

    async fn player_attempts(
        &self,
        player_id: Uuid,
        statuses: &[AttemptStatus],
    ) -> StoreResult<Vec<OperationAttempt>> {
        let rows: Vec<OperationAttempt> = self
            .tables()
            .attempts
            .iter()
            .filter(|a| a.player_id == player_id && statuses.contains(&a.status))
            .cloned()
            .collect();
        Ok(newest_first(rows, |a| a.start_time))
    }

    async fn get_all_listings(&self) -> StoreResult<Vec<MarketListing>> {
        Ok(self.tables().listings.values().cloned().collect())
    }

    async fn get_listing(&self, resource: ResourceKind) -> StoreResult<Option<MarketListing>> {
        Ok(self.tables().listings.get(&resource).cloned())
    }

    async fn create_listing(&self, listing: &MarketListing) -> StoreResult<()> {
        let mut t = self.tables();
        if t.listings.contains_key(&listing.resource) {
            return Err(StoreError::Constraint(format!(
                "listing for {} already exists",
                listing.resource
            )));
        }
        t.listings.insert(listing.resource, listing.clone());
        Ok(())
    }

    async fn update_listing(&self, listing: &MarketListing) -> StoreResult<()> {
        self.check(FailPoint::UpdateListing)?;
        if let Some(stored) = self
            .tables()
            .listings
            .values_mut()
            .find(|l| l.id == listing.id)
        {
            stored.price = listing.price;
            stored.trend = listing.trend;
            stored.trend_percentage = listing.trend_percentage;
            stored.updated_at = listing.updated_at;
        }
        Ok(())
    }

    async fn create_price_history(&self, record: &PriceHistory) -> StoreResult<()> {
        self.tables().history.push(record.clone());
        Ok(())
    }

    async fn price_history(
        &self,
        resource: Option<ResourceKind>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<PriceHistory>> {
        let mut rows: Vec<PriceHistory> = self
            .tables()
            .history
            .iter()
            .filter(|h| resource.is_none_or(|r| h.resource == r) && h.timestamp > since)
            .cloned()
            .collect();
        rows.sort_by_key(|h| (h.timestamp, h.resource));
        Ok(rows)
    }

    async fn create_transaction(&self, tx: &MarketTransaction) -> StoreResult<()> {
        self.check(FailPoint::CreateTransaction)?;
        if tx.quantity <= 0 {
            return Err(StoreError::Constraint(
                "transaction quantity must be positive".to_string(),
            ));
        }
        self.tables().transactions.push(tx.clone());
        Ok(())
    }

    async fn player_transactions(&self, player_id: Uuid) -> StoreResult<Vec<MarketTransaction>> {
        let rows: Vec<MarketTransaction> = self
            .tables()
            .transactions
            .iter()
            .filter(|t| t.player_id == player_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |t| t.timestamp))
    }

    async fn create_travel_attempt(&self, attempt: &TravelAttempt) -> StoreResult<()> {
        self.check(FailPoint::CreateTravelAttempt)?;
        self.tables().travel.push(attempt.clone());
        Ok(())
    }

    async fn travel_history(&self, player_id: Uuid, limit: i64) -> StoreResult<Vec<TravelAttempt>> {
        let rows: Vec<TravelAttempt> = self
            .tables()
            .travel
            .iter()
            .filter(|t| t.player_id == player_id)
            .cloned()
            .collect();
        let mut rows = newest_first(rows, |t| t.timestamp);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceLimits;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn apply_resources_clamps_and_stamps() {
        let store = MemoryStore::new();
        let p = Player::starting("Sonny", &ResourceLimits::default(), now());
        store.insert_player(&p).await.unwrap();

        let d = Deltas::new()
            .with(ResourceKind::Money, -50_000)
            .with(ResourceKind::Heat, 4);
        let after = store.apply_resources(p.id, &d, now()).await.unwrap().unwrap();
        assert_eq!(after.money, 0);
        assert_eq!(after.heat, 4);
        assert_eq!(after.last_active, Some(now()));

        assert!(
            store
                .apply_resources(Uuid::new_v4(), &d, now())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn armed_fault_fires_once_after_skips() {
        let store = MemoryStore::new();
        let p = Player::starting("Sonny", &ResourceLimits::default(), now());
        store.insert_player(&p).await.unwrap();
        let d = Deltas::new().with(ResourceKind::Money, 1);

        store.fail_after(FailPoint::ApplyResources, 1);
        assert!(store.apply_resources(p.id, &d, now()).await.is_ok());
        assert!(matches!(
            store.apply_resources(p.id, &d, now()).await,
            Err(StoreError::Injected("apply_resources"))
        ));
        assert!(store.apply_resources(p.id, &d, now()).await.is_ok());
    }

    #[tokio::test]
    async fn illegal_hotspot_rejects_a_controller() {
        let store = MemoryStore::new();
        let h = Hotspot::new("Back Alley Dice", "Chicago", "gambling", false, 0);
        store.insert_hotspot(&h).await.unwrap();
        assert!(matches!(
            store
                .seize_hotspot(h.id, None, Uuid::new_v4(), Forces::new(1, 0, 0))
                .await,
            Err(StoreError::Constraint(_))
        ));
        assert_eq!(store.get_hotspot(h.id).await.unwrap().unwrap().controller_id, None);
    }

    #[tokio::test]
    async fn seize_requires_the_expected_controller() {
        let store = MemoryStore::new();
        let (old, new) = (Uuid::new_v4(), Uuid::new_v4());
        let mut h = Hotspot::new("Lucky Star", "Chicago", "casino", true, 400);
        h.seize(old, Forces::new(1, 0, 0));
        store.insert_hotspot(&h).await.unwrap();

        let stale = store
            .seize_hotspot(h.id, None, new, Forces::new(2, 0, 0))
            .await
            .unwrap();
        assert!(!stale);
        assert!(
            store
                .seize_hotspot(h.id, Some(old), new, Forces::new(2, 0, 0))
                .await
                .unwrap()
        );
        let h = store.get_hotspot(h.id).await.unwrap().unwrap();
        assert_eq!(h.controller_id, Some(new));
        assert_eq!(h.defense_strength, 20);
    }

    #[tokio::test]
    async fn reinforcements_accumulate_in_storage() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mut h = Hotspot::new("Lucky Star", "Chicago", "casino", true, 400);
        h.seize(owner, Forces::default());
        store.insert_hotspot(&h).await.unwrap();

        for forces in [Forces::new(2, 0, 0), Forces::new(3, 0, 0)] {
            assert!(store.reinforce_hotspot(h.id, owner, forces).await.unwrap());
        }
        assert!(
            !store
                .reinforce_hotspot(h.id, Uuid::new_v4(), Forces::new(9, 9, 9))
                .await
                .unwrap()
        );
        let h = store.get_hotspot(h.id).await.unwrap().unwrap();
        assert_eq!(h.allocated, Forces::new(5, 0, 0));
        assert_eq!(h.defense_strength, 50);
    }

    #[tokio::test]
    async fn take_pending_requires_the_controller() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mut h = Hotspot::new("Lucky Star", "Chicago", "casino", true, 400);
        h.seize(owner, Forces::new(1, 0, 0));
        h.pending_collection = 750;
        store.insert_hotspot(&h).await.unwrap();

        let stranger = store
            .take_pending_collection(h.id, Uuid::new_v4(), now())
            .await
            .unwrap();
        assert_eq!(stranger, None);

        let taken = store.take_pending_collection(h.id, owner, now()).await.unwrap();
        assert_eq!(taken, Some(750));
        let h = store.get_hotspot(h.id).await.unwrap().unwrap();
        assert_eq!(h.pending_collection, 0);
        assert_eq!(h.last_collection_time, Some(now()));
    }

    #[tokio::test]
    async fn pending_decrement_floors_at_zero() {
        let store = MemoryStore::new();
        let h = Hotspot::new("Lucky Star", "Chicago", "casino", true, 400);
        store.insert_hotspot(&h).await.unwrap();
        store.update_hotspot_pending_collection(h.id, 300).await.unwrap();
        store.update_hotspot_pending_collection(h.id, -500).await.unwrap();
        let h = store.get_hotspot(h.id).await.unwrap().unwrap();
        assert_eq!(h.pending_collection, 0);
    }
}
