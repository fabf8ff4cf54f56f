use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::model::{
    ActionResult, AttemptStatus, Deltas, Forces, Hotspot, MarketListing, MarketTransaction,
    Operation, OperationAttempt, OperationResources, OperationResult, Player, PriceHistory, Region,
    Requirements, ResourceKind, Rewards, Risks, TerritoryAction, Title, TravelAttempt,
};

const PLAYER_COLUMNS: &str = "id, name, money, crew, weapons, vehicles, respect, influence, heat, \
     max_crew, max_weapons, max_vehicles, title, current_region_id, last_active, \
     last_travel_time, created_at";

const HOTSPOT_COLUMNS: &str = "id, name, city, business_type, is_legal, income, controller_id, \
     allocated_crew, allocated_weapons, allocated_vehicles, defense_strength, \
     pending_collection, last_income_time, last_collection_time";

const OPERATION_COLUMNS: &str = "id, name, description, kind, is_special, is_active, requirements, \
     resources, rewards, risks, duration_secs, success_rate, available_until";

const ATTEMPT_COLUMNS: &str = "id, operation_id, player_id, start_time, resources, status, result, \
     completion_time, notified";

const LISTING_COLUMNS: &str = "id, resource, price, trend, trend_percentage, updated_at";

/// [`Store`] over a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Decode a TEXT column through the model type's `TryFrom<String>`.
fn text_enum<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: TryFrom<String, Error = String>,
{
    let raw: String = row.try_get(column)?;
    T::try_from(raw).map_err(|e| sqlx::Error::Decode(e.into()))
}

fn player_from_row(row: &PgRow) -> Result<Player, sqlx::Error> {
    Ok(Player {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        money: row.try_get("money")?,
        crew: row.try_get("crew")?,
        weapons: row.try_get("weapons")?,
        vehicles: row.try_get("vehicles")?,
        respect: row.try_get("respect")?,
        influence: row.try_get("influence")?,
        heat: row.try_get("heat")?,
        max_crew: row.try_get("max_crew")?,
        max_weapons: row.try_get("max_weapons")?,
        max_vehicles: row.try_get("max_vehicles")?,
        title: text_enum::<Title>(row, "title")?,
        current_region_id: row.try_get("current_region_id")?,
        last_active: row.try_get("last_active")?,
        last_travel_time: row.try_get("last_travel_time")?,
        created_at: row.try_get("created_at")?,
    })
}

fn hotspot_from_row(row: &PgRow) -> Result<Hotspot, sqlx::Error> {
    Ok(Hotspot {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        city: row.try_get("city")?,
        business_type: row.try_get("business_type")?,
        is_legal: row.try_get("is_legal")?,
        income: row.try_get("income")?,
        controller_id: row.try_get("controller_id")?,
        allocated: Forces::new(
            row.try_get("allocated_crew")?,
            row.try_get("allocated_weapons")?,
            row.try_get("allocated_vehicles")?,
        ),
        defense_strength: row.try_get("defense_strength")?,
        pending_collection: row.try_get("pending_collection")?,
        last_income_time: row.try_get("last_income_time")?,
        last_collection_time: row.try_get("last_collection_time")?,
    })
}

fn action_from_row(row: &PgRow) -> Result<TerritoryAction, sqlx::Error> {
    let result: Json<ActionResult> = row.try_get("result")?;
    Ok(TerritoryAction {
        id: row.try_get("id")?,
        kind: text_enum(row, "kind")?,
        player_id: row.try_get("player_id")?,
        hotspot_id: row.try_get("hotspot_id")?,
        resources: Forces::new(
            row.try_get("crew")?,
            row.try_get("weapons")?,
            row.try_get("vehicles")?,
        ),
        result: result.0,
        timestamp: row.try_get("timestamp")?,
    })
}

fn operation_from_row(row: &PgRow) -> Result<Operation, sqlx::Error> {
    let requirements: Json<Requirements> = row.try_get("requirements")?;
    let resources: Json<OperationResources> = row.try_get("resources")?;
    let rewards: Json<Rewards> = row.try_get("rewards")?;
    let risks: Json<Risks> = row.try_get("risks")?;
    Ok(Operation {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        kind: text_enum(row, "kind")?,
        is_special: row.try_get("is_special")?,
        is_active: row.try_get("is_active")?,
        requirements: requirements.0,
        resources: resources.0,
        rewards: rewards.0,
        risks: risks.0,
        duration_secs: row.try_get("duration_secs")?,
        success_rate: row.try_get("success_rate")?,
        available_until: row.try_get("available_until")?,
    })
}

fn attempt_from_row(row: &PgRow) -> Result<OperationAttempt, sqlx::Error> {
    let resources: Json<OperationResources> = row.try_get("resources")?;
    let result: Option<Json<OperationResult>> = row.try_get("result")?;
    Ok(OperationAttempt {
        id: row.try_get("id")?,
        operation_id: row.try_get("operation_id")?,
        player_id: row.try_get("player_id")?,
        start_time: row.try_get("start_time")?,
        resources: resources.0,
        status: text_enum(row, "status")?,
        result: result.map(|r| r.0),
        completion_time: row.try_get("completion_time")?,
        notified: row.try_get("notified")?,
    })
}

fn listing_from_row(row: &PgRow) -> Result<MarketListing, sqlx::Error> {
    Ok(MarketListing {
        id: row.try_get("id")?,
        resource: text_enum(row, "resource")?,
        price: row.try_get("price")?,
        trend: text_enum(row, "trend")?,
        trend_percentage: row.try_get("trend_percentage")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<PriceHistory, sqlx::Error> {
    Ok(PriceHistory {
        id: row.try_get("id")?,
        resource: text_enum(row, "resource")?,
        price: row.try_get("price")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<MarketTransaction, sqlx::Error> {
    Ok(MarketTransaction {
        id: row.try_get("id")?,
        player_id: row.try_get("player_id")?,
        resource: text_enum(row, "resource")?,
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        total: row.try_get("total")?,
        kind: text_enum(row, "kind")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn travel_from_row(row: &PgRow) -> Result<TravelAttempt, sqlx::Error> {
    Ok(TravelAttempt {
        id: row.try_get("id")?,
        player_id: row.try_get("player_id")?,
        from_region_id: row.try_get("from_region_id")?,
        to_region_id: row.try_get("to_region_id")?,
        success: row.try_get("success")?,
        caught: row.try_get("caught")?,
        fine: row.try_get("fine")?,
        heat_delta: row.try_get("heat_delta")?,
        cost: row.try_get("cost")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn collect_rows<T>(
    rows: &[PgRow],
    map: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> StoreResult<Vec<T>> {
    Ok(rows.iter().map(map).collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

impl Store for PgStore {
    async fn insert_player(&self, p: &Player) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO players ({PLAYER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        );
        sqlx::query(&sql)
            .bind(p.id)
            .bind(&p.name)
            .bind(p.money)
            .bind(p.crew)
            .bind(p.weapons)
            .bind(p.vehicles)
            .bind(p.respect)
            .bind(p.influence)
            .bind(p.heat)
            .bind(p.max_crew)
            .bind(p.max_weapons)
            .bind(p.max_vehicles)
            .bind(p.title.as_str())
            .bind(p.current_region_id)
            .bind(p.last_active)
            .bind(p.last_travel_time)
            .bind(p.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_player(&self, id: Uuid) -> StoreResult<Option<Player>> {
        let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(player_from_row).transpose()?)
    }

    async fn apply_resources(
        &self,
        id: Uuid,
        deltas: &Deltas,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Player>> {
        let sql = format!(
            "UPDATE players SET \
                 money = GREATEST(0, money + $2), \
                 crew = GREATEST(0, crew + $3), \
                 weapons = GREATEST(0, weapons + $4), \
                 vehicles = GREATEST(0, vehicles + $5), \
                 respect = GREATEST(0, respect + $6), \
                 influence = GREATEST(0, influence + $7), \
                 heat = GREATEST(0, heat + $8), \
                 last_active = $9 \
             WHERE id = $1 \
             RETURNING {PLAYER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(deltas.get(ResourceKind::Money))
            .bind(deltas.get(ResourceKind::Crew))
            .bind(deltas.get(ResourceKind::Weapons))
            .bind(deltas.get(ResourceKind::Vehicles))
            .bind(deltas.get(ResourceKind::Respect))
            .bind(deltas.get(ResourceKind::Influence))
            .bind(deltas.get(ResourceKind::Heat))
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(player_from_row).transpose()?)
    }

    async fn update_player_resource(
        &self,
        id: Uuid,
        kind: ResourceKind,
        delta: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // Column names come from a closed enum, never from input.
        let column = kind.as_str();
        let sql = format!(
            "UPDATE players SET {column} = GREATEST(0, {column} + $2), last_active = $3 WHERE id = $1"
        );
        let done = sqlx::query(&sql)
            .bind(id)
            .bind(delta)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn update_player_title(&self, id: Uuid, title: Title) -> StoreResult<()> {
        sqlx::query("UPDATE players SET title = $2 WHERE id = $1")
            .bind(id)
            .bind(title.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_player_region(
        &self,
        id: Uuid,
        region_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE players SET current_region_id = $2, last_travel_time = $3, last_active = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(region_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_region(&self, region: &Region) -> StoreResult<()> {
        sqlx::query("INSERT INTO regions (id, name) VALUES ($1, $2)")
            .bind(region.id)
            .bind(&region.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_region(&self, id: Uuid) -> StoreResult<Option<Region>> {
        let row = sqlx::query("SELECT id, name FROM regions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Region {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        }))
    }

    async fn insert_hotspot(&self, h: &Hotspot) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO hotspots (id, name, city, business_type, is_legal, income, controller_id, \
                 allocated_crew, allocated_weapons, allocated_vehicles, pending_collection, \
                 last_income_time, last_collection_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(h.id)
        .bind(&h.name)
        .bind(&h.city)
        .bind(&h.business_type)
        .bind(h.is_legal)
        .bind(h.income)
        .bind(h.controller_id)
        .bind(h.allocated.crew)
        .bind(h.allocated.weapons)
        .bind(h.allocated.vehicles)
        .bind(h.pending_collection)
        .bind(h.last_income_time)
        .bind(h.last_collection_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_hotspot(&self, id: Uuid) -> StoreResult<Option<Hotspot>> {
        let sql = format!("SELECT {HOTSPOT_COLUMNS} FROM hotspots WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(hotspot_from_row).transpose()?)
    }

    async fn seize_hotspot(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        controller: Uuid,
        forces: Forces,
    ) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE hotspots SET controller_id = $3, allocated_crew = $4, \
                 allocated_weapons = $5, allocated_vehicles = $6 \
             WHERE id = $1 AND controller_id IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(expected)
        .bind(controller)
        .bind(forces.crew)
        .bind(forces.weapons)
        .bind(forces.vehicles)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn reinforce_hotspot(
        &self,
        id: Uuid,
        controller: Uuid,
        forces: Forces,
    ) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE hotspots SET allocated_crew = allocated_crew + $3, \
                 allocated_weapons = allocated_weapons + $4, \
                 allocated_vehicles = allocated_vehicles + $5 \
             WHERE id = $1 AND controller_id = $2",
        )
        .bind(id)
        .bind(controller)
        .bind(forces.crew)
        .bind(forces.weapons)
        .bind(forces.vehicles)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn take_pending_collection(
        &self,
        id: Uuid,
        player_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<i64>> {
        let taken: Option<i64> = sqlx::query_scalar(
            "WITH taken AS ( \
                 SELECT id, pending_collection FROM hotspots \
                 WHERE id = $1 AND controller_id = $2 \
                 FOR UPDATE \
             ) \
             UPDATE hotspots h SET pending_collection = 0, last_collection_time = $3 \
             FROM taken WHERE h.id = taken.id \
             RETURNING taken.pending_collection",
        )
        .bind(id)
        .bind(player_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn update_hotspot_pending_collection(&self, id: Uuid, delta: i64) -> StoreResult<()> {
        sqlx::query(
            "UPDATE hotspots SET pending_collection = GREATEST(0, pending_collection + $2) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_hotspot_last_income_time(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE hotspots SET last_income_time = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_all_controlled_legal_hotspots(&self) -> StoreResult<Vec<Hotspot>> {
        let sql = format!(
            "SELECT {HOTSPOT_COLUMNS} FROM hotspots \
             WHERE is_legal AND controller_id IS NOT NULL ORDER BY controller_id, id"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect_rows(&rows, hotspot_from_row)
    }

    async fn get_controlled_hotspots(&self, player_id: Uuid) -> StoreResult<Vec<Hotspot>> {
        let sql = format!(
            "SELECT {HOTSPOT_COLUMNS} FROM hotspots WHERE controller_id = $1 ORDER BY name"
        );
        let rows = sqlx::query(&sql)
            .bind(player_id)
            .fetch_all(&self.pool)
            .await?;
        collect_rows(&rows, hotspot_from_row)
    }

    async fn refresh_illegal_hotspots(&self) -> StoreResult<u64> {
        let done = sqlx::query(
            "UPDATE hotspots SET controller_id = NULL, allocated_crew = 0, \
                 allocated_weapons = 0, allocated_vehicles = 0 \
             WHERE NOT is_legal",
        )
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    async fn create_territory_action(&self, a: &TerritoryAction) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO territory_actions \
                 (id, kind, player_id, hotspot_id, crew, weapons, vehicles, result, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(a.id)
        .bind(a.kind.as_str())
        .bind(a.player_id)
        .bind(a.hotspot_id)
        .bind(a.resources.crew)
        .bind(a.resources.weapons)
        .bind(a.resources.vehicles)
        .bind(Json(&a.result))
        .bind(a.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_territory_actions(
        &self,
        player_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<TerritoryAction>> {
        let rows = sqlx::query(
            "SELECT id, kind, player_id, hotspot_id, crew, weapons, vehicles, result, timestamp \
             FROM territory_actions WHERE player_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(player_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(&rows, action_from_row)
    }

    async fn insert_operation(&self, op: &Operation) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO operations ({OPERATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        );
        sqlx::query(&sql)
            .bind(op.id)
            .bind(&op.name)
            .bind(&op.description)
            .bind(op.kind.as_str())
            .bind(op.is_special)
            .bind(op.is_active)
            .bind(Json(&op.requirements))
            .bind(Json(&op.resources))
            .bind(Json(&op.rewards))
            .bind(Json(&op.risks))
            .bind(op.duration_secs)
            .bind(op.success_rate)
            .bind(op.available_until)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_operation(&self, id: Uuid) -> StoreResult<Option<Operation>> {
        let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(operation_from_row).transpose()?)
    }

    async fn active_operations(&self, now: DateTime<Utc>) -> StoreResult<Vec<Operation>> {
        let sql = format!(
            "SELECT {OPERATION_COLUMNS} FROM operations \
             WHERE is_active AND available_until > $1 ORDER BY is_special, available_until"
        );
        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.pool).await?;
        collect_rows(&rows, operation_from_row)
    }

    async fn deactivate_expired_operations(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let done = sqlx::query(
            "UPDATE operations SET is_active = FALSE WHERE is_active AND available_until < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    async fn create_operation_attempt(&self, a: &OperationAttempt) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO operation_attempts ({ATTEMPT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        );
        sqlx::query(&sql)
            .bind(a.id)
            .bind(a.operation_id)
            .bind(a.player_id)
            .bind(a.start_time)
            .bind(Json(&a.resources))
            .bind(a.status.as_str())
            .bind(a.result.as_ref().map(Json))
            .bind(a.completion_time)
            .bind(a.notified)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn finish_operation_attempt(&self, a: &OperationAttempt) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE operation_attempts SET status = $2, result = $3, completion_time = $4, \
                 notified = $5 \
             WHERE id = $1 AND status = $6",
        )
        .bind(a.id)
        .bind(a.status.as_str())
        .bind(a.result.as_ref().map(Json))
        .bind(a.completion_time)
        .bind(a.notified)
        .bind(AttemptStatus::InProgress.as_str())
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn reopen_operation_attempt(&self, id: Uuid, from: AttemptStatus) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE operation_attempts SET status = $3, result = NULL, completion_time = NULL \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(AttemptStatus::InProgress.as_str())
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn mark_attempt_notified(&self, id: Uuid) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE operation_attempts SET notified = TRUE WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(AttemptStatus::InProgress.as_str())
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn get_operation_attempt(&self, id: Uuid) -> StoreResult<Option<OperationAttempt>> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM operation_attempts WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(attempt_from_row).transpose()?)
    }

    async fn in_progress_attempts(&self) -> StoreResult<Vec<OperationAttempt>> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM operation_attempts \
             WHERE status = $1 ORDER BY start_time"
        );
        let rows = sqlx::query(&sql)
            .bind(AttemptStatus::InProgress.as_str())
            .fetch_all(&self.pool)
            .await?;
        collect_rows(&rows, attempt_from_row)
    }

    async fn player_attempts(
        &self,
        player_id: Uuid,
        statuses: &[AttemptStatus],
    ) -> StoreResult<Vec<OperationAttempt>> {
        let wanted: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM operation_attempts \
             WHERE player_id = $1 AND status = ANY($2) ORDER BY start_time DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(player_id)
            .bind(&wanted)
            .fetch_all(&self.pool)
            .await?;
        collect_rows(&rows, attempt_from_row)
    }

    async fn get_all_listings(&self) -> StoreResult<Vec<MarketListing>> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM market_listings ORDER BY resource");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect_rows(&rows, listing_from_row)
    }

    async fn get_listing(&self, resource: ResourceKind) -> StoreResult<Option<MarketListing>> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM market_listings WHERE resource = $1");
        let row = sqlx::query(&sql)
            .bind(resource.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(listing_from_row).transpose()?)
    }

    async fn create_listing(&self, l: &MarketListing) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO market_listings ({LISTING_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        );
        sqlx::query(&sql)
            .bind(l.id)
            .bind(l.resource.as_str())
            .bind(l.price)
            .bind(l.trend.as_str())
            .bind(l.trend_percentage)
            .bind(l.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_listing(&self, l: &MarketListing) -> StoreResult<()> {
        sqlx::query(
            "UPDATE market_listings SET price = $2, trend = $3, trend_percentage = $4, \
                 updated_at = $5 \
             WHERE id = $1",
        )
        .bind(l.id)
        .bind(l.price)
        .bind(l.trend.as_str())
        .bind(l.trend_percentage)
        .bind(l.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_price_history(&self, h: &PriceHistory) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO market_price_history (id, resource, price, timestamp) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(h.id)
        .bind(h.resource.as_str())
        .bind(h.price)
        .bind(h.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn price_history(
        &self,
        resource: Option<ResourceKind>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<PriceHistory>> {
        let rows = sqlx::query(
            "SELECT id, resource, price, timestamp FROM market_price_history \
             WHERE ($1::TEXT IS NULL OR resource = $1) AND timestamp > $2 \
             ORDER BY timestamp, resource",
        )
        .bind(resource.map(|r| r.as_str()))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(&rows, history_from_row)
    }

    async fn create_transaction(&self, t: &MarketTransaction) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO market_transactions \
                 (id, player_id, resource, quantity, price, total, kind, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(t.id)
        .bind(t.player_id)
        .bind(t.resource.as_str())
        .bind(t.quantity)
        .bind(t.price)
        .bind(t.total)
        .bind(t.kind.as_str())
        .bind(t.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn player_transactions(&self, player_id: Uuid) -> StoreResult<Vec<MarketTransaction>> {
        let rows = sqlx::query(
            "SELECT id, player_id, resource, quantity, price, total, kind, timestamp \
             FROM market_transactions WHERE player_id = $1 ORDER BY timestamp DESC",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(&rows, transaction_from_row)
    }

    async fn create_travel_attempt(&self, t: &TravelAttempt) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO travel_attempts (id, player_id, from_region_id, to_region_id, success, \
                 caught, fine, heat_delta, cost, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(t.id)
        .bind(t.player_id)
        .bind(t.from_region_id)
        .bind(t.to_region_id)
        .bind(t.success)
        .bind(t.caught)
        .bind(t.fine)
        .bind(t.heat_delta)
        .bind(t.cost)
        .bind(t.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn travel_history(&self, player_id: Uuid, limit: i64) -> StoreResult<Vec<TravelAttempt>> {
        let rows = sqlx::query(
            "SELECT id, player_id, from_region_id, to_region_id, success, caught, fine, \
                 heat_delta, cost, timestamp \
             FROM travel_attempts WHERE player_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(player_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(&rows, travel_from_row)
    }
}
