use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::db::{Store, StoreResult};
use crate::model::*;
use crate::testutil::{TestWorld, fixed_time, test_world_with};

// -- Builder-style ref types --

/// Typed reference to a player in a [`Scenario`], enabling chained field mutation.
///
/// Created by [`Scenario::player`] (creation) or [`Scenario::player_mut`] (mutation).
/// Call [`.id()`](PlayerRef::id) to terminate the chain and extract the player ID.
pub struct PlayerRef<'a> {
    player: &'a mut Player,
}

impl<'a> PlayerRef<'a> {
    pub fn money(self, v: i64) -> Self { self.player.money = v; self }
    pub fn crew(self, v: i64) -> Self { self.player.crew = v; self }
    pub fn weapons(self, v: i64) -> Self { self.player.weapons = v; self }
    pub fn vehicles(self, v: i64) -> Self { self.player.vehicles = v; self }
    pub fn respect(self, v: i64) -> Self { self.player.respect = v; self }
    pub fn influence(self, v: i64) -> Self { self.player.influence = v; self }
    pub fn heat(self, v: i64) -> Self { self.player.heat = v; self }
    pub fn region(self, v: Uuid) -> Self { self.player.current_region_id = Some(v); self }

    /// Set every capacity at once.
    pub fn caps(self, crew: i64, weapons: i64, vehicles: i64) -> Self {
        self.player.max_crew = crew;
        self.player.max_weapons = weapons;
        self.player.max_vehicles = vehicles;
        self
    }

    /// Escape hatch: apply an arbitrary closure to the player.
    pub fn with(self, f: impl FnOnce(&mut Player)) -> Self { f(&mut *self.player); self }

    /// Terminate the chain and return the player ID.
    pub fn id(self) -> Uuid {
        self.player.title = self.player.derived_title();
        self.player.id
    }
}

/// Typed reference to a hotspot in a [`Scenario`].
pub struct HotspotRef<'a> {
    hotspot: &'a mut Hotspot,
}

impl<'a> HotspotRef<'a> {
    pub fn city(self, v: &str) -> Self { self.hotspot.city = v.to_string(); self }
    pub fn business_type(self, v: &str) -> Self { self.hotspot.business_type = v.to_string(); self }
    pub fn income(self, v: i64) -> Self { self.hotspot.income = v; self }
    pub fn illegal(self) -> Self { self.hotspot.is_legal = false; self }
    pub fn pending(self, v: i64) -> Self { self.hotspot.pending_collection = v; self }
    pub fn last_income(self, v: DateTime<Utc>) -> Self { self.hotspot.last_income_time = Some(v); self }

    /// Hand the hotspot to `player` with `forces` stationed there.
    pub fn controlled_by(self, player: Uuid, forces: Forces) -> Self {
        self.hotspot.seize(player, forces);
        self
    }

    pub fn with(self, f: impl FnOnce(&mut Hotspot)) -> Self { f(&mut *self.hotspot); self }

    pub fn id(self) -> Uuid { self.hotspot.id }
}

/// Typed reference to an operation in a [`Scenario`].
pub struct OperationRef<'a> {
    op: &'a mut Operation,
}

impl<'a> OperationRef<'a> {
    pub fn kind(self, v: OperationKind) -> Self { self.op.kind = v; self }
    pub fn special(self) -> Self { self.op.is_special = true; self }
    pub fn inactive(self) -> Self { self.op.is_active = false; self }
    pub fn success_rate(self, v: i64) -> Self { self.op.success_rate = v; self }
    pub fn duration_secs(self, v: i64) -> Self { self.op.duration_secs = v; self }
    pub fn available_until(self, v: DateTime<Utc>) -> Self { self.op.available_until = v; self }
    pub fn requirements(self, v: Requirements) -> Self { self.op.requirements = v; self }
    pub fn resources(self, v: OperationResources) -> Self { self.op.resources = v; self }
    pub fn rewards(self, v: Rewards) -> Self { self.op.rewards = v; self }
    pub fn risks(self, v: Risks) -> Self { self.op.risks = v; self }

    pub fn with(self, f: impl FnOnce(&mut Operation)) -> Self { f(&mut *self.op); self }

    pub fn id(self) -> Uuid { self.op.id }
}

/// Declarative setup for a game-core test: describe the world, then
/// [`build`](Scenario::build) it into an in-memory [`TestWorld`].
pub struct Scenario {
    config: GameConfig,
    start: DateTime<Utc>,
    rolls: Vec<f64>,
    fallback_roll: Option<f64>,
    players: Vec<Player>,
    regions: Vec<Region>,
    hotspots: Vec<Hotspot>,
    operations: Vec<Operation>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// A scenario on the default config starting at [`fixed_time`].
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        Self {
            config,
            start: fixed_time(),
            rolls: Vec::new(),
            fallback_roll: None,
            players: Vec::new(),
            regions: Vec::new(),
            hotspots: Vec::new(),
            operations: Vec::new(),
        }
    }

    pub fn starting_at(mut self, t: DateTime<Utc>) -> Self {
        self.start = t;
        self
    }

    /// Mutate the game config before the world is built.
    pub fn config_mut(&mut self, f: impl FnOnce(&mut GameConfig)) {
        f(&mut self.config);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.start
    }

    // -- Dice --

    /// Queue unit rolls, consumed in order once the world is built.
    pub fn rolls(&mut self, rolls: impl IntoIterator<Item = f64>) {
        self.rolls.extend(rolls);
    }

    /// Unit roll returned once the queue runs out.
    pub fn fallback_roll(&mut self, v: f64) {
        self.fallback_roll = Some(v);
    }

    // -- Entities --

    /// Add a player with the configured starting resources.
    pub fn player(&mut self, name: &str) -> PlayerRef<'_> {
        let player = Player::starting(name, &self.config.resource_limit, self.start);
        self.players.push(player);
        let idx = self.players.len() - 1;
        PlayerRef {
            player: &mut self.players[idx],
        }
    }

    /// Re-open a player added earlier. Panics on an unknown id.
    pub fn player_mut(&mut self, id: Uuid) -> PlayerRef<'_> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .unwrap_or_else(|| panic!("scenario has no player {id}"));
        PlayerRef { player }
    }

    pub fn region(&mut self, name: &str) -> Uuid {
        let region = Region::new(name);
        let id = region.id;
        self.regions.push(region);
        id
    }

    /// Add an uncontrolled legal hotspot in New York.
    pub fn hotspot(&mut self, name: &str, income: i64) -> HotspotRef<'_> {
        self.hotspots
            .push(Hotspot::new(name, "New York", "business", true, income));
        let idx = self.hotspots.len() - 1;
        HotspotRef {
            hotspot: &mut self.hotspots[idx],
        }
    }

    pub fn hotspot_mut(&mut self, id: Uuid) -> HotspotRef<'_> {
        let hotspot = self
            .hotspots
            .iter_mut()
            .find(|h| h.id == id)
            .unwrap_or_else(|| panic!("scenario has no hotspot {id}"));
        HotspotRef { hotspot }
    }

    /// Add an active, ungated operation offered for the next day.
    pub fn operation(&mut self, name: &str) -> OperationRef<'_> {
        self.operations.push(Operation {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            kind: OperationKind::Carjacking,
            is_special: false,
            is_active: true,
            requirements: Requirements::default(),
            resources: OperationResources::default(),
            rewards: Rewards::default(),
            risks: Risks::default(),
            duration_secs: 600,
            success_rate: 50,
            available_until: self.start + Duration::hours(24),
        });
        let idx = self.operations.len() - 1;
        OperationRef {
            op: &mut self.operations[idx],
        }
    }

    // -- Finalize --

    /// Insert everything into a fresh in-memory store behind a manual clock
    /// and scripted dice.
    pub async fn build(self) -> StoreResult<TestWorld> {
        let world = test_world_with(self.config);
        world.clock.set(self.start);
        world.dice.push(self.rolls);
        if let Some(v) = self.fallback_roll {
            world.dice.set_fallback(v);
        }
        for r in &self.regions {
            world.store.insert_region(r).await?;
        }
        for p in &self.players {
            world.store.insert_player(p).await?;
        }
        for h in &self.hotspots {
            world.store.insert_hotspot(h).await?;
        }
        for op in &self.operations {
            world.store.insert_operation(op).await?;
        }
        Ok(world)
    }
}
