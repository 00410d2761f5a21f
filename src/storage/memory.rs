//! In-memory storage backend
//!
//! Backs the same repository traits as PostgreSQL for unit and integration
//! tests. A single `parking_lot::Mutex` around the whole state gives every
//! repo method the same atomicity the database statements provide.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;

use super::repository::*;
use super::{StoreError, StoreResult};
use crate::models::*;

#[derive(Default)]
struct MemoryState {
    economy: HashMap<UserId, UserEconomy>,
    missions: BTreeMap<String, Mission>,
    mission_progress: HashMap<(UserId, String), UserMissionProgress>,
    achievements: BTreeMap<String, Achievement>,
    unlocks: HashMap<UserId, HashSet<String>>,
    bets: Vec<BetRecord>,
    keys: HashMap<(UserId, CrateKind), i64>,
    inventory: BTreeMap<ItemId, InventoryItem>,
    catalog: BTreeMap<String, CatalogItem>,
    contracts: Vec<TradeUpContract>,
    notifications: Vec<Notification>,
    next_item_id: ItemId,
    next_bet_id: i64,
    next_notification_id: i64,
    next_contract_id: i64,
}

fn default_economy(user_id: UserId) -> UserEconomy {
    UserEconomy {
        user_id,
        coins: 0,
        gems: 0,
        xp: 0,
        level: 1,
        login_streak: 0,
        last_login_date: None,
        last_stipend_date: None,
    }
}

/// Shared in-memory state behind every `Mem*` repo.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_item_id: 1,
                next_bet_id: 1,
                next_notification_id: 1,
                next_contract_id: 1,
                ..Default::default()
            }),
        }
    }

    // ------------------------------------------------------------------
    // Seeding helpers (test setup)
    // ------------------------------------------------------------------

    pub fn seed_mission(&self, mission: Mission) {
        self.state.lock().missions.insert(mission.id.clone(), mission);
    }

    pub fn seed_achievement(&self, achievement: Achievement) {
        self.state
            .lock()
            .achievements
            .insert(achievement.id.clone(), achievement);
    }

    pub fn seed_catalog_item(&self, item: CatalogItem) {
        self.state.lock().catalog.insert(item.id.clone(), item);
    }

    /// Append a settled bet row, as the betting service would.
    pub fn record_bet(&self, user_id: UserId, amount: i64, odds: f64, payout: i64, won: bool) {
        let mut state = self.state.lock();
        let id = state.next_bet_id;
        state.next_bet_id += 1;
        state.bets.push(BetRecord {
            id,
            user_id,
            amount,
            odds,
            payout,
            won,
            settled_at: Utc::now(),
        });
    }

    /// Hand an item to a user directly, bypassing the trade-up flow.
    pub fn grant_item(
        &self,
        user_id: UserId,
        template_id: &str,
        name: &str,
        rarity: Rarity,
        value: i64,
    ) -> ItemId {
        let mut state = self.state.lock();
        let id = state.next_item_id;
        state.next_item_id += 1;
        state.inventory.insert(
            id,
            InventoryItem {
                id,
                user_id,
                template_id: template_id.to_string(),
                name: name.to_string(),
                rarity,
                value,
                equipped: false,
            },
        );
        id
    }

    pub fn set_economy(&self, economy: UserEconomy) {
        self.state.lock().economy.insert(economy.user_id, economy);
    }

    pub fn trade_up_contract_count(&self, user_id: UserId) -> usize {
        self.state
            .lock()
            .contracts
            .iter()
            .filter(|c| c.user_id == user_id)
            .count()
    }
}

// ============================================================================
// Economy Repo
// ============================================================================

pub struct MemEconomyRepo {
    backend: Arc<MemoryBackend>,
}

impl MemEconomyRepo {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl EconomyRepo for MemEconomyRepo {
    async fn get(&self, user_id: UserId) -> StoreResult<UserEconomy> {
        self.backend
            .state
            .lock()
            .economy
            .get(&user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("economy row for user {}", user_id)))
    }

    async fn ensure(&self, user_id: UserId) -> StoreResult<UserEconomy> {
        let mut state = self.backend.state.lock();
        Ok(state
            .economy
            .entry(user_id)
            .or_insert_with(|| default_economy(user_id))
            .clone())
    }

    async fn credit(
        &self,
        user_id: UserId,
        coins: i64,
        gems: i64,
        xp: i64,
    ) -> StoreResult<UserEconomy> {
        let mut state = self.backend.state.lock();
        let row = state
            .economy
            .entry(user_id)
            .or_insert_with(|| default_economy(user_id));
        row.coins += coins;
        row.gems += gems;
        row.xp += xp;
        Ok(row.clone())
    }

    async fn raise_level(&self, user_id: UserId, level: i32) -> StoreResult<bool> {
        let mut state = self.backend.state.lock();
        match state.economy.get_mut(&user_id) {
            Some(row) if row.level < level => {
                row.level = level;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_login(
        &self,
        user_id: UserId,
        today: NaiveDate,
        yesterday: NaiveDate,
    ) -> StoreResult<LoginTransition> {
        let mut state = self.backend.state.lock();
        let row = state
            .economy
            .entry(user_id)
            .or_insert_with(|| default_economy(user_id));
        let previous_login = row.last_login_date;

        if previous_login == Some(today) {
            // repeat login, streak untouched
        } else if previous_login == Some(yesterday) {
            row.login_streak += 1;
        } else {
            row.login_streak = 1;
        }
        row.last_login_date = Some(today);

        Ok(LoginTransition {
            streak: row.login_streak,
            previous_login,
        })
    }

    async fn claim_stipend(
        &self,
        user_id: UserId,
        today: NaiveDate,
        coins: i64,
        gems: i64,
    ) -> StoreResult<bool> {
        let mut state = self.backend.state.lock();
        let row = state
            .economy
            .entry(user_id)
            .or_insert_with(|| default_economy(user_id));

        // Same guard as the SQL: any claim date at or past today rejects.
        if row.last_stipend_date.is_some_and(|d| d >= today) {
            return Ok(false);
        }
        row.coins += coins;
        row.gems += gems;
        row.last_stipend_date = Some(today);
        Ok(true)
    }
}

// ============================================================================
// Mission Repo
// ============================================================================

pub struct MemMissionRepo {
    backend: Arc<MemoryBackend>,
}

impl MemMissionRepo {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl MissionRepo for MemMissionRepo {
    async fn by_action(&self, requirement_type: &str) -> StoreResult<Vec<Mission>> {
        Ok(self
            .backend
            .state
            .lock()
            .missions
            .values()
            .filter(|m| m.requirement_type == requirement_type)
            .cloned()
            .collect())
    }

    async fn by_kind(&self, kind: MissionKind) -> StoreResult<Vec<Mission>> {
        Ok(self
            .backend
            .state
            .lock()
            .missions
            .values()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect())
    }

    async fn get(&self, mission_id: &str) -> StoreResult<Option<Mission>> {
        Ok(self.backend.state.lock().missions.get(mission_id).cloned())
    }

    async fn progress(
        &self,
        user_id: UserId,
        mission_id: &str,
    ) -> StoreResult<Option<UserMissionProgress>> {
        Ok(self
            .backend
            .state
            .lock()
            .mission_progress
            .get(&(user_id, mission_id.to_string()))
            .cloned())
    }

    async fn advance_progress(
        &self,
        user_id: UserId,
        mission_id: &str,
        delta: i64,
    ) -> StoreResult<i64> {
        let mut state = self.backend.state.lock();
        let row = state
            .mission_progress
            .entry((user_id, mission_id.to_string()))
            .or_insert_with(|| UserMissionProgress {
                user_id,
                mission_id: mission_id.to_string(),
                progress: 0,
                completed: false,
            });
        row.progress += delta;
        Ok(row.progress)
    }

    async fn set_progress(
        &self,
        user_id: UserId,
        mission_id: &str,
        value: i64,
    ) -> StoreResult<i64> {
        let mut state = self.backend.state.lock();
        let row = state
            .mission_progress
            .entry((user_id, mission_id.to_string()))
            .or_insert_with(|| UserMissionProgress {
                user_id,
                mission_id: mission_id.to_string(),
                progress: 0,
                completed: false,
            });
        row.progress = value;
        Ok(row.progress)
    }

    async fn claim_completion(
        &self,
        user_id: UserId,
        mission_id: &str,
        requirement: i64,
    ) -> StoreResult<bool> {
        let mut state = self.backend.state.lock();
        match state
            .mission_progress
            .get_mut(&(user_id, mission_id.to_string()))
        {
            Some(row) if !row.completed && row.progress >= requirement => {
                row.completed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn all_completed(
        &self,
        user_id: UserId,
        kind: MissionKind,
        excluding_action: &str,
    ) -> StoreResult<bool> {
        let state = self.backend.state.lock();
        let mut any = false;
        for mission in state
            .missions
            .values()
            .filter(|m| m.kind == kind && m.requirement_type != excluding_action)
        {
            any = true;
            let done = state
                .mission_progress
                .get(&(user_id, mission.id.clone()))
                .map(|p| p.completed)
                .unwrap_or(false);
            if !done {
                return Ok(false);
            }
        }
        Ok(any)
    }

    async fn reset_progress(&self, user_id: UserId, kind: MissionKind) -> StoreResult<u64> {
        let mut state = self.backend.state.lock();
        let resettable: Vec<String> = state
            .missions
            .values()
            .filter(|m| m.kind == kind && m.repeatable)
            .map(|m| m.id.clone())
            .collect();

        let mut reset = 0;
        for mission_id in resettable {
            if let Some(row) = state.mission_progress.get_mut(&(user_id, mission_id)) {
                row.progress = 0;
                row.completed = false;
                reset += 1;
            }
        }
        Ok(reset)
    }
}

// ============================================================================
// Achievement Repo
// ============================================================================

pub struct MemAchievementRepo {
    backend: Arc<MemoryBackend>,
}

impl MemAchievementRepo {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AchievementRepo for MemAchievementRepo {
    async fn catalog(&self, category: Option<&str>) -> StoreResult<Vec<Achievement>> {
        Ok(self
            .backend
            .state
            .lock()
            .achievements
            .values()
            .filter(|a| category.map(|c| a.category == c).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get(&self, achievement_id: &str) -> StoreResult<Option<Achievement>> {
        Ok(self
            .backend
            .state
            .lock()
            .achievements
            .get(achievement_id)
            .cloned())
    }

    async fn unlocked_ids(&self, user_id: UserId) -> StoreResult<Vec<String>> {
        Ok(self
            .backend
            .state
            .lock()
            .unlocks
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn try_unlock(&self, user_id: UserId, achievement_id: &str) -> StoreResult<bool> {
        let mut state = self.backend.state.lock();
        Ok(state
            .unlocks
            .entry(user_id)
            .or_default()
            .insert(achievement_id.to_string()))
    }
}

// ============================================================================
// Bet Stats Repo
// ============================================================================

pub struct MemBetStatsRepo {
    backend: Arc<MemoryBackend>,
}

impl MemBetStatsRepo {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BetStatsRepo for MemBetStatsRepo {
    async fn count_bets(&self, user_id: UserId, won_only: bool) -> StoreResult<i64> {
        Ok(self
            .backend
            .state
            .lock()
            .bets
            .iter()
            .filter(|b| b.user_id == user_id && (!won_only || b.won))
            .count() as i64)
    }

    async fn recent_outcomes(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<bool>> {
        Ok(self
            .backend
            .state
            .lock()
            .bets
            .iter()
            .rev()
            .filter(|b| b.user_id == user_id)
            .take(limit as usize)
            .map(|b| b.won)
            .collect())
    }

    async fn max_won_odds(&self, user_id: UserId) -> StoreResult<Option<f64>> {
        Ok(self
            .backend
            .state
            .lock()
            .bets
            .iter()
            .filter(|b| b.user_id == user_id && b.won)
            .map(|b| b.odds)
            .fold(None, |max: Option<f64>, odds| {
                Some(max.map_or(odds, |m| m.max(odds)))
            }))
    }

    async fn max_won_payout(&self, user_id: UserId) -> StoreResult<Option<i64>> {
        Ok(self
            .backend
            .state
            .lock()
            .bets
            .iter()
            .filter(|b| b.user_id == user_id && b.won)
            .map(|b| b.payout)
            .max())
    }
}

// ============================================================================
// Key Repo
// ============================================================================

pub struct MemKeyRepo {
    backend: Arc<MemoryBackend>,
}

impl MemKeyRepo {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl KeyRepo for MemKeyRepo {
    async fn add_keys(&self, user_id: UserId, kind: CrateKind, count: i64) -> StoreResult<i64> {
        let mut state = self.backend.state.lock();
        let total = state.keys.entry((user_id, kind)).or_insert(0);
        *total += count;
        Ok(*total)
    }

    async fn key_count(&self, user_id: UserId, kind: CrateKind) -> StoreResult<i64> {
        Ok(self
            .backend
            .state
            .lock()
            .keys
            .get(&(user_id, kind))
            .copied()
            .unwrap_or(0))
    }
}

// ============================================================================
// Inventory Repo
// ============================================================================

pub struct MemInventoryRepo {
    backend: Arc<MemoryBackend>,
}

impl MemInventoryRepo {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl InventoryRepo for MemInventoryRepo {
    async fn items_by_ids(
        &self,
        user_id: UserId,
        item_ids: &[ItemId],
    ) -> StoreResult<Vec<InventoryItem>> {
        let state = self.backend.state.lock();
        Ok(item_ids
            .iter()
            .filter_map(|id| state.inventory.get(id))
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_items(&self, user_id: UserId) -> StoreResult<i64> {
        Ok(self
            .backend
            .state
            .lock()
            .inventory
            .values()
            .filter(|i| i.user_id == user_id)
            .count() as i64)
    }

    async fn count_items_by_rarity(&self, user_id: UserId, rarity: Rarity) -> StoreResult<i64> {
        Ok(self
            .backend
            .state
            .lock()
            .inventory
            .values()
            .filter(|i| i.user_id == user_id && i.rarity == rarity)
            .count() as i64)
    }

    async fn trade_up(
        &self,
        user_id: UserId,
        input_ids: &[ItemId],
        input_snapshot: serde_json::Value,
        output: NewInventoryItem,
    ) -> StoreResult<InventoryItem> {
        let mut state = self.backend.state.lock();

        // Check ownership of every input before mutating anything.
        let owned = input_ids
            .iter()
            .filter(|id| {
                state
                    .inventory
                    .get(id)
                    .map(|i| i.user_id == user_id)
                    .unwrap_or(false)
            })
            .count();
        if owned != input_ids.len() {
            return Err(StoreError::Constraint(format!(
                "trade-up for user {} deleted {} of {} input items",
                user_id,
                owned,
                input_ids.len()
            )));
        }

        for id in input_ids {
            state.inventory.remove(id);
        }

        let id = state.next_item_id;
        state.next_item_id += 1;
        let item = InventoryItem {
            id,
            user_id: output.user_id,
            template_id: output.template_id,
            name: output.name,
            rarity: output.rarity,
            value: output.value,
            equipped: false,
        };
        state.inventory.insert(id, item.clone());

        let contract_id = state.next_contract_id;
        state.next_contract_id += 1;
        state.contracts.push(TradeUpContract {
            id: contract_id,
            user_id,
            input_items: input_snapshot,
            output_item_id: id,
            created_at: Utc::now(),
        });

        Ok(item)
    }
}

// ============================================================================
// Item Catalog Repo
// ============================================================================

pub struct MemItemCatalogRepo {
    backend: Arc<MemoryBackend>,
}

impl MemItemCatalogRepo {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ItemCatalogRepo for MemItemCatalogRepo {
    async fn active_by_rarity(&self, rarity: Rarity, limit: i64) -> StoreResult<Vec<CatalogItem>> {
        Ok(self
            .backend
            .state
            .lock()
            .catalog
            .values()
            .filter(|c| c.rarity == rarity && c.active)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, template_id: &str) -> StoreResult<Option<CatalogItem>> {
        Ok(self.backend.state.lock().catalog.get(template_id).cloned())
    }
}

// ============================================================================
// Notification Repo
// ============================================================================

pub struct MemNotificationRepo {
    backend: Arc<MemoryBackend>,
}

impl MemNotificationRepo {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl NotificationRepo for MemNotificationRepo {
    async fn insert(&self, notification: NewNotification) -> StoreResult<i64> {
        let mut state = self.backend.state.lock();
        let id = state.next_notification_id;
        state.next_notification_id += 1;
        state.notifications.push(Notification {
            id,
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            data: notification.data,
            read: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn unread_count(&self, user_id: UserId) -> StoreResult<i64> {
        Ok(self
            .backend
            .state
            .lock()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as i64)
    }

    async fn recent(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<Notification>> {
        Ok(self
            .backend
            .state
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
