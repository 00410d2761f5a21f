//! PostgreSQL Storage - progression data persistence
//!
//! All per-user progression data lives in PostgreSQL (shared with the
//! site's other services). Uses `sqlx` for async queries.
//!
//! ## Tables
//! - user_economy, user_keys
//! - missions, user_mission_progress
//! - achievements, user_achievements
//! - item_catalog, inventory_items, trade_up_contracts
//! - bets (read-only here), notifications
//!
//! The repo adapters at the bottom implement the traits from
//! `repository.rs`; every concurrency-sensitive step is a single SQL
//! statement so two racing callers are serialized by the database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

use super::migrations;
use super::repository::*;
use super::{StoreError, StoreResult};
use crate::models::*;

/// PostgreSQL connection pool wrapper
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL and run migrations
    pub async fn new(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("PostgreSQL connected (max_connections={})", max_connections);

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Connect with an existing pool (for testing / shared site pool)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> StoreResult<()> {
        // Create migrations tracking table
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name VARCHAR(100) PRIMARY KEY,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        for (name, sql) in migrations::get_migrations() {
            let applied: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = $1)")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await?;

            if !applied {
                info!("Running migration: {}", name);
                sqlx::raw_sql(sql)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Migration(format!("{}: {}", name, e)))?;

                sqlx::query("INSERT INTO _migrations (name) VALUES ($1)")
                    .bind(name)
                    .execute(&self.pool)
                    .await?;

                info!("Migration applied: {}", name);
            } else {
                debug!("Migration already applied: {}", name);
            }
        }

        Ok(())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct EconomyRow {
    pub user_id: i64,
    pub coins: i64,
    pub gems: i64,
    pub xp: i64,
    pub level: i32,
    pub login_streak: i32,
    pub last_login_date: Option<NaiveDate>,
    pub last_stipend_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MissionRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub mission_type: String,
    pub requirement_type: String,
    pub requirement_value: i64,
    pub xp_reward: i64,
    pub coin_reward: i64,
    pub gem_reward: i64,
    pub repeatable: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct MissionProgressRow {
    pub user_id: i64,
    pub mission_id: String,
    pub progress: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct AchievementRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub requirement_type: String,
    pub requirement_value: f64,
    pub xp_reward: i64,
    pub coin_reward: i64,
    pub gem_reward: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct InventoryRow {
    pub id: i64,
    pub user_id: i64,
    pub template_id: String,
    pub name: String,
    pub rarity: String,
    pub value: i64,
    pub equipped: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct CatalogRow {
    pub id: String,
    pub name: String,
    pub rarity: String,
    pub base_value: i64,
    pub active: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// Type Conversion Helpers
// ============================================================================

fn parse_rarity(s: &str) -> StoreResult<Rarity> {
    Rarity::from_str(s).ok_or_else(|| StoreError::Constraint(format!("unknown rarity '{}'", s)))
}

fn parse_mission_kind(s: &str) -> StoreResult<MissionKind> {
    MissionKind::from_str(s)
        .ok_or_else(|| StoreError::Constraint(format!("unknown mission type '{}'", s)))
}

fn row_to_economy(row: EconomyRow) -> UserEconomy {
    UserEconomy {
        user_id: row.user_id,
        coins: row.coins,
        gems: row.gems,
        xp: row.xp,
        level: row.level,
        login_streak: row.login_streak,
        last_login_date: row.last_login_date,
        last_stipend_date: row.last_stipend_date,
    }
}

fn row_to_mission(row: MissionRow) -> StoreResult<Mission> {
    Ok(Mission {
        kind: parse_mission_kind(&row.mission_type)?,
        id: row.id,
        name: row.name,
        description: row.description,
        requirement_type: row.requirement_type,
        requirement_value: row.requirement_value,
        xp_reward: row.xp_reward,
        coin_reward: row.coin_reward,
        gem_reward: row.gem_reward,
        repeatable: row.repeatable,
    })
}

fn row_to_achievement(row: AchievementRow) -> Achievement {
    Achievement {
        id: row.id,
        name: row.name,
        description: row.description,
        category: row.category,
        requirement_type: row.requirement_type,
        requirement_value: row.requirement_value,
        xp_reward: row.xp_reward,
        coin_reward: row.coin_reward,
        gem_reward: row.gem_reward,
    }
}

fn row_to_item(row: InventoryRow) -> StoreResult<InventoryItem> {
    Ok(InventoryItem {
        rarity: parse_rarity(&row.rarity)?,
        id: row.id,
        user_id: row.user_id,
        template_id: row.template_id,
        name: row.name,
        value: row.value,
        equipped: row.equipped,
    })
}

fn row_to_catalog_item(row: CatalogRow) -> StoreResult<CatalogItem> {
    Ok(CatalogItem {
        rarity: parse_rarity(&row.rarity)?,
        id: row.id,
        name: row.name,
        base_value: row.base_value,
        active: row.active,
    })
}

fn row_to_notification(row: NotificationRow) -> Notification {
    Notification {
        id: row.id,
        user_id: row.user_id,
        kind: row.kind,
        title: row.title,
        message: row.message,
        data: row.data,
        read: row.read,
        created_at: row.created_at,
    }
}

// ============================================================================
// Economy Repo
// ============================================================================

pub struct PgEconomyRepo {
    store: Arc<PostgresStore>,
}

impl PgEconomyRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }

    async fn ensure_row(&self, user_id: UserId) -> StoreResult<()> {
        sqlx::query("INSERT INTO user_economy (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(self.store.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EconomyRepo for PgEconomyRepo {
    async fn get(&self, user_id: UserId) -> StoreResult<UserEconomy> {
        let row = sqlx::query_as::<_, EconomyRow>(
            "SELECT user_id, coins, gems, xp, level, login_streak, last_login_date, last_stipend_date
             FROM user_economy WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.store.pool())
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("economy row for user {}", user_id)))?;

        Ok(row_to_economy(row))
    }

    async fn ensure(&self, user_id: UserId) -> StoreResult<UserEconomy> {
        self.ensure_row(user_id).await?;
        self.get(user_id).await
    }

    async fn credit(
        &self,
        user_id: UserId,
        coins: i64,
        gems: i64,
        xp: i64,
    ) -> StoreResult<UserEconomy> {
        self.ensure_row(user_id).await?;

        let row = sqlx::query_as::<_, EconomyRow>(
            "UPDATE user_economy
             SET coins = coins + $2, gems = gems + $3, xp = xp + $4
             WHERE user_id = $1
             RETURNING user_id, coins, gems, xp, level, login_streak, last_login_date, last_stipend_date",
        )
        .bind(user_id)
        .bind(coins)
        .bind(gems)
        .bind(xp)
        .fetch_one(self.store.pool())
        .await?;

        Ok(row_to_economy(row))
    }

    async fn raise_level(&self, user_id: UserId, level: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE user_economy SET level = $2 WHERE user_id = $1 AND level < $2",
        )
        .bind(user_id)
        .bind(level)
        .execute(self.store.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_login(
        &self,
        user_id: UserId,
        today: NaiveDate,
        yesterday: NaiveDate,
    ) -> StoreResult<LoginTransition> {
        self.ensure_row(user_id).await?;

        // Streak decision and last_login_date write happen in one locked
        // statement; `prev` is the date the row held before this call.
        let (streak, previous_login): (i32, Option<NaiveDate>) = sqlx::query_as(
            "UPDATE user_economy e
             SET login_streak = CASE
                     WHEN p.prev = $2 THEN e.login_streak
                     WHEN p.prev = $3 THEN e.login_streak + 1
                     ELSE 1
                 END,
                 last_login_date = $2
             FROM (
                 SELECT last_login_date AS prev
                 FROM user_economy
                 WHERE user_id = $1
                 FOR UPDATE
             ) p
             WHERE e.user_id = $1
             RETURNING e.login_streak, p.prev",
        )
        .bind(user_id)
        .bind(today)
        .bind(yesterday)
        .fetch_one(self.store.pool())
        .await?;

        Ok(LoginTransition {
            streak,
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
        self.ensure_row(user_id).await?;

        let result = sqlx::query(
            "UPDATE user_economy
             SET coins = coins + $3, gems = gems + $4, last_stipend_date = $2
             WHERE user_id = $1
               AND (last_stipend_date IS NULL OR last_stipend_date < $2)",
        )
        .bind(user_id)
        .bind(today)
        .bind(coins)
        .bind(gems)
        .execute(self.store.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// Mission Repo
// ============================================================================

const MISSION_COLUMNS: &str = "id, name, description, mission_type, requirement_type, \
                               requirement_value, xp_reward, coin_reward, gem_reward, repeatable";

pub struct PgMissionRepo {
    store: Arc<PostgresStore>,
}

impl PgMissionRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MissionRepo for PgMissionRepo {
    async fn by_action(&self, requirement_type: &str) -> StoreResult<Vec<Mission>> {
        let rows = sqlx::query_as::<_, MissionRow>(&format!(
            "SELECT {} FROM missions WHERE requirement_type = $1 ORDER BY id",
            MISSION_COLUMNS
        ))
        .bind(requirement_type)
        .fetch_all(self.store.pool())
        .await?;

        rows.into_iter().map(row_to_mission).collect()
    }

    async fn by_kind(&self, kind: MissionKind) -> StoreResult<Vec<Mission>> {
        let rows = sqlx::query_as::<_, MissionRow>(&format!(
            "SELECT {} FROM missions WHERE mission_type = $1 ORDER BY id",
            MISSION_COLUMNS
        ))
        .bind(kind.as_str())
        .fetch_all(self.store.pool())
        .await?;

        rows.into_iter().map(row_to_mission).collect()
    }

    async fn get(&self, mission_id: &str) -> StoreResult<Option<Mission>> {
        let row = sqlx::query_as::<_, MissionRow>(&format!(
            "SELECT {} FROM missions WHERE id = $1",
            MISSION_COLUMNS
        ))
        .bind(mission_id)
        .fetch_optional(self.store.pool())
        .await?;

        row.map(row_to_mission).transpose()
    }

    async fn progress(
        &self,
        user_id: UserId,
        mission_id: &str,
    ) -> StoreResult<Option<UserMissionProgress>> {
        let row = sqlx::query_as::<_, MissionProgressRow>(
            "SELECT user_id, mission_id, progress, completed
             FROM user_mission_progress WHERE user_id = $1 AND mission_id = $2",
        )
        .bind(user_id)
        .bind(mission_id)
        .fetch_optional(self.store.pool())
        .await?;

        Ok(row.map(|r| UserMissionProgress {
            user_id: r.user_id,
            mission_id: r.mission_id,
            progress: r.progress,
            completed: r.completed,
        }))
    }

    async fn advance_progress(
        &self,
        user_id: UserId,
        mission_id: &str,
        delta: i64,
    ) -> StoreResult<i64> {
        let progress: i64 = sqlx::query_scalar(
            "INSERT INTO user_mission_progress (user_id, mission_id, progress)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, mission_id)
             DO UPDATE SET progress = user_mission_progress.progress + $3
             RETURNING progress",
        )
        .bind(user_id)
        .bind(mission_id)
        .bind(delta)
        .fetch_one(self.store.pool())
        .await?;

        Ok(progress)
    }

    async fn set_progress(
        &self,
        user_id: UserId,
        mission_id: &str,
        value: i64,
    ) -> StoreResult<i64> {
        let progress: i64 = sqlx::query_scalar(
            "INSERT INTO user_mission_progress (user_id, mission_id, progress)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, mission_id)
             DO UPDATE SET progress = EXCLUDED.progress
             RETURNING progress",
        )
        .bind(user_id)
        .bind(mission_id)
        .bind(value)
        .fetch_one(self.store.pool())
        .await?;

        Ok(progress)
    }

    async fn claim_completion(
        &self,
        user_id: UserId,
        mission_id: &str,
        requirement: i64,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE user_mission_progress
             SET completed = TRUE
             WHERE user_id = $1 AND mission_id = $2
               AND completed = FALSE AND progress >= $3",
        )
        .bind(user_id)
        .bind(mission_id)
        .bind(requirement)
        .execute(self.store.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn all_completed(
        &self,
        user_id: UserId,
        kind: MissionKind,
        excluding_action: &str,
    ) -> StoreResult<bool> {
        let all_done: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM missions
                 WHERE mission_type = $2 AND requirement_type <> $3
             )
             AND NOT EXISTS(
                 SELECT 1 FROM missions m
                 LEFT JOIN user_mission_progress p
                        ON p.mission_id = m.id AND p.user_id = $1
                 WHERE m.mission_type = $2 AND m.requirement_type <> $3
                   AND COALESCE(p.completed, FALSE) = FALSE
             )",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(excluding_action)
        .fetch_one(self.store.pool())
        .await?;

        Ok(all_done)
    }

    async fn reset_progress(&self, user_id: UserId, kind: MissionKind) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE user_mission_progress p
             SET progress = 0, completed = FALSE
             FROM missions m
             WHERE p.mission_id = m.id AND p.user_id = $1
               AND m.mission_type = $2 AND m.repeatable",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .execute(self.store.pool())
        .await?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Achievement Repo
// ============================================================================

const ACHIEVEMENT_COLUMNS: &str = "id, name, description, category, requirement_type, \
                                   requirement_value, xp_reward, coin_reward, gem_reward";

pub struct PgAchievementRepo {
    store: Arc<PostgresStore>,
}

impl PgAchievementRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AchievementRepo for PgAchievementRepo {
    async fn catalog(&self, category: Option<&str>) -> StoreResult<Vec<Achievement>> {
        let rows = match category {
            Some(cat) => {
                sqlx::query_as::<_, AchievementRow>(&format!(
                    "SELECT {} FROM achievements WHERE category = $1 ORDER BY id",
                    ACHIEVEMENT_COLUMNS
                ))
                .bind(cat)
                .fetch_all(self.store.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, AchievementRow>(&format!(
                    "SELECT {} FROM achievements ORDER BY id",
                    ACHIEVEMENT_COLUMNS
                ))
                .fetch_all(self.store.pool())
                .await?
            }
        };

        Ok(rows.into_iter().map(row_to_achievement).collect())
    }

    async fn get(&self, achievement_id: &str) -> StoreResult<Option<Achievement>> {
        let row = sqlx::query_as::<_, AchievementRow>(&format!(
            "SELECT {} FROM achievements WHERE id = $1",
            ACHIEVEMENT_COLUMNS
        ))
        .bind(achievement_id)
        .fetch_optional(self.store.pool())
        .await?;

        Ok(row.map(row_to_achievement))
    }

    async fn unlocked_ids(&self, user_id: UserId) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT achievement_id FROM user_achievements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self.store.pool())
        .await?;

        Ok(ids)
    }

    async fn try_unlock(&self, user_id: UserId, achievement_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_achievements (user_id, achievement_id)
             VALUES ($1, $2)
             ON CONFLICT (user_id, achievement_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(achievement_id)
        .execute(self.store.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// Bet Stats Repo
// ============================================================================

pub struct PgBetStatsRepo {
    store: Arc<PostgresStore>,
}

impl PgBetStatsRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BetStatsRepo for PgBetStatsRepo {
    async fn count_bets(&self, user_id: UserId, won_only: bool) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bets WHERE user_id = $1 AND (NOT $2 OR won)",
        )
        .bind(user_id)
        .bind(won_only)
        .fetch_one(self.store.pool())
        .await?;

        Ok(count)
    }

    async fn recent_outcomes(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<bool>> {
        let outcomes: Vec<bool> = sqlx::query_scalar(
            "SELECT won FROM bets WHERE user_id = $1
             ORDER BY settled_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.store.pool())
        .await?;

        Ok(outcomes)
    }

    async fn max_won_odds(&self, user_id: UserId) -> StoreResult<Option<f64>> {
        let max: Option<f64> =
            sqlx::query_scalar("SELECT MAX(odds) FROM bets WHERE user_id = $1 AND won")
                .bind(user_id)
                .fetch_one(self.store.pool())
                .await?;

        Ok(max)
    }

    async fn max_won_payout(&self, user_id: UserId) -> StoreResult<Option<i64>> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(payout) FROM bets WHERE user_id = $1 AND won")
                .bind(user_id)
                .fetch_one(self.store.pool())
                .await?;

        Ok(max)
    }
}

// ============================================================================
// Key Repo
// ============================================================================

pub struct PgKeyRepo {
    store: Arc<PostgresStore>,
}

impl PgKeyRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KeyRepo for PgKeyRepo {
    async fn add_keys(&self, user_id: UserId, kind: CrateKind, count: i64) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "INSERT INTO user_keys (user_id, crate_kind, keys_count)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, crate_kind)
             DO UPDATE SET keys_count = user_keys.keys_count + $3
             RETURNING keys_count",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(count)
        .fetch_one(self.store.pool())
        .await?;

        Ok(total)
    }

    async fn key_count(&self, user_id: UserId, kind: CrateKind) -> StoreResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT keys_count FROM user_keys WHERE user_id = $1 AND crate_kind = $2",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_optional(self.store.pool())
        .await?;

        Ok(count.unwrap_or(0))
    }
}

// ============================================================================
// Inventory Repo
// ============================================================================

const ITEM_COLUMNS: &str = "id, user_id, template_id, name, rarity, value, equipped";

pub struct PgInventoryRepo {
    store: Arc<PostgresStore>,
}

impl PgInventoryRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl InventoryRepo for PgInventoryRepo {
    async fn items_by_ids(
        &self,
        user_id: UserId,
        item_ids: &[ItemId],
    ) -> StoreResult<Vec<InventoryItem>> {
        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {} FROM inventory_items WHERE user_id = $1 AND id = ANY($2) ORDER BY id",
            ITEM_COLUMNS
        ))
        .bind(user_id)
        .bind(item_ids)
        .fetch_all(self.store.pool())
        .await?;

        rows.into_iter().map(row_to_item).collect()
    }

    async fn count_items(&self, user_id: UserId) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.store.pool())
                .await?;

        Ok(count)
    }

    async fn count_items_by_rarity(&self, user_id: UserId, rarity: Rarity) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_items WHERE user_id = $1 AND rarity = $2",
        )
        .bind(user_id)
        .bind(rarity.as_str())
        .fetch_one(self.store.pool())
        .await?;

        Ok(count)
    }

    async fn trade_up(
        &self,
        user_id: UserId,
        input_ids: &[ItemId],
        input_snapshot: serde_json::Value,
        output: NewInventoryItem,
    ) -> StoreResult<InventoryItem> {
        let mut tx = self.store.pool().begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM inventory_items WHERE user_id = $1 AND id = ANY($2)",
        )
        .bind(user_id)
        .bind(input_ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Dropping the tx without commit rolls the delete back.
        if deleted != input_ids.len() as u64 {
            return Err(StoreError::Constraint(format!(
                "trade-up for user {} deleted {} of {} input items",
                user_id,
                deleted,
                input_ids.len()
            )));
        }

        let row = sqlx::query_as::<_, InventoryRow>(&format!(
            "INSERT INTO inventory_items (user_id, template_id, name, rarity, value)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(output.user_id)
        .bind(&output.template_id)
        .bind(&output.name)
        .bind(output.rarity.as_str())
        .bind(output.value)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO trade_up_contracts (user_id, input_items, output_item_id)
             VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(input_snapshot)
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        row_to_item(row)
    }
}

// ============================================================================
// Item Catalog Repo
// ============================================================================

pub struct PgItemCatalogRepo {
    store: Arc<PostgresStore>,
}

impl PgItemCatalogRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemCatalogRepo for PgItemCatalogRepo {
    async fn active_by_rarity(&self, rarity: Rarity, limit: i64) -> StoreResult<Vec<CatalogItem>> {
        let rows = sqlx::query_as::<_, CatalogRow>(
            "SELECT id, name, rarity, base_value, active
             FROM item_catalog WHERE rarity = $1 AND active
             ORDER BY id LIMIT $2",
        )
        .bind(rarity.as_str())
        .bind(limit)
        .fetch_all(self.store.pool())
        .await?;

        rows.into_iter().map(row_to_catalog_item).collect()
    }

    async fn get(&self, template_id: &str) -> StoreResult<Option<CatalogItem>> {
        let row = sqlx::query_as::<_, CatalogRow>(
            "SELECT id, name, rarity, base_value, active FROM item_catalog WHERE id = $1",
        )
        .bind(template_id)
        .fetch_optional(self.store.pool())
        .await?;

        row.map(row_to_catalog_item).transpose()
    }
}

// ============================================================================
// Notification Repo
// ============================================================================

pub struct PgNotificationRepo {
    store: Arc<PostgresStore>,
}

impl PgNotificationRepo {
    pub fn new(store: Arc<PostgresStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationRepo for PgNotificationRepo {
    async fn insert(&self, notification: NewNotification) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO notifications (user_id, kind, title, message, data)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.data)
        .fetch_one(self.store.pool())
        .await?;

        Ok(id)
    }

    async fn unread_count(&self, user_id: UserId) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read",
        )
        .bind(user_id)
        .fetch_one(self.store.pool())
        .await?;

        Ok(count)
    }

    async fn recent(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, user_id, kind, title, message, data, read, created_at
             FROM notifications WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.store.pool())
        .await?;

        Ok(rows.into_iter().map(row_to_notification).collect())
    }
}
