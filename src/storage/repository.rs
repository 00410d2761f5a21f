//! Repository traits - abstraction layer for data access
//!
//! Every progress-counter race lives behind one of these methods: counters are
//! incremented and returned in a single store round trip, completion flips
//! are claimed with a guarded update, and unlock inserts rely on the
//! store's uniqueness constraint. Callers never read-modify-write.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::StoreResult;
use crate::models::*;

/// Outcome of a daily-login bookkeeping update: the streak after the
/// update plus the login date the row held before it.
#[derive(Debug, Clone, Copy)]
pub struct LoginTransition {
    pub streak: i32,
    pub previous_login: Option<NaiveDate>,
}

impl LoginTransition {
    /// True when this call was the first login of `today`.
    pub fn first_login_of(&self, today: NaiveDate) -> bool {
        self.previous_login != Some(today)
    }
}

/// Per-user economy ledger.
#[async_trait]
pub trait EconomyRepo: Send + Sync {
    async fn get(&self, user_id: UserId) -> StoreResult<UserEconomy>;

    /// Create the default row if the user has none yet.
    async fn ensure(&self, user_id: UserId) -> StoreResult<UserEconomy>;

    /// Apply one reward burst (coins + gems + xp) as a single atomic update
    /// and return the row after the write.
    async fn credit(
        &self,
        user_id: UserId,
        coins: i64,
        gems: i64,
        xp: i64,
    ) -> StoreResult<UserEconomy>;

    /// Raise the stored level to `level` if it is currently lower.
    /// Returns true when the row changed.
    async fn raise_level(&self, user_id: UserId, level: i32) -> StoreResult<bool>;

    /// Update login-streak bookkeeping for `today` in one locked write:
    /// consecutive logins increment the streak, a gap resets it to 1, and a
    /// repeat login on the same day leaves it untouched.
    async fn record_login(
        &self,
        user_id: UserId,
        today: NaiveDate,
        yesterday: NaiveDate,
    ) -> StoreResult<LoginTransition>;

    /// Credit the daily rank stipend if it has not been claimed for
    /// `today`. Returns true when the stipend was granted.
    async fn claim_stipend(
        &self,
        user_id: UserId,
        today: NaiveDate,
        coins: i64,
        gems: i64,
    ) -> StoreResult<bool>;
}

/// Mission catalog + per-user progress.
#[async_trait]
pub trait MissionRepo: Send + Sync {
    async fn by_action(&self, requirement_type: &str) -> StoreResult<Vec<Mission>>;
    async fn by_kind(&self, kind: MissionKind) -> StoreResult<Vec<Mission>>;
    async fn get(&self, mission_id: &str) -> StoreResult<Option<Mission>>;

    async fn progress(
        &self,
        user_id: UserId,
        mission_id: &str,
    ) -> StoreResult<Option<UserMissionProgress>>;

    /// Atomically add `delta` to the progress counter (creating the row at
    /// `delta` if absent) and return the new value.
    async fn advance_progress(
        &self,
        user_id: UserId,
        mission_id: &str,
        delta: i64,
    ) -> StoreResult<i64>;

    /// Atomically overwrite the progress counter (ownership-style counters
    /// recomputed from inventory state) and return the new value.
    async fn set_progress(&self, user_id: UserId, mission_id: &str, value: i64)
        -> StoreResult<i64>;

    /// Claim the single completion transition: flips `completed` to true
    /// only if it is false and progress has reached `requirement`. Exactly
    /// one concurrent caller observes `true`.
    async fn claim_completion(
        &self,
        user_id: UserId,
        mission_id: &str,
        requirement: i64,
    ) -> StoreResult<bool>;

    /// True when every mission of `kind` (excluding rows whose
    /// requirement_type is `excluding_action`) is completed for the user.
    async fn all_completed(
        &self,
        user_id: UserId,
        kind: MissionKind,
        excluding_action: &str,
    ) -> StoreResult<bool>;

    /// Zero progress and clear `completed` for the user's repeatable
    /// missions of `kind`; returns the number of rows reset.
    async fn reset_progress(&self, user_id: UserId, kind: MissionKind) -> StoreResult<u64>;
}

/// Achievement catalog + per-user unlocks.
#[async_trait]
pub trait AchievementRepo: Send + Sync {
    async fn catalog(&self, category: Option<&str>) -> StoreResult<Vec<Achievement>>;
    async fn get(&self, achievement_id: &str) -> StoreResult<Option<Achievement>>;
    async fn unlocked_ids(&self, user_id: UserId) -> StoreResult<Vec<String>>;

    /// Insert the unlock row, relying on the store's (user, achievement)
    /// uniqueness. Returns true only for the caller that actually inserted.
    async fn try_unlock(&self, user_id: UserId, achievement_id: &str) -> StoreResult<bool>;
}

/// Read-only aggregates over settled bets, for achievement predicates.
#[async_trait]
pub trait BetStatsRepo: Send + Sync {
    async fn count_bets(&self, user_id: UserId, won_only: bool) -> StoreResult<i64>;

    /// Win/loss outcomes of the most recent `limit` settled bets, newest
    /// first.
    async fn recent_outcomes(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<bool>>;

    async fn max_won_odds(&self, user_id: UserId) -> StoreResult<Option<f64>>;
    async fn max_won_payout(&self, user_id: UserId) -> StoreResult<Option<i64>>;
}

/// Crate-key counters.
#[async_trait]
pub trait KeyRepo: Send + Sync {
    /// Atomic increment (upsert) of the (user, crate) counter; returns the
    /// new total.
    async fn add_keys(&self, user_id: UserId, kind: CrateKind, count: i64) -> StoreResult<i64>;

    async fn key_count(&self, user_id: UserId, kind: CrateKind) -> StoreResult<i64>;
}

/// Per-user inventory.
#[async_trait]
pub trait InventoryRepo: Send + Sync {
    /// Fetch the subset of `item_ids` owned by the user.
    async fn items_by_ids(&self, user_id: UserId, item_ids: &[ItemId])
        -> StoreResult<Vec<InventoryItem>>;

    async fn count_items(&self, user_id: UserId) -> StoreResult<i64>;
    async fn count_items_by_rarity(&self, user_id: UserId, rarity: Rarity) -> StoreResult<i64>;

    /// Transactional trade-up swap: delete exactly the five input rows,
    /// insert the output row, and append the audit contract. Aborts without
    /// mutation unless all five inputs were deleted.
    async fn trade_up(
        &self,
        user_id: UserId,
        input_ids: &[ItemId],
        input_snapshot: serde_json::Value,
        output: NewInventoryItem,
    ) -> StoreResult<InventoryItem>;
}

/// Read-only item catalog.
#[async_trait]
pub trait ItemCatalogRepo: Send + Sync {
    /// Active catalog rows at `rarity`, bounded to `limit` candidates.
    async fn active_by_rarity(&self, rarity: Rarity, limit: i64) -> StoreResult<Vec<CatalogItem>>;

    async fn get(&self, template_id: &str) -> StoreResult<Option<CatalogItem>>;
}

/// Notification persistence.
#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn insert(&self, notification: NewNotification) -> StoreResult<i64>;
    async fn unread_count(&self, user_id: UserId) -> StoreResult<i64>;
    async fn recent(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<Notification>>;
}
