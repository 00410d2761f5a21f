//! Domain types shared by every engine and storage backend.
//!
//! Catalog rows (missions, achievements, item catalog) are read-only; the
//! per-user rows (economy, progress, unlocks, keys, inventory) are the
//! mutable state the engines drive.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ItemId = i64;

// ============================================================================
// Economy Ledger
// ============================================================================

/// Per-user economy row. `xp` is monotonic non-decreasing and `level` is
/// always `curve.level_for_xp(xp)`; the store guard only ever raises it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEconomy {
    pub user_id: UserId,
    pub coins: i64,
    pub gems: i64,
    pub xp: i64,
    pub level: i32,
    pub login_streak: i32,
    pub last_login_date: Option<NaiveDate>,
    pub last_stipend_date: Option<NaiveDate>,
}

/// Currency portion of a reward, bundled into the same ledger write as the
/// xp credit that carries it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RewardBundle {
    pub coins: i64,
    pub gems: i64,
}

impl RewardBundle {
    pub fn is_empty(&self) -> bool {
        self.coins == 0 && self.gems == 0
    }
}

// ============================================================================
// Missions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionKind {
    Daily,
    Weekly,
    Special,
    Story,
}

impl MissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionKind::Daily => "daily",
            MissionKind::Weekly => "weekly",
            MissionKind::Special => "special",
            MissionKind::Story => "story",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(MissionKind::Daily),
            "weekly" => Some(MissionKind::Weekly),
            "special" => Some(MissionKind::Special),
            "story" => Some(MissionKind::Story),
            _ => None,
        }
    }
}

/// Read-only mission catalog row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: MissionKind,
    pub requirement_type: String,
    pub requirement_value: i64,
    pub xp_reward: i64,
    pub coin_reward: i64,
    pub gem_reward: i64,
    pub repeatable: bool,
}

/// Per-(user, mission) progress counter. Monotonic within a cycle; only an
/// external scheduler reset zeroes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMissionProgress {
    pub user_id: UserId,
    pub mission_id: String,
    pub progress: i64,
    pub completed: bool,
}

/// Requirement type of the special mission advanced when every daily
/// mission of a cycle is complete.
pub const DAILY_AGGREGATE_ACTION: &str = "complete_daily_missions";

// ============================================================================
// Achievements
// ============================================================================

/// Read-only achievement catalog row. `requirement_value` is a float so the
/// same column covers counts, levels, and odds thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
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

/// Append-only unlock record; (user_id, achievement_id) is unique in the
/// store and that uniqueness is the primary correctness invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: UserId,
    pub achievement_id: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Progress snapshot for UI display, derived by the same predicate logic
/// that decides unlocks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AchievementProgress {
    pub current: f64,
    pub required: f64,
    pub percentage: f64,
}

// ============================================================================
// Bets (read-only aggregate source for achievement predicates)
// ============================================================================

/// Settled bet row, written by the betting collaborator. The evaluator only
/// reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: i64,
    pub user_id: UserId,
    pub amount: i64,
    pub odds: f64,
    pub payout: i64,
    pub won: bool,
    pub settled_at: DateTime<Utc>,
}

// ============================================================================
// Crates & Keys
// ============================================================================

/// Fixed crate taxonomy. Keys are granted per crate kind and consumed by the
/// (out-of-scope) crate-opening flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrateKind {
    LevelUp,
    WeeklyLoyalty,
    Prestige,
    Reward,
    Event,
}

impl CrateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrateKind::LevelUp => "level_up",
            CrateKind::WeeklyLoyalty => "weekly_loyalty",
            CrateKind::Prestige => "prestige",
            CrateKind::Reward => "reward",
            CrateKind::Event => "event",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "level_up" => Some(CrateKind::LevelUp),
            "weekly_loyalty" => Some(CrateKind::WeeklyLoyalty),
            "prestige" => Some(CrateKind::Prestige),
            "reward" => Some(CrateKind::Reward),
            "event" => Some(CrateKind::Event),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CrateKind::LevelUp => "Level-Up Crate",
            CrateKind::WeeklyLoyalty => "Weekly Loyalty Crate",
            CrateKind::Prestige => "Prestige Crate",
            CrateKind::Reward => "Reward Crate",
            CrateKind::Event => "Event Crate",
        }
    }
}

// ============================================================================
// Inventory & Item Catalog
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "common" => Some(Rarity::Common),
            "uncommon" => Some(Rarity::Uncommon),
            "rare" => Some(Rarity::Rare),
            "epic" => Some(Rarity::Epic),
            "legendary" => Some(Rarity::Legendary),
            _ => None,
        }
    }

    /// Trade-up ladder; legendary is terminal and maps to itself.
    pub fn next_tier(&self) -> Rarity {
        match self {
            Rarity::Common => Rarity::Uncommon,
            Rarity::Uncommon => Rarity::Rare,
            Rarity::Rare => Rarity::Epic,
            Rarity::Epic => Rarity::Legendary,
            Rarity::Legendary => Rarity::Legendary,
        }
    }

    /// Value multiplier used by the trade-up output formula.
    pub fn value_multiplier(&self) -> f64 {
        match self {
            Rarity::Common => 1.0,
            Rarity::Uncommon => 1.5,
            Rarity::Rare => 2.5,
            Rarity::Epic => 4.0,
            Rarity::Legendary => 7.0,
        }
    }
}

/// Per-user owned item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub user_id: UserId,
    pub template_id: String,
    pub name: String,
    pub rarity: Rarity,
    pub value: i64,
    pub equipped: bool,
}

/// Read-only item catalog row; trade-up outputs are drawn from active rows
/// at the target rarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    pub base_value: i64,
    pub active: bool,
}

/// New inventory row to insert (trade-up output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub user_id: UserId,
    pub template_id: String,
    pub name: String,
    pub rarity: Rarity,
    pub value: i64,
}

/// Append-only trade-up audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeUpContract {
    pub id: i64,
    pub user_id: UserId,
    pub input_items: serde_json::Value,
    pub output_item_id: ItemId,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: UserId,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rarity_ladder_terminates_at_legendary() {
        assert_eq!(Rarity::Common.next_tier(), Rarity::Uncommon);
        assert_eq!(Rarity::Epic.next_tier(), Rarity::Legendary);
        assert_eq!(Rarity::Legendary.next_tier(), Rarity::Legendary);
    }

    #[test]
    fn test_rarity_roundtrip() {
        for r in [
            Rarity::Common,
            Rarity::Uncommon,
            Rarity::Rare,
            Rarity::Epic,
            Rarity::Legendary,
        ] {
            assert_eq!(Rarity::from_str(r.as_str()), Some(r));
        }
        assert_eq!(Rarity::from_str("mythic"), None);
    }

    #[test]
    fn test_crate_kind_roundtrip() {
        for k in [
            CrateKind::LevelUp,
            CrateKind::WeeklyLoyalty,
            CrateKind::Prestige,
            CrateKind::Reward,
            CrateKind::Event,
        ] {
            assert_eq!(CrateKind::from_str(k.as_str()), Some(k));
        }
    }

    #[test]
    fn test_mission_kind_roundtrip() {
        for k in [
            MissionKind::Daily,
            MissionKind::Weekly,
            MissionKind::Special,
            MissionKind::Story,
        ] {
            assert_eq!(MissionKind::from_str(k.as_str()), Some(k));
        }
    }
}
