//! XP / Leveling Engine
//!
//! One strictly increasing curve maps levels to cumulative xp, and the
//! inverse direction reuses the same forward function so the two can never
//! disagree. Rank is recomputed from level on every use, never cached.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::crate_keys::KeyDispatcher;
use crate::error::{CoreError, CoreResult};
use crate::gateway::{Audience, Channel, NotificationGateway};
use crate::models::{NewNotification, RewardBundle, UserEconomy, UserId};
use crate::storage::Store;

// ============================================================================
// Level Curve
// ============================================================================

/// Deterministic, strictly increasing mapping between levels and cumulative
/// xp. `level_for_xp` is derived from `xp_for_level`, so any implementor
/// only has to keep the forward direction monotonic.
pub trait LevelCurve: Send + Sync {
    /// Cumulative xp required to hold `level`. Must be strictly increasing
    /// in `level` and zero at level 1.
    fn xp_for_level(&self, level: i32) -> i64;

    /// Highest level whose requirement `xp` meets. Walks the forward
    /// function, so the two directions share one definition.
    fn level_for_xp(&self, xp: i64) -> i32 {
        let mut level = 1;
        while self.xp_for_level(level + 1) <= xp {
            level += 1;
        }
        level
    }
}

/// Default curve: `xp_for_level(n) = base * (n - 1)^2`.
pub struct QuadraticCurve {
    base: i64,
}

impl QuadraticCurve {
    pub fn new(base: i64) -> Self {
        Self { base }
    }
}

impl Default for QuadraticCurve {
    fn default() -> Self {
        Self::new(100)
    }
}

impl LevelCurve for QuadraticCurve {
    fn xp_for_level(&self, level: i32) -> i64 {
        let n = (level - 1).max(0) as i64;
        self.base * n * n
    }
}

// ============================================================================
// Ranks
// ============================================================================

/// Benefit tier keyed off level ranges. Stipends are claimed daily; the xp
/// boost applies to every xp grant while the rank holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub name: &'static str,
    pub min_level: i32,
    pub daily_coins: i64,
    pub daily_gems: i64,
    pub xp_boost_percent: i64,
}

/// Sorted by `min_level`; `rank_for_level` picks the last row at or below
/// the level.
pub const RANKS: [Rank; 6] = [
    Rank { name: "Bronze", min_level: 1, daily_coins: 10, daily_gems: 0, xp_boost_percent: 0 },
    Rank { name: "Silver", min_level: 10, daily_coins: 25, daily_gems: 0, xp_boost_percent: 5 },
    Rank { name: "Gold", min_level: 20, daily_coins: 50, daily_gems: 1, xp_boost_percent: 10 },
    Rank { name: "Platinum", min_level: 35, daily_coins: 100, daily_gems: 2, xp_boost_percent: 15 },
    Rank { name: "Diamond", min_level: 50, daily_coins: 200, daily_gems: 5, xp_boost_percent: 20 },
    Rank { name: "Legend", min_level: 75, daily_coins: 500, daily_gems: 10, xp_boost_percent: 25 },
];

pub fn rank_for_level(level: i32) -> &'static Rank {
    RANKS
        .iter()
        .rev()
        .find(|r| r.min_level <= level)
        .unwrap_or(&RANKS[0])
}

// ============================================================================
// XP Engine
// ============================================================================

pub struct XpEngine {
    store: Arc<Store>,
    gateway: NotificationGateway,
    keys: KeyDispatcher,
    curve: Arc<dyn LevelCurve>,
}

impl XpEngine {
    pub fn new(
        store: Arc<Store>,
        gateway: NotificationGateway,
        keys: KeyDispatcher,
        curve: Arc<dyn LevelCurve>,
    ) -> Self {
        Self {
            store,
            gateway,
            keys,
            curve,
        }
    }

    pub fn curve(&self) -> &dyn LevelCurve {
        self.curve.as_ref()
    }

    /// Grant xp with no bundled currency.
    pub async fn add_xp(
        &self,
        user_id: UserId,
        amount: i64,
        source: &str,
        metadata: Option<serde_json::Value>,
    ) -> CoreResult<UserEconomy> {
        self.add_xp_with_rewards(user_id, amount, RewardBundle::default(), source, metadata)
            .await
    }

    /// Grant xp plus a currency bundle in one ledger write. Applies the
    /// current rank's xp boost, recomputes level from total xp, and fires
    /// the level-up cascade (crate keys, notification, broadcast) when the
    /// level rose. Cascade failures are logged, never surfaced.
    pub async fn add_xp_with_rewards(
        &self,
        user_id: UserId,
        amount: i64,
        rewards: RewardBundle,
        source: &str,
        metadata: Option<serde_json::Value>,
    ) -> CoreResult<UserEconomy> {
        if amount <= 0 {
            return Err(CoreError::validation(format!(
                "xp amount must be positive, got {}",
                amount
            )));
        }

        // Boost reads the level before the credit; a concurrent level-up
        // may use the older rank for this one grant, which is acceptable.
        let before = self.store.economy.ensure(user_id).await?;
        let rank = rank_for_level(before.level);
        let boosted = amount + amount * rank.xp_boost_percent / 100;

        let mut after = self
            .store
            .economy
            .credit(user_id, rewards.coins, rewards.gems, boosted)
            .await?;

        let old_level = self.curve.level_for_xp(after.xp - boosted);
        let new_level = self.curve.level_for_xp(after.xp);

        if new_level > old_level {
            // Guard only ever raises, so racing grants cannot regress it.
            self.store.economy.raise_level(user_id, new_level).await?;
            after.level = after.level.max(new_level);

            info!(
                user_id,
                old_level, new_level, source, "user leveled up"
            );

            if let Err(e) = self
                .keys
                .award_level_up_crate_keys(user_id, old_level, new_level)
                .await
            {
                warn!(user_id, error = %e, "level-up key grant failed");
            }

            let new_rank = rank_for_level(new_level);
            let payload = json!({
                "old_level": old_level,
                "new_level": new_level,
                "rank": new_rank.name,
                "source": source,
                "metadata": metadata,
            });

            if let Err(e) = self.gateway.publish(
                Channel::XpUpdates,
                Audience::User(user_id),
                "level_up",
                payload.clone(),
            ) {
                warn!(user_id, error = %e, "level-up broadcast failed");
            }

            if let Err(e) = self
                .gateway
                .notify(NewNotification {
                    user_id,
                    kind: "level_up".into(),
                    title: format!("Level {}", new_level),
                    message: format!("You reached level {}", new_level),
                    data: payload,
                })
                .await
            {
                warn!(user_id, error = %e, "level-up notification failed");
            }
        } else {
            after.level = after.level.max(new_level);
        }

        Ok(after)
    }

    /// Credit the daily stipend of the user's current rank, at most once
    /// per calendar day.
    pub async fn claim_daily_stipend(
        &self,
        user_id: UserId,
        today: chrono::NaiveDate,
    ) -> CoreResult<bool> {
        let economy = self.store.economy.ensure(user_id).await?;
        let rank = rank_for_level(economy.level);

        let granted = self
            .store
            .economy
            .claim_stipend(user_id, today, rank.daily_coins, rank.daily_gems)
            .await?;

        if granted {
            info!(user_id, rank = rank.name, "daily stipend claimed");
            if let Err(e) = self
                .gateway
                .notify(NewNotification {
                    user_id,
                    kind: "daily_stipend".into(),
                    title: format!("{} Stipend", rank.name),
                    message: format!(
                        "Daily stipend: {} coins, {} gems",
                        rank.daily_coins, rank.daily_gems
                    ),
                    data: json!({
                        "rank": rank.name,
                        "coins": rank.daily_coins,
                        "gems": rank.daily_gems,
                    }),
                })
                .await
            {
                warn!(user_id, error = %e, "stipend notification failed");
            }
        }

        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_directions_agree() {
        let curve = QuadraticCurve::default();
        for level in 1..=100 {
            let xp = curve.xp_for_level(level);
            assert_eq!(
                curve.level_for_xp(xp),
                level,
                "level {} at exactly its requirement",
                level
            );
            if level > 1 {
                assert_eq!(
                    curve.level_for_xp(xp - 1),
                    level - 1,
                    "one xp short of level {}",
                    level
                );
            }
        }
    }

    #[test]
    fn test_curve_is_strictly_increasing() {
        let curve = QuadraticCurve::default();
        for level in 1..=100 {
            assert!(curve.xp_for_level(level + 1) > curve.xp_for_level(level));
        }
    }

    #[test]
    fn test_level_one_at_zero_xp() {
        let curve = QuadraticCurve::default();
        assert_eq!(curve.xp_for_level(1), 0);
        assert_eq!(curve.level_for_xp(0), 1);
        assert_eq!(curve.level_for_xp(99), 1);
        assert_eq!(curve.level_for_xp(100), 2);
    }

    #[test]
    fn test_rank_thresholds() {
        assert_eq!(rank_for_level(1).name, "Bronze");
        assert_eq!(rank_for_level(9).name, "Bronze");
        assert_eq!(rank_for_level(10).name, "Silver");
        assert_eq!(rank_for_level(34).name, "Gold");
        assert_eq!(rank_for_level(35).name, "Platinum");
        assert_eq!(rank_for_level(74).name, "Diamond");
        assert_eq!(rank_for_level(200).name, "Legend");
    }
}
