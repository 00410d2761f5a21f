//! Crate-Key Dispatcher
//!
//! Grants crate keys for level milestones, weekly login streaks, prestige,
//! mission-tier completion, and event participation. Every grant goes
//! through one atomic counter increment in the store; the multiplier logic
//! lives here.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::gateway::NotificationGateway;
use crate::models::{CrateKind, MissionKind, NewNotification, UserId};
use crate::storage::Store;

#[derive(Clone)]
pub struct KeyDispatcher {
    store: Arc<Store>,
    gateway: NotificationGateway,
}

impl KeyDispatcher {
    pub fn new(store: Arc<Store>, gateway: NotificationGateway) -> Self {
        Self { store, gateway }
    }

    /// Atomic grant of `count` keys for one crate kind. Returns the new
    /// counter total. The notification is best-effort.
    pub async fn award_crate_keys(
        &self,
        user_id: UserId,
        kind: CrateKind,
        count: i64,
    ) -> CoreResult<i64> {
        if count <= 0 {
            return Err(CoreError::validation(format!(
                "key count must be positive, got {}",
                count
            )));
        }

        let total = self.store.keys.add_keys(user_id, kind, count).await?;
        info!(user_id, kind = kind.as_str(), count, total, "crate keys granted");

        if let Err(e) = self
            .gateway
            .notify(NewNotification {
                user_id,
                kind: "crate_keys_granted".into(),
                title: kind.display_name().to_string(),
                message: format!("You received {} {} key(s)", count, kind.display_name()),
                data: json!({ "crate": kind.as_str(), "count": count, "total": total }),
            })
            .await
        {
            warn!(user_id, error = %e, "crate-key notification failed");
        }

        Ok(total)
    }

    /// Level-up grants for one level-up event: 1 key per newly attained
    /// level, +1 once for the very first level-up away from level 1, +1 on
    /// every newly attained 10th level, +1 Prestige key on every newly
    /// attained 25th level. Counting only levels in `(old_level,
    /// new_level]` keeps the lifetime total independent of how the climb
    /// was split across events.
    pub async fn award_level_up_crate_keys(
        &self,
        user_id: UserId,
        old_level: i32,
        new_level: i32,
    ) -> CoreResult<()> {
        if new_level <= old_level {
            return Ok(());
        }

        let mut level_up_keys = i64::from(new_level - old_level);
        if old_level == 1 {
            level_up_keys += 1;
        }
        let mut prestige_keys: i64 = 0;
        for level in (old_level + 1)..=new_level {
            if level % 10 == 0 {
                level_up_keys += 1;
            }
            if level % 25 == 0 {
                prestige_keys += 1;
            }
        }

        self.award_crate_keys(user_id, CrateKind::LevelUp, level_up_keys)
            .await?;
        if prestige_keys > 0 {
            self.award_crate_keys(user_id, CrateKind::Prestige, prestige_keys)
                .await?;
        }
        Ok(())
    }

    /// Weekly loyalty grant for a login streak: 1 key at every 7-day
    /// multiple, +1 bonus at every 28-day multiple. Streaks off the weekly
    /// boundary grant nothing.
    pub async fn award_weekly_loyalty_crate_key(
        &self,
        user_id: UserId,
        streak: i32,
    ) -> CoreResult<i64> {
        if streak <= 0 || streak % 7 != 0 {
            return Ok(0);
        }

        let mut count = 1;
        if streak % 28 == 0 {
            count += 1;
        }
        self.award_crate_keys(user_id, CrateKind::WeeklyLoyalty, count)
            .await?;
        Ok(count)
    }

    /// Prestige-up grant: `min(prestige_level, 3)` Prestige keys.
    pub async fn award_prestige_crate_key(
        &self,
        user_id: UserId,
        prestige_level: i32,
    ) -> CoreResult<i64> {
        let count = i64::from(prestige_level.clamp(0, 3));
        if count == 0 {
            return Ok(0);
        }
        self.award_crate_keys(user_id, CrateKind::Prestige, count)
            .await?;
        Ok(count)
    }

    /// Mission-tier completion grant: 1 key for daily, 2 for weekly, 3 for
    /// special. Story missions grant none.
    pub async fn award_reward_crate_key(
        &self,
        user_id: UserId,
        tier: MissionKind,
    ) -> CoreResult<i64> {
        let count = match tier {
            MissionKind::Daily => 1,
            MissionKind::Weekly => 2,
            MissionKind::Special => 3,
            MissionKind::Story => 0,
        };
        if count == 0 {
            return Ok(0);
        }
        self.award_crate_keys(user_id, CrateKind::Reward, count)
            .await?;
        Ok(count)
    }

    /// Event-participation grant: 1 Event key per qualifying action.
    pub async fn award_event_crate_key(&self, user_id: UserId) -> CoreResult<i64> {
        self.award_crate_keys(user_id, CrateKind::Event, 1).await?;
        Ok(1)
    }

    /// Daily-login streak bookkeeping. Consecutive logins extend the
    /// streak, a gap resets it to 1, a repeat login on the same day is a
    /// no-op. On the first login of the day the weekly-loyalty trigger is
    /// re-checked; its failure never undoes the streak update.
    pub async fn record_daily_login(&self, user_id: UserId, today: NaiveDate) -> CoreResult<i32> {
        let yesterday = today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| CoreError::validation(format!("date {} has no yesterday", today)))?;

        let transition = self
            .store
            .economy
            .record_login(user_id, today, yesterday)
            .await?;

        if transition.first_login_of(today) {
            info!(user_id, streak = transition.streak, "daily login recorded");
            if let Err(e) = self
                .award_weekly_loyalty_crate_key(user_id, transition.streak)
                .await
            {
                warn!(user_id, error = %e, "weekly loyalty grant failed");
            }
        }

        Ok(transition.streak)
    }

    pub async fn key_count(&self, user_id: UserId, kind: CrateKind) -> CoreResult<i64> {
        Ok(self.store.keys.key_count(user_id, kind).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;

    fn dispatcher() -> KeyDispatcher {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(Store::in_memory(backend));
        let gateway = NotificationGateway::new(store.clone(), 16);
        KeyDispatcher::new(store, gateway)
    }

    #[tokio::test]
    async fn test_level_up_keys_count_milestones() {
        let d = dispatcher();
        // 9 levels gained + 1 first-level-up bonus + 1 milestone at level 10.
        d.award_level_up_crate_keys(1, 1, 10).await.unwrap();
        assert_eq!(d.key_count(1, CrateKind::LevelUp).await.unwrap(), 11);
        assert_eq!(d.key_count(1, CrateKind::Prestige).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_level_up_keys_are_path_independent() {
        let jump = dispatcher();
        jump.award_level_up_crate_keys(1, 1, 10).await.unwrap();

        let stepwise = dispatcher();
        for level in 2..=10 {
            stepwise
                .award_level_up_crate_keys(1, level - 1, level)
                .await
                .unwrap();
        }

        assert_eq!(
            jump.key_count(1, CrateKind::LevelUp).await.unwrap(),
            stepwise.key_count(1, CrateKind::LevelUp).await.unwrap(),
            "one 1->10 jump and nine single-level events grant the same total"
        );
    }

    #[tokio::test]
    async fn test_level_25_grants_prestige_key() {
        let d = dispatcher();
        d.award_level_up_crate_keys(1, 24, 25).await.unwrap();
        assert_eq!(d.key_count(1, CrateKind::LevelUp).await.unwrap(), 1);
        assert_eq!(d.key_count(1, CrateKind::Prestige).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_weekly_loyalty_boundaries() {
        let d = dispatcher();
        assert_eq!(d.award_weekly_loyalty_crate_key(1, 6).await.unwrap(), 0);
        assert_eq!(d.award_weekly_loyalty_crate_key(1, 7).await.unwrap(), 1);
        assert_eq!(d.award_weekly_loyalty_crate_key(1, 14).await.unwrap(), 1);
        assert_eq!(d.award_weekly_loyalty_crate_key(1, 28).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_prestige_grant_is_capped() {
        let d = dispatcher();
        assert_eq!(d.award_prestige_crate_key(1, 1).await.unwrap(), 1);
        assert_eq!(d.award_prestige_crate_key(1, 7).await.unwrap(), 3);
        assert_eq!(d.key_count(1, CrateKind::Prestige).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_reward_tiers() {
        let d = dispatcher();
        assert_eq!(d.award_reward_crate_key(1, MissionKind::Daily).await.unwrap(), 1);
        assert_eq!(d.award_reward_crate_key(1, MissionKind::Weekly).await.unwrap(), 2);
        assert_eq!(d.award_reward_crate_key(1, MissionKind::Special).await.unwrap(), 3);
        assert_eq!(d.award_reward_crate_key(1, MissionKind::Story).await.unwrap(), 0);
        assert_eq!(d.key_count(1, CrateKind::Reward).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_streak_resets_after_gap() {
        let d = dispatcher();
        let day1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let day5 = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();

        assert_eq!(d.record_daily_login(1, day1).await.unwrap(), 1);
        assert_eq!(d.record_daily_login(1, day2).await.unwrap(), 2);
        // same-day repeat leaves the streak alone
        assert_eq!(d.record_daily_login(1, day2).await.unwrap(), 2);
        // gap resets
        assert_eq!(d.record_daily_login(1, day5).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zero_count_is_rejected() {
        let d = dispatcher();
        assert!(d.award_crate_keys(1, CrateKind::Event, 0).await.is_err());
    }
}
