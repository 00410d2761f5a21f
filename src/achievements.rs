//! Achievement Evaluator
//!
//! Evaluates requirement predicates over aggregate stats and unlocks
//! achievements at most once per user, relying on the store's uniqueness
//! constraint to settle races. One progress function backs both the unlock
//! decision and the read-only UI percentage, so the two cannot diverge.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::gateway::{Audience, Channel, NotificationGateway};
use crate::leveling::LevelCurve;
use crate::models::{Achievement, AchievementProgress, NewNotification, UserId};
use crate::storage::Store;

pub struct AchievementEvaluator {
    store: Arc<Store>,
    gateway: NotificationGateway,
    curve: Arc<dyn LevelCurve>,
}

impl AchievementEvaluator {
    pub fn new(
        store: Arc<Store>,
        gateway: NotificationGateway,
        curve: Arc<dyn LevelCurve>,
    ) -> Self {
        Self {
            store,
            gateway,
            curve,
        }
    }

    /// Evaluate every not-yet-unlocked achievement (optionally filtered by
    /// category) and unlock those whose predicate now holds. Returns the
    /// newly unlocked achievements; an unchanged state unlocks nothing.
    pub async fn check_and_award_achievements(
        &self,
        user_id: UserId,
        category: Option<&str>,
    ) -> CoreResult<Vec<Achievement>> {
        let catalog = self.store.achievements.catalog(category).await?;
        let unlocked = self.store.achievements.unlocked_ids(user_id).await?;

        let mut newly_unlocked = Vec::new();
        for achievement in catalog {
            if unlocked.contains(&achievement.id) {
                continue;
            }

            let progress = self.requirement_progress(user_id, &achievement).await?;
            if progress.current < progress.required {
                continue;
            }

            // The unique constraint, not this read, decides the winner of
            // two concurrent evaluations.
            let inserted = self
                .store
                .achievements
                .try_unlock(user_id, &achievement.id)
                .await?;
            if !inserted {
                continue;
            }

            info!(user_id, achievement = %achievement.id, "achievement unlocked");
            self.deliver_rewards(user_id, &achievement).await;
            newly_unlocked.push(achievement);
        }

        Ok(newly_unlocked)
    }

    /// Read-only progress snapshot for one achievement, computed by the
    /// same counting logic the unlock path uses.
    pub async fn get_achievement_progress(
        &self,
        user_id: UserId,
        achievement_id: &str,
    ) -> CoreResult<AchievementProgress> {
        let achievement = self
            .store
            .achievements
            .get(achievement_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("achievement {}", achievement_id)))?;

        self.requirement_progress(user_id, &achievement).await
    }

    /// Current/required/percentage for one achievement's predicate.
    async fn requirement_progress(
        &self,
        user_id: UserId,
        achievement: &Achievement,
    ) -> CoreResult<AchievementProgress> {
        let required = achievement.requirement_value;

        let current = match achievement.requirement_type.as_str() {
            "bets_placed" => self.store.bets.count_bets(user_id, false).await? as f64,
            "bets_won" => self.store.bets.count_bets(user_id, true).await? as f64,
            "win_streak" => {
                // Leading run of wins over the last N bets; fewer than N
                // bets total can never reach the requirement.
                let outcomes = self
                    .store
                    .bets
                    .recent_outcomes(user_id, required as i64)
                    .await?;
                outcomes.iter().take_while(|won| **won).count() as f64
            }
            "high_odds_win" => self.store.bets.max_won_odds(user_id).await?.unwrap_or(0.0),
            "single_bet_payout" => {
                self.store.bets.max_won_payout(user_id).await?.unwrap_or(0) as f64
            }
            "level" => f64::from(self.store.economy.ensure(user_id).await?.level),
            "items_owned" => self.store.inventory.count_items(user_id).await? as f64,
            // No crate-opening counter exists yet, so this never unlocks.
            "crates_opened" => 0.0,
            other => {
                warn!(
                    achievement = %achievement.id,
                    requirement_type = other,
                    "unknown achievement requirement type"
                );
                0.0
            }
        };

        let percentage = if required > 0.0 {
            (current / required * 100.0).min(100.0)
        } else {
            100.0
        };

        Ok(AchievementProgress {
            current,
            required,
            percentage,
        })
    }

    /// Unlock reward cascade. The reward credits the ledger directly; the
    /// level is still re-derived from total xp so `level = f(xp)` holds,
    /// but no level-up crate keys are granted from achievement xp.
    async fn deliver_rewards(&self, user_id: UserId, achievement: &Achievement) {
        let credit = self
            .store
            .economy
            .credit(
                user_id,
                achievement.coin_reward,
                achievement.gem_reward,
                achievement.xp_reward,
            )
            .await;
        match credit {
            Ok(economy) => {
                let level = self.curve.level_for_xp(economy.xp);
                if level > economy.level {
                    if let Err(e) = self.store.economy.raise_level(user_id, level).await {
                        warn!(user_id, error = %e, "achievement level raise failed");
                    }
                }
            }
            Err(e) => {
                warn!(user_id, achievement = %achievement.id, error = %e,
                      "achievement reward credit failed");
            }
        }

        let payload = json!({
            "achievement_id": achievement.id,
            "name": achievement.name,
            "xp": achievement.xp_reward,
            "coins": achievement.coin_reward,
            "gems": achievement.gem_reward,
        });

        if let Err(e) = self.gateway.publish(
            Channel::XpUpdates,
            Audience::User(user_id),
            "achievement_unlocked",
            payload.clone(),
        ) {
            warn!(user_id, error = %e, "achievement broadcast failed");
        }

        if let Err(e) = self
            .gateway
            .notify(NewNotification {
                user_id,
                kind: "achievement_unlocked".into(),
                title: achievement.name.clone(),
                message: format!("Achievement unlocked: {}", achievement.name),
                data: payload,
            })
            .await
        {
            warn!(user_id, error = %e, "achievement notification failed");
        }
    }
}
