//! Mission Tracker
//!
//! Advances every mission keyed to an action type, claims the single
//! completion transition through the store guard, and delivers completion
//! rewards. Reward delivery is best-effort per step; a failed credit or
//! notification never resurrects a claimed completion.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::crate_keys::KeyDispatcher;
use crate::error::{CoreError, CoreResult};
use crate::gateway::NotificationGateway;
use crate::leveling::XpEngine;
use crate::models::{
    Mission, MissionKind, NewNotification, RewardBundle, UserId, DAILY_AGGREGATE_ACTION,
};
use crate::storage::Store;

pub struct MissionTracker {
    store: Arc<Store>,
    gateway: NotificationGateway,
    xp: Arc<XpEngine>,
    keys: KeyDispatcher,
}

impl MissionTracker {
    pub fn new(
        store: Arc<Store>,
        gateway: NotificationGateway,
        xp: Arc<XpEngine>,
        keys: KeyDispatcher,
    ) -> Self {
        Self {
            store,
            gateway,
            xp,
            keys,
        }
    }

    /// Add `value` to every mission tracking `action_type`. Returns the
    /// missions that completed on this call.
    pub async fn track_mission_progress(
        &self,
        user_id: UserId,
        action_type: &str,
        value: i64,
    ) -> CoreResult<Vec<Mission>> {
        if value <= 0 {
            return Err(CoreError::validation(format!(
                "progress value must be positive, got {}",
                value
            )));
        }

        let missions = self.store.missions.by_action(action_type).await?;
        let mut completed = Vec::new();

        for mission in missions {
            let progress = self
                .store
                .missions
                .advance_progress(user_id, &mission.id, value)
                .await?;
            if self.try_complete(user_id, &mission, progress).await? {
                completed.push(mission);
            }
        }

        Ok(completed)
    }

    /// Overwrite progress for every mission tracking `action_type` with an
    /// absolute value recomputed from current state (ownership counters).
    pub async fn set_mission_progress(
        &self,
        user_id: UserId,
        action_type: &str,
        absolute_value: i64,
    ) -> CoreResult<Vec<Mission>> {
        if absolute_value < 0 {
            return Err(CoreError::validation(format!(
                "progress value must be non-negative, got {}",
                absolute_value
            )));
        }

        let missions = self.store.missions.by_action(action_type).await?;
        let mut completed = Vec::new();

        for mission in missions {
            let progress = self
                .store
                .missions
                .set_progress(user_id, &mission.id, absolute_value)
                .await?;
            if self.try_complete(user_id, &mission, progress).await? {
                completed.push(mission);
            }
        }

        Ok(completed)
    }

    /// Zero progress and clear completion for the user's repeatable daily
    /// missions. Driven by an external schedule boundary.
    pub async fn reset_daily_missions(&self, user_id: UserId) -> CoreResult<u64> {
        let reset = self
            .store
            .missions
            .reset_progress(user_id, MissionKind::Daily)
            .await?;
        info!(user_id, reset, "daily missions reset");
        Ok(reset)
    }

    /// Same as [`reset_daily_missions`], for the weekly cycle.
    ///
    /// [`reset_daily_missions`]: MissionTracker::reset_daily_missions
    pub async fn reset_weekly_missions(&self, user_id: UserId) -> CoreResult<u64> {
        let reset = self
            .store
            .missions
            .reset_progress(user_id, MissionKind::Weekly)
            .await?;
        info!(user_id, reset, "weekly missions reset");
        Ok(reset)
    }

    /// Claim the completion transition if `progress` has reached the
    /// requirement. Only the claiming caller delivers rewards.
    async fn try_complete(
        &self,
        user_id: UserId,
        mission: &Mission,
        progress: i64,
    ) -> CoreResult<bool> {
        if progress < mission.requirement_value {
            return Ok(false);
        }

        let claimed = self
            .store
            .missions
            .claim_completion(user_id, &mission.id, mission.requirement_value)
            .await?;
        if !claimed {
            return Ok(false);
        }

        info!(user_id, mission = %mission.id, "mission completed");
        self.deliver_rewards(user_id, mission).await;

        // A completed daily may have been the last open one for the cycle.
        if mission.kind == MissionKind::Daily {
            self.check_daily_aggregate(user_id).await?;
        }

        Ok(true)
    }

    /// Completion reward cascade: ledger credit, tier crate key,
    /// notification. Each step is independently best-effort so a failing
    /// sibling never blocks the others.
    async fn deliver_rewards(&self, user_id: UserId, mission: &Mission) {
        let bundle = RewardBundle {
            coins: mission.coin_reward,
            gems: mission.gem_reward,
        };

        let credit = if mission.xp_reward > 0 {
            self.xp
                .add_xp_with_rewards(
                    user_id,
                    mission.xp_reward,
                    bundle,
                    "mission_completed",
                    Some(json!({ "mission_id": mission.id })),
                )
                .await
                .map(|_| ())
        } else if !bundle.is_empty() {
            self.store
                .economy
                .credit(user_id, bundle.coins, bundle.gems, 0)
                .await
                .map(|_| ())
                .map_err(Into::into)
        } else {
            Ok(())
        };
        if let Err(e) = credit {
            warn!(user_id, mission = %mission.id, error = %e, "mission reward credit failed");
        }

        if let Err(e) = self.keys.award_reward_crate_key(user_id, mission.kind).await {
            warn!(user_id, mission = %mission.id, error = %e, "mission key grant failed");
        }

        if let Err(e) = self
            .gateway
            .notify(NewNotification {
                user_id,
                kind: "mission_completed".into(),
                title: mission.name.clone(),
                message: format!("Mission complete: {}", mission.name),
                data: json!({
                    "mission_id": mission.id,
                    "mission_type": mission.kind.as_str(),
                    "xp": mission.xp_reward,
                    "coins": mission.coin_reward,
                    "gems": mission.gem_reward,
                }),
            })
            .await
        {
            warn!(user_id, mission = %mission.id, error = %e, "mission notification failed");
        }
    }

    /// Advance the all-dailies aggregate mission once when every daily of
    /// the cycle is complete. Guarded twice: this only runs on a daily
    /// completion transition, and the aggregate's own claim fires once.
    async fn check_daily_aggregate(&self, user_id: UserId) -> CoreResult<()> {
        let all_done = self
            .store
            .missions
            .all_completed(user_id, MissionKind::Daily, DAILY_AGGREGATE_ACTION)
            .await?;
        if !all_done {
            return Ok(());
        }

        for aggregate in self
            .store
            .missions
            .by_action(DAILY_AGGREGATE_ACTION)
            .await?
        {
            let already_done = self
                .store
                .missions
                .progress(user_id, &aggregate.id)
                .await?
                .map(|p| p.completed)
                .unwrap_or(false);
            if already_done {
                continue;
            }

            let progress = self
                .store
                .missions
                .advance_progress(user_id, &aggregate.id, 1)
                .await?;
            if progress >= aggregate.requirement_value {
                let claimed = self
                    .store
                    .missions
                    .claim_completion(user_id, &aggregate.id, aggregate.requirement_value)
                    .await?;
                if claimed {
                    info!(user_id, mission = %aggregate.id, "daily aggregate completed");
                    self.deliver_rewards(user_id, &aggregate).await;
                }
            }
        }

        Ok(())
    }
}
