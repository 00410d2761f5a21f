//! ProgressionCore - facade wiring every engine around one store handle
//!
//! Constructed once per process with an injected `Store`; no global state.
//! The public methods are the stable call contracts the surrounding site
//! services invoke.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast;
use tracing::warn;

use crate::achievements::AchievementEvaluator;
use crate::config::CoreConfig;
use crate::crate_keys::KeyDispatcher;
use crate::error::CoreResult;
use crate::gateway::{Channel, NotificationGateway, RealtimeEvent};
use crate::leveling::{LevelCurve, QuadraticCurve, XpEngine};
use crate::missions::MissionTracker;
use crate::models::*;
use crate::storage::memory::MemoryBackend;
use crate::storage::postgres::PostgresStore;
use crate::storage::{seed_data, Store};
use crate::trade_up::{TradeUpOutcome, TradeUpProcessor};

pub struct ProgressionCore {
    store: Arc<Store>,
    gateway: NotificationGateway,
    xp: Arc<XpEngine>,
    missions: Arc<MissionTracker>,
    achievements: AchievementEvaluator,
    keys: KeyDispatcher,
    trade_up: TradeUpProcessor,
}

impl ProgressionCore {
    /// Wire the engines around an existing store with a custom curve.
    pub fn with_curve(
        store: Arc<Store>,
        curve: Arc<dyn LevelCurve>,
        broadcast_capacity: usize,
    ) -> Self {
        let gateway = NotificationGateway::new(store.clone(), broadcast_capacity);
        let keys = KeyDispatcher::new(store.clone(), gateway.clone());
        let xp = Arc::new(XpEngine::new(
            store.clone(),
            gateway.clone(),
            keys.clone(),
            curve.clone(),
        ));
        let missions = Arc::new(MissionTracker::new(
            store.clone(),
            gateway.clone(),
            xp.clone(),
            keys.clone(),
        ));
        let achievements =
            AchievementEvaluator::new(store.clone(), gateway.clone(), curve);
        let trade_up = TradeUpProcessor::new(
            store.clone(),
            gateway.clone(),
            xp.clone(),
            missions.clone(),
        );

        Self {
            store,
            gateway,
            xp,
            missions,
            achievements,
            keys,
            trade_up,
        }
    }

    /// Default wiring: quadratic level curve.
    pub fn new(store: Arc<Store>, broadcast_capacity: usize) -> Self {
        Self::with_curve(store, Arc::new(QuadraticCurve::default()), broadcast_capacity)
    }

    /// Connect to PostgreSQL, run migrations, seed the catalogs, and wire
    /// the engines.
    pub async fn connect(config: &CoreConfig) -> CoreResult<Self> {
        let pg = PostgresStore::new(&config.database_url, config.pg_max_connections).await?;
        seed_data::seed_postgres(&pg).await?;
        let store = Arc::new(Store::postgres(Arc::new(pg)));
        Ok(Self::new(store, config.broadcast_capacity))
    }

    /// In-memory wiring with seeded default catalogs (tests, local dev).
    pub fn in_memory(broadcast_capacity: usize) -> Self {
        let backend = MemoryBackend::new();
        seed_data::seed_memory(&backend);
        let store = Arc::new(Store::in_memory(Arc::new(backend)));
        Self::new(store, broadcast_capacity)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    // ------------------------------------------------------------------
    // XP / leveling
    // ------------------------------------------------------------------

    pub async fn add_xp(
        &self,
        user_id: UserId,
        amount: i64,
        source: &str,
        metadata: Option<serde_json::Value>,
    ) -> CoreResult<UserEconomy> {
        self.xp.add_xp(user_id, amount, source, metadata).await
    }

    pub async fn claim_daily_stipend(&self, user_id: UserId, today: NaiveDate) -> CoreResult<bool> {
        self.xp.claim_daily_stipend(user_id, today).await
    }

    // ------------------------------------------------------------------
    // Missions
    // ------------------------------------------------------------------

    pub async fn track_mission_progress(
        &self,
        user_id: UserId,
        action_type: &str,
        value: i64,
    ) -> CoreResult<Vec<Mission>> {
        self.missions
            .track_mission_progress(user_id, action_type, value)
            .await
    }

    pub async fn set_mission_progress(
        &self,
        user_id: UserId,
        action_type: &str,
        absolute_value: i64,
    ) -> CoreResult<Vec<Mission>> {
        self.missions
            .set_mission_progress(user_id, action_type, absolute_value)
            .await
    }

    pub async fn reset_daily_missions(&self, user_id: UserId) -> CoreResult<u64> {
        self.missions.reset_daily_missions(user_id).await
    }

    pub async fn reset_weekly_missions(&self, user_id: UserId) -> CoreResult<u64> {
        self.missions.reset_weekly_missions(user_id).await
    }

    // ------------------------------------------------------------------
    // Achievements
    // ------------------------------------------------------------------

    pub async fn check_and_award_achievements(
        &self,
        user_id: UserId,
        category: Option<&str>,
    ) -> CoreResult<Vec<Achievement>> {
        self.achievements
            .check_and_award_achievements(user_id, category)
            .await
    }

    pub async fn get_achievement_progress(
        &self,
        user_id: UserId,
        achievement_id: &str,
    ) -> CoreResult<AchievementProgress> {
        self.achievements
            .get_achievement_progress(user_id, achievement_id)
            .await
    }

    // ------------------------------------------------------------------
    // Crate keys
    // ------------------------------------------------------------------

    pub async fn award_crate_keys(
        &self,
        user_id: UserId,
        kind: CrateKind,
        count: i64,
    ) -> CoreResult<i64> {
        self.keys.award_crate_keys(user_id, kind, count).await
    }

    pub async fn award_event_crate_key(&self, user_id: UserId) -> CoreResult<i64> {
        self.keys.award_event_crate_key(user_id).await
    }

    pub async fn award_prestige_crate_key(
        &self,
        user_id: UserId,
        prestige_level: i32,
    ) -> CoreResult<i64> {
        self.keys
            .award_prestige_crate_key(user_id, prestige_level)
            .await
    }

    pub async fn key_count(&self, user_id: UserId, kind: CrateKind) -> CoreResult<i64> {
        self.keys.key_count(user_id, kind).await
    }

    /// Daily-login entry point: streak bookkeeping, weekly-loyalty keys,
    /// and the login mission tick. The mission tick runs after the streak
    /// update committed, so its failure is logged, not surfaced.
    pub async fn record_daily_login(&self, user_id: UserId, today: NaiveDate) -> CoreResult<i32> {
        let streak = self.keys.record_daily_login(user_id, today).await?;
        if let Err(e) = self
            .missions
            .track_mission_progress(user_id, "login", 1)
            .await
        {
            warn!(user_id, error = %e, "login mission tick failed");
        }
        Ok(streak)
    }

    // ------------------------------------------------------------------
    // Trade-ups
    // ------------------------------------------------------------------

    pub async fn process_trade_up(
        &self,
        user_id: UserId,
        item_ids: &[ItemId],
    ) -> CoreResult<TradeUpOutcome> {
        self.trade_up.process_trade_up(user_id, item_ids).await
    }

    // ------------------------------------------------------------------
    // Gateway
    // ------------------------------------------------------------------

    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<RealtimeEvent> {
        self.gateway.subscribe(channel)
    }

    pub fn gateway(&self) -> &NotificationGateway {
        &self.gateway
    }

    pub async fn unread_notifications(&self, user_id: UserId) -> CoreResult<i64> {
        Ok(self.store.notifications.unread_count(user_id).await?)
    }
}
