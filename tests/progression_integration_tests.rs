//! End-to-end reward cascade tests over the in-memory backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use lootvault_core::error::CoreError;
use lootvault_core::models::*;
use lootvault_core::storage::memory::MemoryBackend;
use lootvault_core::storage::{MissionRepo, Store, StoreError, StoreResult};
use lootvault_core::{CrateKind, ProgressionCore, Rarity};

const USER: UserId = 42;

fn mission(id: &str, kind: MissionKind, action: &str, req: i64, xp: i64, coins: i64) -> Mission {
    Mission {
        id: id.into(),
        name: id.into(),
        description: String::new(),
        kind,
        requirement_type: action.into(),
        requirement_value: req,
        xp_reward: xp,
        coin_reward: coins,
        gem_reward: 0,
        repeatable: true,
    }
}

fn achievement(id: &str, requirement_type: &str, requirement_value: f64) -> Achievement {
    Achievement {
        id: id.into(),
        name: id.into(),
        description: String::new(),
        category: "betting".into(),
        requirement_type: requirement_type.into(),
        requirement_value,
        xp_reward: 10,
        coin_reward: 20,
        gem_reward: 0,
    }
}

fn catalog_item(id: &str, rarity: Rarity, base_value: i64) -> CatalogItem {
    CatalogItem {
        id: id.into(),
        name: id.into(),
        rarity,
        base_value,
        active: true,
    }
}

/// Core over an empty backend the test seeds itself.
fn build_core() -> (ProgressionCore, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(Store::in_memory(backend.clone()));
    (ProgressionCore::new(store, 64), backend)
}

async fn notification_count(core: &ProgressionCore, kind: &str, mission_id: &str) -> usize {
    core.store()
        .notifications
        .recent(USER, 100)
        .await
        .unwrap()
        .iter()
        .filter(|n| n.kind == kind && n.data["mission_id"] == mission_id)
        .count()
}

// ============================================================================
// Achievements
// ============================================================================

#[tokio::test]
async fn test_achievement_unlock_is_idempotent() {
    let (core, backend) = build_core();
    backend.seed_achievement(achievement("ach_bets_3", "bets_placed", 3.0));
    for _ in 0..3 {
        backend.record_bet(USER, 100, 2.0, 0, false);
    }

    let first = core.check_and_award_achievements(USER, None).await.unwrap();
    assert_eq!(first.len(), 1, "first evaluation unlocks the achievement");

    let second = core.check_and_award_achievements(USER, None).await.unwrap();
    assert!(second.is_empty(), "second evaluation unlocks nothing");
}

#[tokio::test]
async fn test_win_streak_needs_full_history() {
    let (core, backend) = build_core();
    backend.seed_achievement(achievement("ach_streak_3", "win_streak", 3.0));
    backend.record_bet(USER, 100, 2.0, 200, true);
    backend.record_bet(USER, 100, 2.0, 200, true);

    // Two straight wins, but fewer than three bets total.
    let unlocked = core.check_and_award_achievements(USER, None).await.unwrap();
    assert!(unlocked.is_empty());

    backend.record_bet(USER, 100, 2.0, 200, true);
    let unlocked = core.check_and_award_achievements(USER, None).await.unwrap();
    assert_eq!(unlocked.len(), 1);
}

#[tokio::test]
async fn test_progress_snapshot_matches_predicate() {
    let (core, backend) = build_core();
    backend.seed_achievement(achievement("ach_bets_4", "bets_placed", 4.0));
    backend.record_bet(USER, 100, 2.0, 0, false);

    let progress = core
        .get_achievement_progress(USER, "ach_bets_4")
        .await
        .unwrap();
    assert_eq!(progress.current, 1.0);
    assert_eq!(progress.required, 4.0);
    assert_eq!(progress.percentage, 25.0);
}

#[tokio::test]
async fn test_crates_opened_never_unlocks() {
    let (core, backend) = build_core();
    backend.seed_achievement(achievement("ach_crates", "crates_opened", 1.0));

    let unlocked = core.check_and_award_achievements(USER, None).await.unwrap();
    assert!(unlocked.is_empty());
    let progress = core
        .get_achievement_progress(USER, "ach_crates")
        .await
        .unwrap();
    assert_eq!(progress.current, 0.0);
}

// ============================================================================
// Missions
// ============================================================================

#[tokio::test]
async fn test_mission_completes_exactly_once() {
    let (core, backend) = build_core();
    backend.seed_mission(mission("m_bets_3", MissionKind::Daily, "bets_placed", 3, 50, 100));

    for call in 1..=3 {
        let completed = core
            .track_mission_progress(USER, "bets_placed", 1)
            .await
            .unwrap();
        if call < 3 {
            assert!(completed.is_empty(), "no completion before the 3rd call");
        } else {
            assert_eq!(completed.len(), 1, "completes on the 3rd call");
        }
    }

    // One more call after completion: progress keeps counting, nothing
    // re-fires.
    let completed = core
        .track_mission_progress(USER, "bets_placed", 1)
        .await
        .unwrap();
    assert!(completed.is_empty());

    let progress = core
        .store()
        .missions
        .progress(USER, "m_bets_3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(progress.progress, 4);
    assert!(progress.completed);

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.coins, 100, "reward credited exactly once");
    assert_eq!(economy.xp, 50);

    assert_eq!(
        notification_count(&core, "mission_completed", "m_bets_3").await,
        1,
        "exactly one completion notification"
    );
}

#[tokio::test]
async fn test_overshooting_value_completes_once() {
    let (core, backend) = build_core();
    backend.seed_mission(mission("m_bets_5", MissionKind::Daily, "bets_placed", 5, 0, 50));

    let completed = core
        .track_mission_progress(USER, "bets_placed", 20)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.coins, 50);
}

#[tokio::test]
async fn test_set_progress_completion() {
    let (core, backend) = build_core();
    backend.seed_mission(mission("m_own_10", MissionKind::Story, "items_owned", 10, 0, 25));

    let completed = core.set_mission_progress(USER, "items_owned", 7).await.unwrap();
    assert!(completed.is_empty());

    let completed = core
        .set_mission_progress(USER, "items_owned", 12)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);

    // Recomputed counters can later shrink without re-firing anything.
    let completed = core.set_mission_progress(USER, "items_owned", 3).await.unwrap();
    assert!(completed.is_empty());
}

#[tokio::test]
async fn test_daily_aggregate_fires_after_last_daily() {
    let (core, backend) = build_core();
    backend.seed_mission(mission("d_bets", MissionKind::Daily, "bets_placed", 1, 0, 10));
    backend.seed_mission(mission("d_login", MissionKind::Daily, "login", 1, 0, 10));
    backend.seed_mission(mission(
        "sweep",
        MissionKind::Special,
        DAILY_AGGREGATE_ACTION,
        1,
        0,
        100,
    ));

    core.track_mission_progress(USER, "bets_placed", 1).await.unwrap();
    let sweep = core.store().missions.progress(USER, "sweep").await.unwrap();
    assert!(sweep.map(|p| !p.completed).unwrap_or(true), "one daily left open");

    core.track_mission_progress(USER, "login", 1).await.unwrap();
    let sweep = core
        .store()
        .missions
        .progress(USER, "sweep")
        .await
        .unwrap()
        .unwrap();
    assert!(sweep.completed, "aggregate completes with the last daily");

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.coins, 10 + 10 + 100);
}

#[tokio::test]
async fn test_daily_reset_allows_second_cycle() {
    let (core, backend) = build_core();
    backend.seed_mission(mission("d_bets", MissionKind::Daily, "bets_placed", 2, 0, 10));

    core.track_mission_progress(USER, "bets_placed", 2).await.unwrap();
    assert_eq!(core.reset_daily_missions(USER).await.unwrap(), 1);

    let completed = core
        .track_mission_progress(USER, "bets_placed", 2)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1, "mission completes again after reset");

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.coins, 20);
}

// ============================================================================
// Leveling & crate keys
// ============================================================================

#[tokio::test]
async fn test_level_milestone_keys() {
    let (core, _backend) = build_core();

    // Quadratic curve: level 10 needs 100 * 9^2 = 8100 xp.
    core.add_xp(USER, 8100, "test", None).await.unwrap();
    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.level, 10);
    assert_eq!(
        core.key_count(USER, CrateKind::LevelUp).await.unwrap(),
        11,
        "10 span keys + 1 milestone bonus at level 10"
    );
    assert_eq!(core.key_count(USER, CrateKind::Prestige).await.unwrap(), 0);

    // Level 25 needs 57600 total. The Silver rank boost (5%) applies to
    // this grant: 49500 * 1.05 = 51975, landing at 60075 total xp, still
    // level 25 (level 26 needs 62500).
    core.add_xp(USER, 49500, "test", None).await.unwrap();
    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.xp, 60075);
    assert_eq!(economy.level, 25);
    assert_eq!(core.key_count(USER, CrateKind::Prestige).await.unwrap(), 1);
}

#[tokio::test]
async fn test_add_xp_rejects_non_positive() {
    let (core, _backend) = build_core();
    assert!(matches!(
        core.add_xp(USER, 0, "test", None).await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        core.add_xp(USER, -5, "test", None).await,
        Err(CoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_weekly_loyalty_28_day_streak() {
    let (core, _backend) = build_core();

    let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    for offset in 0..28 {
        let day = start + chrono::Days::new(offset);
        core.record_daily_login(USER, day).await.unwrap();
    }

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.login_streak, 28);
    assert_eq!(
        core.key_count(USER, CrateKind::WeeklyLoyalty).await.unwrap(),
        5,
        "1 key at days 7/14/21 + 2 at day 28"
    );
}

#[tokio::test]
async fn test_stipend_claims_once_per_day() {
    let (core, _backend) = build_core();
    let today = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();

    assert!(core.claim_daily_stipend(USER, today).await.unwrap());
    assert!(!core.claim_daily_stipend(USER, today).await.unwrap());

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.coins, 10, "one Bronze stipend");

    let tomorrow = today + chrono::Days::new(1);
    assert!(core.claim_daily_stipend(USER, tomorrow).await.unwrap());
}

#[tokio::test]
async fn test_stipend_rejects_earlier_day() {
    let (core, _backend) = build_core();
    let today = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
    let yesterday = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();

    assert!(core.claim_daily_stipend(USER, today).await.unwrap());

    // A claim dated before the last recorded one is rejected, same as a
    // repeat claim for the same day.
    assert!(!core.claim_daily_stipend(USER, yesterday).await.unwrap());

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.coins, 10, "one Bronze stipend");
    assert_eq!(economy.last_stipend_date, Some(today));
}

// ============================================================================
// Trade-ups
// ============================================================================

fn grant_rares(backend: &MemoryBackend) -> Vec<ItemId> {
    [80, 90, 100, 110, 120]
        .iter()
        .map(|&v| backend.grant_item(USER, "itm_rare", "Rare Thing", Rarity::Rare, v))
        .collect()
}

#[tokio::test]
async fn test_trade_up_arithmetic() {
    let (core, backend) = build_core();
    backend.seed_catalog_item(catalog_item("itm_epic", Rarity::Epic, 300));
    let ids = grant_rares(&backend);

    let outcome = core.process_trade_up(USER, &ids).await.unwrap();
    assert_eq!(outcome.input_items.len(), 5);
    assert_eq!(outcome.output_item.rarity, Rarity::Epic);
    assert_eq!(outcome.output_item.value, 160, "floor(100 * 4 / 2.5)");

    assert_eq!(core.store().inventory.count_items(USER).await.unwrap(), 1);
    assert_eq!(backend.trade_up_contract_count(USER), 1);

    // Fixed 30 xp follow-up grant.
    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.xp, 30);
}

#[tokio::test]
async fn test_trade_up_rejects_wrong_count() {
    let (core, backend) = build_core();
    backend.seed_catalog_item(catalog_item("itm_epic", Rarity::Epic, 300));
    let ids = grant_rares(&backend);

    let result = core.process_trade_up(USER, &ids[..4]).await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
    assert_eq!(
        core.store().inventory.count_items(USER).await.unwrap(),
        5,
        "inventory untouched"
    );
}

#[tokio::test]
async fn test_trade_up_rejects_mixed_rarity() {
    let (core, backend) = build_core();
    backend.seed_catalog_item(catalog_item("itm_epic", Rarity::Epic, 300));
    let mut ids = grant_rares(&backend);
    ids[4] = backend.grant_item(USER, "itm_common", "Common Thing", Rarity::Common, 5);

    let result = core.process_trade_up(USER, &ids).await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
    assert_eq!(core.store().inventory.count_items(USER).await.unwrap(), 6);
}

#[tokio::test]
async fn test_trade_up_rejects_unowned_items() {
    let (core, backend) = build_core();
    backend.seed_catalog_item(catalog_item("itm_epic", Rarity::Epic, 300));
    let mut ids = grant_rares(&backend);
    ids[4] = backend.grant_item(7, "itm_rare", "Someone Elses", Rarity::Rare, 100);

    let result = core.process_trade_up(USER, &ids).await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_trade_up_fails_without_output_catalog() {
    let (core, backend) = build_core();
    let ids = grant_rares(&backend);

    // No epic catalog rows exist.
    let result = core.process_trade_up(USER, &ids).await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
    assert_eq!(core.store().inventory.count_items(USER).await.unwrap(), 5);
}

#[tokio::test]
async fn test_legendary_trade_up_is_terminal() {
    let (core, backend) = build_core();
    backend.seed_catalog_item(catalog_item("itm_crown", Rarity::Legendary, 1200));
    let ids: Vec<ItemId> = [1000, 1100, 1200, 1300, 1400]
        .iter()
        .map(|&v| backend.grant_item(USER, "itm_leg", "Legendary Thing", Rarity::Legendary, v))
        .collect();

    let outcome = core.process_trade_up(USER, &ids).await.unwrap();
    assert_eq!(outcome.output_item.rarity, Rarity::Legendary);
    assert_eq!(outcome.output_item.value, 1200, "7/7 ratio keeps the average");
}

#[tokio::test]
async fn test_trade_up_advances_trade_up_mission() {
    let (core, backend) = build_core();
    backend.seed_catalog_item(catalog_item("itm_epic", Rarity::Epic, 300));
    backend.seed_mission(mission("m_forge", MissionKind::Weekly, "trade_up", 1, 0, 75));
    let ids = grant_rares(&backend);

    core.process_trade_up(USER, &ids).await.unwrap();

    let progress = core
        .store()
        .missions
        .progress(USER, "m_forge")
        .await
        .unwrap()
        .unwrap();
    assert!(progress.completed);
}

// ============================================================================
// Notifications & broadcast
// ============================================================================

#[tokio::test]
async fn test_level_up_broadcast_reaches_subscriber() {
    let (core, _backend) = build_core();
    let mut rx = core.subscribe(lootvault_core::Channel::XpUpdates);

    core.add_xp(USER, 100, "test", None).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event, "level_up");
    assert!(event.audience.includes(USER));
    assert_eq!(event.payload["new_level"], 2);
}

#[tokio::test]
async fn test_unread_count_tracks_reward_notifications() {
    let (core, backend) = build_core();
    backend.seed_mission(mission("m_one", MissionKind::Daily, "bets_placed", 1, 0, 10));

    core.track_mission_progress(USER, "bets_placed", 1).await.unwrap();

    // mission_completed + crate_keys_granted (daily reward key)
    assert_eq!(core.unread_notifications(USER).await.unwrap(), 2);
}

// ============================================================================
// Concurrent callers & failure isolation
// ============================================================================

#[tokio::test]
async fn test_concurrent_evaluations_unlock_once() {
    let (core, backend) = build_core();
    backend.seed_achievement(achievement("ach_bets_3", "bets_placed", 3.0));
    for _ in 0..3 {
        backend.record_bet(USER, 100, 2.0, 0, false);
    }

    let (a, b) = tokio::join!(
        core.check_and_award_achievements(USER, None),
        core.check_and_award_achievements(USER, None)
    );
    assert_eq!(
        a.unwrap().len() + b.unwrap().len(),
        1,
        "exactly one caller wins the unlock"
    );

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.coins, 20, "reward credited once");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_progress_ticks_complete_once() {
    let (core, backend) = build_core();
    backend.seed_mission(mission("m_bets_5", MissionKind::Daily, "bets_placed", 5, 0, 40));
    let core = Arc::new(core);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let core = core.clone();
            tokio::spawn(async move {
                core.track_mission_progress(USER, "bets_placed", 1)
                    .await
                    .unwrap()
                    .len()
            })
        })
        .collect();
    let mut completions = 0;
    for handle in handles {
        completions += handle.await.unwrap();
    }

    let progress = core
        .store()
        .missions
        .progress(USER, "m_bets_5")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(progress.progress, 10, "every tick lands");
    assert_eq!(completions, 1, "one caller observes the completion");

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.coins, 40, "reward credited once");
    assert_eq!(
        notification_count(&core, "mission_completed", "m_bets_5").await,
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_key_grants_accumulate() {
    let (core, _backend) = build_core();
    let core = Arc::new(core);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let core = core.clone();
            tokio::spawn(async move { core.award_event_crate_key(USER).await.unwrap() })
        })
        .collect();
    let mut max_total = 0;
    for handle in handles {
        max_total = max_total.max(handle.await.unwrap());
    }

    assert_eq!(max_total, 8, "the last grant sees the full counter");
    assert_eq!(core.key_count(USER, CrateKind::Event).await.unwrap(), 8);
}

struct UnavailableMissions;

fn missions_offline() -> StoreError {
    StoreError::Constraint("mission store offline".into())
}

#[async_trait]
impl MissionRepo for UnavailableMissions {
    async fn by_action(&self, _requirement_type: &str) -> StoreResult<Vec<Mission>> {
        Err(missions_offline())
    }

    async fn by_kind(&self, _kind: MissionKind) -> StoreResult<Vec<Mission>> {
        Err(missions_offline())
    }

    async fn get(&self, _mission_id: &str) -> StoreResult<Option<Mission>> {
        Err(missions_offline())
    }

    async fn progress(
        &self,
        _user_id: UserId,
        _mission_id: &str,
    ) -> StoreResult<Option<UserMissionProgress>> {
        Err(missions_offline())
    }

    async fn advance_progress(
        &self,
        _user_id: UserId,
        _mission_id: &str,
        _delta: i64,
    ) -> StoreResult<i64> {
        Err(missions_offline())
    }

    async fn set_progress(
        &self,
        _user_id: UserId,
        _mission_id: &str,
        _value: i64,
    ) -> StoreResult<i64> {
        Err(missions_offline())
    }

    async fn claim_completion(
        &self,
        _user_id: UserId,
        _mission_id: &str,
        _requirement: i64,
    ) -> StoreResult<bool> {
        Err(missions_offline())
    }

    async fn all_completed(
        &self,
        _user_id: UserId,
        _kind: MissionKind,
        _excluding_action: &str,
    ) -> StoreResult<bool> {
        Err(missions_offline())
    }

    async fn reset_progress(&self, _user_id: UserId, _kind: MissionKind) -> StoreResult<u64> {
        Err(missions_offline())
    }
}

#[tokio::test]
async fn test_login_streak_survives_mission_store_outage() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = Store::in_memory(backend.clone());
    store.missions = Box::new(UnavailableMissions);
    let core = ProgressionCore::new(Arc::new(store), 64);

    let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
    let streak = core.record_daily_login(USER, day).await.unwrap();
    assert_eq!(streak, 1, "streak committed despite the failed mission tick");

    let economy = core.store().economy.get(USER).await.unwrap();
    assert_eq!(economy.last_login_date, Some(day));
}
