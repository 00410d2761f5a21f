//! Seed Data - default mission, achievement, and item catalogs
//!
//! Populates a fresh store with starter content so the reward engines have
//! something to drive. This provides a baseline for testing and development.

use tracing::info;

use super::memory::MemoryBackend;
use super::postgres::PostgresStore;
use super::StoreResult;
use crate::models::*;

fn mission(
    id: &str,
    name: &str,
    kind: MissionKind,
    action: &str,
    requirement: i64,
    xp: i64,
    coins: i64,
    gems: i64,
) -> Mission {
    Mission {
        id: id.into(),
        name: name.into(),
        description: String::new(),
        kind,
        requirement_type: action.into(),
        requirement_value: requirement,
        xp_reward: xp,
        coin_reward: coins,
        gem_reward: gems,
        repeatable: !matches!(kind, MissionKind::Story),
    }
}

fn achievement(
    id: &str,
    name: &str,
    category: &str,
    requirement_type: &str,
    requirement_value: f64,
    xp: i64,
    coins: i64,
    gems: i64,
) -> Achievement {
    Achievement {
        id: id.into(),
        name: name.into(),
        description: String::new(),
        category: category.into(),
        requirement_type: requirement_type.into(),
        requirement_value,
        xp_reward: xp,
        coin_reward: coins,
        gem_reward: gems,
    }
}

fn catalog_item(id: &str, name: &str, rarity: Rarity, base_value: i64) -> CatalogItem {
    CatalogItem {
        id: id.into(),
        name: name.into(),
        rarity,
        base_value,
        active: true,
    }
}

/// Default mission catalog
pub fn default_missions() -> Vec<Mission> {
    use MissionKind::*;
    vec![
        // === Daily ===
        mission("daily_bets_3", "Daily Punter", Daily, "bets_placed", 3, 50, 100, 0),
        mission("daily_win_1", "Daily Winner", Daily, "bets_won", 1, 75, 150, 0),
        mission("daily_login", "Show Up", Daily, "login", 1, 25, 50, 0),
        // === Weekly ===
        mission("weekly_bets_20", "Weekly Grinder", Weekly, "bets_placed", 20, 300, 500, 5),
        mission("weekly_wins_8", "Weekly Champion", Weekly, "bets_won", 8, 400, 750, 10),
        mission("weekly_trade_up_3", "Weekly Forger", Weekly, "trade_up", 3, 250, 400, 5),
        // === Special ===
        mission(
            "special_daily_sweep",
            "Clean Sweep",
            Special,
            DAILY_AGGREGATE_ACTION,
            1,
            200,
            300,
            5,
        ),
        // === Story ===
        mission("story_first_bet", "First Blood", Story, "bets_placed", 1, 100, 200, 0),
        mission("story_first_trade_up", "The Forge Awakens", Story, "trade_up", 1, 150, 250, 5),
        mission("story_collector_25", "Collector", Story, "items_owned", 25, 500, 1000, 10),
    ]
}

/// Default achievement catalog
pub fn default_achievements() -> Vec<Achievement> {
    vec![
        // === Betting ===
        achievement("ach_bets_10", "Regular", "betting", "bets_placed", 10.0, 100, 200, 0),
        achievement("ach_bets_100", "Veteran", "betting", "bets_placed", 100.0, 500, 1000, 10),
        achievement("ach_wins_50", "Sharp", "betting", "bets_won", 50.0, 400, 800, 10),
        achievement("ach_streak_5", "Hot Hand", "betting", "win_streak", 5.0, 300, 500, 5),
        achievement("ach_longshot", "Longshot", "betting", "high_odds_win", 10.0, 250, 400, 5),
        achievement("ach_jackpot", "Jackpot", "betting", "single_bet_payout", 10000.0, 600, 1500, 20),
        // === Progression ===
        achievement("ach_level_10", "Rising Star", "progression", "level", 10.0, 200, 300, 0),
        achievement("ach_level_50", "Elder", "progression", "level", 50.0, 1000, 2000, 25),
        // === Collection ===
        achievement("ach_items_50", "Hoarder", "collection", "items_owned", 50.0, 400, 600, 5),
        // Unlockable only once a crate-opening counter exists.
        achievement("ach_crates_25", "Key Turner", "collection", "crates_opened", 25.0, 300, 500, 5),
    ]
}

/// Default item catalog for trade-up outputs
pub fn default_item_catalog() -> Vec<CatalogItem> {
    use Rarity::*;
    vec![
        catalog_item("itm_rusty_case", "Rusty Case", Common, 10),
        catalog_item("itm_tin_badge", "Tin Badge", Common, 12),
        catalog_item("itm_brass_token", "Brass Token", Uncommon, 30),
        catalog_item("itm_lucky_chip", "Lucky Chip", Uncommon, 35),
        catalog_item("itm_silver_die", "Silver Die", Rare, 90),
        catalog_item("itm_jade_charm", "Jade Charm", Rare, 110),
        catalog_item("itm_gilded_deck", "Gilded Deck", Epic, 300),
        catalog_item("itm_obsidian_coin", "Obsidian Coin", Epic, 340),
        catalog_item("itm_crown_of_odds", "Crown of Odds", Legendary, 1200),
        catalog_item("itm_midas_hand", "Midas Hand", Legendary, 1500),
    ]
}

/// Seed the PostgreSQL catalog tables. Existing rows are left alone so the
/// seed is safe to run on every startup.
pub async fn seed_postgres(store: &PostgresStore) -> StoreResult<()> {
    let mut total = 0usize;

    for m in default_missions() {
        let result = sqlx::query(
            "INSERT INTO missions (id, name, description, mission_type, requirement_type,
                                   requirement_value, xp_reward, coin_reward, gem_reward, repeatable)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&m.id)
        .bind(&m.name)
        .bind(&m.description)
        .bind(m.kind.as_str())
        .bind(&m.requirement_type)
        .bind(m.requirement_value)
        .bind(m.xp_reward)
        .bind(m.coin_reward)
        .bind(m.gem_reward)
        .bind(m.repeatable)
        .execute(store.pool())
        .await?;
        total += result.rows_affected() as usize;
    }

    for a in default_achievements() {
        let result = sqlx::query(
            "INSERT INTO achievements (id, name, description, category, requirement_type,
                                       requirement_value, xp_reward, coin_reward, gem_reward)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&a.id)
        .bind(&a.name)
        .bind(&a.description)
        .bind(&a.category)
        .bind(&a.requirement_type)
        .bind(a.requirement_value)
        .bind(a.xp_reward)
        .bind(a.coin_reward)
        .bind(a.gem_reward)
        .execute(store.pool())
        .await?;
        total += result.rows_affected() as usize;
    }

    for c in default_item_catalog() {
        let result = sqlx::query(
            "INSERT INTO item_catalog (id, name, rarity, base_value, active)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&c.id)
        .bind(&c.name)
        .bind(c.rarity.as_str())
        .bind(c.base_value)
        .bind(c.active)
        .execute(store.pool())
        .await?;
        total += result.rows_affected() as usize;
    }

    info!("Seeded {} catalog rows", total);
    Ok(())
}

/// Seed the in-memory backend with the same defaults (test setup).
pub fn seed_memory(backend: &MemoryBackend) {
    for m in default_missions() {
        backend.seed_mission(m);
    }
    for a in default_achievements() {
        backend.seed_achievement(a);
    }
    for c in default_item_catalog() {
        backend.seed_catalog_item(c);
    }
}
