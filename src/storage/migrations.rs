//! Database Migrations - PostgreSQL schema for the progression core
//!
//! Only the tables the reward engines own or read live here. Accounts,
//! payments, and Steam trading belong to the surrounding services.

/// SQL migration for creating all tables
pub const MIGRATION_V1: &str = r#"
-- ============================================================================
-- LootVault Progression Schema v1
-- ============================================================================

-- ============================================================================
-- 1. Per-user economy ledger
-- ============================================================================

CREATE TABLE IF NOT EXISTS user_economy (
    user_id         BIGINT PRIMARY KEY,
    coins           BIGINT NOT NULL DEFAULT 0 CHECK (coins >= 0),
    gems            BIGINT NOT NULL DEFAULT 0 CHECK (gems >= 0),
    xp              BIGINT NOT NULL DEFAULT 0 CHECK (xp >= 0),
    level           INTEGER NOT NULL DEFAULT 1 CHECK (level >= 1),
    login_streak    INTEGER NOT NULL DEFAULT 0 CHECK (login_streak >= 0),
    last_login_date DATE,
    last_stipend_date DATE
);

-- ============================================================================
-- 2. Mission catalog (read-only) + per-user progress
-- ============================================================================

CREATE TABLE IF NOT EXISTS missions (
    id               VARCHAR(100) PRIMARY KEY,
    name             VARCHAR(200) NOT NULL,
    description      TEXT NOT NULL DEFAULT '',
    mission_type     VARCHAR(20) NOT NULL CHECK (mission_type IN ('daily', 'weekly', 'special', 'story')),
    requirement_type VARCHAR(50) NOT NULL,
    requirement_value BIGINT NOT NULL CHECK (requirement_value > 0),
    xp_reward        BIGINT NOT NULL DEFAULT 0,
    coin_reward      BIGINT NOT NULL DEFAULT 0,
    gem_reward       BIGINT NOT NULL DEFAULT 0,
    repeatable       BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE INDEX idx_missions_action ON missions(requirement_type);
CREATE INDEX idx_missions_type ON missions(mission_type);

CREATE TABLE IF NOT EXISTS user_mission_progress (
    user_id     BIGINT NOT NULL,
    mission_id  VARCHAR(100) NOT NULL REFERENCES missions(id),
    progress    BIGINT NOT NULL DEFAULT 0 CHECK (progress >= 0),
    completed   BOOLEAN NOT NULL DEFAULT FALSE,

    PRIMARY KEY (user_id, mission_id)
);

CREATE INDEX idx_mission_progress_user ON user_mission_progress(user_id);

-- ============================================================================
-- 3. Achievement catalog (read-only) + per-user unlocks
-- ============================================================================

CREATE TABLE IF NOT EXISTS achievements (
    id               VARCHAR(100) PRIMARY KEY,
    name             VARCHAR(200) NOT NULL,
    description      TEXT NOT NULL DEFAULT '',
    category         VARCHAR(50) NOT NULL DEFAULT 'general',
    requirement_type VARCHAR(50) NOT NULL,
    requirement_value DOUBLE PRECISION NOT NULL CHECK (requirement_value > 0),
    xp_reward        BIGINT NOT NULL DEFAULT 0,
    coin_reward      BIGINT NOT NULL DEFAULT 0,
    gem_reward       BIGINT NOT NULL DEFAULT 0
);

CREATE INDEX idx_achievements_category ON achievements(category);

-- Append-only. The primary key is the correctness invariant: an
-- achievement unlocks at most once per user, enforced by the store.
CREATE TABLE IF NOT EXISTS user_achievements (
    user_id         BIGINT NOT NULL,
    achievement_id  VARCHAR(100) NOT NULL REFERENCES achievements(id),
    unlocked_at     TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),

    PRIMARY KEY (user_id, achievement_id)
);

CREATE INDEX idx_user_achievements_user ON user_achievements(user_id);

-- ============================================================================
-- 4. Crate keys
-- ============================================================================

CREATE TABLE IF NOT EXISTS user_keys (
    user_id     BIGINT NOT NULL,
    crate_kind  VARCHAR(20) NOT NULL CHECK (crate_kind IN ('level_up', 'weekly_loyalty', 'prestige', 'reward', 'event')),
    keys_count  BIGINT NOT NULL DEFAULT 0 CHECK (keys_count >= 0),

    PRIMARY KEY (user_id, crate_kind)
);

-- ============================================================================
-- 5. Inventory + item catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS item_catalog (
    id          VARCHAR(100) PRIMARY KEY,
    name        VARCHAR(200) NOT NULL,
    rarity      VARCHAR(20) NOT NULL CHECK (rarity IN ('common', 'uncommon', 'rare', 'epic', 'legendary')),
    base_value  BIGINT NOT NULL DEFAULT 0 CHECK (base_value >= 0),
    active      BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE INDEX idx_item_catalog_rarity ON item_catalog(rarity) WHERE active;

CREATE TABLE IF NOT EXISTS inventory_items (
    id          BIGSERIAL PRIMARY KEY,
    user_id     BIGINT NOT NULL,
    template_id VARCHAR(100) NOT NULL REFERENCES item_catalog(id),
    name        VARCHAR(200) NOT NULL,
    rarity      VARCHAR(20) NOT NULL CHECK (rarity IN ('common', 'uncommon', 'rare', 'epic', 'legendary')),
    value       BIGINT NOT NULL DEFAULT 0 CHECK (value >= 0),
    equipped    BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX idx_inventory_user ON inventory_items(user_id);
CREATE INDEX idx_inventory_user_rarity ON inventory_items(user_id, rarity);

-- ============================================================================
-- 6. Trade-up audit trail
-- ============================================================================

CREATE TABLE IF NOT EXISTS trade_up_contracts (
    id             BIGSERIAL PRIMARY KEY,
    user_id        BIGINT NOT NULL,
    input_items    JSONB NOT NULL,
    output_item_id BIGINT NOT NULL,
    created_at     TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_trade_up_user ON trade_up_contracts(user_id);

-- ============================================================================
-- 7. Settled bets (written by the betting service, read here)
-- ============================================================================

CREATE TABLE IF NOT EXISTS bets (
    id          BIGSERIAL PRIMARY KEY,
    user_id     BIGINT NOT NULL,
    amount      BIGINT NOT NULL DEFAULT 0,
    odds        DOUBLE PRECISION NOT NULL DEFAULT 1.0,
    payout      BIGINT NOT NULL DEFAULT 0,
    won         BOOLEAN NOT NULL DEFAULT FALSE,
    settled_at  TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_bets_user ON bets(user_id, settled_at DESC);
CREATE INDEX idx_bets_user_won ON bets(user_id) WHERE won;

-- ============================================================================
-- 8. Notifications
-- ============================================================================

CREATE TABLE IF NOT EXISTS notifications (
    id          BIGSERIAL PRIMARY KEY,
    user_id     BIGINT NOT NULL,
    kind        VARCHAR(50) NOT NULL,
    title       VARCHAR(200) NOT NULL,
    message     TEXT NOT NULL DEFAULT '',
    data        JSONB NOT NULL DEFAULT '{}',
    read        BOOLEAN NOT NULL DEFAULT FALSE,
    created_at  TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_notifications_user ON notifications(user_id, created_at DESC);
CREATE INDEX idx_notifications_unread ON notifications(user_id) WHERE NOT read;
"#;

/// Get all migration SQL statements in order
pub fn get_migrations() -> Vec<(&'static str, &'static str)> {
    vec![("v1_initial_schema", MIGRATION_V1)]
}
