//! Storage layer - repository traits and backends
//!
//! Engines only ever see the `Store` bundle of trait objects, so the
//! backend can be PostgreSQL in production and the in-memory store in
//! tests without touching engine code.

pub mod memory;
pub mod migrations;
pub mod postgres;
pub mod repository;
pub mod seed_data;

use std::sync::Arc;

pub use repository::*;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Central bundle holding one repository per concern.
pub struct Store {
    pub economy: Box<dyn EconomyRepo>,
    pub missions: Box<dyn MissionRepo>,
    pub achievements: Box<dyn AchievementRepo>,
    pub bets: Box<dyn BetStatsRepo>,
    pub keys: Box<dyn KeyRepo>,
    pub inventory: Box<dyn InventoryRepo>,
    pub catalog: Box<dyn ItemCatalogRepo>,
    pub notifications: Box<dyn NotificationRepo>,
}

impl Store {
    /// Wire every repository to a shared PostgreSQL pool.
    pub fn postgres(store: Arc<postgres::PostgresStore>) -> Self {
        Self {
            economy: Box::new(postgres::PgEconomyRepo::new(store.clone())),
            missions: Box::new(postgres::PgMissionRepo::new(store.clone())),
            achievements: Box::new(postgres::PgAchievementRepo::new(store.clone())),
            bets: Box::new(postgres::PgBetStatsRepo::new(store.clone())),
            keys: Box::new(postgres::PgKeyRepo::new(store.clone())),
            inventory: Box::new(postgres::PgInventoryRepo::new(store.clone())),
            catalog: Box::new(postgres::PgItemCatalogRepo::new(store.clone())),
            notifications: Box::new(postgres::PgNotificationRepo::new(store)),
        }
    }

    /// Wire every repository to a shared in-memory backend (test double).
    pub fn in_memory(backend: Arc<memory::MemoryBackend>) -> Self {
        Self {
            economy: Box::new(memory::MemEconomyRepo::new(backend.clone())),
            missions: Box::new(memory::MemMissionRepo::new(backend.clone())),
            achievements: Box::new(memory::MemAchievementRepo::new(backend.clone())),
            bets: Box::new(memory::MemBetStatsRepo::new(backend.clone())),
            keys: Box::new(memory::MemKeyRepo::new(backend.clone())),
            inventory: Box::new(memory::MemInventoryRepo::new(backend.clone())),
            catalog: Box::new(memory::MemItemCatalogRepo::new(backend.clone())),
            notifications: Box::new(memory::MemNotificationRepo::new(backend)),
        }
    }
}
