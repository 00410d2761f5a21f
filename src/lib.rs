//! LootVault Progression Core
//!
//! Progression and reward ledger for the LootVault game site: XP/leveling
//! with an invertible curve and rank tiers, mission tracking, achievement
//! evaluation, crate-key dispatch, trade-up contracts, and a
//! notification/broadcast gateway. Persistence is PostgreSQL behind
//! repository traits, with an in-memory backend for tests.
//!
//! The site's HTTP, auth, and payment layers live elsewhere; they embed
//! [`ProgressionCore`] and call its methods from their request handlers.

pub mod achievements;
pub mod config;
pub mod crate_keys;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod leveling;
pub mod missions;
pub mod models;
pub mod storage;
pub mod trade_up;

pub use config::CoreConfig;
pub use engine::ProgressionCore;
pub use error::{CoreError, CoreResult};
pub use gateway::{Audience, Channel, NotificationGateway, RealtimeEvent};
pub use leveling::{LevelCurve, QuadraticCurve};
pub use models::{CrateKind, MissionKind, Rarity, UserId};
