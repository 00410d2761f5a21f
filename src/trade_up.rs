//! Trade-Up Processor
//!
//! Consumes five same-rarity inventory items and produces one item of the
//! next rarity tier. Validation happens up front with no mutation; the
//! delete-5/insert-1 swap and its audit contract commit in one store
//! transaction.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::gateway::{Audience, Channel, NotificationGateway};
use crate::leveling::XpEngine;
use crate::missions::MissionTracker;
use crate::models::{InventoryItem, ItemId, NewInventoryItem, NewNotification, Rarity, UserId};
use crate::storage::Store;

/// Items consumed per contract.
pub const TRADE_UP_INPUT_COUNT: usize = 5;

/// Flat xp grant per completed contract.
pub const TRADE_UP_XP: i64 = 30;

/// Upper bound on the candidate pool drawn from the catalog.
const CANDIDATE_POOL_LIMIT: i64 = 64;

/// Result of a successful trade-up.
#[derive(Debug, Clone)]
pub struct TradeUpOutcome {
    pub input_items: Vec<InventoryItem>,
    pub output_item: InventoryItem,
}

/// Output value formula: averaged input value scaled by the multiplier
/// ratio, floored at both steps.
pub fn trade_up_output_value(input_values: &[i64], input_rarity: Rarity) -> i64 {
    let sum: i64 = input_values.iter().sum();
    let average = (sum / TRADE_UP_INPUT_COUNT as i64) as f64;
    let ratio = input_rarity.next_tier().value_multiplier() / input_rarity.value_multiplier();
    (average * ratio).floor() as i64
}

pub struct TradeUpProcessor {
    store: Arc<Store>,
    gateway: NotificationGateway,
    xp: Arc<XpEngine>,
    missions: Arc<MissionTracker>,
}

impl TradeUpProcessor {
    pub fn new(
        store: Arc<Store>,
        gateway: NotificationGateway,
        xp: Arc<XpEngine>,
        missions: Arc<MissionTracker>,
    ) -> Self {
        Self {
            store,
            gateway,
            xp,
            missions,
        }
    }

    /// Execute one trade-up contract. Fails with a validation error (wrong
    /// count, not owned, mixed rarity) or not-found (empty output catalog)
    /// before any mutation; after the transactional swap commits, follow-up
    /// rewards are best-effort.
    pub async fn process_trade_up(
        &self,
        user_id: UserId,
        item_ids: &[ItemId],
    ) -> CoreResult<TradeUpOutcome> {
        if item_ids.len() != TRADE_UP_INPUT_COUNT {
            return Err(CoreError::validation(format!(
                "trade-up requires exactly {} items, got {}",
                TRADE_UP_INPUT_COUNT,
                item_ids.len()
            )));
        }
        let unique: HashSet<ItemId> = item_ids.iter().copied().collect();
        if unique.len() != TRADE_UP_INPUT_COUNT {
            return Err(CoreError::validation("trade-up items must be distinct"));
        }

        let input_items = self.store.inventory.items_by_ids(user_id, item_ids).await?;
        if input_items.len() != TRADE_UP_INPUT_COUNT {
            return Err(CoreError::validation(format!(
                "user owns {} of the {} submitted items",
                input_items.len(),
                TRADE_UP_INPUT_COUNT
            )));
        }

        let input_rarity = input_items[0].rarity;
        if input_items.iter().any(|i| i.rarity != input_rarity) {
            return Err(CoreError::validation(
                "trade-up items must share one rarity",
            ));
        }

        // Legendary is terminal; five legendaries reforge into a legendary.
        let output_rarity = input_rarity.next_tier();
        let candidates = self
            .store
            .catalog
            .active_by_rarity(output_rarity, CANDIDATE_POOL_LIMIT)
            .await?;

        // Rng is scoped so it never lives across an await.
        let template = {
            let mut rng = rand::thread_rng();
            candidates.choose(&mut rng).cloned()
        }
        .ok_or_else(|| {
            CoreError::not_found(format!("no active {} catalog items", output_rarity.as_str()))
        })?;

        let values: Vec<i64> = input_items.iter().map(|i| i.value).collect();
        let output_value = trade_up_output_value(&values, input_rarity);

        let output_item = self
            .store
            .inventory
            .trade_up(
                user_id,
                item_ids,
                json!(input_items),
                NewInventoryItem {
                    user_id,
                    template_id: template.id.clone(),
                    name: template.name.clone(),
                    rarity: output_rarity,
                    value: output_value,
                },
            )
            .await?;

        info!(
            user_id,
            output = %output_item.template_id,
            rarity = output_rarity.as_str(),
            value = output_value,
            "trade-up completed"
        );

        self.deliver_followups(user_id, &input_items, &output_item)
            .await;

        Ok(TradeUpOutcome {
            input_items,
            output_item,
        })
    }

    /// Post-commit cascade: flat xp, trade-up mission tick, refreshed
    /// ownership counters, broadcast, notification. Each step logs and
    /// continues on failure; the swap already stands.
    async fn deliver_followups(
        &self,
        user_id: UserId,
        input_items: &[InventoryItem],
        output_item: &InventoryItem,
    ) {
        if let Err(e) = self
            .xp
            .add_xp(
                user_id,
                TRADE_UP_XP,
                "trade_up",
                Some(json!({ "output_item_id": output_item.id })),
            )
            .await
        {
            warn!(user_id, error = %e, "trade-up xp grant failed");
        }

        if let Err(e) = self
            .missions
            .track_mission_progress(user_id, "trade_up", 1)
            .await
        {
            warn!(user_id, error = %e, "trade-up mission tick failed");
        }

        // Ownership counters are recomputed, not decremented, after any
        // inventory change.
        match self.store.inventory.count_items(user_id).await {
            Ok(count) => {
                if let Err(e) = self
                    .missions
                    .set_mission_progress(user_id, "items_owned", count)
                    .await
                {
                    warn!(user_id, error = %e, "ownership counter update failed");
                }
            }
            Err(e) => warn!(user_id, error = %e, "inventory count failed"),
        }

        let payload = json!({
            "removed": input_items.iter().map(|i| i.id).collect::<Vec<_>>(),
            "added": output_item.id,
            "rarity": output_item.rarity.as_str(),
        });
        if let Err(e) = self.gateway.publish(
            Channel::InventoryChanges,
            Audience::User(user_id),
            "trade_up",
            payload,
        ) {
            warn!(user_id, error = %e, "trade-up broadcast failed");
        }

        if let Err(e) = self
            .gateway
            .notify(NewNotification {
                user_id,
                kind: "trade_up_completed".into(),
                title: output_item.name.clone(),
                message: format!(
                    "Trade-up complete: {} ({})",
                    output_item.name,
                    output_item.rarity.as_str()
                ),
                data: json!({
                    "output_item_id": output_item.id,
                    "template_id": output_item.template_id,
                    "value": output_item.value,
                }),
            })
            .await
        {
            warn!(user_id, error = %e, "trade-up notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_value_formula() {
        // avg 100, rare -> epic is 4 / 2.5
        let value = trade_up_output_value(&[80, 90, 100, 110, 120], Rarity::Rare);
        assert_eq!(value, 160);
    }

    #[test]
    fn test_output_value_floors_twice() {
        // sum 504 -> avg floors to 100 before the ratio applies
        let value = trade_up_output_value(&[100, 100, 100, 100, 104], Rarity::Rare);
        assert_eq!(value, 160);
    }

    #[test]
    fn test_legendary_ratio_is_one() {
        let value = trade_up_output_value(&[1000, 1100, 1200, 1300, 1400], Rarity::Legendary);
        assert_eq!(value, 1200);
    }
}
