//! Order-log reconciliation.
//!
//! Checks the price each order item was actually charged against the
//! discount-window price in effect when the item was checked out.
//!
//! Price logs are full snapshots of a goods' option and adjustment fields
//! as the storefront saw them at `request_time`. For each order item, in
//! ascending `checked_at` order, every not-yet-applied log of the same goods
//! with `request_time <= checked_at` is applied to that goods' Context.
//! The item is flagged when the Context has seen at least one log and the
//! correct price is strictly greater than the price charged.
//!
//! Like the deal replay, each log is applied at most once and the inputs
//! are never mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::Context;
use crate::event::{EntityKey, Timestamp, MISSING};
use crate::policy::discount_window_price;

/// One storefront price log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLog {
    pub market_sno: i64,
    pub goods_sno: EntityKey,
    pub consumer_origin: i64,
    pub price_origin: i64,
    #[serde(default)]
    pub discount_type: Option<i64>,
    #[serde(default)]
    pub discount_rate: Option<i64>,
    #[serde(default)]
    pub discount_price: Option<i64>,
    pub discount_started_at: Timestamp,
    pub discount_ended_at: Timestamp,
    pub request_time: Timestamp,
}

impl PriceLog {
    /// Overwrite the option and adjustment fields of `ctx` with this
    /// snapshot and mark it live.
    pub fn apply(&self, ctx: &mut Context) {
        ctx.consumer_origin = self.consumer_origin;
        ctx.price_origin = self.price_origin;
        ctx.discount_type = self.discount_type.unwrap_or(MISSING);
        ctx.discount_rate = self.discount_rate.unwrap_or(MISSING);
        ctx.discount_price = self.discount_price.unwrap_or(MISSING);
        ctx.discount_started_at = self.discount_started_at;
        ctx.discount_ended_at = self.discount_ended_at;
        ctx.touch(self.request_time);
        ctx.attach();
    }
}

/// One purchased line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_sno: i64,
    pub order_sno: i64,
    pub market_sno: i64,
    pub goods_sno: EntityKey,
    pub goods_name: String,
    pub quantity: i64,
    /// Price actually charged.
    pub price: i64,
    pub checked_at: Timestamp,
}

/// An order item charged below the correct price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidOrder {
    /// Context snapshot at checkout time.
    pub context: Context,
    /// The most recent log applied to the goods.
    pub log: PriceLog,
    pub item: OrderItem,
    pub correct_price: i64,
}

/// Counters for a reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAuditStats {
    pub items: u64,
    pub logs: u64,
    /// Logs applied to some Context.
    pub applied_logs: u64,
    /// Items whose goods had no log at or before checkout.
    pub unobserved_items: u64,
    pub flagged: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OrderAudit {
    pub invalid: Vec<InvalidOrder>,
    pub stats: OrderAuditStats,
}

struct GoodsState<'a> {
    context: Context,
    logs: &'a [PriceLog],
    next: usize,
}

impl<'a> GoodsState<'a> {
    fn advance_to(&mut self, cutoff: Timestamp) -> usize {
        let start = self.next;
        while let Some(log) = self.logs.get(self.next) {
            if log.request_time > cutoff {
                break;
            }
            log.apply(&mut self.context);
            self.next += 1;
        }
        self.next - start
    }

    fn last_applied(&self) -> Option<&'a PriceLog> {
        self.next.checked_sub(1).and_then(|i| self.logs.get(i))
    }
}

/// Reconcile order items against price logs.
///
/// Inputs may be in any order; ties keep their given order. Output is in
/// checkout order.
pub fn reconcile_orders(logs: &[PriceLog], items: &[OrderItem]) -> OrderAudit {
    let mut logs_by_goods: BTreeMap<EntityKey, Vec<PriceLog>> = BTreeMap::new();
    for log in logs {
        logs_by_goods
            .entry(log.goods_sno)
            .or_default()
            .push(log.clone());
    }
    for goods_logs in logs_by_goods.values_mut() {
        goods_logs.sort_by_key(|l| l.request_time);
    }

    let mut queue: Vec<&OrderItem> = items.iter().collect();
    queue.sort_by_key(|i| i.checked_at);

    let mut stats = OrderAuditStats {
        items: items.len() as u64,
        logs: logs.len() as u64,
        ..OrderAuditStats::default()
    };
    let mut states: BTreeMap<EntityKey, GoodsState<'_>> = BTreeMap::new();
    let mut invalid = Vec::new();

    for item in queue {
        let state = states.entry(item.goods_sno).or_insert_with(|| GoodsState {
            context: Context::unobserved(item.goods_sno),
            logs: logs_by_goods
                .get(&item.goods_sno)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            next: 0,
        });
        stats.applied_logs += state.advance_to(item.checked_at) as u64;

        if !state.context.is_valid() {
            stats.unobserved_items += 1;
            continue;
        }
        let Some(correct_price) = discount_window_price(&state.context, item.checked_at) else {
            continue;
        };
        if correct_price <= item.price {
            continue;
        }
        if let Some(log) = state.last_applied() {
            debug!(
                goods = item.goods_sno,
                order = item.order_sno,
                charged = item.price,
                correct = correct_price,
                "order item charged below correct price"
            );
            invalid.push(InvalidOrder {
                context: state.context.clone(),
                log: log.clone(),
                item: item.clone(),
                correct_price,
            });
        }
    }

    stats.flagged = invalid.len() as u64;
    info!(
        items = stats.items,
        logs = stats.logs,
        flagged = stats.flagged,
        "order reconciliation complete"
    );
    OrderAudit { invalid, stats }
}
