//! Per-goods Context -- the cumulative projection of every pricing stream.
//!
//! A Context is created once per goods with every price field at
//! [`MISSING`] and is mutated in place as events are folded. It carries two
//! keys:
//!
//! - `goods_key`: the identity of the goods. Never changes.
//! - `entity_key`: equal to `goods_key` while the Context is live, and
//!   [`INVALID_ENTITY_KEY`] while any stream is latched by a delete.
//!
//! The set of latched streams is kept so that a revalidation mode can
//! decide which Create/Update clears which latch (see
//! [`Revalidation`](crate::reducer::Revalidation)).

use serde::{Deserialize, Serialize};

use crate::event::{epoch, EntityKey, StreamKind, Timestamp, INVALID_ENTITY_KEY, MISSING};

/// Set of streams, stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamSet(u8);

impl StreamSet {
    pub fn new() -> Self {
        StreamSet(0)
    }

    pub fn insert(&mut self, kind: StreamKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: StreamKind) {
        self.0 &= !kind.bit();
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn contains(self, kind: StreamKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Latest known value of every pricing attribute of one goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Identity of the goods this Context belongs to.
    pub goods_key: EntityKey,
    /// `goods_key` while live, [`INVALID_ENTITY_KEY`] while invalidated.
    pub entity_key: EntityKey,

    // Deal stream.
    pub thumbnail_price: i64,

    // Option stream.
    pub consumer_origin: i64,
    pub price_origin: i64,
    pub total_additional_price: i64,

    // Platform consumer stream.
    pub platform_consumer: i64,
    pub platform_total_additional_price: i64,

    // Adjustment stream.
    pub discount_type: i64,
    /// Percentage discount, [`MISSING`] when the adjustment has none.
    pub discount_rate: i64,
    /// Flat discount, [`MISSING`] when the adjustment has none.
    pub discount_price: i64,
    pub discount_started_at: Timestamp,
    pub discount_ended_at: Timestamp,

    /// Latest `occurred_at` folded from any stream.
    pub updated_at: Timestamp,
    /// Streams whose most recent record was a delete.
    pub latched: StreamSet,
}

impl Context {
    /// A live Context with every field at its sentinel.
    pub fn new(goods_key: EntityKey) -> Self {
        Context {
            goods_key,
            entity_key: goods_key,
            thumbnail_price: MISSING,
            consumer_origin: MISSING,
            price_origin: MISSING,
            total_additional_price: MISSING,
            platform_consumer: MISSING,
            platform_total_additional_price: MISSING,
            discount_type: MISSING,
            discount_rate: MISSING,
            discount_price: MISSING,
            discount_started_at: epoch(),
            discount_ended_at: epoch(),
            updated_at: epoch(),
            latched: StreamSet::new(),
        }
    }

    /// A Context that stays invalid until something is folded into it.
    pub fn unobserved(goods_key: EntityKey) -> Self {
        Context {
            entity_key: INVALID_ENTITY_KEY,
            ..Context::new(goods_key)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.entity_key != INVALID_ENTITY_KEY
    }

    /// Latch `kind` and invalidate the whole projection.
    pub(crate) fn latch(&mut self, kind: StreamKind) {
        self.latched.insert(kind);
        self.entity_key = INVALID_ENTITY_KEY;
    }

    /// Recompute `entity_key` from the latch set.
    pub(crate) fn sync_validity(&mut self) {
        self.entity_key = if self.latched.is_empty() {
            self.goods_key
        } else {
            INVALID_ENTITY_KEY
        };
    }

    /// Mark the Context live without consulting latches.
    pub(crate) fn attach(&mut self) {
        self.latched.clear();
        self.entity_key = self.goods_key;
    }

    pub(crate) fn touch(&mut self, at: Timestamp) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }

    /// Whether an adjustment with at least one discount amount was folded.
    pub fn has_discount(&self) -> bool {
        known(self.discount_rate).is_some() || known(self.discount_price).is_some()
    }

    /// Whether `at` falls inside the discount window, both ends inclusive.
    pub fn discount_active_at(&self, at: Timestamp) -> bool {
        self.has_discount() && self.discount_started_at <= at && at <= self.discount_ended_at
    }
}

/// `Some(value)` unless `value` is a sentinel (negative).
pub fn known(value: i64) -> Option<i64> {
    (value >= 0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn new_context_is_live_with_sentinels() {
        let ctx = Context::new(42);
        assert!(ctx.is_valid());
        assert_eq!(ctx.entity_key, 42);
        assert_eq!(ctx.thumbnail_price, MISSING);
        assert_eq!(ctx.consumer_origin, MISSING);
        assert_eq!(ctx.platform_consumer, MISSING);
        assert_eq!(ctx.discount_price, MISSING);
        assert!(ctx.latched.is_empty());
    }

    #[test]
    fn unobserved_context_starts_invalid() {
        let mut ctx = Context::unobserved(42);
        assert!(!ctx.is_valid());
        ctx.attach();
        assert_eq!(ctx.entity_key, 42);
    }

    #[test]
    fn latch_invalidates_until_latches_clear() {
        let mut ctx = Context::new(5);
        ctx.latch(StreamKind::Option);
        ctx.latch(StreamKind::Adjustment);
        assert_eq!(ctx.entity_key, INVALID_ENTITY_KEY);

        ctx.latched.remove(StreamKind::Option);
        ctx.sync_validity();
        assert!(!ctx.is_valid());

        ctx.latched.remove(StreamKind::Adjustment);
        ctx.sync_validity();
        assert_eq!(ctx.entity_key, 5);
    }

    #[test]
    fn stream_set_tracks_members_independently() {
        let mut set = StreamSet::new();
        set.insert(StreamKind::Adjustment);
        set.insert(StreamKind::Deal);
        assert!(set.contains(StreamKind::Deal));
        assert!(!set.contains(StreamKind::Option));
        set.remove(StreamKind::Deal);
        assert!(set.contains(StreamKind::Adjustment));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn touch_keeps_latest_time() {
        let mut ctx = Context::new(1);
        ctx.touch(at(3));
        ctx.touch(at(2));
        assert_eq!(ctx.updated_at, at(3));
    }

    #[test]
    fn discount_window_is_inclusive_on_both_ends() {
        let mut ctx = Context::new(1);
        ctx.discount_price = 500;
        ctx.discount_started_at = at(2);
        ctx.discount_ended_at = at(4);
        assert!(!ctx.discount_active_at(at(1)));
        assert!(ctx.discount_active_at(at(2)));
        assert!(ctx.discount_active_at(at(4)));
        assert!(!ctx.discount_active_at(at(5)));
    }

    #[test]
    fn window_without_discount_amount_is_inactive() {
        let mut ctx = Context::new(1);
        ctx.discount_started_at = at(1);
        ctx.discount_ended_at = at(9);
        assert!(!ctx.discount_active_at(at(3)));
    }

    #[test]
    fn known_filters_sentinels() {
        assert_eq!(known(MISSING), None);
        assert_eq!(known(0), Some(0));
        assert_eq!(known(14900), Some(14900));
    }
}
