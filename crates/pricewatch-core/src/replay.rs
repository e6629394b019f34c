//! Temporal replay engine and observation loop.
//!
//! # Overview
//!
//! For each goods, deal events are observation points. They are consumed in
//! ascending `occurred_at` order, each exactly once. For every deal:
//!
//! 1. fold the deal itself into the Context,
//! 2. advance the option, consumer and adjustment streams, folding every
//!    record with `occurred_at <= deal.occurred_at`,
//! 3. evaluate the configured [`PricingPolicy`],
//! 4. emit a [`Revision`] snapshot on a discrepancy.
//!
//! # Streaming merge
//!
//! Each non-deal stream is read through a [`StreamCursor`]: an index into a
//! borrowed, pre-sorted slice. Advancing a cursor never rewinds, so each
//! record is folded at most once across the whole run and the input is
//! never mutated. Streams are not merged into one timeline; they interleave
//! only through repeated advancement to the same cutoff.
//!
//! # Determinism
//!
//! Goods are processed in ascending key order (the grouping is a
//! `BTreeMap`). Output order is goods key, then observation time.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::Context;
use crate::dataset::{is_time_ordered, EntityStreams, PricingDataset};
use crate::event::{
    AdjustmentEvent, ConsumerEvent, DealEvent, EntityKey, OptionEvent, Timestamp,
};
use crate::policy::{PricingPolicy, Verdict};
use crate::reducer::{fold_in_place, Fold, Revalidation};
use crate::revision::Revision;

/// Run-level choices that change replay semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub policy: PricingPolicy,
    pub revalidation: Revalidation,
}

impl ReplayConfig {
    pub fn new(policy: PricingPolicy, revalidation: Revalidation) -> Self {
        ReplayConfig {
            policy,
            revalidation,
        }
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Forward-only read position in one time-ordered stream.
#[derive(Debug, Clone)]
pub struct StreamCursor<'a, E> {
    events: &'a [E],
    next: usize,
}

impl<'a, E: Fold> StreamCursor<'a, E> {
    /// `events` must be non-decreasing in `occurred_at`.
    pub fn new(events: &'a [E]) -> Self {
        debug_assert!(is_time_ordered(events), "stream must be time-ordered");
        StreamCursor { events, next: 0 }
    }

    /// The earliest record not yet folded.
    pub fn peek(&self) -> Option<&'a E> {
        self.events.get(self.next)
    }

    /// Number of records folded so far.
    pub fn consumed(&self) -> usize {
        self.next
    }

    /// Fold every remaining record with `occurred_at <= cutoff`.
    ///
    /// Returns the number of records folded.
    pub fn advance_to(&mut self, ctx: &mut Context, cutoff: Timestamp, mode: Revalidation) -> usize {
        let start = self.next;
        while let Some(event) = self.peek() {
            if event.occurred_at() > cutoff {
                break;
            }
            fold_in_place(ctx, event, mode);
            self.next += 1;
        }
        self.next - start
    }
}

/// Cursors over the three non-deal streams of one goods.
#[derive(Debug, Clone)]
pub struct ReplayCursors<'a> {
    options: StreamCursor<'a, OptionEvent>,
    consumers: StreamCursor<'a, ConsumerEvent>,
    adjustments: StreamCursor<'a, AdjustmentEvent>,
}

impl<'a> ReplayCursors<'a> {
    pub fn new(streams: EntityStreams<'a>) -> Self {
        ReplayCursors {
            options: StreamCursor::new(streams.options),
            consumers: StreamCursor::new(streams.consumers),
            adjustments: StreamCursor::new(streams.adjustments),
        }
    }

    /// Bring `ctx` up to `cutoff` on every non-deal stream.
    ///
    /// Returns the number of records folded.
    pub fn replay(&mut self, ctx: &mut Context, cutoff: Timestamp, mode: Revalidation) -> usize {
        self.options.advance_to(ctx, cutoff, mode)
            + self.consumers.advance_to(ctx, cutoff, mode)
            + self.adjustments.advance_to(ctx, cutoff, mode)
    }

    /// Records folded so far across the three streams.
    pub fn consumed(&self) -> usize {
        self.options.consumed() + self.consumers.consumed() + self.adjustments.consumed()
    }
}

// ---------------------------------------------------------------------------
// Observation loop
// ---------------------------------------------------------------------------

/// Counters for a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Goods processed.
    pub entities: u64,
    /// Deal events evaluated.
    pub observations: u64,
    /// Events folded, deals included.
    pub folds: u64,
    /// Observations whose recorded price matched.
    pub consistent: u64,
    /// Observations skipped because the Context was invalidated.
    pub suppressed: u64,
    /// Revisions emitted.
    pub revisions: u64,
}

impl ReplayStats {
    fn absorb(&mut self, other: &ReplayStats) {
        self.entities += other.entities;
        self.observations += other.observations;
        self.folds += other.folds;
        self.consistent += other.consistent;
        self.suppressed += other.suppressed;
        self.revisions += other.revisions;
    }
}

/// Result of replaying one goods.
#[derive(Debug, Clone)]
pub struct EntityReplay {
    /// The Context after the last observation point.
    pub context: Context,
    pub revisions: Vec<Revision>,
    pub stats: ReplayStats,
}

/// Result of replaying a whole dataset.
#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    pub revisions: Vec<Revision>,
    pub stats: ReplayStats,
}

/// Replay one goods: every deal, in time order, against its other streams.
///
/// `deals` may be in any order; ties keep their given order. The streams in
/// `streams` must already be time-ordered.
pub fn process_entity(
    key: EntityKey,
    deals: &[DealEvent],
    streams: EntityStreams<'_>,
    config: ReplayConfig,
) -> EntityReplay {
    let mut queue: Vec<&DealEvent> = deals.iter().collect();
    queue.sort_by_key(|d| d.occurred_at);

    let mode = config.revalidation;
    let mut ctx = Context::new(key);
    let mut cursors = ReplayCursors::new(streams);
    let mut revisions = Vec::new();
    let mut stats = ReplayStats {
        entities: 1,
        ..ReplayStats::default()
    };

    for (observation_index, deal) in queue.into_iter().enumerate() {
        fold_in_place(&mut ctx, deal, mode);
        stats.folds += 1;
        stats.folds += cursors.replay(&mut ctx, deal.occurred_at, mode) as u64;
        stats.observations += 1;

        match config
            .policy
            .evaluate(&ctx, deal.thumbnail_price, deal.occurred_at)
        {
            Verdict::Consistent => stats.consistent += 1,
            Verdict::Suppressed => stats.suppressed += 1,
            Verdict::Discrepancy { expected } => {
                stats.revisions += 1;
                revisions.push(Revision {
                    entity_key: key,
                    observation_index,
                    observed_at: deal.occurred_at,
                    expected_prices: expected,
                    context: ctx.clone(),
                    deal: deal.clone(),
                });
            }
        }
    }

    debug!(
        goods = key,
        observations = stats.observations,
        folds = stats.folds,
        suppressed = stats.suppressed,
        revisions = stats.revisions,
        "replayed goods"
    );

    EntityReplay {
        context: ctx,
        revisions,
        stats,
    }
}

/// Replay every goods in the dataset, in ascending key order.
pub fn replay_dataset(dataset: &PricingDataset, config: ReplayConfig) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    for (key, deals) in dataset.deals() {
        let entity = process_entity(*key, deals, dataset.entity_streams(*key), config);
        outcome.stats.absorb(&entity.stats);
        outcome.revisions.extend(entity.revisions);
    }
    info!(
        policy = %config.policy,
        revalidation = %config.revalidation,
        entities = outcome.stats.entities,
        observations = outcome.stats.observations,
        revisions = outcome.stats.revisions,
        "replay complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Operation, INVALID_ENTITY_KEY};
    use chrono::NaiveDate;

    fn t(min: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_opt(10, min, 0)
            .unwrap()
    }

    fn opt(min: u32, op: Operation, price: i64) -> OptionEvent {
        OptionEvent::new(1, op, t(min), 43000, price)
    }

    #[test]
    fn cursor_stops_at_cutoff_inclusive() {
        let events = vec![
            opt(1, Operation::Create, 100),
            opt(2, Operation::Update, 200),
            opt(3, Operation::Update, 300),
        ];
        let mut ctx = Context::new(1);
        let mut cursor = StreamCursor::new(&events);

        assert_eq!(cursor.advance_to(&mut ctx, t(2), Revalidation::default()), 2);
        assert_eq!(ctx.price_origin, 200);
        assert_eq!(cursor.peek().map(|e| e.price_origin), Some(300));
        assert_eq!(cursor.consumed(), 2);
    }

    #[test]
    fn cursor_never_refolds() {
        let events = vec![opt(1, Operation::Create, 100)];
        let mut ctx = Context::new(1);
        let mut cursor = StreamCursor::new(&events);
        assert_eq!(cursor.advance_to(&mut ctx, t(5), Revalidation::default()), 1);
        assert_eq!(cursor.advance_to(&mut ctx, t(9), Revalidation::default()), 0);
        assert_eq!(cursor.consumed(), 1);
    }

    #[test]
    fn cursor_before_first_event_folds_nothing() {
        let events = vec![opt(5, Operation::Create, 100)];
        let mut ctx = Context::new(1);
        let mut cursor = StreamCursor::new(&events);
        assert_eq!(cursor.advance_to(&mut ctx, t(4), Revalidation::default()), 0);
        assert_eq!(ctx, Context::new(1));
    }

    #[test]
    fn replay_advances_every_stream_independently() {
        let options = vec![opt(1, Operation::Create, 14900)];
        let consumers = vec![
            ConsumerEvent::new(1, Operation::Create, t(2), 43000),
            ConsumerEvent::new(1, Operation::Update, t(8), 50000),
        ];
        let adjustments = vec![AdjustmentEvent::flat(
            1,
            Operation::Create,
            t(3),
            28100,
            t(0),
            t(59),
        )];
        let streams = EntityStreams {
            options: &options,
            consumers: &consumers,
            adjustments: &adjustments,
        };
        let mut cursors = ReplayCursors::new(streams);
        let mut ctx = Context::new(1);

        assert_eq!(cursors.replay(&mut ctx, t(5), Revalidation::default()), 3);
        assert_eq!(ctx.platform_consumer, 43000);
        assert_eq!(ctx.discount_price, 28100);
        assert_eq!(cursors.consumed(), 3);

        assert_eq!(cursors.replay(&mut ctx, t(9), Revalidation::default()), 1);
        assert_eq!(ctx.platform_consumer, 50000);
    }

    #[test]
    fn process_entity_sorts_deals_and_indexes_observations() {
        let deals = vec![
            DealEvent::new(1, Operation::Update, t(9), 222),
            DealEvent::new(1, Operation::Create, t(1), 111),
        ];
        let out = process_entity(1, &deals, EntityStreams::empty(), ReplayConfig::default());
        assert_eq!(out.revisions.len(), 2);
        assert_eq!(out.revisions[0].observed_price(), 111);
        assert_eq!(out.revisions[0].observation_index, 0);
        assert_eq!(out.revisions[1].observed_price(), 222);
        assert_eq!(out.revisions[1].observation_index, 1);
        assert_eq!(out.context.thumbnail_price, 222);
    }

    #[test]
    fn deal_delete_suppresses_its_own_observation() {
        let deals = vec![DealEvent::new(1, Operation::Delete, t(1), 5)];
        let out = process_entity(1, &deals, EntityStreams::empty(), ReplayConfig::default());
        assert!(out.revisions.is_empty());
        assert_eq!(out.stats.suppressed, 1);
        assert_eq!(out.context.entity_key, INVALID_ENTITY_KEY);
    }

    #[test]
    fn emitted_revision_is_isolated_from_later_folds() {
        let deals = vec![
            DealEvent::new(1, Operation::Create, t(1), 10),
            DealEvent::new(1, Operation::Update, t(5), 20),
        ];
        let options = vec![opt(3, Operation::Create, 777)];
        let streams = EntityStreams {
            options: &options,
            ..EntityStreams::empty()
        };
        let out = process_entity(1, &deals, streams, ReplayConfig::default());
        assert_eq!(out.revisions[0].context.price_origin, -1);
        assert_eq!(out.revisions[0].context.thumbnail_price, 10);
        assert_eq!(out.context.price_origin, 777);
    }

    #[test]
    fn stats_absorb_sums_fields() {
        let mut a = ReplayStats {
            entities: 1,
            observations: 2,
            folds: 3,
            consistent: 1,
            suppressed: 0,
            revisions: 1,
        };
        a.absorb(&a.clone());
        assert_eq!(a.observations, 4);
        assert_eq!(a.folds, 6);
    }
}
