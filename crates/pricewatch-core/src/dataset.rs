//! Grouped, time-ordered input for a replay run.

use std::collections::{BTreeMap, BTreeSet};

use crate::event::{
    AdjustmentEvent, ConsumerEvent, DealEvent, EntityKey, OptionEvent, StreamEvent,
};

/// Events of one stream grouped by goods key.
pub type EventMap<E> = BTreeMap<EntityKey, Vec<E>>;

/// The four grouped streams of a run.
///
/// Construction sorts every per-goods list by `occurred_at` with a stable
/// sort, so records sharing a timestamp keep their source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PricingDataset {
    deals: EventMap<DealEvent>,
    options: EventMap<OptionEvent>,
    consumers: EventMap<ConsumerEvent>,
    adjustments: EventMap<AdjustmentEvent>,
}

/// Borrowed, time-ordered non-deal streams of one goods.
///
/// A goods absent from a stream gets an empty slice.
#[derive(Debug, Clone, Copy)]
pub struct EntityStreams<'a> {
    pub options: &'a [OptionEvent],
    pub consumers: &'a [ConsumerEvent],
    pub adjustments: &'a [AdjustmentEvent],
}

impl EntityStreams<'_> {
    pub fn empty() -> Self {
        EntityStreams {
            options: &[],
            consumers: &[],
            adjustments: &[],
        }
    }
}

impl PricingDataset {
    pub fn new(
        mut deals: EventMap<DealEvent>,
        mut options: EventMap<OptionEvent>,
        mut consumers: EventMap<ConsumerEvent>,
        mut adjustments: EventMap<AdjustmentEvent>,
    ) -> Self {
        sort_streams(&mut deals);
        sort_streams(&mut options);
        sort_streams(&mut consumers);
        sort_streams(&mut adjustments);
        PricingDataset {
            deals,
            options,
            consumers,
            adjustments,
        }
    }

    pub fn deals(&self) -> &EventMap<DealEvent> {
        &self.deals
    }

    /// The non-deal streams for `key`.
    pub fn entity_streams(&self, key: EntityKey) -> EntityStreams<'_> {
        EntityStreams {
            options: slice_for(&self.options, key),
            consumers: slice_for(&self.consumers, key),
            adjustments: slice_for(&self.adjustments, key),
        }
    }

    /// Keep only the goods in `keys`.
    ///
    /// Returns the requested keys that have no deal events.
    pub fn retain_entities(&mut self, keys: &BTreeSet<EntityKey>) -> Vec<EntityKey> {
        let missing = keys
            .iter()
            .copied()
            .filter(|k| !self.deals.contains_key(k))
            .collect();
        self.deals.retain(|k, _| keys.contains(k));
        self.options.retain(|k, _| keys.contains(k));
        self.consumers.retain(|k, _| keys.contains(k));
        self.adjustments.retain(|k, _| keys.contains(k));
        missing
    }

    /// Number of goods that have at least one deal.
    pub fn entity_count(&self) -> usize {
        self.deals.len()
    }

    /// Total events per stream: `[deal, option, consumer, adjustment]`.
    pub fn event_counts(&self) -> [usize; 4] {
        [
            count(&self.deals),
            count(&self.options),
            count(&self.consumers),
            count(&self.adjustments),
        ]
    }
}

/// Group events by goods key, preserving source order within a goods.
pub fn group_by_entity<E: StreamEvent>(events: impl IntoIterator<Item = E>) -> EventMap<E> {
    let mut map: EventMap<E> = BTreeMap::new();
    for event in events {
        map.entry(event.entity_key()).or_default().push(event);
    }
    map
}

/// Whether `events` is non-decreasing in `occurred_at`.
pub fn is_time_ordered<E: StreamEvent>(events: &[E]) -> bool {
    events
        .windows(2)
        .all(|w| w[0].occurred_at() <= w[1].occurred_at())
}

fn sort_streams<E: StreamEvent>(map: &mut EventMap<E>) {
    for events in map.values_mut() {
        events.sort_by_key(|e| e.occurred_at());
    }
}

fn slice_for<E>(map: &EventMap<E>, key: EntityKey) -> &[E] {
    map.get(&key).map(Vec::as_slice).unwrap_or(&[])
}

fn count<E>(map: &EventMap<E>) -> usize {
    map.values().map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Operation, Timestamp};
    use chrono::NaiveDate;

    fn t(min: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_opt(8, min, 0)
            .unwrap()
    }

    fn opt(key: EntityKey, min: u32, price: i64) -> OptionEvent {
        OptionEvent::new(key, Operation::Update, t(min), 1000, price)
    }

    #[test]
    fn group_preserves_source_order() {
        let map = group_by_entity(vec![opt(2, 5, 1), opt(1, 1, 2), opt(2, 3, 3)]);
        assert_eq!(map.len(), 2);
        let prices: Vec<_> = map[&2].iter().map(|e| e.price_origin).collect();
        assert_eq!(prices, vec![1, 3]);
    }

    #[test]
    fn new_sorts_stably_by_time() {
        let options = group_by_entity(vec![opt(1, 9, 1), opt(1, 2, 2), opt(1, 9, 3), opt(1, 2, 4)]);
        let ds = PricingDataset::new(BTreeMap::new(), options, BTreeMap::new(), BTreeMap::new());
        let prices: Vec<_> = ds.entity_streams(1).options.iter().map(|e| e.price_origin).collect();
        assert_eq!(prices, vec![2, 4, 1, 3]);
        assert!(is_time_ordered(ds.entity_streams(1).options));
    }

    #[test]
    fn absent_goods_get_empty_streams() {
        let ds = PricingDataset::default();
        let streams = ds.entity_streams(77);
        assert!(streams.options.is_empty());
        assert!(streams.consumers.is_empty());
        assert!(streams.adjustments.is_empty());
    }

    #[test]
    fn retain_entities_reports_keys_without_deals() {
        let deals = group_by_entity(vec![
            DealEvent::new(1, Operation::Create, t(1), 100),
            DealEvent::new(2, Operation::Create, t(1), 100),
        ]);
        let options = group_by_entity(vec![opt(1, 0, 1), opt(3, 0, 1)]);
        let mut ds = PricingDataset::new(deals, options, BTreeMap::new(), BTreeMap::new());

        let keys: BTreeSet<EntityKey> = [1, 3].into_iter().collect();
        let missing = ds.retain_entities(&keys);
        assert_eq!(missing, vec![3]);
        assert_eq!(ds.entity_count(), 1);
        assert_eq!(ds.event_counts(), [1, 2, 0, 0]);
    }
}
