//! Deterministic policy-to-policy delta.
//!
//! Compares the Revisions two policies produced over the same dataset and
//! emits one divergence per observation point flagged by exactly one side.
//! Observation points are keyed by `(entity_key, observation_index)`, which
//! is stable because both runs walk the same time-ordered deal queues.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::event::{EntityKey, Timestamp};
use crate::policy::PricingPolicy;
use crate::revision::Revision;

/// Which side flagged an observation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeClass {
    /// Flagged by the left policy only.
    OnlyLeft,
    /// Flagged by the right policy only.
    OnlyRight,
}

/// One observation point the two policies disagree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub entity_key: EntityKey,
    pub observation_index: usize,
    pub deal_sno: i64,
    pub observed_at: Timestamp,
    pub observed_price: i64,
    pub change_class: ChangeClass,
    /// Expected prices of the side that flagged the point.
    pub expected_prices: Vec<i64>,
}

/// Delta between two policy runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDelta {
    pub left_policy: PricingPolicy,
    pub right_policy: PricingPolicy,
    pub left_revision_count: usize,
    pub right_revision_count: usize,
    /// Points flagged by both sides.
    pub shared_count: usize,
    pub divergences: Vec<Divergence>,
}

impl PolicyDelta {
    pub fn count(&self, class: ChangeClass) -> usize {
        self.divergences
            .iter()
            .filter(|d| d.change_class == class)
            .count()
    }
}

type PointKey = (EntityKey, usize);

/// Compute the delta between two revision sets.
///
/// Input order does not matter; output is ordered by entity key, then
/// observation index.
pub fn diff_revisions(
    left_policy: PricingPolicy,
    left: &[Revision],
    right_policy: PricingPolicy,
    right: &[Revision],
) -> PolicyDelta {
    let left_by_point = index_by_point(left);
    let right_by_point = index_by_point(right);

    let all_points: BTreeSet<PointKey> = left_by_point
        .keys()
        .chain(right_by_point.keys())
        .copied()
        .collect();

    let mut shared_count = 0;
    let mut divergences = Vec::new();
    for point in all_points {
        match (left_by_point.get(&point), right_by_point.get(&point)) {
            (Some(l), None) => divergences.push(divergence(l, ChangeClass::OnlyLeft)),
            (None, Some(r)) => divergences.push(divergence(r, ChangeClass::OnlyRight)),
            (Some(_), Some(_)) => shared_count += 1,
            (None, None) => {}
        }
    }

    PolicyDelta {
        left_policy,
        right_policy,
        left_revision_count: left.len(),
        right_revision_count: right.len(),
        shared_count,
        divergences,
    }
}

fn index_by_point(revisions: &[Revision]) -> BTreeMap<PointKey, &Revision> {
    revisions
        .iter()
        .map(|r| ((r.entity_key, r.observation_index), r))
        .collect()
}

fn divergence(revision: &Revision, change_class: ChangeClass) -> Divergence {
    Divergence {
        entity_key: revision.entity_key,
        observation_index: revision.observation_index,
        deal_sno: revision.deal.deal_sno,
        observed_at: revision.observed_at,
        observed_price: revision.observed_price(),
        change_class,
        expected_prices: revision.expected_prices.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::event::{DealEvent, Operation};
    use chrono::NaiveDate;

    fn rev(key: EntityKey, index: usize, expected: i64) -> Revision {
        let at = NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_opt(0, index as u32, 0)
            .unwrap();
        let mut deal = DealEvent::new(key, Operation::Update, at, 999);
        deal.deal_sno = key * 100 + index as i64;
        Revision {
            entity_key: key,
            observation_index: index,
            observed_at: at,
            expected_prices: vec![expected],
            context: Context::new(key),
            deal,
        }
    }

    #[test]
    fn identical_inputs_have_no_divergence() {
        let revs = vec![rev(1, 0, 10), rev(2, 3, 20)];
        let delta = diff_revisions(
            PricingPolicy::Candidates,
            &revs,
            PricingPolicy::DiscountWindow,
            &revs,
        );
        assert!(delta.divergences.is_empty());
        assert_eq!(delta.shared_count, 2);
    }

    #[test]
    fn one_sided_points_are_classified() {
        let left = vec![rev(1, 0, 10), rev(2, 0, 20)];
        let right = vec![rev(2, 0, 25), rev(3, 1, 30)];
        let delta = diff_revisions(
            PricingPolicy::Candidates,
            &left,
            PricingPolicy::DiscountWindow,
            &right,
        );
        assert_eq!(delta.divergences.len(), 2);
        assert_eq!(delta.divergences[0].entity_key, 1);
        assert_eq!(delta.divergences[0].change_class, ChangeClass::OnlyLeft);
        assert_eq!(delta.divergences[1].entity_key, 3);
        assert_eq!(delta.divergences[1].change_class, ChangeClass::OnlyRight);
        assert_eq!(delta.divergences[1].deal_sno, 301);
        assert_eq!(delta.divergences[1].expected_prices, vec![30]);
        assert_eq!(delta.shared_count, 1);
        assert_eq!(delta.count(ChangeClass::OnlyLeft), 1);
    }

    #[test]
    fn output_order_ignores_input_order() {
        let left = vec![rev(5, 1, 0), rev(1, 2, 0), rev(5, 0, 0)];
        let mut shuffled = left.clone();
        shuffled.reverse();
        let a = diff_revisions(PricingPolicy::Candidates, &left, PricingPolicy::Candidates, &[]);
        let b = diff_revisions(PricingPolicy::Candidates, &shuffled, PricingPolicy::Candidates, &[]);
        assert_eq!(a, b);
        let points: Vec<_> = a
            .divergences
            .iter()
            .map(|d| (d.entity_key, d.observation_index))
            .collect();
        assert_eq!(points, vec![(1, 2), (5, 0), (5, 1)]);
    }
}
