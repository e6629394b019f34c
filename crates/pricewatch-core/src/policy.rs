//! Correctness policies -- what the displayed price should have been.
//!
//! A policy is a named strategy value chosen once per run. Two variants
//! exist and they are not numerically equivalent:
//!
//! - [`PricingPolicy::Candidates`]: the recorded price is correct if it
//!   equals either candidate
//!   - A: `round_down_10(platform_consumer - discount_price)`
//!   - B: `round_down_10(max(consumer, price) - |consumer - price|)`
//! - [`PricingPolicy::DiscountWindow`]: one expected price,
//!   `max(consumer, price) - discount`, where the discount is the folded
//!   adjustment when the observation time is inside its window and the raw
//!   origin spread otherwise.
//!
//! A candidate whose operands include a sentinel is unavailable. When no
//! candidate is available the observation is a discrepancy. An invalidated
//! Context is never reported, whatever the prices say.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::context::{known, Context};
use crate::event::Timestamp;

/// Truncate to the nearest lower multiple of ten.
pub fn round_down_10(x: i64) -> i64 {
    x.div_euclid(10) * 10
}

/// Named correctness formula.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingPolicy {
    /// Recorded price must match one of two candidate prices.
    #[default]
    Candidates,
    /// Recorded price must match origin minus the discount active at the
    /// observation time.
    DiscountWindow,
}

/// Outcome of checking one observation point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The recorded price matches an expected price.
    Consistent,
    /// The recorded price matches none of `expected` (possibly empty).
    Discrepancy { expected: Vec<i64> },
    /// The Context is invalidated; no comparison is reported.
    Suppressed,
}

impl PricingPolicy {
    pub const ALL: [PricingPolicy; 2] = [PricingPolicy::Candidates, PricingPolicy::DiscountWindow];

    pub fn name(self) -> &'static str {
        match self {
            PricingPolicy::Candidates => "candidates",
            PricingPolicy::DiscountWindow => "discount-window",
        }
    }

    /// Every available expected price, in candidate order, deduplicated.
    pub fn expected_prices(self, ctx: &Context, at: Timestamp) -> Vec<i64> {
        let mut out: Vec<i64> = match self {
            PricingPolicy::Candidates => [consumer_minus_discount(ctx), origin_floor(ctx)]
                .into_iter()
                .flatten()
                .collect(),
            PricingPolicy::DiscountWindow => discount_window_price(ctx, at).into_iter().collect(),
        };
        out.dedup();
        out
    }

    /// Compare `observed` against the expected prices for `ctx` at `at`.
    pub fn evaluate(self, ctx: &Context, observed: i64, at: Timestamp) -> Verdict {
        if !ctx.is_valid() {
            return Verdict::Suppressed;
        }
        let expected = self.expected_prices(ctx, at);
        if expected.contains(&observed) {
            Verdict::Consistent
        } else {
            Verdict::Discrepancy { expected }
        }
    }
}

impl fmt::Display for PricingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PricingPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PricingPolicy::ALL
            .into_iter()
            .find(|p| p.name() == s.trim())
            .ok_or_else(|| PolicyParseError(s.to_string()))
    }
}

/// Error returned when parsing an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyParseError(pub String);

impl fmt::Display for PolicyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid pricing policy: {:?} (expected candidates or discount-window)",
            self.0
        )
    }
}

impl std::error::Error for PolicyParseError {}

// ---------------------------------------------------------------------------
// Candidate formulas
// ---------------------------------------------------------------------------

/// Candidate A: platform consumer price minus the flat discount.
pub fn consumer_minus_discount(ctx: &Context) -> Option<i64> {
    let platform = known(ctx.platform_consumer)?;
    let discount = known(ctx.discount_price)?;
    Some(round_down_10(platform - discount))
}

/// Candidate B: the larger origin minus the origin spread.
pub fn origin_floor(ctx: &Context) -> Option<i64> {
    let consumer = known(ctx.consumer_origin)?;
    let price = known(ctx.price_origin)?;
    Some(round_down_10(consumer.max(price) - (consumer - price).abs()))
}

/// Discount-window expected price.
pub fn discount_window_price(ctx: &Context, at: Timestamp) -> Option<i64> {
    let consumer = known(ctx.consumer_origin)?;
    let price = known(ctx.price_origin)?;
    let discount = active_discount(ctx, consumer, at).unwrap_or((consumer - price).abs());
    Some(consumer.max(price) - discount)
}

/// The folded adjustment's discount, if its window contains `at`.
///
/// A percentage applies only when no flat amount is set. A rate whose
/// product with `consumer` overflows yields no discount.
pub fn active_discount(ctx: &Context, consumer: i64, at: Timestamp) -> Option<i64> {
    if !ctx.discount_active_at(at) {
        return None;
    }
    match (known(ctx.discount_rate), known(ctx.discount_price)) {
        (Some(rate), None) => consumer.checked_mul(rate).map(|v| round_down_10(v / 100)),
        (_, Some(flat)) => Some(round_down_10(flat)),
        (None, None) => None,
    }
}
