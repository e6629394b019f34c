//! Fold reducer -- the transition rules from one event to the next Context.
//!
//! # Overview
//!
//! `fold` is a pure function `(Context, Event) -> Context`. Every stream
//! kind implements [`Fold`], which names the Context fields that stream
//! owns. The reducer adds the operation semantics on top:
//!
//! - **Create / Update** (and, for deals, `is_enabled`): overwrite every
//!   owned field with the event's payload. Later events fully replace prior
//!   values; nothing is merged.
//! - **Delete** (or a disabled deal): latch the stream and invalidate the
//!   whole Context. Owned fields are left untouched.
//!
//! Whether a later Create/Update brings a latched Context back to life is
//! decided by [`Revalidation`].
//!
//! # Purity contract
//!
//! - No IO.
//! - No wall clock reads.
//! - Same inputs always produce the same output.
//!
//! [`fold_in_place`] applies the same transition without cloning and is
//! what the replay engine uses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::context::Context;
use crate::event::{AdjustmentEvent, ConsumerEvent, DealEvent, OptionEvent, StreamEvent, MISSING};

// ---------------------------------------------------------------------------
// Revalidation mode
// ---------------------------------------------------------------------------

/// How an invalidated Context becomes valid again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Revalidation {
    /// A Create/Update on any stream clears every latch.
    AnyStream,
    /// A Create/Update on a stream clears only that stream's latch. The
    /// Context is valid once no stream is latched.
    #[default]
    OriginatingStream,
    /// The first delete invalidates the goods for the rest of the run.
    Permanent,
}

impl Revalidation {
    pub const ALL: [Revalidation; 3] = [
        Revalidation::AnyStream,
        Revalidation::OriginatingStream,
        Revalidation::Permanent,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Revalidation::AnyStream => "any-stream",
            Revalidation::OriginatingStream => "originating-stream",
            Revalidation::Permanent => "permanent",
        }
    }
}

impl fmt::Display for Revalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Revalidation {
    type Err = RevalidationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Revalidation::ALL
            .into_iter()
            .find(|r| r.name() == s.trim())
            .ok_or_else(|| RevalidationParseError(s.to_string()))
    }
}

/// Error returned when parsing an unknown revalidation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidationParseError(pub String);

impl fmt::Display for RevalidationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid revalidation mode: {:?} (expected any-stream, originating-stream, or permanent)",
            self.0
        )
    }
}

impl std::error::Error for RevalidationParseError {}

// ---------------------------------------------------------------------------
// Per-stream field ownership
// ---------------------------------------------------------------------------

/// A stream record that can be folded into a [`Context`].
pub trait Fold: StreamEvent {
    /// Overwrite every Context field this stream owns.
    fn overwrite(&self, ctx: &mut Context);
}

impl Fold for DealEvent {
    fn overwrite(&self, ctx: &mut Context) {
        ctx.thumbnail_price = self.thumbnail_price;
    }
}

impl Fold for OptionEvent {
    fn overwrite(&self, ctx: &mut Context) {
        ctx.consumer_origin = self.consumer_origin;
        ctx.price_origin = self.price_origin;
        ctx.total_additional_price = self.total_additional_price;
    }
}

impl Fold for ConsumerEvent {
    fn overwrite(&self, ctx: &mut Context) {
        ctx.platform_consumer = self.consumer_origin;
        ctx.platform_total_additional_price = self.total_additional_price;
    }
}

impl Fold for AdjustmentEvent {
    fn overwrite(&self, ctx: &mut Context) {
        ctx.discount_type = self.discount_type;
        ctx.discount_rate = self.discount_rate.unwrap_or(MISSING);
        ctx.discount_price = self.discount_price.unwrap_or(MISSING);
        ctx.discount_started_at = self.started_at;
        ctx.discount_ended_at = self.ended_at;
    }
}

// ---------------------------------------------------------------------------
// Fold
// ---------------------------------------------------------------------------

/// Pure fold: `(Context, Event) -> Context`.
pub fn fold<E: Fold>(ctx: &Context, event: &E, mode: Revalidation) -> Context {
    let mut next = ctx.clone();
    fold_in_place(&mut next, event, mode);
    next
}

/// In-place fold used by the replay engine.
pub fn fold_in_place<E: Fold>(ctx: &mut Context, event: &E, mode: Revalidation) {
    ctx.touch(event.occurred_at());

    if !event.is_live() {
        ctx.latch(E::KIND);
        return;
    }

    event.overwrite(ctx);
    match mode {
        Revalidation::AnyStream => ctx.latched.clear(),
        Revalidation::OriginatingStream => ctx.latched.remove(E::KIND),
        Revalidation::Permanent => {}
    }
    ctx.sync_validity();
}
