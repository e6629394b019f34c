//! Pricewatch core: deterministic temporal replay of pricing streams.
//!
//! # Pipeline
//!
//! ```text
//! grouped streams → per-goods deal queue → fold + replay → policy → Revisions
//! ```
//!
//! Four independent change streams (deal, option, platform consumer price,
//! adjustment) are folded into one [`context::Context`] per goods. Every deal
//! record is an observation point: the other streams are replayed up to its
//! timestamp and the recorded displayed price is checked against a
//! [`policy::PricingPolicy`]. Mismatches become [`revision::Revision`]s.
//!
//! Nothing in this crate performs IO. Parsing lives in `pricewatch-import`,
//! artifacts in `pricewatch-audit`.

pub mod context;
pub mod dataset;
pub mod delta;
pub mod event;
pub mod order_audit;
pub mod policy;
pub mod reducer;
pub mod replay;
pub mod revision;
