//! Event schema -- the four upstream change streams that feed a goods Context.
//!
//! # Stream kinds
//!
//! | Kind | Source table | Context fields owned |
//! |------|--------------|----------------------|
//! | [`StreamKind::Deal`] | deal | `thumbnail_price` |
//! | [`StreamKind::Option`] | goods option | `consumer_origin`, `price_origin`, `total_additional_price` |
//! | [`StreamKind::Consumer`] | platform consumer price | `platform_consumer`, `platform_total_additional_price` |
//! | [`StreamKind::Adjustment`] | consumer price adjustment | discount type/rate/price and validity window |
//!
//! Every record carries the goods key, an [`Operation`] tag and the moment
//! the change took effect upstream (`occurred_at`). Streams are ordered by
//! `occurred_at` independently of one another; there is no global sequence
//! number across streams.
//!
//! # Sentinels
//!
//! Numeric fields that an upstream row leaves blank are carried as
//! `Option<i64>` on the event and folded into the Context as [`MISSING`].
//! Blank timestamps parse to [`epoch`] upstream of this crate.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer identifier of a priced goods item.
pub type EntityKey = i64;

/// Point in time on the upstream wall clock.
pub type Timestamp = NaiveDateTime;

/// Entity key of a Context that has been invalidated by a delete.
pub const INVALID_ENTITY_KEY: EntityKey = -1;

/// Value of a Context price field that no event has supplied yet.
pub const MISSING: i64 = -1;

/// `1970-01-01 00:00:00`, the value of a blank timestamp column.
pub fn epoch() -> Timestamp {
    NaiveDateTime::default()
}

/// `9999-12-31 23:59:59`, the open end of a discount window.
pub fn far_future() -> Timestamp {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .unwrap_or(NaiveDateTime::MAX)
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Change-data-capture operation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Create and Update both overwrite the fields a stream owns.
    pub fn is_upsert(self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "c"),
            Operation::Update => write!(f, "u"),
            Operation::Delete => write!(f, "d"),
        }
    }
}

impl FromStr for Operation {
    type Err = OperationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "create" => Ok(Operation::Create),
            "u" | "update" => Ok(Operation::Update),
            "d" | "delete" => Ok(Operation::Delete),
            _ => Err(OperationParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown operation tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationParseError(pub String);

impl fmt::Display for OperationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid operation: {:?} (expected c, u, or d)", self.0)
    }
}

impl std::error::Error for OperationParseError {}

// ---------------------------------------------------------------------------
// Stream kind
// ---------------------------------------------------------------------------

/// The four change streams that contribute to a Context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamKind {
    Deal,
    Option,
    Consumer,
    Adjustment,
}

impl StreamKind {
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Deal,
        StreamKind::Option,
        StreamKind::Consumer,
        StreamKind::Adjustment,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Deal => "deal",
            StreamKind::Option => "option",
            StreamKind::Consumer => "consumer",
            StreamKind::Adjustment => "adjustment",
        }
    }

    pub(crate) fn bit(self) -> u8 {
        match self {
            StreamKind::Deal => 1,
            StreamKind::Option => 1 << 1,
            StreamKind::Consumer => 1 << 2,
            StreamKind::Adjustment => 1 << 3,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StreamKind {
    type Err = StreamKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StreamKindParseError(s.to_string()))
    }
}

/// Error returned when parsing an unknown stream kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamKindParseError(pub String);

impl fmt::Display for StreamKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid stream kind: {:?} (expected deal, option, consumer, or adjustment)",
            self.0
        )
    }
}

impl std::error::Error for StreamKindParseError {}

// ---------------------------------------------------------------------------
// Common event shape
// ---------------------------------------------------------------------------

/// Accessors shared by every stream's record type.
pub trait StreamEvent {
    /// Which stream this record belongs to.
    const KIND: StreamKind;

    fn entity_key(&self) -> EntityKey;
    fn operation(&self) -> Operation;
    fn occurred_at(&self) -> Timestamp;

    /// Whether folding this record keeps its stream live.
    ///
    /// Defaults to "operation is Create or Update". Deals additionally
    /// require `is_enabled`.
    fn is_live(&self) -> bool {
        self.operation().is_upsert()
    }
}

// ---------------------------------------------------------------------------
// Deal
// ---------------------------------------------------------------------------

/// A deal change. Each deal record is also an observation point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealEvent {
    pub entity_key: EntityKey,
    pub operation: Operation,
    pub occurred_at: Timestamp,
    pub deal_sno: i64,
    pub policy_sno: i64,
    /// Displayed price recorded on the deal row.
    pub thumbnail_price: i64,
    pub is_enabled: bool,
    pub priority: i64,
    pub app_type: i64,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub deleted: bool,
}

impl DealEvent {
    /// An enabled deal with zeroed identifiers and an open validity window.
    pub fn new(
        entity_key: EntityKey,
        operation: Operation,
        occurred_at: Timestamp,
        thumbnail_price: i64,
    ) -> Self {
        DealEvent {
            entity_key,
            operation,
            occurred_at,
            deal_sno: 0,
            policy_sno: 0,
            thumbnail_price,
            is_enabled: true,
            priority: 0,
            app_type: 0,
            started_at: epoch(),
            ended_at: far_future(),
            deleted: false,
        }
    }
}

impl StreamEvent for DealEvent {
    const KIND: StreamKind = StreamKind::Deal;

    fn entity_key(&self) -> EntityKey {
        self.entity_key
    }

    fn operation(&self) -> Operation {
        self.operation
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    fn is_live(&self) -> bool {
        self.is_enabled && self.operation.is_upsert()
    }
}

// ---------------------------------------------------------------------------
// Option
// ---------------------------------------------------------------------------

/// A goods option price change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEvent {
    pub entity_key: EntityKey,
    pub operation: Operation,
    pub occurred_at: Timestamp,
    pub market_sno: i64,
    pub option_sno: i64,
    pub consumer_origin: i64,
    pub price_origin: i64,
    pub total_additional_price: i64,
}

impl OptionEvent {
    pub fn new(
        entity_key: EntityKey,
        operation: Operation,
        occurred_at: Timestamp,
        consumer_origin: i64,
        price_origin: i64,
    ) -> Self {
        OptionEvent {
            entity_key,
            operation,
            occurred_at,
            market_sno: 0,
            option_sno: 0,
            consumer_origin,
            price_origin,
            total_additional_price: 0,
        }
    }
}

impl StreamEvent for OptionEvent {
    const KIND: StreamKind = StreamKind::Option;

    fn entity_key(&self) -> EntityKey {
        self.entity_key
    }

    fn operation(&self) -> Operation {
        self.operation
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }
}

// ---------------------------------------------------------------------------
// Platform consumer price
// ---------------------------------------------------------------------------

/// A platform consumer price change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerEvent {
    pub entity_key: EntityKey,
    pub operation: Operation,
    pub occurred_at: Timestamp,
    pub market_sno: i64,
    pub consumer_origin: i64,
    pub total_additional_price: i64,
}

impl ConsumerEvent {
    pub fn new(
        entity_key: EntityKey,
        operation: Operation,
        occurred_at: Timestamp,
        consumer_origin: i64,
    ) -> Self {
        ConsumerEvent {
            entity_key,
            operation,
            occurred_at,
            market_sno: 0,
            consumer_origin,
            total_additional_price: 0,
        }
    }
}

impl StreamEvent for ConsumerEvent {
    const KIND: StreamKind = StreamKind::Consumer;

    fn entity_key(&self) -> EntityKey {
        self.entity_key
    }

    fn operation(&self) -> Operation {
        self.operation
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }
}

// ---------------------------------------------------------------------------
// Consumer price adjustment
// ---------------------------------------------------------------------------

/// A discount adjustment change.
///
/// `discount_rate` is a percentage. Either discount field may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentEvent {
    pub entity_key: EntityKey,
    pub operation: Operation,
    pub occurred_at: Timestamp,
    pub market_sno: i64,
    pub discount_type: i64,
    #[serde(default)]
    pub discount_rate: Option<i64>,
    #[serde(default)]
    pub discount_price: Option<i64>,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
}

impl AdjustmentEvent {
    /// A flat-price adjustment valid over `[started_at, ended_at]`.
    pub fn flat(
        entity_key: EntityKey,
        operation: Operation,
        occurred_at: Timestamp,
        discount_price: i64,
        started_at: Timestamp,
        ended_at: Timestamp,
    ) -> Self {
        AdjustmentEvent {
            entity_key,
            operation,
            occurred_at,
            market_sno: 0,
            discount_type: 0,
            discount_rate: None,
            discount_price: Some(discount_price),
            started_at,
            ended_at,
        }
    }
}

impl StreamEvent for AdjustmentEvent {
    const KIND: StreamKind = StreamKind::Adjustment;

    fn entity_key(&self) -> EntityKey {
        self.entity_key
    }

    fn operation(&self) -> Operation {
        self.operation
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }
}
