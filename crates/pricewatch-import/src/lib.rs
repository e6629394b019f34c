//! Pricewatch import: the ingestion boundary.
//!
//! Everything that can be malformed is rejected here. Records that leave
//! this crate are well-formed, so the replay core never validates.
//!
//! - [`export`]: fail-fast CSV export reader
//! - [`layout`]: per-export column layouts ([`layout::RowLayout`])
//! - [`timestamp`]: upstream timestamp formats
//! - [`cache`]: versioned bincode cache of grouped streams

pub mod cache;
pub mod csv_line;
pub mod error;
pub mod export;
pub mod layout;
pub mod timestamp;

pub use error::ImportError;
