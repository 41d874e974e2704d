//! # Domain Models
//!
//! Canonical types for the listings pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RawListing`] | Untyped element of the API `data` array |
//! | [`ListingRecord`] | Typed decode of a raw listing |
//! | [`NormalizedRow`] | Flat output record |
//! | [`ResultTable`] | Ordered rows of one run |
//! | [`COLUMNS`] | Declared output schema |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Decoding is explicit: required fields that are absent, null, or not
//! coercible to their declared type fail with the dotted field path
//! (for example `quote.USD.price`). Only `max_supply` is optional.

mod listing;
mod row;
mod schema;
mod timestamp;

pub use listing::{
    coerce_float, coerce_integer, coerce_text, ListingRecord, RawListing, UsdQuote,
    QUOTE_CURRENCY,
};
pub use row::{NormalizedRow, ResultTable};
pub use schema::{column_names, Column, ColumnType, COLUMNS, COLUMN_COUNT};
pub use timestamp::UtcDateTime;
