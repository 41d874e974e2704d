use tracing::{debug, warn};

use crate::{ListingRecord, NormalizedRow, RawListing, ResultTable, SchemaError, UtcDateTime};

/// Map raw listings to canonical rows, one per input and in input order.
///
/// Every row carries the same `retrieved_timestamp`, taken from `retrieved_at`.
/// The first listing that fails to decode aborts the whole batch; no partial
/// table is ever returned.
pub fn normalize(
    raw_listings: &[RawListing],
    retrieved_at: UtcDateTime,
) -> Result<ResultTable, SchemaError> {
    let retrieved_timestamp = retrieved_at.format_rfc3339();
    let mut rows = Vec::with_capacity(raw_listings.len());

    for (index, raw) in raw_listings.iter().enumerate() {
        let record = ListingRecord::decode(raw).map_err(|source| {
            let error = SchemaError::new(index, ListingRecord::peek_id(raw), source);
            warn!(index, field = ?error.decode_error().field(), "listing failed to decode");
            error
        })?;
        rows.push(NormalizedRow::from_record(record, &retrieved_timestamp));
    }

    debug!(rows = rows.len(), %retrieved_timestamp, "normalized listings");
    Ok(ResultTable::new(rows))
}
