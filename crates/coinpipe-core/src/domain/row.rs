use serde::Serialize;

use crate::{ListingRecord, UtcDateTime};

/// Canonical flat output record. Field order matches [`crate::COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub slug: String,
    pub cmc_rank: i64,
    pub num_market_pairs: i64,
    pub circulating_supply: f64,
    pub total_supply: f64,
    pub max_supply: Option<f64>,
    pub price_usd: f64,
    pub volume_24h_usd: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
    pub market_cap_usd: f64,
    pub last_updated: UtcDateTime,
    pub retrieved_timestamp: String,
}

impl NormalizedRow {
    pub fn from_record(record: ListingRecord, retrieved_timestamp: &str) -> Self {
        Self {
            id: record.id,
            name: record.name,
            symbol: record.symbol,
            slug: record.slug,
            cmc_rank: record.cmc_rank,
            num_market_pairs: record.num_market_pairs,
            circulating_supply: record.circulating_supply,
            total_supply: record.total_supply,
            max_supply: record.max_supply,
            price_usd: record.quote.price,
            volume_24h_usd: record.quote.volume_24h,
            percent_change_1h: record.quote.percent_change_1h,
            percent_change_24h: record.quote.percent_change_24h,
            percent_change_7d: record.quote.percent_change_7d,
            market_cap_usd: record.quote.market_cap,
            last_updated: record.last_updated,
            retrieved_timestamp: retrieved_timestamp.to_owned(),
        }
    }
}

/// Ordered rows produced by one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    rows: Vec<NormalizedRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<NormalizedRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Retrieval instant of the first row; every row of a run carries the same value.
    pub fn retrieved_timestamp(&self) -> Option<&str> {
        self.rows
            .first()
            .map(|row| row.retrieved_timestamp.as_str())
    }

    pub fn into_rows(self) -> Vec<NormalizedRow> {
        self.rows
    }
}
