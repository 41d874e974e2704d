//! CSV serialization of a [`ResultTable`] and upload of the artifact.
//!
//! The CSV layout is the schema's column order with a header line, no index
//! column, `\n` record terminators, and minimal quoting. Missing values
//! (only `max_supply` can be missing) are empty fields. Parsing the output
//! with [`ResultTable::from_csv`] and serializing again yields identical text.

use tracing::info;

use crate::storage::{ObjectLocation, ObjectStore, CSV_CONTENT_TYPE};
use crate::{
    column_names, ExportError, NormalizedRow, PipelineError, ResultTable, UtcDateTime,
    COLUMN_COUNT,
};

/// Serialize the table to CSV text.
pub fn to_csv(table: &ResultTable) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(column_names())?;

    for row in table.rows() {
        writer.write_record(row_fields(row))?;
    }

    let data = writer
        .into_inner()
        .map_err(|error| ExportError::Flush(error.to_string()))?;
    Ok(String::from_utf8(data)?)
}

/// Render a float the way the artifact stores it: whole values keep a trailing
/// `.0`, everything else uses the shortest representation that round-trips.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn row_fields(row: &NormalizedRow) -> [String; COLUMN_COUNT] {
    [
        row.id.to_string(),
        row.name.clone(),
        row.symbol.clone(),
        row.slug.clone(),
        row.cmc_rank.to_string(),
        row.num_market_pairs.to_string(),
        format_float(row.circulating_supply),
        format_float(row.total_supply),
        row.max_supply.map(format_float).unwrap_or_default(),
        format_float(row.price_usd),
        format_float(row.volume_24h_usd),
        format_float(row.percent_change_1h),
        format_float(row.percent_change_24h),
        format_float(row.percent_change_7d),
        format_float(row.market_cap_usd),
        row.last_updated.format_rfc3339(),
        row.retrieved_timestamp.clone(),
    ]
}

impl ResultTable {
    pub fn to_csv(&self) -> Result<String, ExportError> {
        to_csv(self)
    }

    /// Parse CSV produced by [`to_csv`], validating the header against the schema.
    pub fn from_csv(text: &str) -> Result<Self, ExportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let expected = column_names();
        let headers = reader.headers()?;
        if headers.iter().ne(expected.iter().copied()) {
            return Err(ExportError::HeaderMismatch {
                expected: expected.join(","),
                found: headers.iter().collect::<Vec<_>>().join(","),
            });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |position| position.line());
            rows.push(parse_row(&record, line)?);
        }

        Ok(Self::new(rows))
    }
}

/// Free-function alias for [`ResultTable::from_csv`].
pub fn parse_csv(text: &str) -> Result<ResultTable, ExportError> {
    ResultTable::from_csv(text)
}

fn parse_row(record: &csv::StringRecord, line: u64) -> Result<NormalizedRow, ExportError> {
    if record.len() != COLUMN_COUNT {
        return Err(ExportError::FieldCount {
            line,
            found: record.len(),
            expected: COLUMN_COUNT,
        });
    }

    let cells = Cells { record, line };
    Ok(NormalizedRow {
        id: cells.integer(0, "id")?,
        name: cells.text(1),
        symbol: cells.text(2),
        slug: cells.text(3),
        cmc_rank: cells.integer(4, "cmc_rank")?,
        num_market_pairs: cells.integer(5, "num_market_pairs")?,
        circulating_supply: cells.float(6, "circulating_supply")?,
        total_supply: cells.float(7, "total_supply")?,
        max_supply: cells.optional_float(8, "max_supply")?,
        price_usd: cells.float(9, "price_usd")?,
        volume_24h_usd: cells.float(10, "volume_24h_usd")?,
        percent_change_1h: cells.float(11, "percent_change_1h")?,
        percent_change_24h: cells.float(12, "percent_change_24h")?,
        percent_change_7d: cells.float(13, "percent_change_7d")?,
        market_cap_usd: cells.float(14, "market_cap_usd")?,
        last_updated: cells.timestamp(15, "last_updated")?,
        retrieved_timestamp: cells.text(16),
    })
}

struct Cells<'a> {
    record: &'a csv::StringRecord,
    line: u64,
}

impl Cells<'_> {
    fn raw(&self, index: usize) -> &str {
        self.record.get(index).unwrap_or_default()
    }

    fn text(&self, index: usize) -> String {
        self.raw(index).to_owned()
    }

    fn integer(&self, index: usize, column: &'static str) -> Result<i64, ExportError> {
        self.raw(index)
            .parse::<i64>()
            .map_err(|error| self.invalid(column, error.to_string()))
    }

    fn float(&self, index: usize, column: &'static str) -> Result<f64, ExportError> {
        match self.raw(index) {
            "" => Err(self.invalid(column, String::from("required value is empty"))),
            raw => raw
                .parse::<f64>()
                .map_err(|error| self.invalid(column, error.to_string())),
        }
    }

    fn optional_float(&self, index: usize, column: &'static str) -> Result<Option<f64>, ExportError> {
        match self.raw(index) {
            "" => Ok(None),
            _ => self.float(index, column).map(Some),
        }
    }

    fn timestamp(&self, index: usize, column: &'static str) -> Result<UtcDateTime, ExportError> {
        UtcDateTime::parse(self.raw(index)).map_err(|error| self.invalid(column, error.to_string()))
    }

    fn invalid(&self, column: &'static str, message: String) -> ExportError {
        ExportError::InvalidValue {
            line: self.line,
            column,
            message,
        }
    }
}

/// Serialize `table` and store it at `location` with a single write.
///
/// Returns the number of bytes uploaded.
pub async fn upload_table(
    store: &dyn ObjectStore,
    location: &ObjectLocation,
    table: &ResultTable,
) -> Result<usize, PipelineError> {
    let body = to_csv(table)?.into_bytes();
    let bytes = body.len();

    store.put(location, body, CSV_CONTENT_TYPE).await?;

    info!(
        bucket = %location.bucket,
        key = %location.key,
        rows = table.len(),
        bytes,
        "CSV uploaded to {location}"
    );
    Ok(bytes)
}
