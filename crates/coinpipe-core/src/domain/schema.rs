use serde::Serialize;

/// Semantic type of an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Timestamp,
}

impl ColumnType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
        }
    }
}

/// One declared output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    const fn required(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: false,
        }
    }

    const fn nullable(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: true,
        }
    }
}

pub const COLUMN_COUNT: usize = 17;

/// Canonical column list; fixes CSV column order.
pub const COLUMNS: [Column; COLUMN_COUNT] = [
    Column::required("id", ColumnType::Integer),
    Column::required("name", ColumnType::Text),
    Column::required("symbol", ColumnType::Text),
    Column::required("slug", ColumnType::Text),
    Column::required("cmc_rank", ColumnType::Integer),
    Column::required("num_market_pairs", ColumnType::Integer),
    Column::required("circulating_supply", ColumnType::Float),
    Column::required("total_supply", ColumnType::Float),
    Column::nullable("max_supply", ColumnType::Float),
    Column::required("price_usd", ColumnType::Float),
    Column::required("volume_24h_usd", ColumnType::Float),
    Column::required("percent_change_1h", ColumnType::Float),
    Column::required("percent_change_24h", ColumnType::Float),
    Column::required("percent_change_7d", ColumnType::Float),
    Column::required("market_cap_usd", ColumnType::Float),
    Column::required("last_updated", ColumnType::Timestamp),
    Column::required("retrieved_timestamp", ColumnType::Text),
];

/// Column names in declared order.
pub fn column_names() -> [&'static str; COLUMN_COUNT] {
    COLUMNS.map(|column| column.name)
}
