use ::duckdb::Connection;

pub const STAGING_TABLE: &str = "crypto_prices_staging";

struct Migration {
    version: &'static str,
    sql: &'static str,
}

// Column order and types follow the listing schema; `loaded_at` records the load time.
const MIGRATIONS: &[Migration] = &[Migration {
    version: "0001_crypto_prices_staging",
    sql: r#"
CREATE TABLE IF NOT EXISTS crypto_prices_staging (
    id BIGINT NOT NULL,
    name TEXT NOT NULL,
    symbol TEXT NOT NULL,
    slug TEXT NOT NULL,
    cmc_rank BIGINT NOT NULL,
    num_market_pairs BIGINT NOT NULL,
    circulating_supply DOUBLE NOT NULL,
    total_supply DOUBLE NOT NULL,
    max_supply DOUBLE,
    price_usd DOUBLE NOT NULL,
    volume_24h_usd DOUBLE NOT NULL,
    percent_change_1h DOUBLE NOT NULL,
    percent_change_24h DOUBLE NOT NULL,
    percent_change_7d DOUBLE NOT NULL,
    market_cap_usd DOUBLE NOT NULL,
    last_updated TIMESTAMP NOT NULL,
    retrieved_timestamp TEXT NOT NULL,
    loaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
}];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}
