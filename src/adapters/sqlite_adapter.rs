//! SQLite price store.

use crate::domain::error::DcaError;
use crate::domain::price::{PriceBar, StockInfo};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{paginate, PriceDataPort, SymbolPage};
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn pool_error(e: r2d2::Error) -> DcaError {
    DcaError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> DcaError {
    DcaError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_stored_date(raw: &str) -> Result<NaiveDate, DcaError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| DcaError::Database {
        reason: format!("bad date '{raw}' in store: {e}"),
    })
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn open(path: &str, pool_size: u32) -> Result<Self, DcaError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, DcaError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| DcaError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;
        let pool_size = config.get_int("sqlite", "pool_size", 4).clamp(1, 64) as u32;
        Self::open(&db_path, pool_size)
    }

    /// Single-connection in-memory store; every checkout sees the same db.
    pub fn in_memory() -> Result<Self, DcaError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, DcaError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), DcaError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS stocks (
                    symbol TEXT PRIMARY KEY,
                    company_name TEXT,
                    sector TEXT,
                    market_cap REAL,
                    beta REAL
                );
                CREATE TABLE IF NOT EXISTS daily_prices (
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    adjusted_close REAL,
                    volume INTEGER NOT NULL,
                    PRIMARY KEY (symbol, date)
                );
                CREATE INDEX IF NOT EXISTS idx_daily_prices_date ON daily_prices(date);",
            )
            .map_err(query_error)
    }

    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<(), DcaError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO daily_prices
                    (symbol, date, open, high, low, close, adjusted_close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    bar.symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.adjusted_close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }
        tx.commit().map_err(query_error)
    }

    /// Insert or replace the descriptive row for a symbol. Date range and
    /// bar count are always derived from `daily_prices`.
    pub fn upsert_stock(&self, info: &StockInfo) -> Result<(), DcaError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO stocks (symbol, company_name, sector, market_cap, beta)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    info.symbol,
                    info.company_name,
                    info.sector,
                    info.market_cap,
                    info.beta
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }
}

impl PriceDataPort for SqliteAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, DcaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, open, high, low, close, adjusted_close, volume
                 FROM daily_prices
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let start = start_date.format(DATE_FORMAT).to_string();
        let end = end_date.format(DATE_FORMAT).to_string();
        let rows = stmt
            .query_map(params![symbol, start, end], |row| {
                let date_str: String = row.get(1)?;
                let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(PriceBar {
                    symbol: row.get(0)?,
                    date,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    adjusted_close: row.get(6)?,
                    volume: row.get(7)?,
                })
            })
            .map_err(query_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn list_symbols(&self, limit: usize, offset: usize) -> Result<SymbolPage, DcaError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol FROM stocks
                 UNION
                 SELECT DISTINCT symbol FROM daily_prices
                 ORDER BY symbol",
            )
            .map_err(query_error)?;
        let all = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;
        Ok(paginate(all, limit, offset))
    }

    fn get_stock_info(&self, symbol: &str) -> Result<Option<StockInfo>, DcaError> {
        let conn = self.conn()?;

        let described: Option<(Option<String>, Option<String>, Option<f64>, Option<f64>)> = conn
            .query_row(
                "SELECT company_name, sector, market_cap, beta FROM stocks WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(query_error)?;

        let (min, max, count): (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM daily_prices WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        if described.is_none() && count == 0 {
            return Ok(None);
        }

        let (company_name, sector, market_cap, beta) = described.unwrap_or_default();
        Ok(Some(StockInfo {
            symbol: symbol.to_string(),
            company_name,
            sector,
            market_cap,
            beta,
            first_date: min.as_deref().map(parse_stored_date).transpose()?,
            last_date: max.as_deref().map(parse_stored_date).transpose()?,
            total_days: count.max(0) as usize,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn bar(symbol: &str, day: u32, close: f64) -> PriceBar {
        PriceBar {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            adjusted_close: None,
            volume: 1000,
        }
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_bars(&[bar("MSFT", 2, 370.0), bar("AAPL", 3, 186.0), bar("AAPL", 2, 185.5)])
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(DcaError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_prices_in_date_order() {
        let adapter = seeded();
        let bars = adapter
            .fetch_prices(
                "AAPL",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 185.5);
        assert_eq!(bars[1].close, 186.0);
        assert_eq!(bars[0].adjusted_close, None);
    }

    #[test]
    fn fetch_prices_respects_window() {
        let adapter = seeded();
        let day = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let bars = adapter.fetch_prices("AAPL", day, day).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, day);
    }

    #[test]
    fn adjusted_close_round_trips() {
        let adapter = seeded();
        let mut split = bar("NVDA", 5, 1200.0);
        split.adjusted_close = Some(120.0);
        adapter.insert_bars(&[split]).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let bars = adapter.fetch_prices("NVDA", day, day).unwrap();
        assert_eq!(bars[0].adjusted_close, Some(120.0));
    }

    #[test]
    fn list_symbols_paginates() {
        let adapter = seeded();
        adapter
            .upsert_stock(&StockInfo {
                symbol: "GOOGL".into(),
                company_name: Some("Alphabet".into()),
                sector: None,
                market_cap: None,
                beta: None,
                first_date: None,
                last_date: None,
                total_days: 0,
            })
            .unwrap();
        let page = adapter.list_symbols(2, 0).unwrap();
        assert_eq!(page.symbols, vec!["AAPL", "GOOGL"]);
        assert_eq!(page.total_count, 3);
        let page = adapter.list_symbols(2, 2).unwrap();
        assert_eq!(page.symbols, vec!["MSFT"]);
    }

    #[test]
    fn stock_info_combines_tables() {
        let adapter = seeded();
        adapter
            .upsert_stock(&StockInfo {
                symbol: "AAPL".into(),
                company_name: Some("Apple Inc.".into()),
                sector: Some("Technology".into()),
                market_cap: Some(2.9e12),
                beta: Some(1.25),
                first_date: None,
                last_date: None,
                total_days: 0,
            })
            .unwrap();

        let info = adapter.get_stock_info("AAPL").unwrap().unwrap();
        assert_eq!(info.company_name.as_deref(), Some("Apple Inc."));
        assert_eq!(info.beta, Some(1.25));
        assert_eq!(info.first_date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(info.last_date, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(info.total_days, 2);
    }

    #[test]
    fn stock_info_from_prices_only() {
        let info = seeded().get_stock_info("MSFT").unwrap().unwrap();
        assert_eq!(info.company_name, None);
        assert_eq!(info.total_days, 1);
    }

    #[test]
    fn stock_info_unknown_symbol() {
        assert!(seeded().get_stock_info("ZZZZ").unwrap().is_none());
    }
}
