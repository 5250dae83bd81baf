//! SQLite store adapter.
//!
//! Markets, positions, and trades live in three tables. Every multi-row
//! write runs inside a `BEGIN IMMEDIATE` transaction so concurrent writers
//! serialize on the database lock instead of interleaving.

use crate::domain::error::PolydashError;
use crate::domain::execution::weighted_entry_price;
use crate::domain::market::Market;
use crate::domain::position::{Position, PositionStatus, Side};
use crate::domain::settings::Settings;
use crate::domain::trade::{Fill, Trade};
use crate::ports::store_port::StorePort;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS markets (
    id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    end_date TEXT,
    category TEXT,
    volume REAL NOT NULL DEFAULT 0,
    liquidity REAL NOT NULL DEFAULT 0,
    yes_price REAL NOT NULL CHECK (yes_price BETWEEN 0 AND 1),
    no_price REAL NOT NULL CHECK (no_price BETWEEN 0 AND 1),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    market_id TEXT NOT NULL REFERENCES markets(id),
    side TEXT NOT NULL CHECK (side IN ('yes', 'no')),
    size REAL NOT NULL CHECK (size > 0),
    entry_price REAL NOT NULL,
    current_price REAL,
    pnl REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    market_id TEXT NOT NULL REFERENCES markets(id),
    side TEXT NOT NULL CHECK (side IN ('yes', 'no')),
    size REAL NOT NULL,
    price REAL NOT NULL,
    fee REAL NOT NULL DEFAULT 0,
    order_id TEXT,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_positions_market ON positions(market_id, side, status);
CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades(timestamp);
";

const MARKET_SELECT: &str = "SELECT id, question, end_date, category, volume, liquidity,
    yes_price, no_price, created_at, updated_at FROM markets";

const POSITION_SELECT: &str = "SELECT p.id, p.market_id, p.side, p.size, p.entry_price,
    p.current_price, p.pnl, p.status, p.created_at, p.updated_at, m.question, m.category
    FROM positions p LEFT JOIN markets m ON m.id = p.market_id";

const TRADE_SELECT: &str = "SELECT t.id, t.market_id, t.side, t.size, t.price, t.fee,
    t.timestamp, m.question, m.category
    FROM trades t LEFT JOIN markets m ON m.id = t.market_id";

const MEMORY_PATH: &str = ":memory:";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_settings(settings: &Settings) -> Result<Self, PolydashError> {
        Self::open(&settings.database_path, settings.pool_size)
    }

    /// Opens a file-backed pool. `:memory:` yields the single-connection
    /// in-memory store, since each pooled connection would otherwise see its
    /// own empty database.
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, PolydashError> {
        let path = path.as_ref();
        if path == Path::new(MEMORY_PATH) {
            return Self::in_memory();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(configure_connection);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory store. The connection is never recycled,
    /// so the database lives as long as the adapter.
    pub fn in_memory() -> Result<Self, PolydashError> {
        let manager = SqliteConnectionManager::memory().with_init(configure_connection);
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PolydashError> {
        self.pool.get().map_err(pool_error)
    }
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
}

fn pool_error(e: r2d2::Error) -> PolydashError {
    PolydashError::Store {
        reason: format!("connection pool: {e}"),
    }
}

fn query_error(e: rusqlite::Error) -> PolydashError {
    PolydashError::Store {
        reason: e.to_string(),
    }
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_side(row: &Row<'_>, idx: usize) -> rusqlite::Result<Side> {
    let raw: String = row.get(idx)?;
    Side::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn market_from_row(row: &Row<'_>) -> rusqlite::Result<Market> {
    Ok(Market {
        id: row.get(0)?,
        question: row.get(1)?,
        end_date: row.get(2)?,
        category: row.get(3)?,
        volume: row.get(4)?,
        liquidity: row.get(5)?,
        yes_price: row.get(6)?,
        no_price: row.get(7)?,
        created_at: Some(parse_timestamp(row, 8)?),
        updated_at: Some(parse_timestamp(row, 9)?),
    })
}

fn position_from_row(row: &Row<'_>) -> rusqlite::Result<Position> {
    let status: String = row.get(7)?;
    Ok(Position {
        id: row.get(0)?,
        market_id: row.get(1)?,
        side: parse_side(row, 2)?,
        size: row.get(3)?,
        entry_price: row.get(4)?,
        current_price: row.get(5)?,
        pnl: row.get(6)?,
        status: PositionStatus::from_str(&status).map_err(|e| conversion_error(7, e))?,
        created_at: parse_timestamp(row, 8)?,
        updated_at: parse_timestamp(row, 9)?,
        question: row.get(10)?,
        category: row.get(11)?,
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        market_id: row.get(1)?,
        side: parse_side(row, 2)?,
        size: row.get(3)?,
        price: row.get(4)?,
        fee: row.get(5)?,
        timestamp: parse_timestamp(row, 6)?,
        question: row.get(7)?,
        category: row.get(8)?,
    })
}

fn load_position(conn: &Connection, id: i64) -> Result<Option<Position>, PolydashError> {
    conn.query_row(
        &format!("{POSITION_SELECT} WHERE p.id = ?1"),
        params![id],
        position_from_row,
    )
    .optional()
    .map_err(query_error)
}

fn position_not_found(id: i64) -> PolydashError {
    PolydashError::NotFound {
        entity: "position",
        id: id.to_string(),
    }
}

/// Side, size, entry price, and status of one position.
fn position_terms(
    conn: &Connection,
    id: i64,
) -> Result<(Side, f64, f64, PositionStatus), PolydashError> {
    let row = conn
        .query_row(
            "SELECT side, size, entry_price, status FROM positions WHERE id = ?1",
            params![id],
            |row| {
                let status: String = row.get(3)?;
                Ok((
                    parse_side(row, 0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    PositionStatus::from_str(&status).map_err(|e| conversion_error(3, e))?,
                ))
            },
        )
        .optional()
        .map_err(query_error)?;
    row.ok_or_else(|| position_not_found(id))
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl StorePort for SqliteAdapter {
    fn initialize_schema(&self) -> Result<(), PolydashError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_error)
    }

    fn insert_market_if_absent(&self, market: &Market) -> Result<bool, PolydashError> {
        let now = timestamp(Utc::now());
        let created = market.created_at.map(timestamp).unwrap_or_else(|| now.clone());
        let changed = self
            .conn()?
            .execute(
                "INSERT INTO markets (id, question, end_date, category, volume, liquidity,
                    yes_price, no_price, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    market.id,
                    market.question,
                    market.end_date,
                    market.category,
                    market.volume,
                    market.liquidity,
                    market.yes_price,
                    market.no_price,
                    created,
                    now
                ],
            )
            .map_err(query_error)?;
        Ok(changed > 0)
    }

    fn upsert_market(&self, market: &Market) -> Result<(), PolydashError> {
        let now = timestamp(Utc::now());
        let created = market.created_at.map(timestamp).unwrap_or_else(|| now.clone());
        self.conn()?
            .execute(
                "INSERT INTO markets (id, question, end_date, category, volume, liquidity,
                    yes_price, no_price, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    question = excluded.question,
                    end_date = excluded.end_date,
                    category = excluded.category,
                    volume = excluded.volume,
                    liquidity = excluded.liquidity,
                    yes_price = excluded.yes_price,
                    no_price = excluded.no_price,
                    updated_at = excluded.updated_at",
                params![
                    market.id,
                    market.question,
                    market.end_date,
                    market.category,
                    market.volume,
                    market.liquidity,
                    market.yes_price,
                    market.no_price,
                    created,
                    now
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn list_markets(&self, limit: usize) -> Result<Vec<Market>, PolydashError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("{MARKET_SELECT} ORDER BY volume DESC, id ASC LIMIT ?1"))
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![limit_param(limit)], market_from_row)
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn get_market(&self, market_id: &str) -> Result<Option<Market>, PolydashError> {
        self.conn()?
            .query_row(
                &format!("{MARKET_SELECT} WHERE id = ?1"),
                params![market_id],
                market_from_row,
            )
            .optional()
            .map_err(query_error)
    }

    fn list_positions(
        &self,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>, PolydashError> {
        let conn = self.conn()?;
        let order = "ORDER BY p.created_at DESC, p.id DESC";
        let positions = match status {
            Some(status) => {
                let mut stmt = conn
                    .prepare(&format!("{POSITION_SELECT} WHERE p.status = ?1 {order}"))
                    .map_err(query_error)?;
                let rows = stmt
                    .query_map(params![status.as_str()], position_from_row)
                    .map_err(query_error)?;
                rows.collect::<Result<Vec<_>, _>>()
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!("{POSITION_SELECT} {order}"))
                    .map_err(query_error)?;
                let rows = stmt.query_map([], position_from_row).map_err(query_error)?;
                rows.collect::<Result<Vec<_>, _>>()
            }
        };
        positions.map_err(query_error)
    }

    fn get_position(&self, id: i64) -> Result<Option<Position>, PolydashError> {
        let conn = self.conn()?;
        load_position(&conn, id)
    }

    fn reprice_positions(&self, market_id: &str, yes_price: f64) -> Result<usize, PolydashError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error)?;

        let open: Vec<(i64, Side, f64, f64)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, side, size, entry_price FROM positions
                     WHERE market_id = ?1 AND status = 'open'",
                )
                .map_err(query_error)?;
            let rows = stmt
                .query_map(params![market_id], |row| {
                    Ok((row.get(0)?, parse_side(row, 1)?, row.get(2)?, row.get(3)?))
                })
                .map_err(query_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(query_error)?
        };

        let now = timestamp(Utc::now());
        for (id, side, size, entry) in &open {
            tx.execute(
                "UPDATE positions SET current_price = ?1, pnl = ?2, updated_at = ?3 WHERE id = ?4",
                params![yes_price, side.profit_loss(*entry, yes_price, *size), now, id],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(open.len())
    }

    fn close_position(&self, id: i64, exit_price: f64) -> Result<Position, PolydashError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error)?;

        let (side, size, entry, status) = position_terms(&tx, id)?;
        if status == PositionStatus::Closed {
            return Err(PolydashError::PositionClosed { id });
        }
        tx.execute(
            "UPDATE positions SET status = 'closed', current_price = ?1, pnl = ?2, updated_at = ?3
             WHERE id = ?4 AND status = 'open'",
            params![
                exit_price,
                side.profit_loss(entry, exit_price, size),
                timestamp(Utc::now()),
                id
            ],
        )
        .map_err(query_error)?;

        let closed = load_position(&tx, id)?.ok_or_else(|| position_not_found(id))?;
        tx.commit().map_err(query_error)?;
        Ok(closed)
    }

    fn record_fill(&self, fill: &Fill) -> Result<(Trade, Position), PolydashError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_error)?;

        let (question, category): (String, Option<String>) = tx
            .query_row(
                "SELECT question, category FROM markets WHERE id = ?1",
                params![fill.market_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(query_error)?
            .ok_or_else(|| PolydashError::market_not_found(&fill.market_id))?;

        let executed_at = Utc::now();
        let now = timestamp(executed_at);

        tx.execute(
            "INSERT INTO trades (market_id, side, size, price, fee, order_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                fill.market_id,
                fill.side.as_str(),
                fill.size,
                fill.price,
                fill.fee,
                fill.order_id,
                now
            ],
        )
        .map_err(query_error)?;
        let trade_id = tx.last_insert_rowid();

        let held: Option<(i64, f64, f64)> = tx
            .query_row(
                "SELECT id, size, entry_price FROM positions
                 WHERE market_id = ?1 AND side = ?2 AND status = 'open'
                 ORDER BY id ASC LIMIT 1",
                params![fill.market_id, fill.side.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(query_error)?;

        let position_id = match held {
            Some((id, held_size, held_entry)) => {
                let size = held_size + fill.size;
                let entry = weighted_entry_price(held_size, held_entry, fill.size, fill.price);
                tx.execute(
                    "UPDATE positions SET size = ?1, entry_price = ?2, current_price = ?3,
                        pnl = ?4, updated_at = ?5 WHERE id = ?6",
                    params![
                        size,
                        entry,
                        fill.price,
                        fill.side.profit_loss(entry, fill.price, size),
                        now,
                        id
                    ],
                )
                .map_err(query_error)?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO positions (market_id, side, size, entry_price, current_price,
                        pnl, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4, 0, 'open', ?5, ?5)",
                    params![fill.market_id, fill.side.as_str(), fill.size, fill.price, now],
                )
                .map_err(query_error)?;
                tx.last_insert_rowid()
            }
        };

        let position =
            load_position(&tx, position_id)?.ok_or_else(|| position_not_found(position_id))?;
        tx.commit().map_err(query_error)?;

        let trade = Trade {
            id: trade_id,
            market_id: fill.market_id.clone(),
            side: fill.side,
            size: fill.size,
            price: fill.price,
            fee: fill.fee,
            timestamp: executed_at,
            question: Some(question),
            category,
        };
        Ok((trade, position))
    }

    fn list_trades(&self, limit: usize) -> Result<Vec<Trade>, PolydashError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{TRADE_SELECT} ORDER BY t.timestamp DESC, t.id DESC LIMIT ?1"
            ))
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![limit_param(limit)], trade_from_row)
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn market(id: &str, yes: f64, volume: f64) -> Market {
        Market {
            id: id.into(),
            question: format!("Will {id} resolve YES?"),
            end_date: Some("2030-01-01T00:00:00Z".into()),
            category: Some("Politics".into()),
            volume,
            liquidity: volume * 0.06,
            yes_price: yes,
            no_price: 1.0 - yes,
            created_at: None,
            updated_at: None,
        }
    }

    fn fill(market_id: &str, side: Side, size: f64, price: f64) -> Fill {
        Fill {
            market_id: market_id.into(),
            side,
            size,
            price,
            fee: 0.0,
            order_id: None,
        }
    }

    fn seeded() -> SqliteAdapter {
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store.upsert_market(&market("m1", 0.52, 1000.0)).unwrap();
        store.upsert_market(&market("m2", 0.30, 5000.0)).unwrap();
        store
    }

    #[test]
    fn schema_is_idempotent() {
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store.initialize_schema().unwrap();
        assert!(store.list_markets(10).unwrap().is_empty());
    }

    #[test]
    fn markets_list_by_volume() {
        let store = seeded();
        let ids: Vec<String> = store
            .list_markets(10)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m2", "m1"]);
        assert_eq!(store.list_markets(1).unwrap().len(), 1);
    }

    #[test]
    fn insert_if_absent_does_not_overwrite() {
        let store = seeded();
        assert!(!store.insert_market_if_absent(&market("m1", 0.9, 1.0)).unwrap());
        assert_eq!(store.get_market("m1").unwrap().unwrap().yes_price, 0.52);
        assert!(store.insert_market_if_absent(&market("m3", 0.4, 1.0)).unwrap());
    }

    #[test]
    fn upsert_keeps_created_at() {
        let store = seeded();
        let first = store.get_market("m1").unwrap().unwrap();
        store.upsert_market(&market("m1", 0.61, 1200.0)).unwrap();
        let second = store.get_market("m1").unwrap().unwrap();
        assert_eq!(second.yes_price, 0.61);
        assert_eq!(second.volume, 1200.0);
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn first_fill_opens_position() {
        let store = seeded();
        let (trade, position) = store.record_fill(&fill("m1", Side::Yes, 100.0, 0.52)).unwrap();

        assert_eq!(trade.price, 0.52);
        assert_eq!(trade.question.as_deref(), Some("Will m1 resolve YES?"));
        assert_eq!(position.side, Side::Yes);
        assert_eq!(position.size, 100.0);
        assert_eq!(position.entry_price, 0.52);
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(position.pnl, 0.0);
        assert_eq!(position.category.as_deref(), Some("Politics"));
    }

    #[test]
    fn repeated_fills_accumulate_with_weighted_entry() {
        let store = seeded();
        store.record_fill(&fill("m1", Side::Yes, 100.0, 0.50)).unwrap();
        let (_, position) = store.record_fill(&fill("m1", Side::Yes, 50.0, 0.62)).unwrap();

        assert_eq!(position.size, 150.0);
        assert_relative_eq!(position.entry_price, 0.54, epsilon = 1e-12);
        assert_eq!(store.list_positions(None).unwrap().len(), 1);
        assert_eq!(store.list_trades(10).unwrap().len(), 2);
    }

    #[test]
    fn opposite_sides_are_separate_positions() {
        let store = seeded();
        store.record_fill(&fill("m1", Side::Yes, 10.0, 0.52)).unwrap();
        store.record_fill(&fill("m1", Side::No, 10.0, 0.52)).unwrap();
        assert_eq!(store.list_positions(Some(PositionStatus::Open)).unwrap().len(), 2);
    }

    #[test]
    fn fill_on_unknown_market_writes_nothing() {
        let store = seeded();
        let err = store.record_fill(&fill("ghost", Side::Yes, 10.0, 0.5)).unwrap_err();
        assert!(matches!(err, PolydashError::NotFound { entity: "market", .. }));
        assert!(store.list_trades(10).unwrap().is_empty());
        assert!(store.list_positions(None).unwrap().is_empty());
    }

    #[test]
    fn reprice_updates_pnl_for_both_sides() {
        let store = seeded();
        let (_, yes) = store.record_fill(&fill("m1", Side::Yes, 100.0, 0.52)).unwrap();
        let (_, no) = store.record_fill(&fill("m1", Side::No, 100.0, 0.52)).unwrap();

        assert_eq!(store.reprice_positions("m1", 0.60).unwrap(), 2);

        let yes = store.get_position(yes.id).unwrap().unwrap();
        let no = store.get_position(no.id).unwrap().unwrap();
        assert_relative_eq!(yes.pnl, 8.0, epsilon = 1e-9);
        assert_relative_eq!(no.pnl, -8.0, epsilon = 1e-9);
        assert_eq!(yes.current_price, Some(0.60));
    }

    #[test]
    fn close_is_terminal() {
        let store = seeded();
        let (_, position) = store.record_fill(&fill("m1", Side::Yes, 100.0, 0.52)).unwrap();

        let closed = store.close_position(position.id, 0.60).unwrap();
        assert_eq!(closed.status, PositionStatus::Closed);
        assert_relative_eq!(closed.pnl, 8.0, epsilon = 1e-9);

        let err = store.close_position(position.id, 0.70).unwrap_err();
        assert!(matches!(err, PolydashError::PositionClosed { .. }));

        // closed positions are skipped by repricing
        assert_eq!(store.reprice_positions("m1", 0.9).unwrap(), 0);
        let still = store.get_position(position.id).unwrap().unwrap();
        assert_relative_eq!(still.pnl, 8.0, epsilon = 1e-9);
    }

    #[test]
    fn fill_after_close_opens_new_position() {
        let store = seeded();
        let (_, first) = store.record_fill(&fill("m1", Side::Yes, 10.0, 0.5)).unwrap();
        store.close_position(first.id, 0.55).unwrap();
        let (_, second) = store.record_fill(&fill("m1", Side::Yes, 10.0, 0.6)).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.entry_price, 0.6);
    }

    #[test]
    fn close_unknown_position_is_not_found() {
        let store = seeded();
        let err = store.close_position(999, 0.5).unwrap_err();
        assert!(matches!(err, PolydashError::NotFound { entity: "position", .. }));
    }

    #[test]
    fn trades_list_newest_first() {
        let store = seeded();
        store.record_fill(&fill("m1", Side::Yes, 1.0, 0.5)).unwrap();
        store.record_fill(&fill("m2", Side::No, 2.0, 0.3)).unwrap();
        store.record_fill(&fill("m1", Side::Yes, 3.0, 0.5)).unwrap();

        let trades = store.list_trades(10).unwrap();
        let sizes: Vec<f64> = trades.iter().map(|t| t.size).collect();
        assert_eq!(sizes, vec![3.0, 2.0, 1.0]);
        assert_eq!(store.list_trades(2).unwrap().len(), 2);
    }

    #[test]
    fn file_store_persists_across_adapters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("polydash.db");

        {
            let store = SqliteAdapter::open(&path, 2).unwrap();
            store.initialize_schema().unwrap();
            store.upsert_market(&market("m1", 0.52, 1000.0)).unwrap();
            store.record_fill(&fill("m1", Side::Yes, 5.0, 0.52)).unwrap();
        }

        let store = SqliteAdapter::open(&path, 2).unwrap();
        store.initialize_schema().unwrap();
        assert_eq!(store.list_trades(10).unwrap().len(), 1);
        assert_eq!(store.list_positions(None).unwrap().len(), 1);
    }

    #[test]
    fn memory_path_shares_one_database_across_threads() {
        let store = std::sync::Arc::new(SqliteAdapter::open(":memory:", 4).unwrap());
        store.initialize_schema().unwrap();
        store.upsert_market(&market("m1", 0.5, 1000.0)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    store.record_fill(&fill("m1", Side::Yes, 1.0, 0.5)).unwrap();
                    store.list_markets(10).unwrap().len()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
        assert_eq!(store.list_trades(100).unwrap().len(), 8);
    }
}
