use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use garage_api::db::{Built, migrations::MIGRATIONS};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Lock the connection. A poisoned lock still holds a usable connection.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let db_path = data_dir.join("garage.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // Enable WAL mode for better concurrent read performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    setup(conn)
}

/// In-memory database with the full schema.
pub fn open_in_memory() -> Result<Db> {
    setup(Connection::open_in_memory().context("opening in-memory database")?)
}

fn setup(conn: Connection) -> Result<Db> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    run_migrations(&conn)?;
    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query helpers
// ---------------------------------------------------------------------------

/// Convert `sea_query::Values` into rusqlite bind params.
fn bind_values(values: &sea_query::Values) -> Vec<SqlValue> {
    use sea_query::Value;

    values
        .0
        .iter()
        .map(|v| match v {
            Value::Bool(Some(b)) => SqlValue::Integer(i64::from(*b)),
            Value::TinyInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
            Value::SmallInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
            Value::Int(Some(i)) => SqlValue::Integer(i64::from(*i)),
            Value::BigInt(Some(i)) => SqlValue::Integer(*i),
            Value::TinyUnsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
            Value::SmallUnsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
            Value::Unsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
            Value::BigUnsigned(Some(u)) => SqlValue::Integer(i64::try_from(*u).unwrap_or(i64::MAX)),
            Value::Float(Some(f)) => SqlValue::Real(f64::from(*f)),
            Value::Double(Some(f)) => SqlValue::Real(*f),
            Value::String(Some(s)) => SqlValue::Text(s.to_string()),
            Value::Char(Some(c)) => SqlValue::Text(c.to_string()),
            Value::Bytes(Some(b)) => SqlValue::Blob(b.to_vec()),
            _ => SqlValue::Null,
        })
        .collect()
}

/// Execute a built statement, returning the number of affected rows.
pub fn sq_execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, params_from_iter(bind_values(&values)))
}

/// Run a built query expecting exactly one row.
pub fn sq_query_row<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    conn.query_row(&sql, params_from_iter(bind_values(&values)), f)
}

/// Run a built query expecting zero or one row.
pub fn sq_query_opt<T, F>(
    conn: &Connection,
    built: Built,
    f: F,
) -> rusqlite::Result<Option<T>>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    sq_query_row(conn, built, f).optional()
}

/// Run a built query and map every row.
pub fn sq_query_map<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(bind_values(&values)), f)?;
    rows.collect()
}

/// Whether an error is a UNIQUE / FK constraint violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
