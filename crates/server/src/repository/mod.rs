//! Thin data access layer: runs `garage_api::db` builders and maps rows.

pub mod cars;
pub mod dashboard;
pub mod events;
pub mod modifications;
pub mod tokens;
pub mod users;

use rusqlite::{Connection, Row};

use garage_api::db::BuiltList;
use garage_api::Paginated;

use crate::error::ApiErr;
use crate::storage::{sq_query_map, sq_query_row};

/// Run a list request's count and page queries.
pub fn paginate<T>(
    conn: &Connection,
    built: BuiltList,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Paginated<T>, ApiErr> {
    let total: i64 = sq_query_row(conn, built.count_query, |row| row.get(0))
        .map_err(ApiErr::from_db("count rows"))?;
    let data = sq_query_map(conn, built.select_query, map).map_err(ApiErr::from_db("list rows"))?;
    Ok(Paginated::new(
        data,
        total,
        built.applied.page,
        built.applied.per_page,
    ))
}
