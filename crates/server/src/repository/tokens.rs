use rusqlite::{Connection, Row};

use garage_api::TokenSummary;
use garage_api::db;

use crate::error::ApiErr;
use crate::storage::{sq_execute, sq_query_map, sq_query_opt};

pub fn token_from_row(row: &Row<'_>) -> rusqlite::Result<TokenSummary> {
    Ok(TokenSummary {
        id: row.get(0)?,
        name: row.get(1)?,
        token_prefix: row.get(2)?,
        last_used_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn list(conn: &Connection, user_id: &str) -> Result<Vec<TokenSummary>, ApiErr> {
    sq_query_map(conn, db::tokens::list_by_user(user_id), token_from_row)
        .map_err(ApiErr::from_db("list tokens"))
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<TokenSummary>, ApiErr> {
    sq_query_opt(conn, db::tokens::get_by_id(id), token_from_row)
        .map_err(ApiErr::from_db("get token"))
}

/// Resolve a plaintext personal token to its owner, stamping `last_used_at`.
pub fn authenticate(conn: &Connection, plaintext: &str) -> Result<Option<String>, ApiErr> {
    let hash = garage_api::crypto::hash_token(plaintext);
    let found: Option<(String, String)> =
        sq_query_opt(conn, db::tokens::get_by_hash(&hash), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(ApiErr::from_db("lookup personal token"))?;
    let Some((token_id, user_id)) = found else {
        return Ok(None);
    };
    sq_execute(conn, db::tokens::touch(&token_id)).map_err(ApiErr::from_db("touch token"))?;
    Ok(Some(user_id))
}
