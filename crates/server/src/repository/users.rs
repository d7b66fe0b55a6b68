use rusqlite::{Connection, Row};

use garage_api::UserResponse;
use garage_api::db;

use crate::error::ApiErr;
use crate::storage::sq_query_opt;

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserResponse> {
    Ok(UserResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        email_verified_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn find(conn: &Connection, user_id: &str) -> Result<Option<UserResponse>, ApiErr> {
    sq_query_opt(conn, db::users::get_by_id(user_id), user_from_row)
        .map_err(ApiErr::from_db("get user"))
}
