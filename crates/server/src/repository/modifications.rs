use rusqlite::{Connection, Row};
use uuid::Uuid;

use garage_api::db::{self, listing::ListParams};
use garage_api::service::ModificationChanges;
use garage_api::{ModificationResponse, Paginated};

use crate::error::ApiErr;
use crate::storage::{sq_execute, sq_query_opt};

/// Map a row of `db::modifications` SELECT columns.
pub fn modification_from_row(row: &Row<'_>) -> rusqlite::Result<ModificationResponse> {
    Ok(ModificationResponse {
        id: row.get(0)?,
        car_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        brand: row.get(4)?,
        vendor: row.get(5)?,
        installation_date: row.get(6)?,
        cost: row.get(7)?,
        is_active: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn list(
    conn: &Connection,
    car_id: &str,
    params: &ListParams,
) -> Result<Paginated<ModificationResponse>, ApiErr> {
    let built = db::modifications::list(car_id, params)?;
    super::paginate(conn, built, modification_from_row)
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<ModificationResponse>, ApiErr> {
    sq_query_opt(conn, db::modifications::get_by_id(id), modification_from_row)
        .map_err(ApiErr::from_db("get modification"))
}

pub fn create(
    conn: &Connection,
    car_id: &str,
    changes: &ModificationChanges,
) -> Result<ModificationResponse, ApiErr> {
    let id = Uuid::new_v4().to_string();
    sq_execute(conn, db::modifications::insert(&id, car_id, changes))
        .map_err(ApiErr::from_db("insert modification"))?;
    find(conn, &id)?.ok_or_else(|| ApiErr::internal("modification vanished after insert"))
}

pub fn update(conn: &Connection, id: &str, changes: &ModificationChanges) -> Result<(), ApiErr> {
    sq_execute(conn, db::modifications::update(id, changes))
        .map_err(ApiErr::from_db("update modification"))?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> Result<(), ApiErr> {
    sq_execute(conn, db::modifications::delete(id))
        .map_err(ApiErr::from_db("delete modification"))?;
    Ok(())
}
