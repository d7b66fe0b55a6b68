use rusqlite::Connection;

use garage_api::db;
use garage_api::{DashboardResponse, RecentModification, car_display_name};

use crate::error::ApiErr;
use crate::storage::{sq_query_map, sq_query_row};

/// Aggregate counts, spend and recent activity for one user.
pub fn summary(conn: &Connection, user_id: &str) -> Result<DashboardResponse, ApiErr> {
    let cars_count: i64 = sq_query_row(conn, db::dashboard::cars_count(user_id), |row| row.get(0))
        .map_err(ApiErr::from_db("count cars"))?;

    let (modifications_count, active_modifications_count, total_spent): (i64, i64, f64) =
        sq_query_row(conn, db::dashboard::modification_totals(user_id), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(ApiErr::from_db("modification totals"))?;

    let recent_modifications = sq_query_map(
        conn,
        db::dashboard::recent_modifications(user_id),
        |row| {
            let nickname: Option<String> = row.get(4)?;
            let year: i64 = row.get(5)?;
            let make: String = row.get(6)?;
            let model: String = row.get(7)?;
            Ok(RecentModification {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                car_id: row.get(3)?,
                car_name: car_display_name(nickname.as_deref(), year, &make, &model),
                installation_date: row.get(8)?,
                cost: row.get(9)?,
            })
        },
    )
    .map_err(ApiErr::from_db("recent modifications"))?;

    Ok(DashboardResponse {
        cars_count,
        modifications_count,
        active_modifications_count,
        total_spent: (total_spent * 100.0).round() / 100.0,
        recent_modifications,
    })
}
