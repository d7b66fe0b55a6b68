use std::collections::HashMap;

use rusqlite::{Connection, Row};
use uuid::Uuid;

use garage_api::db::{self, listing::ListParams};
use garage_api::service::CarChanges;
use garage_api::{CarResponse, Paginated, car_display_name};

use super::modifications::modification_from_row;
use crate::error::ApiErr;
use crate::storage::{sq_execute, sq_query_map, sq_query_opt};

/// The columns a policy check needs.
#[derive(Debug, Clone)]
pub struct CarOwner {
    pub user_id: String,
    pub image_path: Option<String>,
}

/// Public URL of a car's image endpoint.
pub fn image_url(car_id: &str) -> String {
    format!("/api/cars/{car_id}/image")
}

/// Map a row of `db::cars` SELECT columns.
pub fn car_from_row(row: &Row<'_>) -> rusqlite::Result<CarResponse> {
    let id: String = row.get(0)?;
    let make: String = row.get(2)?;
    let model: String = row.get(3)?;
    let year: i64 = row.get(4)?;
    let nickname: Option<String> = row.get(5)?;
    let image_path: Option<String> = row.get(7)?;
    Ok(CarResponse {
        display_name: car_display_name(nickname.as_deref(), year, &make, &model),
        image_url: image_path.map(|_| image_url(&id)),
        user_id: row.get(1)?,
        vin: row.get(6)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        modifications_count: row.get(11)?,
        modifications: None,
        id,
        make,
        model,
        year,
        nickname,
    })
}

/// One page of a user's cars; loads modifications when `include=modifications`.
pub fn list(
    conn: &Connection,
    user_id: &str,
    params: &ListParams,
) -> Result<Paginated<CarResponse>, ApiErr> {
    let built = db::cars::list(user_id, params)?;
    let with_modifications = built.applied.includes("modifications");
    let mut page = super::paginate(conn, built, car_from_row)?;
    if with_modifications {
        attach_modifications(conn, &mut page.data)?;
    }
    Ok(page)
}

fn attach_modifications(conn: &Connection, cars: &mut [CarResponse]) -> Result<(), ApiErr> {
    if cars.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = cars.iter().map(|c| c.id.clone()).collect();
    let rows = sq_query_map(
        conn,
        db::modifications::list_for_cars(&ids),
        modification_from_row,
    )
    .map_err(ApiErr::from_db("list car modifications"))?;

    let mut by_car: HashMap<String, Vec<_>> = HashMap::new();
    for m in rows {
        by_car.entry(m.car_id.clone()).or_default().push(m);
    }
    for car in cars {
        car.modifications = Some(by_car.remove(&car.id).unwrap_or_default());
    }
    Ok(())
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<CarResponse>, ApiErr> {
    sq_query_opt(conn, db::cars::get_by_id(id), car_from_row).map_err(ApiErr::from_db("get car"))
}

/// A car with its modifications embedded.
pub fn find_with_modifications(conn: &Connection, id: &str) -> Result<Option<CarResponse>, ApiErr> {
    let Some(car) = find(conn, id)? else {
        return Ok(None);
    };
    let mut cars = [car];
    attach_modifications(conn, &mut cars)?;
    let [car] = cars;
    Ok(Some(car))
}

pub fn owner(conn: &Connection, id: &str) -> Result<Option<CarOwner>, ApiErr> {
    sq_query_opt(conn, db::cars::get_owner_and_image(id), |row| {
        Ok(CarOwner {
            user_id: row.get(0)?,
            image_path: row.get(1)?,
        })
    })
    .map_err(ApiErr::from_db("get car owner"))
}

pub fn create(conn: &Connection, user_id: &str, car: &CarChanges) -> Result<CarResponse, ApiErr> {
    let id = Uuid::new_v4().to_string();
    sq_execute(conn, db::cars::insert(&id, user_id, car)).map_err(ApiErr::from_db("insert car"))?;
    find(conn, &id)?.ok_or_else(|| ApiErr::internal("car vanished after insert"))
}

pub fn update(conn: &Connection, id: &str, changes: &CarChanges) -> Result<(), ApiErr> {
    sq_execute(conn, db::cars::update(id, changes)).map_err(ApiErr::from_db("update car"))?;
    Ok(())
}

pub fn set_image(conn: &Connection, id: &str, key: Option<&str>) -> Result<(), ApiErr> {
    sq_execute(conn, db::cars::set_image(id, key)).map_err(ApiErr::from_db("set car image"))?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> Result<(), ApiErr> {
    sq_execute(conn, db::cars::delete(id)).map_err(ApiErr::from_db("delete car"))?;
    Ok(())
}
