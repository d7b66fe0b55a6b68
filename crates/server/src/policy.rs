//! Ownership rules for cars and their modifications.
//!
//! Check order is fixed: a missing car is 404, a car owned by someone else
//! is 403, and a missing modification (or one under a different car) is 404.

use rusqlite::Connection;

use garage_api::{FORBIDDEN_MESSAGE, ModificationResponse};

use crate::error::ApiErr;
use crate::repository::cars::{self, CarOwner};
use crate::repository::modifications;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability {
    View,
    Update,
    Delete,
    ManageImage,
}

pub struct CarPolicy;

impl CarPolicy {
    pub fn allows(user_id: &str, ability: Ability, car: &CarOwner) -> bool {
        match ability {
            Ability::View | Ability::Update | Ability::Delete | Ability::ManageImage => {
                car.user_id == user_id
            }
        }
    }

    /// Load the car and check `ability` for `user_id`.
    pub fn authorize(
        conn: &Connection,
        user_id: &str,
        car_id: &str,
        ability: Ability,
    ) -> Result<CarOwner, ApiErr> {
        let car = cars::owner(conn, car_id)?.ok_or_else(|| ApiErr::not_found("car not found"))?;
        if !Self::allows(user_id, ability, &car) {
            tracing::debug!("denied {ability:?} on car {car_id} for user {user_id}");
            return Err(ApiErr::forbidden(FORBIDDEN_MESSAGE));
        }
        Ok(car)
    }
}

pub struct ModificationPolicy;

impl ModificationPolicy {
    /// Authorize through the parent car, then require the modification to
    /// belong to that car.
    pub fn authorize(
        conn: &Connection,
        user_id: &str,
        car_id: &str,
        modification_id: &str,
        ability: Ability,
    ) -> Result<ModificationResponse, ApiErr> {
        CarPolicy::authorize(conn, user_id, car_id, ability)?;
        modifications::find(conn, modification_id)?
            .filter(|m| m.car_id == car_id)
            .ok_or_else(|| ApiErr::not_found("modification not found"))
    }
}
