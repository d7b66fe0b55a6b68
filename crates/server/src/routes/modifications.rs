use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use garage_api::{
    ModificationRequest, ModificationResponse, Paginated,
    service::{self, Mode},
};

use crate::error::ApiErr;
use crate::extract::{JsonBody, ListQuery};
use crate::policy::{Ability, CarPolicy, ModificationPolicy};
use crate::repository;
use crate::routes::auth::AuthUser;
use crate::storage::Db;

/// GET /api/cars/{car}/modifications
pub async fn list_modifications(
    State(db): State<Db>,
    user: AuthUser,
    Path(car_id): Path<String>,
    ListQuery(params): ListQuery,
) -> Result<Json<Paginated<ModificationResponse>>, ApiErr> {
    let conn = db.conn();
    CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::View)?;
    repository::modifications::list(&conn, &car_id, &params).map(Json)
}

/// POST /api/cars/{car}/modifications
pub async fn create_modification(
    State(db): State<Db>,
    user: AuthUser,
    Path(car_id): Path<String>,
    JsonBody(req): JsonBody<ModificationRequest>,
) -> Result<(StatusCode, Json<ModificationResponse>), ApiErr> {
    let conn = db.conn();
    CarPolicy::authorize(&conn, &user.user_id, &car_id, Ability::Update)?;
    let changes = service::validate_modification(&req, Mode::Create)?;
    let modification = repository::modifications::create(&conn, &car_id, &changes)?;
    Ok((StatusCode::CREATED, Json(modification)))
}

/// GET /api/cars/{car}/modifications/{modification}
pub async fn get_modification(
    State(db): State<Db>,
    user: AuthUser,
    Path((car_id, modification_id)): Path<(String, String)>,
) -> Result<Json<ModificationResponse>, ApiErr> {
    let conn = db.conn();
    ModificationPolicy::authorize(&conn, &user.user_id, &car_id, &modification_id, Ability::View)
        .map(Json)
}

/// PUT|PATCH /api/cars/{car}/modifications/{modification}: partial update.
pub async fn update_modification(
    State(db): State<Db>,
    user: AuthUser,
    Path((car_id, modification_id)): Path<(String, String)>,
    JsonBody(req): JsonBody<ModificationRequest>,
) -> Result<Json<ModificationResponse>, ApiErr> {
    let conn = db.conn();
    let current = ModificationPolicy::authorize(
        &conn,
        &user.user_id,
        &car_id,
        &modification_id,
        Ability::Update,
    )?;
    let changes = service::validate_modification(&req, Mode::Update)?;
    if changes == Default::default() {
        return Ok(Json(current));
    }
    repository::modifications::update(&conn, &modification_id, &changes)?;
    repository::modifications::find(&conn, &modification_id)?
        .map(Json)
        .ok_or_else(|| ApiErr::not_found("modification not found"))
}

/// DELETE /api/cars/{car}/modifications/{modification}
pub async fn delete_modification(
    State(db): State<Db>,
    user: AuthUser,
    Path((car_id, modification_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    ModificationPolicy::authorize(
        &conn,
        &user.user_id,
        &car_id,
        &modification_id,
        Ability::Delete,
    )?;
    repository::modifications::delete(&conn, &modification_id)?;
    Ok(StatusCode::NO_CONTENT)
}
