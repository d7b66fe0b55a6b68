use axum::{Json, extract::State};

use garage_api::DashboardResponse;

use crate::error::ApiErr;
use crate::repository;
use crate::routes::auth::AuthUser;
use crate::storage::Db;

/// GET /api/dashboard: totals and recent modifications across the caller's cars.
pub async fn dashboard(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, ApiErr> {
    let conn = db.conn();
    repository::dashboard::summary(&conn, &user.user_id).map(Json)
}
