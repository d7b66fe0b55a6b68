use axum::{
    Json,
    extract::{Path, State},
};

use garage_api::{EventResponse, ListOrganizersResponse, ListTracksResponse, Paginated};

use crate::error::ApiErr;
use crate::extract::ListQuery;
use crate::repository;
use crate::storage::Db;
use crate::today;

/// GET /api/events: public track-day finder.
pub async fn list_events(
    State(db): State<Db>,
    ListQuery(params): ListQuery,
) -> Result<Json<Paginated<EventResponse>>, ApiErr> {
    let conn = db.conn();
    repository::events::list(&conn, &params, &today()).map(Json)
}

/// GET /api/events/{event}
pub async fn get_event(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, ApiErr> {
    let conn = db.conn();
    repository::events::find(&conn, &id)?
        .map(Json)
        .ok_or_else(|| ApiErr::not_found("event not found"))
}

/// GET /api/tracks
pub async fn list_tracks(State(db): State<Db>) -> Result<Json<ListTracksResponse>, ApiErr> {
    let conn = db.conn();
    let tracks = repository::events::tracks(&conn)?;
    Ok(Json(ListTracksResponse { tracks }))
}

/// GET /api/organizers
pub async fn list_organizers(
    State(db): State<Db>,
) -> Result<Json<ListOrganizersResponse>, ApiErr> {
    let conn = db.conn();
    let organizers = repository::events::organizers(&conn)?;
    Ok(Json(ListOrganizersResponse { organizers }))
}
