use rusqlite::{Connection, Row};

use garage_api::db::{self, listing::ListParams};
use garage_api::{EventResponse, OrganizerResponse, Paginated, TrackResponse};

use crate::error::ApiErr;
use crate::storage::{sq_query_map, sq_query_opt};

/// Map a row of `db::events` SELECT columns (event, track, organizer).
pub fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventResponse> {
    Ok(EventResponse {
        id: row.get(0)?,
        title: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        website: row.get(4)?,
        track: TrackResponse {
            id: row.get(5)?,
            name: row.get(6)?,
            location: row.get(7)?,
            website: row.get(8)?,
        },
        organizer: OrganizerResponse {
            id: row.get(9)?,
            name: row.get(10)?,
            website: row.get(11)?,
        },
    })
}

/// One page of events; upcoming-only unless the caller opts out.
pub fn list(
    conn: &Connection,
    params: &ListParams,
    today: &str,
) -> Result<Paginated<EventResponse>, ApiErr> {
    let built = db::events::list(params, today)?;
    super::paginate(conn, built, event_from_row)
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<EventResponse>, ApiErr> {
    sq_query_opt(conn, db::events::get_by_id(id), event_from_row)
        .map_err(ApiErr::from_db("get event"))
}

pub fn tracks(conn: &Connection) -> Result<Vec<TrackResponse>, ApiErr> {
    sq_query_map(conn, db::events::list_tracks(), |row| {
        Ok(TrackResponse {
            id: row.get(0)?,
            name: row.get(1)?,
            location: row.get(2)?,
            website: row.get(3)?,
        })
    })
    .map_err(ApiErr::from_db("list tracks"))
}

pub fn organizers(conn: &Connection) -> Result<Vec<OrganizerResponse>, ApiErr> {
    sq_query_map(conn, db::events::list_organizers(), |row| {
        Ok(OrganizerResponse {
            id: row.get(0)?,
            name: row.get(1)?,
            website: row.get(2)?,
        })
    })
    .map_err(ApiErr::from_db("list organizers"))
}
