//! Track-day event finder query builders.

use sea_query::{
    Alias, Asterisk, Expr, Func, JoinType, OnConflict, Order, Query, SelectStatement,
    SqliteQueryBuilder,
};

use super::listing::{Filter, FilterKind, ListParams, ListSpec, Sort, parse_bool};
use super::tables::{Events, Organizers, Tracks};
use super::{Built, BuiltList};
use crate::{EventImportRow, OrganizerResponse, ServiceError, TrackResponse};

/// Filters and sorts accepted by `GET /api/events`.
pub const LIST_SPEC: ListSpec = ListSpec {
    rowid_of: "e",
    filters: &[
        Filter {
            name: "search",
            kind: FilterKind::PartialAny(&[("e", "title"), ("t", "name"), ("o", "name")]),
        },
        Filter {
            name: "track",
            kind: FilterKind::Exact(("e", "track_id")),
        },
        Filter {
            name: "organizer",
            kind: FilterKind::Exact(("e", "organizer_id")),
        },
        Filter {
            name: "from",
            kind: FilterKind::DateFrom(("e", "start_date")),
        },
        Filter {
            name: "to",
            kind: FilterKind::DateTo(("e", "start_date")),
        },
        Filter {
            name: "upcoming",
            kind: FilterKind::Custom,
        },
    ],
    sorts: &[
        Sort {
            name: "start_date",
            column: ("e", "start_date"),
        },
        Sort {
            name: "title",
            column: ("e", "title"),
        },
    ],
    default_sort: "start_date",
    includes: &[],
};

/// Add the track and organizer joins shared by count and select.
fn join_relations(q: &mut SelectStatement) -> &mut SelectStatement {
    q.join_as(
        JoinType::InnerJoin,
        Tracks::Table,
        Alias::new("t"),
        Expr::col((Alias::new("t"), Tracks::Id)).equals((Alias::new("e"), Events::TrackId)),
    )
    .join_as(
        JoinType::InnerJoin,
        Organizers::Table,
        Alias::new("o"),
        Expr::col((Alias::new("o"), Organizers::Id))
            .equals((Alias::new("e"), Events::OrganizerId)),
    )
}

/// Column order must match the server's `event_from_row()` mapper.
fn event_select() -> SelectStatement {
    let (e, t, o) = (Alias::new("e"), Alias::new("t"), Alias::new("o"));
    let mut q = Query::select()
        .column((e.clone(), Events::Id))
        .column((e.clone(), Events::Title))
        .column((e.clone(), Events::StartDate))
        .column((e.clone(), Events::EndDate))
        .column((e.clone(), Events::Website))
        .column((t.clone(), Tracks::Id))
        .column((t.clone(), Tracks::Name))
        .column((t.clone(), Tracks::Location))
        .column((t, Tracks::Website))
        .column((o.clone(), Organizers::Id))
        .column((o.clone(), Organizers::Name))
        .column((o, Organizers::Website))
        .from_as(Events::Table, e)
        .to_owned();
    join_relations(&mut q);
    q
}

/// Build the paginated event list. `today` is `YYYY-MM-DD`.
///
/// Unless `filter[upcoming]` is false, only events that have not ended
/// before `today` are listed.
pub fn list(params: &ListParams, today: &str) -> Result<BuiltList, ServiceError> {
    let mut count_q = Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from_as(Events::Table, Alias::new("e"))
        .to_owned();
    join_relations(&mut count_q);
    let mut select_q = event_select();

    let upcoming = match params.filter("upcoming") {
        None => true,
        Some(v) => parse_bool(v).ok_or_else(|| {
            ServiceError::BadRequest("filter `upcoming` must be a boolean".into())
        })?,
    };
    if upcoming {
        let cond = Expr::cust_with_values(
            "COALESCE(\"e\".\"end_date\", \"e\".\"start_date\") >= ?",
            [today],
        );
        count_q.and_where(cond.clone());
        select_q.and_where(cond);
    }

    let applied = LIST_SPEC.apply(params, &mut count_q, &mut select_q)?;
    Ok(BuiltList {
        count_query: count_q.build(SqliteQueryBuilder),
        select_query: select_q.build(SqliteQueryBuilder),
        applied,
    })
}

/// SELECT a single event with its track and organizer.
pub fn get_by_id(id: &str) -> Built {
    event_select()
        .and_where(Expr::col((Alias::new("e"), Events::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// All tracks by name.
pub fn list_tracks() -> Built {
    Query::select()
        .columns([Tracks::Id, Tracks::Name, Tracks::Location, Tracks::Website])
        .from(Tracks::Table)
        .order_by(Tracks::Name, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// All organizers by name.
pub fn list_organizers() -> Built {
    Query::select()
        .columns([Organizers::Id, Organizers::Name, Organizers::Website])
        .from(Organizers::Table)
        .order_by(Organizers::Name, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// INSERT or UPDATE a track by id.
pub fn upsert_track(t: &TrackResponse) -> Built {
    Query::insert()
        .into_table(Tracks::Table)
        .columns([Tracks::Id, Tracks::Name, Tracks::Location, Tracks::Website])
        .values_panic([
            t.id.as_str().into(),
            t.name.as_str().into(),
            t.location.as_str().into(),
            t.website.clone().into(),
        ])
        .on_conflict(
            OnConflict::column(Tracks::Id)
                .update_columns([Tracks::Name, Tracks::Location, Tracks::Website])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// INSERT or UPDATE an organizer by id.
pub fn upsert_organizer(o: &OrganizerResponse) -> Built {
    Query::insert()
        .into_table(Organizers::Table)
        .columns([Organizers::Id, Organizers::Name, Organizers::Website])
        .values_panic([
            o.id.as_str().into(),
            o.name.as_str().into(),
            o.website.clone().into(),
        ])
        .on_conflict(
            OnConflict::column(Organizers::Id)
                .update_columns([Organizers::Name, Organizers::Website])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// INSERT or UPDATE an event by id.
pub fn upsert_event(e: &EventImportRow) -> Built {
    Query::insert()
        .into_table(Events::Table)
        .columns([
            Events::Id,
            Events::TrackId,
            Events::OrganizerId,
            Events::Title,
            Events::StartDate,
            Events::EndDate,
            Events::Website,
        ])
        .values_panic([
            e.id.as_str().into(),
            e.track_id.as_str().into(),
            e.organizer_id.as_str().into(),
            e.title.trim().into(),
            e.start_date.trim().into(),
            e.end_date.as_deref().map(str::trim).map(str::to_string).into(),
            e.website.clone().into(),
        ])
        .on_conflict(
            OnConflict::column(Events::Id)
                .update_columns([
                    Events::TrackId,
                    Events::OrganizerId,
                    Events::Title,
                    Events::StartDate,
                    Events::EndDate,
                    Events::Website,
                ])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upcoming_is_the_default() {
        let built = list(&ListParams::default(), "2026-10-16").unwrap();
        let (sql, values) = &built.count_query;
        assert!(sql.contains("COALESCE"), "{sql}");
        assert_eq!(values.0.len(), 1);

        let params = ListParams::from_pairs([("filter[upcoming]", "0")]).unwrap();
        let built = list(&params, "2026-10-16").unwrap();
        assert!(!built.count_query.0.contains("COALESCE"));
    }

    #[test]
    fn search_spans_title_track_and_organizer() {
        let params = ListParams::from_pairs([("filter[search]", "spa")]).unwrap();
        let built = list(&params, "2026-10-16").unwrap();
        let (sql, _) = &built.select_query;
        assert!(sql.contains(r#""e"."title" LIKE ?"#), "{sql}");
        assert!(sql.contains(r#""t"."name" LIKE ?"#), "{sql}");
        assert!(sql.contains(r#""o"."name" LIKE ?"#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "e"."start_date" ASC"#), "{sql}");
    }

    #[test]
    fn bad_dates_are_rejected() {
        let params = ListParams::from_pairs([("filter[from]", "next week")]).unwrap();
        assert_eq!(list(&params, "2026-10-16").err().map(|e| e.status_code()), Some(400));
    }
}
