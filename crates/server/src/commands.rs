//! Administrative subcommands run against the database directly.

use std::path::Path;

use anyhow::{Context, Result, bail};

use garage_api::{EventImport, db, service};

use crate::storage::{Db, sq_execute, sq_query_opt};

/// What `verify-email` did.
#[derive(Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
}

/// Mark the user with `email` as verified, inside a transaction.
pub fn verify_email(db: &Db, email: &str) -> Result<VerifyOutcome> {
    let email = email.trim().to_lowercase();
    let mut conn = db.conn();
    let tx = conn.transaction()?;

    let found: Option<(String, Option<String>)> =
        sq_query_opt(&tx, db::users::get_by_email(&email), |row| {
            Ok((row.get(0)?, row.get(3)?))
        })?;
    let Some((user_id, verified_at)) = found else {
        bail!("no user with email {email}");
    };
    if verified_at.is_some() {
        return Ok(VerifyOutcome::AlreadyVerified);
    }

    sq_execute(&tx, db::users::mark_verified(&user_id))?;
    tx.commit()?;
    tracing::info!("marked {email} as verified");
    Ok(VerifyOutcome::Verified)
}

/// Counts of upserted rows.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub tracks: usize,
    pub organizers: usize,
    pub events: usize,
}

/// Load a JSON event document from disk and import it.
pub fn import_events_file(db: &Db, path: &Path) -> Result<ImportSummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let doc: EventImport =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    import_events(db, &doc)
}

/// Upsert tracks, organizers and events by id in one transaction.
pub fn import_events(db: &Db, doc: &EventImport) -> Result<ImportSummary> {
    for row in &doc.events {
        if let Err(e) = service::validate_event_row(row) {
            let detail = match &e {
                garage_api::ServiceError::Validation(v) => v
                    .fields()
                    .values()
                    .flatten()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" "),
                other => other.to_string(),
            };
            bail!("event {}: {detail}", row.id);
        }
    }

    let mut conn = db.conn();
    let tx = conn.transaction()?;
    let mut summary = ImportSummary::default();
    for track in &doc.tracks {
        sq_execute(&tx, db::events::upsert_track(track))
            .with_context(|| format!("track {}", track.id))?;
        summary.tracks += 1;
    }
    for organizer in &doc.organizers {
        sq_execute(&tx, db::events::upsert_organizer(organizer))
            .with_context(|| format!("organizer {}", organizer.id))?;
        summary.organizers += 1;
    }
    for event in &doc.events {
        sq_execute(&tx, db::events::upsert_event(event))
            .with_context(|| format!("event {} (unknown track or organizer?)", event.id))?;
        summary.events += 1;
    }
    tx.commit()?;
    tracing::info!(
        "imported {} tracks, {} organizers, {} events",
        summary.tracks,
        summary.organizers,
        summary.events
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{open_in_memory, sq_query_row};

    fn doc(end_date: Option<&str>) -> EventImport {
        serde_json::from_value(serde_json::json!({
            "tracks": [{"id": "t1", "name": "Laguna Seca", "location": "Monterey, CA", "website": null}],
            "organizers": [{"id": "o1", "name": "Hooked on Driving", "website": null}],
            "events": [{
                "id": "e1", "track_id": "t1", "organizer_id": "o1",
                "title": "Spring Open", "start_date": "2030-04-01", "end_date": end_date
            }]
        }))
        .unwrap()
    }

    #[test]
    fn verify_email_is_idempotent() {
        let db = open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO users (id, name, email, password_hash) VALUES ('u1', 'Ann', 'ann@example.com', 'x')",
                [],
            )
            .unwrap();

        assert_eq!(verify_email(&db, " ANN@example.com ").unwrap(), VerifyOutcome::Verified);
        assert_eq!(
            verify_email(&db, "ann@example.com").unwrap(),
            VerifyOutcome::AlreadyVerified
        );
        assert!(verify_email(&db, "nobody@example.com").is_err());
    }

    #[test]
    fn import_upserts_by_id() {
        let db = open_in_memory().unwrap();
        let summary = import_events(&db, &doc(Some("2030-04-02"))).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                tracks: 1,
                organizers: 1,
                events: 1
            }
        );
        import_events(&db, &doc(None)).unwrap();

        let conn = db.conn();
        let (count, end): (i64, Option<String>) = sq_query_row(
            &conn,
            ("SELECT COUNT(*), MAX(end_date) FROM events".to_string(), sea_query::Values(vec![])),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(end, None);
    }

    #[test]
    fn import_rejects_inverted_dates_without_writing() {
        let db = open_in_memory().unwrap();
        let mut bad = doc(Some("2030-03-01"));
        bad.tracks.clear();
        assert!(import_events(&db, &bad).is_err());
        let tracks: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tracks, 0);
    }
}
