use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{conversion_err, fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::VitalSample;

/// Append a vital sample. The (patient_id, recorded_at) unique index makes
/// duplicate timestamps a constraint violation rather than a silent insert.
pub fn insert_sample(conn: &Connection, s: &VitalSample) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO vital_samples (id, patient_id, recorded_at, heart_rate, temperature, spo2)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            s.id.to_string(),
            s.patient_id.to_string(),
            fmt_ts(&s.recorded_at),
            s.heart_rate,
            s.temperature,
            s.spo2,
        ],
    )?;
    Ok(())
}

/// Most recent sample for a patient.
pub fn latest_sample(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<VitalSample>, DatabaseError> {
    conn.query_row(
        "SELECT id, patient_id, recorded_at, heart_rate, temperature, spo2
         FROM vital_samples WHERE patient_id = ?1
         ORDER BY recorded_at DESC LIMIT 1",
        params![patient_id.to_string()],
        row_to_sample,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Timestamp of the last stored sample for a patient, if any. Used for the
/// strictly-increasing ingest check.
pub fn last_recorded_at(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<NaiveDateTime>, DatabaseError> {
    let ts: Option<String> = conn
        .query_row(
            "SELECT MAX(recorded_at) FROM vital_samples WHERE patient_id = ?1",
            params![patient_id.to_string()],
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    match ts {
        Some(s) => Ok(Some(parse_ts(&s).map_err(|e| conversion_err(0, e))?)),
        None => Ok(None),
    }
}

/// Samples for a patient, most-recent-first, capped at `limit`.
pub fn samples_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
    limit: usize,
) -> Result<Vec<VitalSample>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, recorded_at, heart_rate, temperature, spo2
         FROM vital_samples WHERE patient_id = ?1
         ORDER BY recorded_at DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string(), limit as i64], row_to_sample)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Samples recorded at or after `since`, most-recent-first. The recent
/// window for rule evaluation and risk scoring.
pub fn samples_since(
    conn: &Connection,
    patient_id: &Uuid,
    since: &NaiveDateTime,
) -> Result<Vec<VitalSample>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, recorded_at, heart_rate, temperature, spo2
         FROM vital_samples WHERE patient_id = ?1 AND recorded_at >= ?2
         ORDER BY recorded_at DESC",
    )?;
    let rows = stmt.query_map(
        params![patient_id.to_string(), fmt_ts(since)],
        row_to_sample,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Samples recorded in `[since, until]`, most-recent-first. Used by as-of
/// queries, where samples recorded after the as-of instant must not leak
/// into the window.
pub fn samples_between(
    conn: &Connection,
    patient_id: &Uuid,
    since: &NaiveDateTime,
    until: &NaiveDateTime,
) -> Result<Vec<VitalSample>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, recorded_at, heart_rate, temperature, spo2
         FROM vital_samples
         WHERE patient_id = ?1 AND recorded_at >= ?2 AND recorded_at <= ?3
         ORDER BY recorded_at DESC",
    )?;
    let rows = stmt.query_map(
        params![patient_id.to_string(), fmt_ts(since), fmt_ts(until)],
        row_to_sample,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Evict samples older than `cutoff` for a patient. Returns how many rows
/// were removed.
pub fn evict_samples_before(
    conn: &Connection,
    patient_id: &Uuid,
    cutoff: &NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM vital_samples WHERE patient_id = ?1 AND recorded_at < ?2",
        params![patient_id.to_string(), fmt_ts(cutoff)],
    )?;
    Ok(affected)
}

fn row_to_sample(row: &rusqlite::Row) -> Result<VitalSample, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let patient_str: String = row.get(1)?;
    let recorded_str: String = row.get(2)?;

    Ok(VitalSample {
        id: Uuid::parse_str(&id_str).map_err(|e| conversion_err(0, e))?,
        patient_id: Uuid::parse_str(&patient_str).map_err(|e| conversion_err(1, e))?,
        recorded_at: parse_ts(&recorded_str).map_err(|e| conversion_err(2, e))?,
        heart_rate: row.get(3)?,
        temperature: row.get(4)?,
        spo2: row.get(5)?,
    })
}
