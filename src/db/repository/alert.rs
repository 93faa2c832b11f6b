use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{conversion_err, fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::{Alert, AlertState, RuleId, Severity};

/// Insert a freshly created alert.
pub fn insert_alert(conn: &Connection, a: &Alert) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO alerts (id, patient_id, rule, severity, state, message, sample_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            a.id.to_string(),
            a.patient_id.to_string(),
            a.rule.as_str(),
            a.severity.as_str(),
            a.state.as_str(),
            a.message,
            a.sample_id.to_string(),
            fmt_ts(&a.created_at),
        ],
    )?;
    Ok(())
}

/// Get an alert by id.
pub fn get_alert(conn: &Connection, id: &Uuid) -> Result<Option<Alert>, DatabaseError> {
    conn.query_row(
        &format!("{SELECT_ALERT} WHERE id = ?1"),
        params![id.to_string()],
        row_to_alert,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// The active (open or escalated) alert for a (patient, rule) pair, if one
/// exists. The engine's dedup invariant guarantees at most one row.
pub fn find_active_alert(
    conn: &Connection,
    patient_id: &Uuid,
    rule: RuleId,
) -> Result<Option<Alert>, DatabaseError> {
    conn.query_row(
        &format!("{SELECT_ALERT} WHERE patient_id = ?1 AND rule = ?2 AND state IN ('open', 'escalated')"),
        params![patient_id.to_string(), rule.as_str()],
        row_to_alert,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Refresh the triggering-sample reference, message, and severity of an
/// absorbed candidate onto its active alert. The engine decides the
/// severity to write (upgrades only).
pub fn refresh_alert_trigger(
    conn: &Connection,
    id: &Uuid,
    sample_id: &Uuid,
    message: &str,
    severity: Severity,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE alerts SET sample_id = ?2, message = ?3, severity = ?4
         WHERE id = ?1 AND state IN ('open', 'escalated')",
        params![
            id.to_string(),
            sample_id.to_string(),
            message,
            severity.as_str()
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "active alert".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Compare-and-swap an alert from `from` to `to`, stamping the transition
/// audit fields. Returns false when the row was not in `from` anymore —
/// i.e. a concurrent transition won the race.
pub fn cas_transition(
    conn: &Connection,
    id: &Uuid,
    from: AlertState,
    to: AlertState,
    actor_id: &Uuid,
    at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let sql = match to {
        AlertState::Escalated => {
            "UPDATE alerts SET state = ?2, escalated_at = ?4, escalated_by = ?5
             WHERE id = ?1 AND state = ?3"
        }
        AlertState::Reviewed => {
            "UPDATE alerts SET state = ?2, reviewed_at = ?4, reviewed_by = ?5
             WHERE id = ?1 AND state = ?3"
        }
        AlertState::Closed => {
            "UPDATE alerts SET state = ?2, closed_at = ?4, closed_by = ?5
             WHERE id = ?1 AND state = ?3"
        }
        AlertState::Open => {
            return Err(DatabaseError::ConstraintViolation(
                "open is the initial state, not a transition target".into(),
            ))
        }
    };
    let affected = conn.execute(
        sql,
        params![
            id.to_string(),
            to.as_str(),
            from.as_str(),
            fmt_ts(at),
            actor_id.to_string(),
        ],
    )?;
    Ok(affected == 1)
}

/// List alerts, newest first, constrained to the given states and
/// optionally to one patient. An empty state list yields no rows.
pub fn list_alerts(
    conn: &Connection,
    patient_id: Option<&Uuid>,
    states: &[AlertState],
) -> Result<Vec<Alert>, DatabaseError> {
    if states.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = states
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let alerts = match patient_id {
        Some(pid) => {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_ALERT} WHERE patient_id = ?1 AND state IN ({placeholders})
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![pid.to_string()], row_to_alert)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_ALERT} WHERE state IN ({placeholders}) ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], row_to_alert)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(alerts)
}

const SELECT_ALERT: &str = "SELECT id, patient_id, rule, severity, state, message, sample_id,
        created_at, escalated_at, escalated_by, reviewed_at, reviewed_by, closed_at, closed_by
 FROM alerts";

fn row_to_alert(row: &rusqlite::Row) -> Result<Alert, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let patient_str: String = row.get(1)?;
    let rule_str: String = row.get(2)?;
    let severity_str: String = row.get(3)?;
    let state_str: String = row.get(4)?;
    let sample_str: String = row.get(6)?;
    let created_str: String = row.get(7)?;

    Ok(Alert {
        id: Uuid::parse_str(&id_str).map_err(|e| conversion_err(0, e))?,
        patient_id: Uuid::parse_str(&patient_str).map_err(|e| conversion_err(1, e))?,
        rule: RuleId::from_str(&rule_str).map_err(|e| conversion_err(2, e))?,
        severity: Severity::from_str(&severity_str).map_err(|e| conversion_err(3, e))?,
        state: AlertState::from_str(&state_str).map_err(|e| conversion_err(4, e))?,
        message: row.get(5)?,
        sample_id: Uuid::parse_str(&sample_str).map_err(|e| conversion_err(6, e))?,
        created_at: parse_ts(&created_str).map_err(|e| conversion_err(7, e))?,
        escalated_at: opt_ts(row, 8)?,
        escalated_by: opt_uuid(row, 9)?,
        reviewed_at: opt_ts(row, 10)?,
        reviewed_by: opt_uuid(row, 11)?,
        closed_at: opt_ts(row, 12)?,
        closed_by: opt_uuid(row, 13)?,
    })
}

fn opt_ts(row: &rusqlite::Row, idx: usize) -> Result<Option<NaiveDateTime>, rusqlite::Error> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(s) => Ok(Some(parse_ts(&s).map_err(|e| conversion_err(idx, e))?)),
        None => Ok(None),
    }
}

fn opt_uuid(row: &rusqlite::Row, idx: usize) -> Result<Option<Uuid>, rusqlite::Error> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(s) => Ok(Some(Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e))?)),
        None => Ok(None),
    }
}
