use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{conversion_err, fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::{Patient, PatientUpdate};

/// Insert a patient record.
pub fn insert_patient(conn: &Connection, p: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, age, sex, room, weight_kg, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            p.id.to_string(),
            p.name,
            p.age,
            p.sex,
            p.room,
            p.weight_kg,
            p.notes,
            fmt_ts(&p.created_at),
        ],
    )?;
    Ok(())
}

/// Get a patient by id.
pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, age, sex, room, weight_kg, notes, created_at
         FROM patients WHERE id = ?1",
        params![id.to_string()],
        row_to_patient,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// List all patients, oldest first.
pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, age, sex, room, weight_kg, notes, created_at
         FROM patients ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([], row_to_patient)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Apply a partial update to patient details. Fields left `None` in the
/// update are preserved.
pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    update: &PatientUpdate,
) -> Result<Patient, DatabaseError> {
    let mut patient = get_patient(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "patient".into(),
        id: id.to_string(),
    })?;

    if let Some(age) = update.age {
        patient.age = Some(age);
    }
    if let Some(ref sex) = update.sex {
        patient.sex = Some(sex.clone());
    }
    if let Some(ref room) = update.room {
        patient.room = Some(room.clone());
    }
    if let Some(weight) = update.weight_kg {
        patient.weight_kg = Some(weight);
    }
    if let Some(ref notes) = update.notes {
        patient.notes = Some(notes.clone());
    }

    conn.execute(
        "UPDATE patients SET age = ?2, sex = ?3, room = ?4, weight_kg = ?5, notes = ?6
         WHERE id = ?1",
        params![
            id.to_string(),
            patient.age,
            patient.sex,
            patient.room,
            patient.weight_kg,
            patient.notes,
        ],
    )?;
    Ok(patient)
}

fn row_to_patient(row: &rusqlite::Row) -> Result<Patient, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(7)?;

    Ok(Patient {
        id: Uuid::parse_str(&id_str).map_err(|e| conversion_err(0, e))?,
        name: row.get(1)?,
        age: row.get(2)?,
        sex: row.get(3)?,
        room: row.get(4)?,
        weight_kg: row.get(5)?,
        notes: row.get(6)?,
        created_at: parse_ts(&created_str).map_err(|e| conversion_err(7, e))?,
    })
}
