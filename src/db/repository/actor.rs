use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::conversion_err;
use crate::db::DatabaseError;
use crate::models::{Actor, Role};

/// Register an actor (care staff member).
pub fn insert_actor(conn: &Connection, actor: &Actor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO actors (id, name, role) VALUES (?1, ?2, ?3)",
        params![actor.id.to_string(), actor.name, actor.role.as_str()],
    )?;
    Ok(())
}

/// Resolve an actor id to an `Actor`. The hook the authentication
/// collaborator uses to turn a request credential into an identity.
pub fn get_actor(conn: &Connection, id: &Uuid) -> Result<Option<Actor>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, role FROM actors WHERE id = ?1",
        params![id.to_string()],
        row_to_actor,
    )
    .optional()
    .map_err(DatabaseError::from)
}

fn row_to_actor(row: &rusqlite::Row) -> Result<Actor, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let role_str: String = row.get(2)?;

    Ok(Actor {
        id: Uuid::parse_str(&id_str).map_err(|e| conversion_err(0, e))?,
        name: row.get(1)?,
        role: Role::from_str(&role_str).map_err(|e| conversion_err(2, e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn resolve_round_trip() {
        let conn = open_memory_database().unwrap();
        let nurse = Actor::new("Joy", Role::Nurse);
        insert_actor(&conn, &nurse).unwrap();

        let resolved = get_actor(&conn, &nurse.id).unwrap().unwrap();
        assert_eq!(resolved.name, "Joy");
        assert_eq!(resolved.role, Role::Nurse);
    }

    #[test]
    fn unknown_credential_resolves_to_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_actor(&conn, &Uuid::new_v4()).unwrap().is_none());
    }
}
