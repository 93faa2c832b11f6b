use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// Identity performing a lifecycle transition. Resolved by the
/// authentication collaborator; the core only inspects the role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role,
        }
    }
}
