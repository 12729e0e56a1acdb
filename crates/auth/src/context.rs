//! Authorization context for authenticated actors

use uuid::Uuid;

use crate::types::{Actor, ActorRole};

/// Represents an authenticated request context
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub actor: Actor,
}

impl AuthContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn actor_id(&self) -> Uuid {
        self.actor.id
    }

    pub fn is_admin(&self) -> bool {
        self.actor.role.is_admin()
    }

    /// Whether the actor may act on a record owned by `owner_id`
    pub fn owns(&self, owner_id: Uuid) -> bool {
        self.actor.id == owner_id
    }

    /// Build a context directly, for tests and internal callers
    pub fn for_actor(id: Uuid, role: ActorRole) -> Self {
        Self::new(Actor {
            id,
            role,
            email: None,
        })
    }
}
