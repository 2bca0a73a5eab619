use uuid::Uuid;

use meerkat_types::api::Claims;
use meerkat_types::models::Role;

/// The authenticated identity performing an action.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl From<&Claims> for Actor {
    fn from(claims: &Claims) -> Self {
        Actor {
            id: claims.sub,
            role: claims.role,
        }
    }
}

/// The single ownership rule applied before every post/reply update or
/// delete: admins may mutate anything, everyone else only their own
/// content. Callers must surface `false` as a Forbidden rejection, never
/// silently skip the operation.
pub fn can_mutate(actor: &Actor, author_id: Uuid) -> bool {
    actor.role == Role::Admin || actor.id == author_id
}
