use comanda_auth::{PrincipalId, Role};
use comanda_core::{ActorId, RestaurantId};

/// Restaurant scope for a request.
///
/// Immutable; derived from the token and required for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RestaurantContext {
    restaurant_id: RestaurantId,
}

impl RestaurantContext {
    pub fn new(restaurant_id: RestaurantId) -> Self {
        Self { restaurant_id }
    }

    pub fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }
}

/// Acting identity for a request (staff member or table session + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl ActorContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self {
            principal_id,
            roles,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn actor_id(&self) -> ActorId {
        ActorId::from_uuid(*self.principal_id.as_uuid())
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
