//! API-side authorization guard for commands.
//!
//! Enforces permissions at the command boundary (before dispatch), keeping
//! domain aggregates and infra auth-agnostic.

use comanda_auth::{
    AuthzError, CommandAuthorization, Permission, Principal, RestaurantMembership, Role, authorize,
};

use crate::context::{ActorContext, RestaurantContext};

/// Check authorization for a command in the current request context.
///
/// Intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    restaurant: &RestaurantContext,
    actor: &ActorContext,
    command: &C,
) -> Result<(), AuthzError> {
    let membership = RestaurantMembership {
        restaurant_id: restaurant.restaurant_id(),
        roles: actor.roles().to_vec(),
        permissions: permissions_from_roles(actor.roles()),
    };

    let principal = Principal {
        principal_id: actor.principal_id(),
        active_restaurant_id: restaurant.restaurant_id(),
        membership,
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Role→permission policy table.
///
/// Static by convention until a real policy source exists: managers get
/// everything, staff roles get their working set, and anonymous
/// table-session tokens can only browse, keep a cart and submit it.
fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    let mut perms = Vec::new();

    for role in roles {
        match role.as_str() {
            "manager" => return vec![Permission::new("*")],
            "waiter" => perms.extend(
                [
                    "menu.read",
                    "stock.read",
                    "stock.adjust",
                    "cart.manage",
                    "orders.create",
                    "orders.read",
                    "orders.transition",
                ]
                .map(Permission::new),
            ),
            "kitchen" => {
                perms.extend(["menu.read", "orders.read", "orders.transition"].map(Permission::new))
            }
            "table-session" => perms.extend(
                ["menu.read", "stock.read", "cart.manage", "orders.create"].map(Permission::new),
            ),
            _ => {}
        }
    }

    perms
}
