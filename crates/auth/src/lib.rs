//! `comanda-auth` — authentication/authorization boundary.
//!
//! Token *issuance* lives elsewhere (the identity collaborator); this crate
//! only validates presented tokens and answers pure policy questions. It is
//! intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{Claims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::{PrincipalId, RestaurantMembership};
pub use roles::Role;
