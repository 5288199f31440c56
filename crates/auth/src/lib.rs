//! `sabueso-auth`: authentication/authorization boundary and user accounts.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, RoleDefinition, authorize, role_allows, role_definitions};
pub use claims::{Hs256TokenCodec, JwtValidator, SessionClaims, TokenError, validate_claims};
pub use password::{PasswordError, hash_password, verify_password};
pub use permissions::Action;
pub use principal::Principal;
pub use roles::Role;
pub use user::{Address, Credentials, NewUser, Registration, User, UserUpdate, VerificationToken};
