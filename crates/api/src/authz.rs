//! API-side authorization guard.
//!
//! Handlers call this before validating or executing a request, so a caller
//! without the capability learns nothing about the target resource.

use sabueso_auth::{Action, AuthzError, authorize};

use crate::context::PrincipalContext;

/// Check one action for the current request's principal.
pub fn authorize_action(principal: &PrincipalContext, action: Action) -> Result<(), AuthzError> {
    authorize(principal.principal(), action)
}
