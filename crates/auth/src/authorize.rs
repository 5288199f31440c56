use serde::Serialize;
use thiserror::Error;

use crate::{Action, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// No (valid) session was presented.
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: role '{role}' may not perform '{action}'")]
    Forbidden { role: Role, action: Action },

    #[error("email address not verified")]
    EmailNotVerified,
}

/// Role → action policy table.
///
/// - No IO
/// - No panics
pub fn role_allows(role: Role, action: Action) -> bool {
    match role {
        Role::Admin => true,
        Role::DepositManager => matches!(
            action,
            Action::StockAdjust | Action::StockRead | Action::ProductsRead | Action::ProductsWrite
        ),
        Role::Customer => matches!(action, Action::ProductsRead),
    }
}

/// Authorize a principal for one action.
///
/// The role check runs first so that a principal lacking the role always gets
/// a permission error, regardless of verification state.
pub fn authorize(principal: &Principal, action: Action) -> Result<(), AuthzError> {
    if !role_allows(principal.role, action) {
        return Err(AuthzError::Forbidden {
            role: principal.role,
            action,
        });
    }
    if action.requires_verified_email() && !principal.email_verified {
        return Err(AuthzError::EmailNotVerified);
    }
    Ok(())
}

/// Role definition with its granted actions (for `GET /roles`).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub id: i32,
    pub name: &'static str,
    pub description: &'static str,
    pub actions: Vec<&'static str>,
}

pub fn role_definitions() -> Vec<RoleDefinition> {
    Role::ALL
        .into_iter()
        .map(|role| RoleDefinition {
            id: role.id(),
            name: role.as_str(),
            description: role_description(role),
            actions: Action::ALL
                .into_iter()
                .filter(|a| role_allows(role, *a))
                .map(|a| a.as_str())
                .collect(),
        })
        .collect()
}

fn role_description(role: Role) -> &'static str {
    match role {
        Role::Admin => "Full back-office access, including user administration",
        Role::DepositManager => "Warehouse staff: catalog maintenance and stock movements",
        Role::Customer => "Storefront customer with catalog read access",
    }
}
