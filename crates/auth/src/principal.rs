use serde::{Deserialize, Serialize};

use sabueso_core::UserId;

use crate::Role;

/// A fully resolved principal for authorization decisions.
///
/// Built from verified session claims; construction is decoupled from
/// transport and storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub email_verified: bool,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role, email_verified: bool) -> Self {
        Self {
            user_id,
            role,
            email_verified,
        }
    }
}
