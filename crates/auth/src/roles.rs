use core::str::FromStr;

use serde::{Deserialize, Serialize};

use sabueso_core::DomainError;

/// Role held by a back-office user.
///
/// The set is closed: the policy in [`crate::authorize`] maps each role to the
/// actions it may perform. Roles are persisted by their numeric id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(rename = "depositmanager")]
    DepositManager,
    Customer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::DepositManager, Role::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::DepositManager => "depositmanager",
            Role::Customer => "customer",
        }
    }

    /// Stable numeric id (the `roles` table key).
    pub fn id(&self) -> i32 {
        match self {
            Role::Admin => 1,
            Role::DepositManager => 2,
            Role::Customer => 3,
        }
    }

    pub fn from_id(id: i32) -> Result<Self, DomainError> {
        Role::ALL
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| DomainError::validation(format!("unknown role id {id}")))
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "depositmanager" => Ok(Role::DepositManager),
            "customer" => Ok(Role::Customer),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_for_every_role() {
        for role in Role::ALL {
            assert_eq!(Role::from_id(role.id()).unwrap(), role);
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!(Role::from_id(99).is_err());
    }

    #[test]
    fn serializes_with_session_claim_names() {
        let json = serde_json::to_string(&Role::DepositManager).unwrap();
        assert_eq!(json, "\"depositmanager\"");
    }
}
