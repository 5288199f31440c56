//! User accounts: directory records, create/update requests, registration and
//! email verification tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sabueso_core::{DomainError, DomainResult, UserId, serde_ext::double_option};

use crate::Role;

/// How long an email verification link stays valid.
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// User as exposed by the directory (never carries the password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub addresses: Vec<Address>,
}

impl User {
    pub fn email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Login material for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: UserId,
    pub role: Role,
    pub email_verified: bool,
    pub password_hash: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Administrative user creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub role: Role,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Plain text; hashed by the directory before it is stored.
    pub password: Option<String>,
}

impl NewUser {
    /// Trim fields, drop blank optionals and validate.
    pub fn normalized(self) -> DomainResult<Self> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(DomainError::validation("username is required"));
        }
        let email = normalize_email(self.email)?;
        Ok(Self {
            username,
            role: self.role,
            email,
            phone_number: non_blank(self.phone_number),
            password: self.password.filter(|p| !p.trim().is_empty()),
        })
    }
}

/// Partial user update. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone_number: Option<Option<String>>,
    pub role: Option<Role>,
    pub password: Option<String>,
    /// Full replacement list of addresses.
    pub addresses: Option<Vec<String>>,
}

impl UserUpdate {
    pub fn normalized(self) -> DomainResult<Self> {
        let username = match self.username {
            Some(u) if u.trim().is_empty() => {
                return Err(DomainError::validation("username cannot be empty"));
            }
            Some(u) => Some(u.trim().to_string()),
            None => None,
        };
        let email = match self.email {
            Some(e) => Some(normalize_email(e)?),
            None => None,
        };
        let update = Self {
            username,
            email,
            phone_number: self.phone_number.map(non_blank),
            role: self.role,
            password: self.password.filter(|p| !p.trim().is_empty()),
            addresses: self.addresses.map(normalize_addresses),
        };
        if update.is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }
        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
            && self.role.is_none()
            && self.password.is_none()
            && self.addresses.is_none()
    }

    /// True when only the address list is being replaced.
    pub fn touches_user_row(&self) -> bool {
        self.username.is_some()
            || self.email.is_some()
            || self.phone_number.is_some()
            || self.role.is_some()
            || self.password.is_some()
    }
}

/// Self-service registration (always creates a `customer`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl Registration {
    pub const MIN_PASSWORD_LEN: usize = 8;

    pub fn into_new_user(self) -> DomainResult<NewUser> {
        if self.email.trim().is_empty() || self.username.trim().is_empty() {
            return Err(DomainError::validation("email, username and password are required"));
        }
        if self.password.chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must have at least {} characters",
                Self::MIN_PASSWORD_LEN
            )));
        }
        NewUser {
            username: self.username,
            role: Role::Customer,
            email: Some(self.email),
            phone_number: None,
            password: Some(self.password),
        }
        .normalized()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Email verification
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    /// Email address being verified.
    pub identifier: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn issue(identifier: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            token: Uuid::new_v4().simple().to_string(),
            expires_at: now + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_email(email: Option<String>) -> DomainResult<Option<String>> {
    match non_blank(email) {
        Some(e) if !e.contains('@') => Err(DomainError::validation("invalid email format")),
        Some(e) => Ok(Some(e.to_lowercase())),
        None => Ok(None),
    }
}

/// Trim, drop blanks and duplicates (first occurrence wins).
fn normalize_addresses(addresses: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(addresses.len());
    for a in addresses {
        let a = a.trim().to_string();
        if !a.is_empty() && !out.contains(&a) {
            out.push(a);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            role: Role::DepositManager,
            email: Some("  Depo@Example.com ".to_string()),
            phone_number: Some("   ".to_string()),
            password: Some("".to_string()),
        }
    }

    #[test]
    fn new_user_is_trimmed_and_blank_optionals_dropped() {
        let u = new_user("  deposito ").normalized().unwrap();
        assert_eq!(u.username, "deposito");
        assert_eq!(u.email.as_deref(), Some("depo@example.com"));
        assert_eq!(u.phone_number, None);
        assert_eq!(u.password, None);
    }

    #[test]
    fn new_user_requires_username() {
        assert!(matches!(
            new_user("  ").normalized(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = UserUpdate::default().normalized().unwrap_err();
        assert_eq!(err, DomainError::validation("no fields to update"));
    }

    #[test]
    fn address_list_is_cleaned() {
        let update = UserUpdate {
            addresses: Some(vec![
                " Av. Siempre Viva 742 ".to_string(),
                "".to_string(),
                "Av. Siempre Viva 742".to_string(),
                "Calle 9".to_string(),
            ]),
            ..Default::default()
        }
        .normalized()
        .unwrap();

        assert_eq!(
            update.addresses.as_deref(),
            Some(&["Av. Siempre Viva 742".to_string(), "Calle 9".to_string()][..])
        );
        assert!(!update.touches_user_row());
    }

    #[test]
    fn clearing_email_is_allowed() {
        let update = UserUpdate {
            email: Some(None),
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(update.email, Some(None));
        assert!(update.touches_user_row());
    }

    #[test]
    fn registration_creates_customer() {
        let u = Registration {
            email: "cliente@example.com".to_string(),
            username: "cliente".to_string(),
            password: "longenough".to_string(),
        }
        .into_new_user()
        .unwrap();
        assert_eq!(u.role, Role::Customer);
        assert_eq!(u.password.as_deref(), Some("longenough"));
    }

    #[test]
    fn registration_rejects_short_password() {
        let err = Registration {
            email: "cliente@example.com".to_string(),
            username: "cliente".to_string(),
            password: "short".to_string(),
        }
        .into_new_user()
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn verification_token_expires_after_ttl() {
        let now = Utc::now();
        let t = VerificationToken::issue("a@b.c", now);
        assert_eq!(t.token.len(), 32);
        assert!(!t.is_expired(now + Duration::hours(23)));
        assert!(t.is_expired(now + Duration::hours(25)));
    }
}
