use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sabueso_auth::{Address, Credentials, NewUser, User, UserUpdate, VerificationToken};
use sabueso_core::{DomainError, UserId};

use super::{UserDirectory, hash_optional};
use crate::error::StoreError;
use crate::memory::{InMemoryDatabase, Tables, UserRecord};

/// In-memory user directory. Intended for tests/dev.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    db: InMemoryDatabase,
}

impl InMemoryUserDirectory {
    pub fn new(db: InMemoryDatabase) -> Self {
        Self { db }
    }
}

/// Username, email and phone number are each unique across users.
fn ensure_unique(
    tables: &Tables,
    except: Option<UserId>,
    username: Option<&str>,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<(), StoreError> {
    for record in tables.users.values() {
        let u = &record.user;
        if Some(u.id) == except {
            continue;
        }
        if username.is_some() && username == Some(u.username.as_str()) {
            return Err(DomainError::conflict("username already exists").into());
        }
        if email.is_some() && email == u.email.as_deref() {
            return Err(DomainError::conflict("email already exists").into());
        }
        if phone_number.is_some() && phone_number == u.phone_number.as_deref() {
            return Err(DomainError::conflict("phone_number already exists").into());
        }
    }
    Ok(())
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.db.lock()?;
        Ok(tables.users.values().map(|r| r.user.clone()).collect())
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let tables = self.db.lock()?;
        tables
            .users
            .get(&id.get())
            .map(|r| r.user.clone())
            .ok_or_else(|| DomainError::not_found("user").into())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.trim().to_lowercase();
        let tables = self.db.lock()?;
        Ok(tables
            .users
            .values()
            .find(|r| r.user.email.as_deref() == Some(email.as_str()))
            .map(|r| r.user.clone()))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.normalized()?;
        let password_hash = hash_optional(user.password.as_deref())?;

        let mut tables = self.db.lock()?;
        ensure_unique(
            &tables,
            None,
            Some(&user.username),
            user.email.as_deref(),
            user.phone_number.as_deref(),
        )?;

        let id = tables.next_user_id();
        let created = User {
            id,
            username: user.username,
            email: user.email,
            phone_number: user.phone_number,
            role: user.role,
            email_verified_at: None,
            created_at: Utc::now(),
            addresses: Vec::new(),
        };
        tables.users.insert(
            id.get(),
            UserRecord {
                user: created.clone(),
                password_hash,
            },
        );
        Ok(created)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, StoreError> {
        let update = update.normalized()?;
        let password_hash = hash_optional(update.password.as_deref())?;

        let mut tables = self.db.lock()?;
        if !tables.users.contains_key(&id.get()) {
            return Err(DomainError::not_found("user").into());
        }
        ensure_unique(
            &tables,
            Some(id),
            update.username.as_deref(),
            update.email.as_ref().and_then(|e| e.as_deref()),
            update.phone_number.as_ref().and_then(|p| p.as_deref()),
        )?;

        let now = Utc::now();
        let addresses = match &update.addresses {
            Some(list) => {
                let mut fresh = Vec::with_capacity(list.len());
                for address in list {
                    fresh.push(Address {
                        id: tables.next_address_id(),
                        address: address.clone(),
                        created_at: now,
                    });
                }
                Some(fresh)
            }
            None => None,
        };

        let record = tables
            .users
            .get_mut(&id.get())
            .ok_or(DomainError::not_found("user"))?;
        let user = &mut record.user;
        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(phone) = update.phone_number {
            user.phone_number = phone;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(addresses) = addresses {
            user.addresses = addresses;
        }
        if password_hash.is_some() {
            record.password_hash = password_hash;
        }
        Ok(record.user.clone())
    }

    async fn credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError> {
        let tables = self.db.lock()?;
        Ok(tables
            .users
            .values()
            .find(|r| r.user.username == username)
            .map(|r| Credentials {
                user_id: r.user.id,
                role: r.user.role,
                email_verified: r.user.email_verified(),
                password_hash: r.password_hash.clone(),
            }))
    }

    async fn replace_verification_token(&self, token: VerificationToken) -> Result<(), StoreError> {
        let mut tables = self.db.lock()?;
        tables.tokens.retain(|t| t.identifier != token.identifier);
        tables.tokens.push(token);
        Ok(())
    }

    async fn find_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let tables = self.db.lock()?;
        Ok(tables.tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn delete_verification_token(&self, token: &str) -> Result<(), StoreError> {
        let mut tables = self.db.lock()?;
        tables.tokens.retain(|t| t.token != token);
        Ok(())
    }

    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.db.lock()?;
        let record = tables
            .users
            .values_mut()
            .find(|r| r.user.email.as_deref() == Some(email))
            .ok_or(DomainError::not_found("user"))?;
        record.user.email_verified_at = Some(at);
        Ok(())
    }
}
