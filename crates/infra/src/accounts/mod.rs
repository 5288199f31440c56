//! User directory and account flows (registration, email verification,
//! login).

pub mod in_memory;
pub mod postgres;
pub mod service;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sabueso_auth::{Credentials, NewUser, User, UserUpdate, VerificationToken, hash_password};
use sabueso_core::UserId;

use crate::error::StoreError;

pub use in_memory::InMemoryUserDirectory;
pub use postgres::PostgresUserDirectory;
pub use service::AccountService;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All users ordered by id, with their addresses.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn get_user(&self, id: UserId) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. A plain-text password is hashed before it is stored.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Apply a partial update. `addresses`, when present, replace the whole
    /// list in the same transaction as the user row update.
    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, StoreError>;

    async fn credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError>;

    /// Store `token`, dropping any earlier token for the same identifier.
    async fn replace_verification_token(&self, token: VerificationToken) -> Result<(), StoreError>;

    async fn find_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError>;

    async fn delete_verification_token(&self, token: &str) -> Result<(), StoreError>;

    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

pub(crate) fn hash_optional(password: Option<&str>) -> Result<Option<String>, StoreError> {
    password
        .map(hash_password)
        .transpose()
        .map_err(|e| StoreError::storage(e.to_string()))
}
