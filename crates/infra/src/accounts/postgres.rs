//! Postgres-backed user directory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Row};
use tracing::instrument;

use sabueso_auth::{Address, Credentials, NewUser, Role, User, UserUpdate, VerificationToken};
use sabueso_core::{DomainError, UserId};

use super::{UserDirectory, hash_optional};
use crate::error::{StoreError, map_sqlx_error};

const USER_COLUMNS: &str =
    "id, username, email, phone_number, role_id, email_verified_at, created_at";

#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: Arc<PgPool>,
}

impl PostgresUserDirectory {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    #[instrument(skip(self), err)]
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;

        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        let mut users = rows.iter().map(decode_user).collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<i64> = users.iter().map(|u| u.id.get()).collect();
        let mut addresses = load_addresses(&mut *conn, &ids).await?;
        for user in &mut users {
            user.addresses = addresses.remove(&user.id.get()).unwrap_or_default();
        }
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        fetch_user(&mut *conn, id).await
    }

    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email.trim().to_lowercase())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_email", e))?;
        row.as_ref().map(decode_user).transpose()
    }

    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.normalized()?;
        let password_hash = hash_optional(user.password.as_deref())?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (username, email, phone_number, password_hash, role_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&password_hash)
        .bind(user.role.id())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        decode_user(&row)
    }

    #[instrument(skip(self, update), fields(user_id = %id), err)]
    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, StoreError> {
        let update = update.normalized()?;
        let password_hash = hash_optional(update.password.as_deref())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_user", e))?;
        if exists.is_none() {
            return Err(DomainError::not_found("user").into());
        }

        if update.touches_user_row() {
            sqlx::query(
                r#"
                UPDATE users SET
                    username = COALESCE($2, username),
                    email = CASE WHEN $3::boolean THEN $4::text ELSE email END,
                    phone_number = CASE WHEN $5::boolean THEN $6::text ELSE phone_number END,
                    role_id = COALESCE($7, role_id),
                    password_hash = COALESCE($8, password_hash)
                WHERE id = $1
                "#,
            )
            .bind(id.get())
            .bind(&update.username)
            .bind(update.email.is_some())
            .bind(update.email.clone().flatten())
            .bind(update.phone_number.is_some())
            .bind(update.phone_number.clone().flatten())
            .bind(update.role.map(|r| r.id()))
            .bind(&password_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;
        }

        if let Some(addresses) = &update.addresses {
            sqlx::query("DELETE FROM user_addresses WHERE user_id = $1")
                .bind(id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_addresses", e))?;
            sqlx::query(
                "INSERT INTO user_addresses (user_id, address) SELECT $1, unnest($2::text[])",
            )
            .bind(id.get())
            .bind(addresses)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_addresses", e))?;
        }

        let user = fetch_user(&mut *tx, id).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError> {
        let row = sqlx::query(
            "SELECT id, role_id, email_verified_at, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("credentials", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let decode = |e| map_sqlx_error("decode_credentials", e);
        let verified_at: Option<DateTime<Utc>> = row.try_get("email_verified_at").map_err(decode)?;
        Ok(Some(Credentials {
            user_id: UserId::from_raw(row.try_get("id").map_err(decode)?),
            role: decode_role(row.try_get("role_id").map_err(decode)?)?,
            email_verified: verified_at.is_some(),
            password_hash: row.try_get("password_hash").map_err(decode)?,
        }))
    }

    #[instrument(skip(self, token), fields(identifier = %token.identifier), err)]
    async fn replace_verification_token(&self, token: VerificationToken) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("DELETE FROM verification_tokens WHERE identifier = $1")
            .bind(&token.identifier)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_tokens", e))?;
        sqlx::query(
            "INSERT INTO verification_tokens (identifier, token, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&token.identifier)
        .bind(&token.token)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_token", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip_all, err)]
    async fn find_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let row = sqlx::query(
            "SELECT identifier, token, expires_at FROM verification_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_token", e))?;

        row.map(|row| -> Result<VerificationToken, sqlx::Error> {
            Ok(VerificationToken {
                identifier: row.try_get("identifier")?,
                token: row.try_get("token")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
        .map_err(|e| map_sqlx_error("decode_token", e))
    }

    #[instrument(skip_all, err)]
    async fn delete_verification_token(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM verification_tokens WHERE token = $1")
            .bind(token)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_token", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE users SET email_verified_at = $2 WHERE email = $1")
            .bind(email)
            .bind(at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_email_verified", e))?;
        if updated.rows_affected() == 0 {
            return Err(DomainError::not_found("user").into());
        }
        Ok(())
    }
}

async fn fetch_user(conn: &mut PgConnection, id: UserId) -> Result<User, StoreError> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get_user", e))?
        .ok_or(DomainError::not_found("user"))?;
    let mut user = decode_user(&row)?;
    user.addresses = load_addresses(conn, &[id.get()])
        .await?
        .remove(&id.get())
        .unwrap_or_default();
    Ok(user)
}

async fn load_addresses(
    conn: &mut PgConnection,
    user_ids: &[i64],
) -> Result<HashMap<i64, Vec<Address>>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, address, created_at
        FROM user_addresses
        WHERE user_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(user_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_addresses", e))?;

    let mut by_user: HashMap<i64, Vec<Address>> = HashMap::new();
    for row in &rows {
        let decode = |e| map_sqlx_error("decode_address", e);
        let user_id: i64 = row.try_get("user_id").map_err(decode)?;
        by_user.entry(user_id).or_default().push(Address {
            id: row.try_get("id").map_err(decode)?,
            address: row.try_get("address").map_err(decode)?,
            created_at: row.try_get("created_at").map_err(decode)?,
        });
    }
    Ok(by_user)
}

fn decode_role(role_id: i32) -> Result<Role, StoreError> {
    Role::from_id(role_id).map_err(|e| StoreError::storage(format!("corrupt role id: {e}")))
}

fn decode_user(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let row = UserRow::from_row(row).map_err(|e| map_sqlx_error("decode_user", e))?;
    Ok(User {
        id: UserId::from_raw(row.id),
        username: row.username,
        email: row.email,
        phone_number: row.phone_number,
        role: decode_role(row.role_id)?,
        email_verified_at: row.email_verified_at,
        created_at: row.created_at,
        addresses: Vec::new(),
    })
}

// SQLx row types

#[derive(Debug)]
struct UserRow {
    id: i64,
    username: String,
    email: Option<String>,
    phone_number: Option<String>,
    role_id: i32,
    email_verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            phone_number: row.try_get("phone_number")?,
            role_id: row.try_get("role_id")?,
            email_verified_at: row.try_get("email_verified_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
