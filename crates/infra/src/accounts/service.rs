use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use sabueso_auth::{Principal, Registration, User, VerificationToken, verify_password};
use sabueso_core::DomainError;

use super::UserDirectory;
use crate::error::StoreError;
use crate::mail::{Mailer, OutgoingMail};

/// Self-service account flows on top of a [`UserDirectory`].
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
    public_base_url: String,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            mailer,
            public_base_url: public_base_url.into(),
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={token}",
            self.public_base_url.trim_end_matches('/')
        )
    }

    /// Create a `customer` account and mail it a verification link.
    ///
    /// A mail failure is logged and does not undo the registration; the user
    /// can ask for the link again.
    pub async fn register(&self, registration: Registration) -> Result<User, StoreError> {
        let new_user = registration.into_new_user()?;
        let email = new_user.email.clone().unwrap_or_default();
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict("email already registered").into());
        }

        let user = self.users.create_user(new_user).await?;
        info!(user_id = %user.id, "customer registered");

        if let Err(e) = self.send_verification(&email, Utc::now()).await {
            warn!(user_id = %user.id, error = %e, "verification mail not sent");
        }
        Ok(user)
    }

    /// Issue a fresh token (replacing any earlier one) and mail it.
    pub async fn resend_verification(&self, email: &str) -> Result<(), StoreError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(DomainError::validation("email is required").into());
        }
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(DomainError::not_found("user"))?;
        if user.email_verified() {
            return Err(DomainError::validation("email already verified").into());
        }
        self.send_verification(&email, Utc::now()).await
    }

    /// Consume a verification token.
    ///
    /// Unknown tokens are rejected; an expired token is deleted and then
    /// rejected.
    pub async fn verify_email(&self, token: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DomainError::validation("token is required").into());
        }
        let Some(stored) = self.users.find_verification_token(token).await? else {
            return Err(DomainError::validation("invalid or expired token").into());
        };
        if stored.is_expired(now) {
            self.users.delete_verification_token(token).await?;
            return Err(DomainError::validation("token has expired").into());
        }

        self.users.mark_email_verified(&stored.identifier, now).await?;
        self.users.delete_verification_token(token).await?;
        info!(identifier = %stored.identifier, "email verified");
        Ok(())
    }

    /// Check a username/password pair.
    ///
    /// Unknown user, missing password and wrong password are indistinguishable
    /// to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Principal, StoreError> {
        let creds = self
            .users
            .credentials(username.trim())
            .await?
            .ok_or(DomainError::Unauthorized)?;
        let Some(hash) = creds.password_hash.as_deref() else {
            return Err(DomainError::Unauthorized.into());
        };
        let matches =
            verify_password(password, hash).map_err(|e| StoreError::storage(e.to_string()))?;
        if !matches {
            return Err(DomainError::Unauthorized.into());
        }
        Ok(Principal::new(creds.user_id, creds.role, creds.email_verified))
    }

    async fn send_verification(&self, email: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let token = VerificationToken::issue(email, now);
        let link = self.verification_link(&token.token);
        self.users.replace_verification_token(token).await?;
        self.mailer
            .send(OutgoingMail::verification(email, &link))
            .await
            .map_err(|e| StoreError::storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use sabueso_auth::Role;

    use super::*;
    use crate::accounts::InMemoryUserDirectory;
    use crate::memory::InMemoryDatabase;
    use crate::test_support::RecordingMailer;

    struct Harness {
        service: AccountService,
        users: Arc<InMemoryUserDirectory>,
        mailer: Arc<RecordingMailer>,
    }

    fn harness() -> Harness {
        let users = Arc::new(InMemoryUserDirectory::new(InMemoryDatabase::new()));
        let mailer = Arc::new(RecordingMailer::default());
        let service = AccountService::new(users.clone(), mailer.clone(), "http://sabueso.test/");
        Harness {
            service,
            users,
            mailer,
        }
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            username: "cliente".to_string(),
            password: "perro1234".to_string(),
        }
    }

    fn token_from_link(body: &str) -> String {
        body.split("token=")
            .nth(1)
            .map(|rest| rest.trim().to_string())
            .unwrap()
    }

    #[tokio::test]
    async fn register_creates_unverified_customer_and_mails_link() {
        let h = harness();
        let user = h.service.register(registration("c@x.com")).await.unwrap();
        assert_eq!(user.role, Role::Customer);
        assert!(!user.email_verified());

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "c@x.com");
        assert!(sent[0].body.contains("http://sabueso.test/verify-email?token="));
    }

    #[tokio::test]
    async fn register_twice_with_same_email_conflicts() {
        let h = harness();
        h.service.register(registration("c@x.com")).await.unwrap();
        let err = h
            .service
            .register(Registration {
                username: "otro".to_string(),
                ..registration("c@x.com")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn verify_marks_user_and_consumes_token() {
        let h = harness();
        let user = h.service.register(registration("c@x.com")).await.unwrap();
        let token = token_from_link(&h.mailer.sent()[0].body);

        h.service.verify_email(&token, Utc::now()).await.unwrap();
        assert!(h.users.get_user(user.id).await.unwrap().email_verified());

        let err = h.service.verify_email(&token, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn expired_token_is_deleted_and_rejected() {
        let h = harness();
        h.service.register(registration("c@x.com")).await.unwrap();
        let token = token_from_link(&h.mailer.sent()[0].body);

        let later = Utc::now() + Duration::hours(25);
        let err = h.service.verify_email(&token, later).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Domain(DomainError::validation("token has expired"))
        );
        assert_eq!(h.users.find_verification_token(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn resend_replaces_previous_token() {
        let h = harness();
        h.service.register(registration("c@x.com")).await.unwrap();
        let first = token_from_link(&h.mailer.sent()[0].body);

        h.service.resend_verification(" C@X.com ").await.unwrap();
        let second = token_from_link(&h.mailer.sent()[1].body);

        assert_ne!(first, second);
        assert_eq!(h.users.find_verification_token(&first).await.unwrap(), None);
        h.service.verify_email(&second, Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let h = harness();
        let user = h.service.register(registration("c@x.com")).await.unwrap();

        let principal = h.service.authenticate("cliente", "perro1234").await.unwrap();
        assert_eq!(principal.user_id, user.id);
        assert_eq!(principal.role, Role::Customer);
        assert!(!principal.email_verified);

        for (username, password) in [("cliente", "wrong-pass"), ("nadie", "perro1234")] {
            let err = h.service.authenticate(username, password).await.unwrap_err();
            assert_eq!(err, StoreError::Domain(DomainError::Unauthorized));
        }
    }
}
