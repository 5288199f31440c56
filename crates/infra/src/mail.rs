//! Outgoing mail seam.
//!
//! Delivery is an external collaborator. [`LogMailer`] logs each message
//! instead of sending it and keeps nothing.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn verification(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verificá tu email".to_string(),
            body: format!("Para activar tu cuenta en Sr. Sabueso abrí este enlace:\n\n{link}\n"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Stateless mailer that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, "mail queued (log only)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_accepts_mail_without_retaining_it() {
        let mailer = LogMailer;
        for n in 0..3 {
            let mail = OutgoingMail::verification(
                &format!("c{n}@x.com"),
                "http://sabueso.test/verify-email?token=t",
            );
            mailer.send(mail).await.unwrap();
        }
        assert_eq!(std::mem::size_of::<LogMailer>(), 0);
    }

    #[test]
    fn verification_mail_carries_the_link() {
        let mail = OutgoingMail::verification("c@x.com", "http://sabueso.test/verify-email?token=t");
        assert_eq!(mail.to, "c@x.com");
        assert!(mail.body.contains("http://sabueso.test/verify-email?token=t"));
    }
}
