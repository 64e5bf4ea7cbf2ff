use async_trait::async_trait;
use tracing::{debug, info};

/// A password-reset link addressed to one user.
#[derive(Debug, Clone)]
pub struct PasswordResetMail {
    pub to: String,
    pub name: String,
    pub token: String,
    pub url: String,
}

impl PasswordResetMail {
    pub fn subject(&self) -> &'static str {
        "Reset your password"
    }

    pub fn body(&self) -> String {
        format!(
            "Hello {},\n\nUse the link below to choose a new password:\n\n{}\n\n\
             If you did not ask for a reset, ignore this message.\n",
            self.name, self.url
        )
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, mail: &PasswordResetMail) -> anyhow::Result<()>;
}

/// Writes outgoing mail to the log instead of a relay. The body, which
/// contains the reset link, only appears at debug level.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, mail: &PasswordResetMail) -> anyhow::Result<()> {
        info!(from = %self.from, to = %mail.to, subject = mail.subject(), "mail queued");
        debug!(to = %mail.to, body = %mail.body(), "mail body");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Keeps every message so tests can read the mailed token.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<PasswordResetMail>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<PasswordResetMail> {
            self.sent.lock().clone()
        }

        pub fn last_token(&self) -> Option<String> {
            self.sent.lock().last().map(|m| m.token.clone())
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_password_reset(&self, mail: &PasswordResetMail) -> anyhow::Result<()> {
            self.sent.lock().push(mail.clone());
            Ok(())
        }
    }

    pub struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send_password_reset(&self, _mail: &PasswordResetMail) -> anyhow::Result<()> {
            anyhow::bail!("smtp relay refused connection")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_accepts() {
        let mail = PasswordResetMail {
            to: "ada@x.com".into(),
            name: "Ada".into(),
            token: "abc".into(),
            url: "http://localhost/reset-password?token=abc".into(),
        };
        assert!(mail.body().contains(&mail.url));
        LogMailer::new("no-reply@localhost")
            .send_password_reset(&mail)
            .await
            .unwrap();
    }
}
