//! Outbound email transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::auth::verification::CODE_TTL_SECS;
use crate::config::{Config, MailConfig};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("email delivery is not configured")]
    NotConfigured,
    #[error("mail relay unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {status}")]
    Rejected { status: u16 },
}

/// Sends the two kinds of mail the service produces. One call per recipient;
/// each call may fail independently.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_schedule_notice(&self, address: &str, group_code: &str)
        -> Result<(), MailError>;

    async fn send_verification_code(&self, address: &str, code: &str) -> Result<(), MailError>;
}

/// Pick the HTTP relay when mail is configured, otherwise a mailer that
/// fails every send.
pub fn mailer_from_config(config: &Config) -> Arc<dyn Mailer> {
    match &config.mail {
        Some(mail) => match HttpMailer::new(mail.clone()) {
            Ok(mailer) => {
                tracing::info!(api_url = %mail.api_url, "email delivery enabled");
                Arc::new(mailer)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to build mail relay client, email delivery disabled");
                Arc::new(DisabledMailer)
            }
        },
        None => {
            tracing::warn!("MAIL_API_URL/MAIL_API_KEY/MAIL_FROM not set, email delivery disabled");
            Arc::new(DisabledMailer)
        }
    }
}

// ---------------------------------------------------------------------------
// Message bodies
// ---------------------------------------------------------------------------

struct Envelope {
    subject: String,
    text: String,
    html: String,
}

fn schedule_notice(group_code: &str) -> Envelope {
    Envelope {
        subject: format!("Timetable update for group {group_code}"),
        text: format!(
            "Hello,\n\nThe timetable for group {group_code} has changed. \
             Please check the latest version in the timetable app.\n"
        ),
        html: format!(
            "<p>Hello,</p><p>The timetable for group <strong>{group_code}</strong> has changed. \
             Please check the latest version in the timetable app.</p>"
        ),
    }
}

fn verification_code(code: &str) -> Envelope {
    let minutes = CODE_TTL_SECS / 60;
    Envelope {
        subject: "Your verification code".to_string(),
        text: format!(
            "Your verification code is {code}.\nIt is valid for {minutes} minutes.\n"
        ),
        html: format!(
            "<p>Your verification code is <strong>{code}</strong>.</p>\
             <p>It is valid for {minutes} minutes.</p>"
        ),
    }
}

// ---------------------------------------------------------------------------
// HTTP relay
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Upper bound on one relay request, connect through response.
const RELAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts JSON messages to an HTTP mail relay with a bearer key.
pub struct HttpMailer {
    http: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        Self::with_timeout(config, RELAY_TIMEOUT)
    }

    /// Like [`HttpMailer::new`], but every relay request is abandoned after
    /// `timeout`.
    pub fn with_timeout(config: MailConfig, timeout: Duration) -> Result<Self, MailError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    async fn deliver(&self, to: &str, envelope: Envelope) -> Result<(), MailError> {
        let body = RelayMessage {
            from: &self.config.from,
            to,
            subject: &envelope.subject,
            text: &envelope.text,
            html: &envelope.html,
        };

        let resp = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            tracing::warn!(status, %to, "mail relay rejected message");
            return Err(MailError::Rejected { status });
        }

        tracing::debug!(%to, subject = %envelope.subject, "email sent");
        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_schedule_notice(
        &self,
        address: &str,
        group_code: &str,
    ) -> Result<(), MailError> {
        self.deliver(address, schedule_notice(group_code)).await
    }

    async fn send_verification_code(&self, address: &str, code: &str) -> Result<(), MailError> {
        self.deliver(address, verification_code(code)).await
    }
}

// ---------------------------------------------------------------------------
// Disabled
// ---------------------------------------------------------------------------

/// Used when no relay is configured. Every send fails, so callers count it.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_schedule_notice(
        &self,
        address: &str,
        group_code: &str,
    ) -> Result<(), MailError> {
        tracing::warn!(%address, %group_code, "email not configured, schedule notice dropped");
        Err(MailError::NotConfigured)
    }

    async fn send_verification_code(&self, address: &str, _code: &str) -> Result<(), MailError> {
        tracing::warn!(%address, "email not configured, verification code dropped");
        Err(MailError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_notice_names_the_group() {
        let env = schedule_notice("1211A");
        assert!(env.subject.contains("1211A"));
        assert!(env.text.contains("1211A"));
        assert!(env.html.contains("<strong>1211A</strong>"));
    }

    #[test]
    fn verification_mail_states_code_and_validity() {
        let env = verification_code("042917");
        assert!(env.text.contains("042917"));
        assert!(env.text.contains("10 minutes"));
    }

    #[tokio::test]
    async fn disabled_mailer_fails_every_send() {
        let mailer = DisabledMailer;
        assert!(matches!(
            mailer.send_schedule_notice("a@x.edu", "G1").await,
            Err(MailError::NotConfigured)
        ));
        assert!(matches!(
            mailer.send_verification_code("a@x.edu", "123456").await,
            Err(MailError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn hung_relay_times_out() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mailer = HttpMailer::with_timeout(
            MailConfig {
                api_url: format!("http://{addr}/send"),
                api_key: "key".to_string(),
                from: "timetable@x.edu".to_string(),
            },
            Duration::from_millis(200),
        )
        .unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            mailer.send_schedule_notice("a@x.edu", "G1"),
        )
        .await
        .expect("relay request should give up on its own");
        assert!(matches!(result, Err(MailError::Transport(e)) if e.is_timeout()));
    }
}
