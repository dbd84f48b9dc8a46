//! SMTP delivery of the rendered briefing.
//!
//! The message is `multipart/mixed`: a `multipart/alternative` body (plain
//! text and HTML) followed by the PDF report as an attachment. Sending is
//! retried with exponential backoff; permanent SMTP failures (bad
//! credentials, rejected recipients) are not retried.

use crate::config::EmailConfig;
use crate::models::Briefing;
use crate::outputs::{OutputError, html, pdf, text};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration as StdDuration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("missing email configuration: {}", .0.join(", "))]
    MissingSettings(Vec<&'static str>),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("cannot build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("cannot render attachment: {0}")]
    Render(#[from] OutputError),

    #[error("invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Fully resolved delivery settings.
#[derive(Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    pub recipients: Vec<String>,
    pub password: String,
    pub max_attempts: usize,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("sender", &self.sender)
            .field("recipients", &self.recipients)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl EmailSettings {
    /// Merge the config file with environment variables.
    ///
    /// `SENDER_EMAIL` and `RECIPIENT_EMAIL` (comma separated) fill in what the
    /// file leaves out; the password comes from `SMTP_PASSWORD` or
    /// `GMAIL_APP_PASSWORD`. Every missing setting is reported at once.
    pub fn resolve(
        config: &EmailConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DeliveryError> {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let sender = non_empty(config.sender.clone()).or_else(|| non_empty(env("SENDER_EMAIL")));
        let mut recipients: Vec<String> = config
            .recipients
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if recipients.is_empty() {
            recipients = env("RECIPIENT_EMAIL")
                .unwrap_or_default()
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }
        let password =
            non_empty(env("SMTP_PASSWORD")).or_else(|| non_empty(env("GMAIL_APP_PASSWORD")));

        let mut missing = Vec::new();
        if recipients.is_empty() {
            missing.push("RECIPIENT_EMAIL");
        }
        if sender.is_none() {
            missing.push("SENDER_EMAIL");
        }
        if password.is_none() {
            missing.push("SMTP_PASSWORD");
        }
        match (sender, password) {
            (Some(sender), Some(password)) if missing.is_empty() => Ok(Self {
                smtp_host: config.smtp_host.clone(),
                smtp_port: config.smtp_port,
                sender,
                recipients,
                password,
                max_attempts: config.max_attempts.max(1),
            }),
            _ => Err(DeliveryError::MissingSettings(missing)),
        }
    }
}

pub fn subject(briefing: &Briefing) -> String {
    format!("{} | {}", html::TITLE, briefing.date_range.display())
}

pub fn attachment_name(briefing: &Briefing) -> String {
    format!(
        "AI-Tech-Briefing-{}.pdf",
        briefing.date_range.end.format("%Y-%m-%d")
    )
}

/// Build the MIME message for `briefing`.
pub fn build_message(settings: &EmailSettings, briefing: &Briefing) -> Result<Message, DeliveryError> {
    let from: Mailbox = format!("AI News Briefing <{}>", settings.sender).parse()?;
    let mut builder = Message::builder().from(from).subject(subject(briefing));
    for recipient in &settings.recipients {
        builder = builder.to(recipient.parse()?);
    }

    let body = MultiPart::alternative()
        .singlepart(SinglePart::plain(text::render_text(briefing)))
        .singlepart(SinglePart::html(html::render_html(briefing)));
    let report = pdf::render_pdf(briefing).map_err(OutputError::from)?;
    let attachment = Attachment::new(attachment_name(briefing))
        .body(report, ContentType::parse("application/pdf")?);

    Ok(builder.multipart(MultiPart::mixed().multipart(body).singlepart(attachment))?)
}

/// Run `op` up to `max_attempts` times with exponential backoff.
///
/// Stops early on errors for which `is_permanent` is true.
pub async fn with_retry<T, E, F, Fut>(
    max_attempts: usize,
    base_delay: StdDuration,
    is_permanent: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_permanent(&e) || attempt >= max_attempts => {
                error!(attempt, max = max_attempts, error = %e, "Giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = base_delay.saturating_mul(1u32 << (attempt - 1).min(16));
                warn!(attempt, max = max_attempts, ?delay, error = %e, "Attempt failed; retrying");
                sleep(delay).await;
            }
        }
    }
}

/// Sends briefings over SMTP with implicit TLS.
pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    settings: EmailSettings,
}

impl EmailSender {
    pub fn new(settings: EmailSettings) -> Result<Self, DeliveryError> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self { mailer, settings })
    }

    #[instrument(level = "info", skip_all, fields(recipients = self.settings.recipients.len()))]
    pub async fn send_briefing(&self, briefing: &Briefing) -> Result<(), DeliveryError> {
        let message = build_message(&self.settings, briefing)?;
        with_retry(
            self.settings.max_attempts,
            StdDuration::from_secs(2),
            |e: &lettre::transport::smtp::Error| e.is_permanent(),
            || self.mailer.send(message.clone()),
        )
        .await?;
        info!(subject = %subject(briefing), "Briefing email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::tests::sample_briefing;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    fn settings() -> EmailSettings {
        EmailSettings::resolve(
            &EmailConfig::default(),
            env(&[
                ("SENDER_EMAIL", "bot@example.com"),
                ("RECIPIENT_EMAIL", "a@example.com, b@example.com"),
                ("SMTP_PASSWORD", "app-password"),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_from_env() {
        let s = settings();
        assert_eq!(s.sender, "bot@example.com");
        assert_eq!(s.recipients, vec!["a@example.com", "b@example.com"]);
        assert_eq!(s.smtp_host, "smtp.gmail.com");
        assert!(!format!("{s:?}").contains("app-password"));
    }

    #[test]
    fn test_config_file_wins_over_env() {
        let config = EmailConfig {
            sender: Some("file@example.com".into()),
            recipients: vec!["team@example.com".into()],
            ..EmailConfig::default()
        };
        let s = EmailSettings::resolve(
            &config,
            env(&[
                ("SENDER_EMAIL", "env@example.com"),
                ("GMAIL_APP_PASSWORD", "pw"),
            ]),
        )
        .unwrap();
        assert_eq!(s.sender, "file@example.com");
        assert_eq!(s.recipients, vec!["team@example.com"]);
        assert_eq!(s.password, "pw");
    }

    #[test]
    fn test_missing_settings_are_all_named() {
        let err = EmailSettings::resolve(&EmailConfig::default(), env(&[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing email configuration: RECIPIENT_EMAIL, SENDER_EMAIL, SMTP_PASSWORD"
        );
    }

    #[test]
    fn test_message_layout() {
        let briefing = sample_briefing();
        let message = build_message(&settings(), &briefing).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("AI-Tech-Briefing-2026-10-16.pdf"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("To: a@example.com, b@example.com"));
    }

    #[test]
    fn test_bad_address_is_rejected() {
        let mut s = settings();
        s.recipients = vec!["not an address".into()];
        assert!(matches!(
            build_message(&s, &sample_briefing()),
            Err(DeliveryError::Address(_))
        ));
    }

    #[derive(Debug)]
    struct FakeError {
        permanent: bool,
    }

    impl Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake (permanent: {})", self.permanent)
        }
    }

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let out = with_retry(
            3,
            StdDuration::from_millis(1),
            |e: &FakeError| e.permanent,
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FakeError { permanent: false })
                } else {
                    Ok("sent")
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(out, "sent");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_permanent_error() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let res: Result<(), FakeError> = with_retry(
            3,
            StdDuration::from_millis(1),
            |e: &FakeError| e.permanent,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError { permanent: true })
            },
        )
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let res: Result<(), FakeError> = with_retry(
            3,
            StdDuration::from_millis(1),
            |e: &FakeError| e.permanent,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError { permanent: false })
            },
        )
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
