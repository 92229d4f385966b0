use crate::config::{EMAIL_CONFIG_FILE, read_key_values};
use crate::error::Error;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::path::Path;

const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
const DEFAULT_SUBJECT: &str = "[drop_watch] changes detected";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub recipient: String,
    pub subject: String,
}

impl EmailConfig {
    #[must_use]
    pub fn load(config_dir: &Path) -> Option<Self> {
        let map = read_key_values(&config_dir.join(EMAIL_CONFIG_FILE))?;

        Some(EmailConfig {
            smtp_server: map
                .get("SMTP_SERVER")
                .cloned()
                .unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
            smtp_user: map.get("SMTP_USER")?.clone(),
            smtp_pass: map.get("SMTP_PASS")?.clone(),
            recipient: map.get("RECIPIENT_EMAIL")?.clone(),
            subject: map
                .get("SUBJECT")
                .cloned()
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        })
    }
}

pub fn send_alert(subject: &str, body: &str, config: &EmailConfig) -> Result<(), Error> {
    let from_addr = config
        .smtp_user
        .parse::<Mailbox>()
        .map_err(|e| Error::Email(format!("invalid sender address: {e}")))?;
    let to_addr = config
        .recipient
        .parse::<Mailbox>()
        .map_err(|e| Error::Email(format!("invalid recipient address: {e}")))?;

    let email = Message::builder()
        .from(from_addr)
        .to(to_addr)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| Error::Email(format!("failed to build message: {e}")))?;

    let creds = Credentials::new(config.smtp_user.clone(), config.smtp_pass.clone());

    // smtps, port 465
    let mailer = SmtpTransport::relay(&config.smtp_server)
        .map_err(|e| Error::Email(format!("cannot reach {}: {e}", config.smtp_server)))?
        .credentials(creds)
        .build();

    mailer
        .send(&email)
        .map_err(|e| Error::Email(e.to_string()))?;
    Ok(())
}
