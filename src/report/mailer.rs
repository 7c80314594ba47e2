//! Mails the application record with the CSV attached

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::path::Path;

use super::types::ApplicationRecord;
use crate::utils::config::SmtpConfig;

pub fn subject(record: &ApplicationRecord) -> String {
    match (record.title.is_empty(), record.company.is_empty()) {
        (false, false) => format!("Applied: {} at {}", record.title, record.company),
        (false, true) => format!("Applied: {}", record.title),
        _ => "Applied to a job".to_string(),
    }
}

fn body(record: &ApplicationRecord) -> String {
    let mut body = String::from("Application submitted.\n\n");
    for (label, value) in record.fields() {
        body.push_str(&format!("{}: {}\n", label, value));
    }
    body
}

/// Build the message without sending it
pub fn build_message(
    smtp: &SmtpConfig,
    record: &ApplicationRecord,
    attachment: &Path,
) -> Result<Message> {
    let (Some(from), Some(to)) = (smtp.from.as_deref(), smtp.to.as_deref()) else {
        anyhow::bail!("smtp.from and smtp.to must be set");
    };
    let from: Mailbox = from
        .parse()
        .with_context(|| format!("Invalid sender address: {}", from))?;
    let to: Mailbox = to
        .parse()
        .with_context(|| format!("Invalid recipient address: {}", to))?;

    let content = std::fs::read(attachment)
        .with_context(|| format!("Failed to read attachment: {}", attachment.display()))?;
    let filename = attachment
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "application.csv".to_string());
    let csv_type = ContentType::parse("text/csv").context("Invalid attachment content type")?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(subject(record))
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body(record)))
                .singlepart(Attachment::new(filename).body(content, csv_type)),
        )
        .context("Failed to build report email")?;
    Ok(message)
}

/// Send over STARTTLS, logging in when credentials are set. Blocking.
pub fn send(smtp: &SmtpConfig, record: &ApplicationRecord, attachment: &Path) -> Result<()> {
    let message = build_message(smtp, record, attachment)?;

    let mut transport = SmtpTransport::starttls_relay(&smtp.host)
        .with_context(|| format!("Invalid SMTP host: {}", smtp.host))?
        .port(smtp.port);
    if let (Some(username), Some(password)) = (smtp.username.clone(), smtp.password.clone()) {
        transport = transport.credentials(Credentials::new(username, password));
    }

    transport
        .build()
        .send(&message)
        .with_context(|| format!("Failed to send report via {}:{}", smtp.host, smtp.port))?;
    log::info!("report mailed to {}", smtp.to.as_deref().unwrap_or_default());
    Ok(())
}
