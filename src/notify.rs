use anyhow::{Context, Result};
use chrono::NaiveDate;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::EmailConfig;

pub fn subject(generated_on: NaiveDate) -> String {
    format!("Grade report for {generated_on}")
}

pub fn build_message(config: &EmailConfig, generated_on: NaiveDate, report: &str) -> Result<Message> {
    Message::builder()
        .from(config.from.parse::<Mailbox>().context("EMAIL_FROM is not a valid mailbox")?)
        .to(config.to.parse::<Mailbox>().context("EMAIL_TO is not a valid mailbox")?)
        .subject(subject(generated_on))
        .header(ContentType::TEXT_PLAIN)
        .body(report.to_string())
        .context("Failed to build report email")
}

pub async fn send_report(config: &EmailConfig, generated_on: NaiveDate, report: &str) -> Result<()> {
    let message = build_message(config, generated_on, report)?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        .with_context(|| format!("Failed to set up SMTP relay {}", config.smtp_host))?
        .credentials(Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        ))
        .build();

    transport
        .send(message)
        .await
        .context("Failed to send report email")?;

    info!(to = %config.to, "report emailed");
    Ok(())
}
