//! Summary rendering and delivery.

use crate::config::SmtpConfig;
use crate::error::EmailError;
use crate::summary::Summary;
use chrono::{Datelike, Local};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{debug, info};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Subject line used for every summary message.
pub const SUBJECT: &str = "Your Account Summary";

/// Renders and delivers account summaries.
pub trait EmailService: Send + Sync {
    /// Renders `summary` into an HTML body.
    fn render(&self, summary: &Summary) -> Result<String, EmailError> {
        render_summary(summary)
    }

    /// Delivers an already rendered body to `recipient`.
    fn send(&self, recipient: &str, body: &str) -> Result<(), EmailError>;
}

/// Renders the HTML summary email.
pub fn render_summary(summary: &Summary) -> Result<String, EmailError> {
    let mut html = String::new();

    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html>")?;
    writeln!(html, "<head><meta charset=\"UTF-8\"><title>{}</title></head>", SUBJECT)?;
    writeln!(html, "<body>")?;
    writeln!(html, "<h1>Your Monthly Snapshot</h1>")?;
    writeln!(html, "<div class=\"balance-section\">")?;
    writeln!(html, "  <div class=\"balance-label\">Total balance</div>")?;
    writeln!(
        html,
        "  <div class=\"balance-amount\">${}</div>",
        summary.total_balance().to_fixed(2)
    )?;
    writeln!(html, "</div>")?;

    if summary.has_transactions() {
        writeln!(html, "<div class=\"section\">")?;
        writeln!(html, "  <h2>Monthly transactions</h2>")?;
        for (month, count) in summary.monthly_transactions() {
            writeln!(
                html,
                "  <div class=\"transaction-item\">Number of transactions in {}: <strong>{}</strong></div>",
                month, count
            )?;
        }
        for (month, amount) in summary.monthly_credits() {
            writeln!(
                html,
                "  <div class=\"transaction-item\">Credits in {}: <span class=\"credit\">+${}</span></div>",
                month,
                amount.to_fixed(2)
            )?;
        }
        for (month, amount) in summary.monthly_debits() {
            writeln!(
                html,
                "  <div class=\"transaction-item\">Debits in {}: <span class=\"debit\">-${}</span></div>",
                month,
                amount.to_fixed(2)
            )?;
        }
        writeln!(html, "</div>")?;

        writeln!(html, "<div class=\"section\">")?;
        writeln!(html, "  <h2>Average transaction values</h2>")?;
        let credit = summary.average_credit();
        let debit = summary.average_debit();
        if !credit.is_zero() {
            writeln!(
                html,
                "  <div class=\"average-item\">Average credit amount: <span class=\"credit\">+${}</span></div>",
                credit.to_fixed(2)
            )?;
        }
        if !debit.is_zero() {
            writeln!(
                html,
                "  <div class=\"average-item\">Average debit amount: <span class=\"debit\">-${}</span></div>",
                debit.to_fixed(2)
            )?;
        }
        if credit.is_zero() && debit.is_zero() {
            writeln!(
                html,
                "  <div class=\"average-item\">No credit or debit transactions this period.</div>"
            )?;
        }
        writeln!(html, "</div>")?;
    } else {
        writeln!(
            html,
            "<div class=\"no-transactions\">There were no transactions in the processed file.</div>"
        )?;
    }

    writeln!(
        html,
        "<div class=\"footer\">This is an automated message. &copy; {}</div>",
        Local::now().year()
    )?;
    writeln!(html, "</body>")?;
    writeln!(html, "</html>")?;

    Ok(html)
}

/// Delivers messages by writing them into an outbox directory.
///
/// Each message becomes one `.eml` file with the usual MIME headers, ready
/// for a relay to pick up.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    outbox: PathBuf,
    from: String,
}

impl OutboxMailer {
    pub fn new(outbox: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        OutboxMailer {
            outbox: outbox.into(),
            from: from.into(),
        }
    }

    fn message(&self, recipient: &str, body: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{}",
            self.from, recipient, SUBJECT, body
        )
    }
}

impl EmailService for OutboxMailer {
    fn send(&self, recipient: &str, body: &str) -> Result<(), EmailError> {
        if recipient.trim().is_empty() || !recipient.contains('@') {
            return Err(EmailError::DeliveryFailed(format!(
                "invalid recipient {:?}",
                recipient
            )));
        }

        fs::create_dir_all(&self.outbox).map_err(|e| {
            EmailError::DeliveryFailed(format!("creating outbox {}: {}", self.outbox.display(), e))
        })?;

        let file_name = format!(
            "{}-{}.eml",
            Local::now().format("%Y%m%dT%H%M%S%.6f"),
            safe_file_stem(recipient)
        );
        let path = self.outbox.join(file_name);
        debug!("Writing message for {} to {}", recipient, path.display());

        fs::write(&path, self.message(recipient, body)).map_err(|e| {
            EmailError::DeliveryFailed(format!("writing {}: {}", path.display(), e))
        })?;

        info!("Summary queued for {} at {}", recipient, path.display());
        Ok(())
    }
}

/// Delivers messages through an SMTP relay.
///
/// The connection is plain SMTP to the configured host and port; TLS, if
/// needed, is expected to be handled by a local relay. Credentials are sent
/// only when both username and password are configured.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, EmailError> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| EmailError::DeliveryFailed(format!("invalid sender {:?}: {}", from, e)))?;

        let mut builder = SmtpTransport::builder_dangerous(config.host.as_str())
            .port(config.port)
            .timeout(Some(SMTP_TIMEOUT));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!("Delivering summaries via SMTP {}:{}", config.host, config.port);
        Ok(SmtpMailer {
            transport: builder.build(),
            from,
        })
    }

    fn message(&self, recipient: &str, body: &str) -> Result<Message, EmailError> {
        let to = recipient.parse::<Mailbox>().map_err(|e| {
            EmailError::DeliveryFailed(format!("invalid recipient {:?}: {}", recipient, e))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| EmailError::DeliveryFailed(format!("building message: {}", e)))
    }
}

impl EmailService for SmtpMailer {
    fn send(&self, recipient: &str, body: &str) -> Result<(), EmailError> {
        let message = self.message(recipient, body)?;
        debug!("Sending summary to {} over SMTP", recipient);

        self.transport
            .send(&message)
            .map_err(|e| EmailError::DeliveryFailed(e.to_string()))?;

        info!("Summary sent to {}", recipient);
        Ok(())
    }
}

fn safe_file_stem(recipient: &str) -> String {
    recipient
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '@' || c == '.' { c } else { '_' })
        .collect()
}
