//! Outbound mail over SMTP submission (STARTTLS).

use crate::config::SmtpConfig;
use crate::error::{Error, Result};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// Compose a plain-text UTF-8 message.
///
/// # Errors
///
/// Returns [`Error::Send`] if either address does not parse.
pub fn build_message(from: &str, to: &str, subject: &str, body: &str) -> Result<Message> {
    Message::builder()
        .from(
            from.parse()
                .map_err(|e| Error::Send(format!("Invalid from address {from}: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| Error::Send(format!("Invalid to address {to}: {e}")))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| Error::Send(format!("Failed to build email: {e}")))
}

/// Sends mail through the configured SMTP relay.
pub struct Mailer {
    from: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl Mailer {
    /// Build a mailer for `config`. No connection is made until
    /// [`Mailer::send`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Send`] if the relay's TLS parameters cannot be
    /// built.
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let builder = if config.accept_invalid_certs {
            let tls = TlsParameters::builder(config.host.clone())
                .dangerous_accept_invalid_certs(true)
                .build_rustls()
                .map_err(|e| Error::Send(format!("SMTP TLS error: {e}")))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .tls(Tls::Required(tls))
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| Error::Send(format!("SMTP STARTTLS error: {e}")))?
        };

        let transport = builder
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            from: config.from.clone(),
            transport,
        })
    }

    /// Send one plain-text message from the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Send`] for a bad recipient or any transport
    /// failure. Nothing is retried.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = build_message(&self.from, to, subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Send(format!("SMTP send error: {e}")))?;
        info!("Sent message to {}", to);
        Ok(())
    }
}
