//! SMTP email provider implementation using lettre.
//!
//! Works against MailHog/Mailpit locally and a TLS relay in production.

use super::{EmailContent, EmailProvider, SentEmail};
use crate::error::{NotificationError, NotificationResult};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse, env_required};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::env;
use tracing::{debug, error, info};

/// SMTP configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Sender email address.
    pub from_email: String,
    /// Sender name.
    pub from_name: String,
    /// SMTP username (optional for dev servers like Mailpit).
    pub username: Option<String>,
    /// SMTP password (optional for dev servers like Mailpit).
    pub password: Option<String>,
    /// Whether to use TLS (false for local dev servers).
    pub use_tls: bool,
}

impl SmtpConfig {
    /// Create a new SMTP configuration.
    pub fn new(host: String, port: u16, from_email: String, from_name: String) -> Self {
        Self {
            host,
            port,
            from_email,
            from_name,
            username: None,
            password: None,
            use_tls: false,
        }
    }

    /// Configuration for MailHog/Mailpit on localhost (default development setup).
    pub fn mailhog() -> Self {
        Self::new(
            "localhost".to_string(),
            1025,
            "noreply@localhost".to_string(),
            "Userhub".to_string(),
        )
    }

    /// Builder method to set TLS.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

/// Reads `SMTP_*` and `EMAIL_FROM_*`, falling back to the MailHog defaults.
///
/// `SMTP_PASSWORD` becomes required once `SMTP_USERNAME` is set.
impl FromEnv for SmtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::mailhog();

        let use_tls = match env::var("SMTP_USE_TLS") {
            Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            Err(_) => defaults.use_tls,
        };

        let username = env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty());
        let password = match username {
            Some(_) => Some(env_required("SMTP_PASSWORD")?),
            None => None,
        };

        Ok(Self {
            host: env_or_default("SMTP_HOST", &defaults.host),
            port: env_parse("SMTP_PORT", defaults.port)?,
            from_email: env_or_default("EMAIL_FROM_ADDRESS", &defaults.from_email),
            from_name: env_or_default("EMAIL_FROM_NAME", &defaults.from_name),
            username,
            password,
            use_tls,
        })
    }
}

/// SMTP email provider.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpProvider {
    /// Create a new SMTP provider.
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self { transport, config })
    }

    /// Create a provider configured for MailHog/Mailpit.
    pub fn mailhog() -> NotificationResult<Self> {
        Self::new(SmtpConfig::mailhog())
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Build the SMTP transport based on configuration.
    fn build_transport(
        config: &SmtpConfig,
    ) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| {
                    NotificationError::ConfigError(format!("Failed to create SMTP relay: {e}"))
                })?
                .port(config.port)
        } else {
            // Plain connection for local dev servers like Mailpit
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    /// Build a lettre Message from EmailContent.
    fn build_message(&self, email: &EmailContent) -> NotificationResult<Message> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| NotificationError::ConfigError(format!("Invalid from address: {e}")))?;

        let to: Mailbox = email
            .to_email
            .parse()
            .map_err(|e| NotificationError::InvalidEmail(format!("{}: {e}", email.to_email)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| {
                NotificationError::MailDelivery(format!("Failed to build email message: {e}"))
            })
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail> {
        debug!(
            to = %email.to_email,
            subject = %email.subject,
            host = %self.config.host,
            port = %self.config.port,
            "Sending email via SMTP"
        );

        let message = self.build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(to = %email.to_email, error = %e, "Failed to send email via SMTP");
            NotificationError::MailDelivery(format!("SMTP send failed: {e}"))
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        info!(
            to = %email.to_email,
            message_id = ?message_id,
            "Email sent via SMTP"
        );

        Ok(SentEmail {
            message_id,
            accepted: response.is_positive(),
        })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| NotificationError::MailDelivery(format!("SMTP health check failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMTP_VARS: [&str; 7] = [
        "SMTP_HOST",
        "SMTP_PORT",
        "SMTP_USERNAME",
        "SMTP_PASSWORD",
        "SMTP_USE_TLS",
        "EMAIL_FROM_ADDRESS",
        "EMAIL_FROM_NAME",
    ];

    #[test]
    fn test_smtp_config_mailhog() {
        let config = SmtpConfig::mailhog();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1025);
        assert!(!config.use_tls);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_smtp_config_with_tls() {
        let config = SmtpConfig::new(
            "smtp.example.com".to_string(),
            587,
            "test@example.com".to_string(),
            "Test".to_string(),
        )
        .with_tls(true)
        .with_credentials("user".to_string(), "pass".to_string());

        assert!(config.use_tls);
        assert_eq!(config.username, Some("user".to_string()));
        assert_eq!(config.password, Some("pass".to_string()));
    }

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars_unset(SMTP_VARS, || {
            let config = SmtpConfig::from_env().unwrap();
            assert_eq!(config, SmtpConfig::mailhog());
        });
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("smtp.example.com")),
                ("SMTP_PORT", Some("587")),
                ("SMTP_USERNAME", Some("mailer")),
                ("SMTP_PASSWORD", Some("secret")),
                ("SMTP_USE_TLS", Some("TRUE")),
                ("EMAIL_FROM_ADDRESS", Some("noreply@example.com")),
                ("EMAIL_FROM_NAME", Some("Example")),
            ],
            || {
                let config = SmtpConfig::from_env().unwrap();
                assert_eq!(config.host, "smtp.example.com");
                assert_eq!(config.port, 587);
                assert_eq!(config.username.as_deref(), Some("mailer"));
                assert_eq!(config.password.as_deref(), Some("secret"));
                assert!(config.use_tls);
                assert_eq!(config.from_email, "noreply@example.com");
                assert_eq!(config.from_name, "Example");
            },
        );
    }

    #[test]
    fn test_from_env_username_requires_password() {
        temp_env::with_vars(
            [("SMTP_USERNAME", Some("mailer")), ("SMTP_PASSWORD", None)],
            || {
                let err = SmtpConfig::from_env().unwrap_err();
                assert!(
                    matches!(err, ConfigError::MissingEnvVar(ref key) if key == "SMTP_PASSWORD")
                );
            },
        );

        // Password alone is ignored
        temp_env::with_vars(
            [("SMTP_USERNAME", None), ("SMTP_PASSWORD", Some("secret"))],
            || {
                let config = SmtpConfig::from_env().unwrap();
                assert!(config.username.is_none());
                assert!(config.password.is_none());
            },
        );
    }

    #[test]
    fn test_from_env_invalid_port() {
        temp_env::with_var("SMTP_PORT", Some("smtp"), || {
            let err = SmtpConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "SMTP_PORT"));
        });
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_recipient() {
        let provider = SmtpProvider::mailhog().unwrap();
        let email = EmailContent {
            to_email: "not an address".to_string(),
            subject: "Account created".to_string(),
            text_body: "Hello!".to_string(),
            html_body: "<p>Hello!</p>".to_string(),
        };

        let result = provider.build_message(&email);
        assert!(matches!(result, Err(NotificationError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_build_message_multipart() {
        let provider = SmtpProvider::mailhog().unwrap();
        let email = EmailContent {
            to_email: "ann@example.com".to_string(),
            subject: "Account created".to_string(),
            text_body: "Hello! Your account has been successfully created.".to_string(),
            html_body: "<p>Hello!</p>".to_string(),
        };

        let message = provider.build_message(&email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Account created"));
        assert!(raw.contains("To: ann@example.com"));
        assert!(raw.contains("multipart/alternative"));
    }
}
