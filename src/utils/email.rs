use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::env;

/// SMTP settings, read once when the service is constructed
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

impl SmtpConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.zoho.com".to_string()),
            port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "465".to_string())
                .parse()
                .map_err(|_| "SMTP_PORT must be a valid number")?,
            username: env::var("SMTP_USERNAME").map_err(|_| "SMTP_USERNAME is required")?,
            password: env::var("SMTP_PASSWORD").map_err(|_| "SMTP_PASSWORD is required")?,
            from_email: env::var("SMTP_FROM_EMAIL").map_err(|_| "SMTP_FROM_EMAIL is required")?,
            from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Inkpost".to_string()),
        })
    }
}

/// Transactional mail over SMTP. The transport and sender mailbox are built
/// once; lettre pools connections across sends.
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    pub fn new() -> Result<Self, String> {
        Self::with_config(SmtpConfig::from_env()?)
    }

    pub fn with_config(config: SmtpConfig) -> Result<Self, String> {
        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| format!("Invalid sender address: {}", e))?;

        // Implicit TLS on port 465 (SMTPS)
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
            .credentials(Credentials::new(config.username, config.password))
            .port(config.port)
            .build();

        Ok(Self { transport, from })
    }

    /// Send a plain text email
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), String> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to_email
                .parse()
                .map_err(|e| format!("Invalid recipient address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| format!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {}", e))?;

        Ok(())
    }

    /// Send the email-verification code required for sign up
    pub async fn send_verification_email(&self, to_email: &str, code: &str) -> Result<(), String> {
        let body = format!(
            "Welcome to Inkpost!\n\n\
            Use this code to finish creating your account: {}\n\n\
            It expires in 10 minutes. If you didn't sign up for Inkpost, you \
            can ignore this message.",
            code
        );

        self.send_email(to_email, "Your Inkpost verification code", &body)
            .await
    }

    /// Send a password reset code
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        code: &str,
    ) -> Result<(), String> {
        let body = format!(
            "A password reset was requested for your Inkpost account.\n\n\
            Your reset code: {}\n\n\
            It expires in 10 minutes. If this wasn't you, your password is \
            unchanged and you can ignore this message.",
            code
        );

        self.send_email(to_email, "Reset your Inkpost password", &body)
            .await
    }
}
