//! Outbound email: verification links, password resets, welcome mail.

use async_trait::async_trait;
use lettre::message::{MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{error, info};

use crate::services::error::ServiceError;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_email(
        &self,
        to: &str,
        username: &str,
        token: &str,
    ) -> Result<(), ServiceError>;

    async fn send_password_reset_email(
        &self,
        to: &str,
        username: &str,
        token: &str,
    ) -> Result<(), ServiceError>;

    async fn send_welcome_email(&self, to: &str, username: &str) -> Result<(), ServiceError>;
}

/// SMTP-backed provider. The transport is blocking, so sends run on the
/// blocking pool.
#[derive(Clone)]
pub struct SmtpEmailService {
    transport: SmtpTransport,
    from_address: String,
    base_url: String,
}

impl SmtpEmailService {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        smtp_username: &str,
        smtp_password: &str,
        from_address: String,
        base_url: String,
    ) -> Result<Self, anyhow::Error> {
        let mut builder = SmtpTransport::relay(smtp_host)
            .map_err(|e| anyhow::anyhow!("Invalid SMTP relay: {}", e))?
            .port(smtp_port);

        if !smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                smtp_username.to_string(),
                smtp_password.to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from_address,
            base_url,
        })
    }

    async fn send(&self, to: &str, subject: &str, text: String, html: String) -> Result<(), ServiceError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| ServiceError::Email(format!("Invalid from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| ServiceError::Email(format!("Invalid recipient: {}", e)))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )
            .map_err(|e| ServiceError::Email(format!("Failed to build message: {}", e)))?;

        let transport = self.transport.clone();
        let recipient = to.to_string();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| ServiceError::Email(format!("Send task failed: {}", e)))?
            .map_err(|e| {
                error!(recipient = %recipient, "Failed to send email: {}", e);
                ServiceError::Email(format!("SMTP send failed: {}", e))
            })?;

        info!(recipient = %recipient, subject = %subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_verification_email(
        &self,
        to: &str,
        username: &str,
        token: &str,
    ) -> Result<(), ServiceError> {
        let link = format!("{}/auth/verify-email?token={}", self.base_url, token);
        let text = format!(
            "Hi {username},\n\nPlease verify your email address by visiting:\n{link}\n\nThe link expires in 24 hours."
        );
        let html = format!(
            "<p>Hi {username},</p><p>Please verify your email address by clicking \
             <a href=\"{link}\">this link</a>.</p><p>The link expires in 24 hours.</p>"
        );
        self.send(to, "Verify your email address", text, html).await
    }

    async fn send_password_reset_email(
        &self,
        to: &str,
        username: &str,
        token: &str,
    ) -> Result<(), ServiceError> {
        let link = format!("{}/reset-password?token={}", self.base_url, token);
        let text = format!(
            "Hi {username},\n\nA password reset was requested for your account. Visit:\n{link}\n\nThe link expires in 1 hour. If you did not request this, ignore this email."
        );
        let html = format!(
            "<p>Hi {username},</p><p>A password reset was requested for your account. \
             <a href=\"{link}\">Reset your password</a>.</p><p>The link expires in 1 hour. \
             If you did not request this, ignore this email.</p>"
        );
        self.send(to, "Reset your password", text, html).await
    }

    async fn send_welcome_email(&self, to: &str, username: &str) -> Result<(), ServiceError> {
        let text = format!("Hi {username},\n\nYour account is now active. Welcome aboard!");
        let html = format!("<p>Hi {username},</p><p>Your account is now active. Welcome aboard!</p>");
        self.send(to, "Welcome!", text, html).await
    }
}

/// Captures sends instead of delivering them. Test double.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: std::sync::Mutex<Vec<SentEmail>>,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub kind: EmailKind,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
    Welcome,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, email: SentEmail) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("Mock email lock poisoned")))?
            .push(email);
        Ok(())
    }

    pub fn last_token_for(&self, to: &str, kind: EmailKind) -> Option<String> {
        self.sent
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|e| e.to == to && e.kind == kind)
            .and_then(|e| e.token.clone())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_verification_email(
        &self,
        to: &str,
        _username: &str,
        token: &str,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail {
            to: to.to_string(),
            kind: EmailKind::Verification,
            token: Some(token.to_string()),
        })
    }

    async fn send_password_reset_email(
        &self,
        to: &str,
        _username: &str,
        token: &str,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail {
            to: to.to_string(),
            kind: EmailKind::PasswordReset,
            token: Some(token.to_string()),
        })
    }

    async fn send_welcome_email(&self, to: &str, _username: &str) -> Result<(), ServiceError> {
        self.record(SentEmail {
            to: to.to_string(),
            kind: EmailKind::Welcome,
            token: None,
        })
    }
}
