use async_trait::async_trait;
use lettre::{
    transport::smtp::authentication::Credentials, AsyncSmtpTransport, AsyncTransport, Message,
    Tokio1Executor,
};
use std::env;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_otp_email(&self, to_email: &str, code: &str) -> Result<(), EmailError>;
    async fn send_password_reset_email(&self, to_email: &str, code: &str)
        -> Result<(), EmailError>;
}

/// Logs instead of sending. Used when SMTP is not configured and in tests.
pub struct MockEmailService;

impl MockEmailService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockEmailService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_otp_email(&self, to_email: &str, code: &str) -> Result<(), EmailError> {
        tracing::info!("[MOCK EMAIL] Verification code to: {}", to_email);
        tracing::info!("   Subject: Patient Portal - Email Verification");
        tracing::info!("   Code: {}", code);
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        code: &str,
    ) -> Result<(), EmailError> {
        tracing::info!("[MOCK EMAIL] Password reset code to: {}", to_email);
        tracing::info!("   Subject: Patient Portal - Password Reset");
        tracing::info!("   Code: {}", code);
        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl SmtpEmailService {
    pub fn new() -> Result<Self, EmailError> {
        let smtp_host = env::var("SMTP_HOST")
            .map_err(|_| EmailError::ConfigError("SMTP_HOST not set".to_string()))?;
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| EmailError::ConfigError("Invalid SMTP_PORT".to_string()))?;
        let smtp_username = env::var("SMTP_USERNAME")
            .map_err(|_| EmailError::ConfigError("SMTP_USERNAME not set".to_string()))?;
        let smtp_password = env::var("SMTP_PASSWORD")
            .map_err(|_| EmailError::ConfigError("SMTP_PASSWORD not set".to_string()))?;
        let from_email = env::var("SMTP_FROM_EMAIL")
            .map_err(|_| EmailError::ConfigError("SMTP_FROM_EMAIL not set".to_string()))?;
        let from_name =
            env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Patient Portal".to_string());

        let credentials = Credentials::new(smtp_username, smtp_password);

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_host)
            .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
            .port(smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_email,
            from_name,
        })
    }

    async fn send(&self, to_email: &str, subject: &str, body: String) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| {
                        EmailError::MessageBuild(format!("Invalid from address: {}", e))
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .body(body)
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_otp_email(&self, to_email: &str, code: &str) -> Result<(), EmailError> {
        let body = format!(
            "Dear Patient,\n\n\
             Your verification code is: {code}\n\n\
             This code will expire in 10 minutes.\n\
             Please do not share this code with anyone.\n\n\
             Best regards,\n\
             Patient Portal Team\n"
        );

        self.send(to_email, "Patient Portal - Email Verification", body)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        code: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "Dear Patient,\n\n\
             Your password reset code is: {code}\n\n\
             This code will expire in 10 minutes.\n\
             If you did not request this password reset, please ignore this email.\n\n\
             Best regards,\n\
             Patient Portal Team\n"
        );

        self.send(to_email, "Patient Portal - Password Reset", body)
            .await
    }
}

pub fn create_email_service() -> Box<dyn EmailService> {
    if env::var("SMTP_HOST").is_ok() {
        match SmtpEmailService::new() {
            Ok(service) => {
                tracing::info!("Using SMTP email service");
                Box::new(service)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP email service: {}. Falling back to mock service",
                    e
                );
                Box::new(MockEmailService::new())
            }
        }
    } else {
        tracing::info!(
            "SMTP not configured. Using mock email service (codes will be logged to console)"
        );
        Box::new(MockEmailService::new())
    }
}
