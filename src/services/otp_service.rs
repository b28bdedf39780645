use crate::error::{AuthError, Result};
use crate::models::{OtpCode, OtpPurpose};
use crate::repositories::{AccountRepository, OtpRepository, PendingRepository};
use crate::services::email_service::EmailService;
use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;

pub const OTP_TTL_MINUTES: i64 = 10;

/// Issues and consumes one-time passcodes for email verification and
/// password reset. Codes are purpose-scoped and single-use.
pub struct OtpService {
    otp_repository: Arc<dyn OtpRepository>,
    account_repository: Arc<dyn AccountRepository>,
    pending_repository: Arc<dyn PendingRepository>,
    email_service: Arc<dyn EmailService>,
}

impl OtpService {
    pub fn new(
        otp_repository: Arc<dyn OtpRepository>,
        account_repository: Arc<dyn AccountRepository>,
        pending_repository: Arc<dyn PendingRepository>,
        email_service: Arc<dyn EmailService>,
    ) -> Self {
        Self {
            otp_repository,
            account_repository,
            pending_repository,
            email_service,
        }
    }

    /// Generates, stores, and emails a fresh code. Outstanding codes of the
    /// same purpose are invalidated first, so only the newest code of a
    /// purpose can ever match. An email transport failure is reported but
    /// does not roll the stored code back; the caller can request a resend
    /// and the code stays valid until expiry.
    pub async fn issue(&self, email: &str, purpose: OtpPurpose) -> Result<String> {
        match purpose {
            OtpPurpose::Reset => {
                if self.account_repository.find_by_email(email).await?.is_none() {
                    return Err(AuthError::NotFound("user"));
                }
            }
            OtpPurpose::Verify => {
                let known = self.account_repository.find_by_email(email).await?.is_some()
                    || self.pending_repository.email_exists(email).await?;
                if !known {
                    return Err(AuthError::NotFound("user"));
                }
            }
        }

        self.otp_repository.delete_by_purpose(email, purpose).await?;

        let code = Self::generate_code();
        let now = Utc::now();
        let otp = OtpCode {
            email: email.to_owned(),
            code: code.clone(),
            purpose,
            created_at: now,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
        };
        self.otp_repository.insert(&otp).await?;

        let sent = match purpose {
            OtpPurpose::Verify => self.email_service.send_otp_email(email, &code).await,
            OtpPurpose::Reset => {
                self.email_service
                    .send_password_reset_email(email, &code)
                    .await
            }
        };

        if let Err(e) = sent {
            tracing::error!(email, purpose = %purpose, "failed to send OTP email: {}", e);
            return Err(AuthError::EmailDelivery(e.to_string()));
        }

        tracing::info!(email, purpose = %purpose, "OTP issued");
        Ok(code)
    }

    /// Checks a code without spending it. Callers that have further steps to
    /// run before the code is truly used (account promotion, password
    /// update) check first and consume only once those steps succeed, so a
    /// failure in between leaves the code valid for a retry.
    pub async fn check(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<()> {
        let found = self
            .otp_repository
            .matches(email, code, purpose, Utc::now())
            .await?;

        if !found {
            return Err(AuthError::InvalidOtp);
        }

        Ok(())
    }

    /// Spends a code. The matching record is deleted in the same store
    /// operation that checks it, so a second consume with the same triple
    /// finds nothing. Missing, expired, and already-consumed codes are
    /// indistinguishable to the caller.
    pub async fn consume(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<()> {
        let consumed = self
            .otp_repository
            .consume(email, code, purpose, Utc::now())
            .await?;

        if !consumed {
            return Err(AuthError::InvalidOtp);
        }

        Ok(())
    }

    fn generate_code() -> String {
        let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{:06}", value)
    }
}
