use crate::error::{AuthError, Result};
use crate::models::{Account, OtpPurpose, PendingRegistration, Profile, UserType};
use crate::repositories::{AccountRepository, PendingRepository, RepositoryError};
use crate::services::otp_service::OtpService;
use crate::services::user_id::IdAllocator;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

pub const PENDING_TTL_MINUTES: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: String,
    pub is_pregnant: Option<bool>,
    pub specialization: Option<String>,
}

#[derive(Debug)]
pub struct RegistrationReceipt {
    pub user_id: String,
    pub expires_in_minutes: i64,
}

#[derive(Debug)]
pub struct VerifiedAccount {
    pub user_id: String,
    pub user_type: UserType,
}

/// Two-phase registration: `register` parks the submission as a pending
/// record and emails an OTP; `verify` promotes it to a real account. Nothing
/// reaches the accounts table before a successful OTP check.
pub struct RegistrationService {
    accounts: Arc<dyn AccountRepository>,
    pending: Arc<dyn PendingRepository>,
    allocator: IdAllocator,
    otp_service: Arc<OtpService>,
}

impl RegistrationService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        pending: Arc<dyn PendingRepository>,
        allocator: IdAllocator,
        otp_service: Arc<OtpService>,
    ) -> Self {
        Self {
            accounts,
            pending,
            allocator,
            otp_service,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegistrationReceipt> {
        let user_type: UserType =
            request
                .user_type
                .parse()
                .map_err(|_| AuthError::InvalidArgument {
                    field: "user_type",
                    message: "must be 'patient' or 'doctor'".to_string(),
                })?;
        validate_email(&request.email)?;
        validate_password(&request.password)?;

        let profile = match user_type {
            UserType::Patient => Profile::Patient {
                is_pregnant: request.is_pregnant.unwrap_or(false),
            },
            UserType::Doctor => Profile::Doctor {
                specialization: request.specialization.clone(),
            },
        };

        if let Some(existing) = self
            .accounts
            .find_by_email_or_username(&request.email, &request.username)
            .await?
        {
            let user_type = existing.user_type();
            return Err(AuthError::AlreadyExists {
                user_id: existing.user_id,
                user_type,
                minutes_remaining: None,
            });
        }

        let now = Utc::now();
        if let Some(pending) = self
            .pending
            .find_by_email_or_username(&request.email, &request.username)
            .await?
        {
            if pending.is_expired(now) {
                // Stale submission; clear it and let this one through.
                self.pending.delete_by_user_id(&pending.user_id).await?;
            } else {
                return Err(AuthError::AlreadyExists {
                    user_id: pending.user_id.clone(),
                    user_type: pending.profile.user_type(),
                    minutes_remaining: Some(pending.minutes_remaining(now)),
                });
            }
        }

        let user_id = self.allocator.allocate(user_type).await?;
        let password_hash = hash_password(&request.password)?;

        let pending = PendingRegistration {
            user_id: user_id.clone(),
            username: request.username.clone(),
            email: request.email.clone(),
            mobile: request.mobile,
            password_hash,
            first_name: request.first_name,
            last_name: request.last_name,
            profile,
            created_at: now,
            expires_at: now + Duration::minutes(PENDING_TTL_MINUTES),
        };

        match self.pending.insert(&pending).await {
            Ok(()) => {}
            Err(RepositoryError::AlreadyExists) => {
                // Lost a race with a concurrent submission for the same
                // email or username; report whichever record won.
                return Err(self
                    .conflict_detail(&request.email, &request.username)
                    .await?);
            }
            Err(e) => return Err(e.into()),
        }

        self.otp_service
            .issue(&request.email, OtpPurpose::Verify)
            .await?;

        tracing::info!(user_id, user_type = %user_type, "registration pending verification");
        Ok(RegistrationReceipt {
            user_id,
            expires_in_minutes: PENDING_TTL_MINUTES,
        })
    }

    pub async fn verify(&self, email: &str, code: &str) -> Result<VerifiedAccount> {
        // Checked but not spent yet: a failure further down (expired or
        // admin-deleted pending, lost promotion race) must leave the code
        // valid so the user can retry.
        self.otp_service
            .check(email, code, OtpPurpose::Verify)
            .await?;

        let now = Utc::now();
        let pending = self
            .pending
            .find_live_by_email(email, now)
            .await?
            .ok_or(AuthError::NotFound("pending registration"))?;

        let account = Account {
            user_id: pending.user_id.clone(),
            username: pending.username.clone(),
            email: pending.email.clone(),
            mobile: pending.mobile.clone(),
            password_hash: pending.password_hash.clone(),
            first_name: pending.first_name.clone(),
            last_name: pending.last_name.clone(),
            profile: pending.profile.clone(),
            verified_at: Some(now),
            created_at: now,
        };

        match self.accounts.insert(&account).await {
            Ok(()) => {}
            Err(RepositoryError::AlreadyExists) => {
                // A concurrent verify promoted this registration first.
                return Err(self.conflict_detail(email, &pending.username).await?);
            }
            Err(e) => return Err(e.into()),
        }

        if !self.pending.delete_by_user_id(&pending.user_id).await? {
            tracing::debug!(user_id = pending.user_id, "pending record already removed");
        }

        // The promotion succeeded; only now is the code spent.
        if let Err(e) = self.otp_service.consume(email, code, OtpPurpose::Verify).await {
            tracing::debug!(email, "verification code already gone: {e}");
        }

        tracing::info!(user_id = account.user_id, "account verified");
        let user_type = account.user_type();
        Ok(VerifiedAccount {
            user_id: account.user_id,
            user_type,
        })
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.otp_service.issue(email, OtpPurpose::Reset).await?;
        Ok(())
    }

    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()> {
        validate_password(new_password)?;
        self.otp_service
            .check(email, code, OtpPurpose::Reset)
            .await?;

        let password_hash = hash_password(new_password)?;
        if !self
            .accounts
            .update_password_by_email(email, &password_hash)
            .await?
        {
            // Account vanished between check and update; the code stays
            // valid.
            return Err(AuthError::NotFound("user"));
        }

        if let Err(e) = self.otp_service.consume(email, code, OtpPurpose::Reset).await {
            tracing::debug!(email, "reset code already gone: {e}");
        }

        tracing::info!(email, "password reset completed");
        Ok(())
    }

    /// Resolves a uniqueness conflict into the `AlreadyExists` detail the
    /// caller should see, preferring the account record over a pending one.
    async fn conflict_detail(&self, email: &str, username: &str) -> Result<AuthError> {
        if let Some(account) = self
            .accounts
            .find_by_email_or_username(email, username)
            .await?
        {
            let user_type = account.user_type();
            return Ok(AuthError::AlreadyExists {
                user_id: account.user_id,
                user_type,
                minutes_remaining: None,
            });
        }

        let now = Utc::now();
        if let Some(pending) = self
            .pending
            .find_by_email_or_username(email, username)
            .await?
        {
            return Ok(AuthError::AlreadyExists {
                user_id: pending.user_id.clone(),
                user_type: pending.profile.user_type(),
                minutes_remaining: Some(pending.minutes_remaining(now)),
            });
        }

        Ok(AuthError::Internal(
            "uniqueness conflict with no surviving record".to_string(),
        ))
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))
}

fn validate_email(email: &str) -> Result<()> {
    if !email.contains('@') || email.len() < 3 {
        return Err(AuthError::InvalidArgument {
            field: "email",
            message: "not a valid email address".to_string(),
        });
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AuthError::InvalidArgument {
            field: "password",
            message: "must be at least 8 characters".to_string(),
        });
    }
    Ok(())
}
