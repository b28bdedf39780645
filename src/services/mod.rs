pub mod email_service;
pub mod otp_service;
pub mod registration_service;
pub mod session_service;
pub mod token_service;
pub mod user_id;

pub use email_service::{create_email_service, EmailService, MockEmailService, SmtpEmailService};
pub use otp_service::{OtpService, OTP_TTL_MINUTES};
pub use registration_service::{
    RegisterRequest, RegistrationReceipt, RegistrationService, VerifiedAccount,
    PENDING_TTL_MINUTES,
};
pub use session_service::{AuthContext, LoginResult, SessionService, SESSION_TTL_MINUTES};
pub use token_service::{Claims, TokenService};
pub use user_id::IdAllocator;
