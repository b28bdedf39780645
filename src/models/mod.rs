pub mod account;
pub mod otp;
pub mod pending;
pub mod session;

pub use account::{Account, Profile, UserType};
pub use otp::{OtpCode, OtpPurpose};
pub use pending::{PendingRegistration, PendingSummary};
pub use session::UserSession;
