use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What an OTP code is allowed to be spent on. Codes never cross purposes: a
/// verification code cannot reset a password and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    Verify,
    Reset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Verify => "verify",
            OtpPurpose::Reset => "reset",
        }
    }
}

impl FromStr for OtpPurpose {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify" => Ok(OtpPurpose::Verify),
            "reset" => Ok(OtpPurpose::Reset),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored one-time passcode. Single-use: deleted on the first successful
/// match, expires 10 minutes after creation otherwise.
#[derive(Debug, Clone)]
pub struct OtpCode {
    pub email: String,
    pub code: String,
    pub purpose: OtpPurpose,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
