use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Patient,
    Doctor,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Patient => "patient",
            UserType::Doctor => "doctor",
        }
    }

    /// Prefix of the public identifier for this user class.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            UserType::Patient => "PAT",
            UserType::Doctor => "DOC",
        }
    }
}

impl FromStr for UserType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(UserType::Patient),
            "doctor" => Ok(UserType::Doctor),
            _ => Err(()),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific attributes, tagged by the user class. Patients and doctors
/// share everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "lowercase")]
pub enum Profile {
    Patient {
        #[serde(default)]
        is_pregnant: bool,
    },
    Doctor {
        specialization: Option<String>,
    },
}

impl Profile {
    pub fn user_type(&self) -> UserType {
        match self {
            Profile::Patient { .. } => UserType::Patient,
            Profile::Doctor { .. } => UserType::Doctor,
        }
    }
}

/// A verified account. Created only by promoting a pending registration;
/// immutable afterwards except for the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub profile: Profile,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn user_type(&self) -> UserType {
        self.profile.user_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_parse() {
        assert_eq!("patient".parse::<UserType>(), Ok(UserType::Patient));
        assert_eq!("doctor".parse::<UserType>(), Ok(UserType::Doctor));
        assert!("nurse".parse::<UserType>().is_err());
        assert!("Patient".parse::<UserType>().is_err());
    }

    #[test]
    fn test_id_prefix() {
        assert_eq!(UserType::Patient.id_prefix(), "PAT");
        assert_eq!(UserType::Doctor.id_prefix(), "DOC");
    }

    #[test]
    fn test_profile_serializes_tag() {
        let profile = Profile::Doctor {
            specialization: Some("cardiology".to_string()),
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["user_type"], "doctor");
        assert_eq!(json["specialization"], "cardiology");
        assert!(json.get("is_pregnant").is_none());
    }
}
