// src/models/user.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What an authenticated user may do. Accounts themselves live in the
/// identity service; this crate only sees the role claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Takes exams.
    Student,
    /// Authors exams and owns their results.
    Examiner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Examiner => "examiner",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "examiner" => Ok(Role::Examiner),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Identity resolved from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub role: Role,
}
