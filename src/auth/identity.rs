use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to every region
    Master,
    /// Access limited to one region
    Regional,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" => Some(Role::Master),
            "regional" | "daerah" => Some(Role::Regional),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Regional => write!(f, "regional"),
        }
    }
}

/// An authenticated administrator.
///
/// A regional identity always carries its region code; a master identity never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    username: String,
    role: Role,
    region_code: Option<String>,
}

impl Identity {
    pub fn master(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: Role::Master,
            region_code: None,
        }
    }

    pub fn regional(username: impl Into<String>, region_code: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: Role::Regional,
            region_code: Some(region_code.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    /// Region this identity is confined to; `None` for master
    pub fn scope(&self) -> Option<&str> {
        self.region_code.as_deref()
    }

    /// Whether records of `region_code` are visible and editable
    pub fn can_access(&self, region_code: &str) -> bool {
        match self.scope() {
            None => true,
            Some(own) => own == region_code,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region_code {
            Some(code) => write!(f, "{} ({}, {})", self.username, self.role, code),
            None => write!(f, "{} ({})", self.username, self.role),
        }
    }
}
