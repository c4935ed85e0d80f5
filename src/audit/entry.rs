use crate::auth::Identity;
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout of the audit file: local wall-clock time, no offset
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Audited actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Login,
    Logout,
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "LOGIN" => Some(Self::Login),
            "LOGOUT" => Some(Self::Logout),
            "CREATE" => Some(Self::Create),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn category(self) -> ActionCategory {
        match self {
            Self::Login | Self::Logout => ActionCategory::Authentication,
            Self::Create | Self::Update | Self::Delete => ActionCategory::DataChange,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse grouping of actions for the log viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Authentication,
    DataChange,
}

impl ActionCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auth" | "authentication" => Some(Self::Authentication),
            "data" | "data_change" | "changes" => Some(Self::DataChange),
            _ => None,
        }
    }
}

/// One line of the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Local time of the host that wrote the entry
    pub timestamp: NaiveDateTime,
    pub username: String,
    pub action: AuditAction,
    pub details: String,
}

impl AuditEntry {
    /// Entry stamped with the current local time, truncated to whole seconds
    pub fn now(identity: &Identity, action: AuditAction, details: impl Into<String>) -> Self {
        Self::at(Local::now().naive_local(), identity.username(), action, details)
    }

    pub fn at(
        timestamp: NaiveDateTime,
        username: impl Into<String>,
        action: AuditAction,
        details: impl Into<String>,
    ) -> Self {
        let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        Self {
            timestamp,
            username: username.into(),
            action,
            details: details.into(),
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Parse a timestamp written with `TIMESTAMP_FORMAT`
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

/// Entries of one category, newest first. Entries with equal timestamps
/// keep reverse append order.
pub fn filter_by_category(entries: &[AuditEntry], category: ActionCategory) -> Vec<AuditEntry> {
    let mut out: Vec<AuditEntry> = entries
        .iter()
        .rev()
        .filter(|e| e.action.category() == category)
        .cloned()
        .collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}
