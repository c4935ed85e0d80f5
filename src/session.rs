//! Per-login session state

use crate::auth::Identity;
use crate::storage::LoadedDataset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque handle returned by login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// State of one logged-in identity: created at login, dropped at logout.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    started: DateTime<Utc>,
    cached: Option<LoadedDataset>,
    narrative: Option<String>,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            started: Utc::now(),
            cached: None,
            narrative: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// The dataset as last loaded, with the version it was read at
    pub fn cached(&self) -> Option<&LoadedDataset> {
        self.cached.as_ref()
    }

    pub fn cache(&mut self, loaded: LoadedDataset) {
        self.cached = Some(loaded);
    }

    /// Drop the cached dataset so the next read goes to the store.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn narrative(&self) -> Option<&str> {
        self.narrative.as_deref()
    }

    pub fn set_narrative(&mut self, text: impl Into<String>) {
        self.narrative = Some(text.into());
    }
}
