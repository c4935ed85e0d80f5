use super::identity::{Identity, Role};
use bcrypt::DEFAULT_COST;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Regency and city codes of West Java, one regional administrator each.
pub const WEST_JAVA_REGION_CODES: [&str; 26] = [
    "3201", "3202", "3203", "3204", "3205", "3206", "3207", "3208", "3209", "3210", "3211",
    "3212", "3213", "3214", "3215", "3216", "3217", "3271", "3272", "3273", "3274", "3275",
    "3276", "3277", "3278", "3279",
];

pub const MASTER_USERNAME: &str = "masteradmin";

/// Username of the regional administrator for a region
pub fn regional_username(region_code: &str) -> String {
    format!("admin{}", region_code)
}

/// Verifies username/password pairs
pub trait CredentialStore: Send + Sync {
    /// The identity for valid credentials, `None` otherwise
    fn verify(&self, username: &str, password: &str) -> Option<Identity>;
}

/// Failure to hash a password for storage
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("cannot hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// A stored credential: bcrypt hash plus the identity it unlocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub region_code: Option<String>,
    /// bcrypt hash, cost and salt included
    pub password_hash: String,
}

impl CredentialEntry {
    pub fn new(identity: &Identity, password: &str, cost: u32) -> Result<Self, CredentialError> {
        Ok(Self::with_hash(identity, bcrypt::hash(password, cost)?))
    }

    fn with_hash(identity: &Identity, password_hash: String) -> Self {
        Self {
            username: identity.username().to_string(),
            role: identity.role(),
            region_code: identity.scope().map(str::to_string),
            password_hash,
        }
    }

    fn matches(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }

    fn identity(&self) -> Option<Identity> {
        match (self.role, &self.region_code) {
            (Role::Master, _) => Some(Identity::master(&self.username)),
            (Role::Regional, Some(code)) => Some(Identity::regional(&self.username, code)),
            (Role::Regional, None) => None,
        }
    }
}

/// In-memory credential set
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    entries: HashMap<String, CredentialEntry>,
    cost: u32,
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            cost: DEFAULT_COST,
        }
    }
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// bcrypt cost for passwords added from now on
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Build from stored entries, e.g. a deserialized credentials file
    pub fn from_entries(entries: impl IntoIterator<Item = CredentialEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.username.clone(), e)).collect(),
            ..Self::default()
        }
    }

    /// `masteradmin` plus one `admin{code}` account per region code
    pub fn provisioned<'a>(
        master_password: &str,
        regional_password: &str,
        region_codes: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, CredentialError> {
        Self::new().provision(master_password, regional_password, region_codes)
    }

    /// Add the provisioned accounts to this set.
    ///
    /// Regional accounts share one password, so it is hashed once.
    pub fn provision<'a>(
        mut self,
        master_password: &str,
        regional_password: &str,
        region_codes: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, CredentialError> {
        self.add(&Identity::master(MASTER_USERNAME), master_password)?;
        let regional_hash = bcrypt::hash(regional_password, self.cost)?;
        for code in region_codes {
            let identity = Identity::regional(regional_username(code), code);
            self.entries.insert(
                identity.username().to_string(),
                CredentialEntry::with_hash(&identity, regional_hash.clone()),
            );
        }
        Ok(self)
    }

    /// Add or replace an account
    pub fn add(&mut self, identity: &Identity, password: &str) -> Result<(), CredentialError> {
        let entry = CredentialEntry::new(identity, password, self.cost)?;
        self.entries.insert(identity.username().to_string(), entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CredentialEntry> {
        self.entries.values()
    }
}

impl CredentialStore for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> Option<Identity> {
        let entry = self.entries.get(username.trim())?;
        if entry.matches(password) {
            entry.identity()
        } else {
            None
        }
    }
}
