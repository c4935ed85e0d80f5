//! Administrator identities and credential verification

mod credentials;
mod identity;

pub use credentials::{
    regional_username, CredentialEntry, CredentialError, CredentialStore, StaticCredentials, MASTER_USERNAME,
    WEST_JAVA_REGION_CODES,
};
pub use identity::{Identity, Role};
