//! Dashboard configuration
//!
//! Loaded from YAML; every field has a default, so an empty or missing
//! file yields a working configuration. Environment variables override
//! the file:
//!
//! - `DBD_DATA_PATH`: dataset CSV
//! - `DBD_AUDIT_PATH`: audit log CSV
//! - `DBD_INSIGHT_API_KEY`, then `GEMINI_API_KEY`: text-generation API key
//! - `DBD_MASTER_PASSWORD`, `DBD_REGIONAL_PASSWORD`: provisioned account passwords

use crate::auth::{CredentialEntry, CredentialError, StaticCredentials, WEST_JAVA_REGION_CODES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid credentials file {path}: {message}")]
    Credentials { path: PathBuf, message: String },

    #[error("no credentials configured (set credentials_file or DBD_MASTER_PASSWORD)")]
    NoCredentials,

    #[error(transparent)]
    Hash(#[from] CredentialError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub audit_path: PathBuf,
    /// Where insight exchanges are kept; history is not persisted when unset
    pub history_path: Option<PathBuf>,
    /// JSON list of stored credential entries
    pub credentials_file: Option<PathBuf>,
    pub region_codes: Vec<String>,
    /// bcrypt cost for provisioned account passwords
    pub password_cost: u32,
    pub backfill: BackfillDefaults,
    pub insight: InsightConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data_dbd.csv"),
            audit_path: PathBuf::from("admin_log.csv"),
            history_path: None,
            credentials_file: None,
            region_codes: WEST_JAVA_REGION_CODES.iter().map(|c| c.to_string()).collect(),
            password_cost: bcrypt::DEFAULT_COST,
            backfill: BackfillDefaults::default(),
            insight: InsightConfig::default(),
        }
    }
}

/// Values used for a new regional record when the region has no records yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillDefaults {
    /// `{code}` is replaced with the region code
    pub region_name_template: String,
    pub province_code: String,
    pub province_name: String,
    pub unit: String,
}

impl Default for BackfillDefaults {
    fn default() -> Self {
        Self {
            region_name_template: "Wilayah {code}".to_string(),
            province_code: "32".to_string(),
            province_name: "JAWA BARAT".to_string(),
            unit: "KASUS".to_string(),
        }
    }
}

impl BackfillDefaults {
    pub fn region_name(&self, region_code: &str) -> String {
        self.region_name_template.replace("{code}", region_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Regions listed in summaries and prompts
    pub top_n: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 60,
            top_n: 10,
        }
    }
}

impl InsightConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DashboardConfig {
    /// Default config file location (`<config dir>/dbd-dashboard/config.yaml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dbd-dashboard").join("config.yaml"))
    }

    /// Parse YAML text. Empty text gives the defaults.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, or from the default location when `None`. A missing
    /// file at the default location is not an error. Environment overrides
    /// are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (Some(p.to_path_buf()), true),
            None => (Self::default_path(), false),
        };

        let mut config = match path {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(text) => {
                    debug!(path = %path.display(), "loading config");
                    Self::from_yaml(&text, &path)?
                }
                Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(source) => return Err(ConfigError::Read { path, source }),
            },
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = set("DBD_DATA_PATH") {
            self.data_path = PathBuf::from(v);
        }
        if let Some(v) = set("DBD_AUDIT_PATH") {
            self.audit_path = PathBuf::from(v);
        }
        if let Some(v) = set("DBD_INSIGHT_API_KEY").or_else(|| set("GEMINI_API_KEY")) {
            self.insight.api_key = Some(v);
        }
    }

    /// Credentials from `credentials_file`, or provisioned accounts when
    /// `DBD_MASTER_PASSWORD` is set.
    pub fn credentials(&self) -> Result<StaticCredentials, ConfigError> {
        if let Some(path) = &self.credentials_file {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let entries: Vec<CredentialEntry> =
                serde_json::from_str(&text).map_err(|e| ConfigError::Credentials {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            return Ok(StaticCredentials::from_entries(entries));
        }

        let master = std::env::var("DBD_MASTER_PASSWORD").map_err(|_| ConfigError::NoCredentials)?;
        let regional = std::env::var("DBD_REGIONAL_PASSWORD").unwrap_or_else(|_| master.clone());
        let credentials = StaticCredentials::new().with_cost(self.password_cost).provision(
            &master,
            &regional,
            self.region_codes.iter().map(String::as_str),
        )?;
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = DashboardConfig::from_yaml("", Path::new("x.yaml")).unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.region_codes.len(), 26);
        assert_eq!(config.insight.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "data_path: /srv/dbd.csv\ninsight:\n  timeout_secs: 5\n";
        let config = DashboardConfig::from_yaml(yaml, Path::new("x.yaml")).unwrap();
        assert_eq!(config.data_path, PathBuf::from("/srv/dbd.csv"));
        assert_eq!(config.insight.timeout_secs, 5);
        assert_eq!(config.insight.model, "gemini-1.5-flash");
        assert_eq!(config.backfill.province_name, "JAWA BARAT");
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let err = DashboardConfig::from_yaml("data_path: [", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [("DBD_DATA_PATH", "/tmp/d.csv"), ("GEMINI_API_KEY", "k1")]
            .into_iter()
            .collect();
        let mut config = DashboardConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.data_path, PathBuf::from("/tmp/d.csv"));
        assert_eq!(config.insight.api_key.as_deref(), Some("k1"));
        assert_eq!(config.audit_path, PathBuf::from("admin_log.csv"));
    }

    #[test]
    fn backfill_region_name_template() {
        assert_eq!(BackfillDefaults::default().region_name("3201"), "Wilayah 3201");
    }

    #[test]
    fn credentials_file_holds_bcrypt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let entry = CredentialEntry::new(&crate::auth::Identity::regional("admin3201", "3201"), "pw", 4).unwrap();
        std::fs::write(&path, serde_json::to_string(&[entry]).unwrap()).unwrap();

        let config = DashboardConfig {
            credentials_file: Some(path),
            ..DashboardConfig::default()
        };
        let creds = config.credentials().unwrap();
        use crate::auth::CredentialStore;
        assert_eq!(creds.verify("admin3201", "pw").unwrap().scope(), Some("3201"));
        assert!(creds.verify("admin3201", "wrong").is_none());
    }

    #[test]
    fn missing_explicit_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DashboardConfig::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
