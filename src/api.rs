//! Transport-independent API layer.
//!
//! `DashboardApi` is the single entry point for everything a front end
//! does: login, scoped reads, saving edits, audit views, charts and
//! narrative insight. Front ends never reach into the store or the audit
//! log directly.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::aggregate::{summary_statistics, DatasetFilter, SummaryStatistics};
use crate::audit::{filter_by_category, ActionCategory, AuditAction, AuditEntry, AuditLog, CsvAuditLog};
use crate::auth::{CredentialStore, Identity};
use crate::chart::{ChartData, ChartRequest};
use crate::config::DashboardConfig;
use crate::crud::{apply_changes, ChangeSet};
use crate::error::{DashboardError, DashboardResult};
use crate::insight::{generate_narrative, GeminiClient, HistoryEntry, InsightClient, InsightError, InsightHistory, InsightRequest};
use crate::record::Dataset;
use crate::schema::{load_and_validate, Validated};
use crate::session::{Session, SessionId};
use crate::storage::{CsvStore, DatasetStore, DatasetVersion, LoadedDataset, OpenStore, StorageError};

/// Dataset for display. When loading failed, `dataset` is empty and
/// `problem` says why; the session stays usable.
#[derive(Debug, Clone)]
pub struct DatasetView {
    pub dataset: Dataset,
    pub problem: Option<String>,
}

/// Result of a successful save
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// Version of the data now stored
    pub version: DatasetVersion,
    /// Audit entries written for this save; empty when nothing changed
    pub entries: Vec<AuditEntry>,
}

/// Narrative text, or the message to show when none could be produced
#[derive(Debug, Clone, PartialEq)]
pub enum InsightReply {
    Narrative(String),
    Unavailable(String),
}

impl InsightReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Narrative(t) | Self::Unavailable(t) => t,
        }
    }

    pub fn is_narrative(&self) -> bool {
        matches!(self, Self::Narrative(_))
    }
}

/// Single entry point for all consumer-facing operations.
#[derive(Clone)]
pub struct DashboardApi {
    store: Arc<dyn DatasetStore>,
    audit: Arc<dyn AuditLog>,
    credentials: Arc<dyn CredentialStore>,
    insight: Option<Arc<dyn InsightClient>>,
    config: Arc<DashboardConfig>,
    sessions: Arc<DashMap<SessionId, Session>>,
    history: Arc<Mutex<InsightHistory>>,
}

impl DashboardApi {
    /// Create an API over the given backends, without an insight client.
    pub fn new(
        store: Arc<dyn DatasetStore>,
        audit: Arc<dyn AuditLog>,
        credentials: Arc<dyn CredentialStore>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            store,
            audit,
            credentials,
            insight: None,
            config: Arc::new(config),
            sessions: Arc::new(DashMap::new()),
            history: Arc::new(Mutex::new(InsightHistory::new())),
        }
    }

    pub fn with_insight(mut self, client: Arc<dyn InsightClient>) -> Self {
        self.insight = Some(client);
        self
    }

    pub fn with_history(self, history: InsightHistory) -> Self {
        if let Ok(mut h) = self.history.lock() {
            *h = history;
        }
        self
    }

    /// Wire up file-backed stores, credentials and, when an API key is
    /// configured, the text-generation client.
    pub fn from_config(config: DashboardConfig) -> DashboardResult<Self> {
        let store = CsvStore::open(&config.data_path)?;
        let audit = CsvAuditLog::open(&config.audit_path);
        let credentials = config.credentials()?;

        let insight: Option<Arc<dyn InsightClient>> = match GeminiClient::from_config(&config.insight) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn InsightClient>),
            Err(e) => {
                info!(reason = %e, "narrative insight disabled");
                None
            }
        };

        let history = match &config.history_path {
            Some(path) => InsightHistory::load(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "could not read insight history");
                InsightHistory::new()
            }),
            None => InsightHistory::new(),
        };

        let mut api = Self::new(Arc::new(store), Arc::new(audit), Arc::new(credentials), config).with_history(history);
        api.insight = insight;
        Ok(api)
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    // --- Sessions ---

    /// Verify credentials and open a session. The login is audited.
    pub fn login(&self, username: &str, password: &str) -> DashboardResult<SessionId> {
        let identity = self.credentials.verify(username.trim(), password).ok_or_else(|| {
            warn!(username, "login rejected");
            DashboardError::Auth("invalid username or password".to_string())
        })?;

        let entry = AuditEntry::now(
            &identity,
            AuditAction::Login,
            format!("user '{}' logged in", identity.username()),
        );
        self.audit.append(&entry)?;

        let id = SessionId::new();
        info!(username = identity.username(), role = %identity.role(), session = %id, "login");
        self.sessions.insert(id, Session::new(identity));
        Ok(id)
    }

    /// Close a session. The logout is audited.
    pub fn logout(&self, id: SessionId) -> DashboardResult<()> {
        let (_, session) = self.sessions.remove(&id).ok_or(DashboardError::SessionNotFound)?;
        let identity = session.identity();
        let entry = AuditEntry::now(
            identity,
            AuditAction::Logout,
            format!("user '{}' logged out", identity.username()),
        );
        info!(username = identity.username(), session = %id, "logout");
        self.audit.append(&entry)?;
        Ok(())
    }

    pub fn identity(&self, id: SessionId) -> DashboardResult<Identity> {
        self.sessions
            .get(&id)
            .map(|s| s.identity().clone())
            .ok_or(DashboardError::SessionNotFound)
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // --- Reads ---

    /// Cached dataset of the session, loading it on first use.
    fn loaded(&self, id: SessionId) -> DashboardResult<LoadedDataset> {
        if let Some(loaded) = self
            .sessions
            .get(&id)
            .ok_or(DashboardError::SessionNotFound)?
            .cached()
        {
            return Ok(loaded.clone());
        }

        let loaded = self.store.load()?;
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.cache(loaded.clone());
        }
        Ok(loaded)
    }

    /// Rows the session's identity may edit: everything for the master
    /// identity, the own region's rows for a regional one.
    pub fn dataset(&self, id: SessionId) -> DashboardResult<Dataset> {
        let identity = self.identity(id)?;
        let loaded = self.loaded(id)?;
        Ok(match identity.scope() {
            Some(region) => DatasetFilter::new().with_region(region).apply(&loaded.dataset),
            None => loaded.dataset,
        })
    }

    /// Every row, regardless of scope. Used by charts and summaries.
    pub fn full_dataset(&self, id: SessionId) -> DashboardResult<Dataset> {
        Ok(self.loaded(id)?.dataset)
    }

    /// Scoped dataset for display. Load failures give an empty dataset and
    /// a message instead of an error.
    pub fn view(&self, id: SessionId) -> DashboardResult<DatasetView> {
        match self.dataset(id) {
            Ok(dataset) => Ok(DatasetView { dataset, problem: None }),
            Err(DashboardError::SessionNotFound) => Err(DashboardError::SessionNotFound),
            Err(e) => {
                warn!(error = %e, "showing empty dataset");
                Ok(DatasetView {
                    dataset: Dataset::new(),
                    problem: Some(e.to_string()),
                })
            }
        }
    }

    pub fn summary(&self, id: SessionId) -> DashboardResult<SummaryStatistics> {
        Ok(summary_statistics(&self.full_dataset(id)?))
    }

    pub fn chart(&self, id: SessionId, request: &ChartRequest) -> DashboardResult<ChartData> {
        Ok(request.build(&self.full_dataset(id)?))
    }

    /// Run every validator over the stored data and clean it when possible.
    pub fn validate_source(&self) -> DashboardResult<Validated> {
        Ok(load_and_validate(self.store.as_ref())?)
    }

    // --- Writes ---

    /// Apply a change set and persist it.
    ///
    /// The save is checked against the version the session loaded. On
    /// success the audit entries are appended and the cached dataset of
    /// every open session is dropped. On `Conflict` this session's cache is
    /// dropped so the next read sees the newer data. Any other failure leaves the file, the audit log and
    /// the cache untouched, so the same change set can be resubmitted.
    pub fn save_changes(&self, id: SessionId, changes: &ChangeSet) -> DashboardResult<SaveOutcome> {
        let identity = self.identity(id)?;
        let loaded = self.loaded(id)?;

        let outcome = apply_changes(&loaded.dataset, &identity, changes, &self.config.backfill)?;
        if outcome.is_noop() {
            return Ok(SaveOutcome {
                version: loaded.version,
                entries: Vec::new(),
            });
        }

        let version = match self.store.save(&outcome.dataset, Some(&loaded.version)) {
            Ok(version) => version,
            Err(e @ StorageError::Conflict { .. }) => {
                warn!(username = identity.username(), error = %e, "save rejected");
                self.invalidate(id);
                return Err(e.into());
            }
            Err(e) => {
                warn!(username = identity.username(), error = %e, "save failed");
                return Err(e.into());
            }
        };
        self.invalidate_all();

        self.audit.append_all(&outcome.entries)?;
        info!(
            username = identity.username(),
            changes = outcome.entries.len(),
            version = %version,
            "changes saved"
        );
        Ok(SaveOutcome {
            version,
            entries: outcome.entries,
        })
    }

    fn invalidate(&self, id: SessionId) {
        if let Some(mut session) = self.sessions.get_mut(&id) {
            session.invalidate();
        }
    }

    fn invalidate_all(&self) {
        self.sessions.iter_mut().for_each(|mut session| session.invalidate());
        debug!(sessions = self.sessions.len(), "dropped cached datasets");
    }

    // --- Audit ---

    /// Audit entries of one category, newest first. Master identity only.
    pub fn audit_entries(&self, id: SessionId, category: ActionCategory) -> DashboardResult<Vec<AuditEntry>> {
        let identity = self.identity(id)?;
        if !identity.is_master() {
            return Err(DashboardError::Forbidden(format!(
                "{} may not view the activity log",
                identity.username()
            )));
        }
        let entries = self.audit.load_all()?;
        Ok(filter_by_category(&entries, category))
    }

    // --- Insight ---

    /// Ask for a narrative over the full dataset.
    ///
    /// Every failure of the text-generation side comes back as
    /// `InsightReply::Unavailable` with a message for the user; only a
    /// missing session is an error.
    pub async fn generate_insight(&self, id: SessionId, request: &InsightRequest) -> DashboardResult<InsightReply> {
        let dataset = match self.full_dataset(id) {
            Ok(dataset) => dataset,
            Err(DashboardError::SessionNotFound) => return Err(DashboardError::SessionNotFound),
            Err(e) => return Ok(InsightReply::Unavailable(e.to_string())),
        };

        let Some(client) = self.insight.clone() else {
            return Ok(unavailable(InsightError::MissingApiKey));
        };

        let prompt = match request.prompt(&dataset, self.config.insight.top_n) {
            Ok(prompt) => prompt,
            Err(e) => return Ok(unavailable(e)),
        };

        match generate_narrative(client.as_ref(), &prompt, self.config.insight.timeout()).await {
            Ok(text) => {
                if let Some(mut session) = self.sessions.get_mut(&id) {
                    session.set_narrative(text.clone());
                }
                self.remember(request, &text);
                Ok(InsightReply::Narrative(text))
            }
            Err(e) => Ok(unavailable(e)),
        }
    }

    /// Last narrative generated in this session
    pub fn narrative(&self, id: SessionId) -> DashboardResult<Option<String>> {
        self.sessions
            .get(&id)
            .map(|s| s.narrative().map(str::to_string))
            .ok_or(DashboardError::SessionNotFound)
    }

    pub fn insight_history(&self) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .map(|h| h.entries().to_vec())
            .unwrap_or_default()
    }

    fn remember(&self, request: &InsightRequest, text: &str) {
        let Ok(mut history) = self.history.lock() else {
            warn!("insight history lock poisoned");
            return;
        };
        history.record(request, text);
        if let Some(path) = &self.config.history_path {
            if let Err(e) = history.save(path) {
                warn!(path = %path.display(), error = %e, "could not write insight history");
            }
        }
    }
}

fn unavailable(e: InsightError) -> InsightReply {
    InsightReply::Unavailable(DashboardError::from(e).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::auth::StaticCredentials;
    use crate::insight::MockClient;
    use std::time::Duration;
    use tempfile::TempDir;

    const CSV: &str = "id,kode_provinsi,nama_provinsi,kode_kabupaten_kota,nama_kabupaten_kota,jumlah_kasus,satuan,tahun\n\
                       1,32,JAWA BARAT,3201,KAB. BOGOR,100,KASUS,2021\n\
                       2,32,JAWA BARAT,3273,KOTA BANDUNG,80,KASUS,2021\n";

    fn setup() -> (TempDir, DashboardApi, Arc<MemoryAuditLog>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, CSV).unwrap();
        let audit = Arc::new(MemoryAuditLog::new());
        let creds = StaticCredentials::new()
            .with_cost(4)
            .provision("master-pw", "region-pw", ["3201", "3273"])
            .unwrap();
        let api = DashboardApi::new(
            Arc::new(CsvStore::open(&path).unwrap()),
            audit.clone(),
            Arc::new(creds),
            DashboardConfig::default(),
        );
        (dir, api, audit)
    }

    #[test]
    fn regional_view_is_scoped() {
        let (_dir, api, _) = setup();
        let id = api.login("admin3201", "region-pw").unwrap();
        assert_eq!(api.dataset(id).unwrap().len(), 1);
        assert_eq!(api.full_dataset(id).unwrap().len(), 2);
    }

    #[test]
    fn bad_password_is_auth_error_and_not_audited() {
        let (_dir, api, audit) = setup();
        let err = api.login("masteradmin", "wrong").unwrap_err();
        assert!(matches!(err, DashboardError::Auth(_)));
        assert!(audit.load_all().unwrap().is_empty());
    }

    #[test]
    fn logout_ends_session() {
        let (_dir, api, audit) = setup();
        let id = api.login("masteradmin", "master-pw").unwrap();
        api.logout(id).unwrap();
        assert!(matches!(api.dataset(id), Err(DashboardError::SessionNotFound)));
        assert!(matches!(api.logout(id), Err(DashboardError::SessionNotFound)));

        let actions: Vec<AuditAction> = audit.load_all().unwrap().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Login, AuditAction::Logout]);
    }

    #[test]
    fn save_refreshes_every_open_session() {
        let (_dir, api, _) = setup();
        let reader = api.login("masteradmin", "master-pw").unwrap();
        let writer = api.login("admin3273", "region-pw").unwrap();
        assert_eq!(api.summary(reader).unwrap().total_cases, 180.0);

        let changes = ChangeSet::new().update(
            crate::record::RecordId::new(2),
            crate::crud::RecordPatch::new().with_case_count(530.0),
        );
        api.save_changes(writer, &changes).unwrap();

        assert_eq!(api.summary(reader).unwrap().total_cases, 630.0);
        assert_eq!(api.full_dataset(writer).unwrap().get(crate::record::RecordId::new(2)).unwrap().case_count, 530.0);
    }

    #[test]
    fn regional_identity_cannot_read_audit_log() {
        let (_dir, api, _) = setup();
        let id = api.login("admin3273", "region-pw").unwrap();
        let err = api.audit_entries(id, ActionCategory::Authentication).unwrap_err();
        assert!(matches!(err, DashboardError::Forbidden(_)));
    }

    #[test]
    fn unreadable_data_gives_placeholder_view() {
        let (dir, api, _) = setup();
        let id = api.login("masteradmin", "master-pw").unwrap();
        std::fs::write(dir.path().join("data.csv"), "tahun\n2021\n").unwrap();

        let view = api.view(id).unwrap();
        assert!(view.dataset.is_empty());
        assert!(view.problem.is_some());
    }

    #[tokio::test]
    async fn insight_without_client_is_a_message() {
        let (_dir, api, _) = setup();
        let id = api.login("masteradmin", "master-pw").unwrap();
        let reply = api
            .generate_insight(id, &InsightRequest::Comprehensive { focus_areas: vec![] })
            .await
            .unwrap();
        assert!(!reply.is_narrative());
        assert!(reply.text().contains("API key"));
    }

    #[tokio::test]
    async fn insight_is_cached_in_session_and_history() {
        let (_dir, api, _) = setup();
        let client = Arc::new(MockClient::with_response("Kasus meningkat."));
        let api = api.with_insight(client.clone());
        let id = api.login("masteradmin", "master-pw").unwrap();

        let reply = api
            .generate_insight(id, &InsightRequest::Mitigation { province: None })
            .await
            .unwrap();
        assert_eq!(reply, InsightReply::Narrative("Kasus meningkat.".into()));
        assert_eq!(api.narrative(id).unwrap().as_deref(), Some("Kasus meningkat."));
        assert_eq!(api.insight_history().len(), 1);
        assert!(client.prompts()[0].contains("mitigation plan"));
    }

    #[tokio::test]
    async fn slow_insight_times_out_with_message() {
        let (_dir, api, _) = setup();
        let mut config = (*api.config).clone();
        config.insight.timeout_secs = 0;
        let api = DashboardApi {
            config: Arc::new(config),
            ..api
        }
        .with_insight(Arc::new(MockClient::with_response("late").delayed(Duration::from_millis(200))));
        let id = api.login("masteradmin", "master-pw").unwrap();

        let reply = api
            .generate_insight(id, &InsightRequest::Comprehensive { focus_areas: vec![] })
            .await
            .unwrap();
        assert!(!reply.is_narrative());
        assert!(reply.text().contains("no response within"));
        assert!(api.narrative(id).unwrap().is_none());
    }
}
