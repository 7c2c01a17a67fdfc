use crate::config::WorkspaceConfig;
use crate::context::{
    build_full_context, build_sample_context, preview, AnalysisKind, TablePreview,
};
use crate::error::{invalid_input, Error, SessionError, SessionResult};
use crate::lifecycle::SessionManager;
use crate::model::{DatasetPair, SessionId, SessionState, Snapshot, SnapshotMeta, Table};
use crate::normalize::{normalize, FileFormat};
use crate::reasoning::ReasoningService;
use crate::store::SnapshotStore;
use crate::upload::{validate_part, UploadedFile, ADS_FIELD, SALES_FIELD};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Serialize)]
pub struct UploadOutcome {
    pub session: SessionId,
    pub ads: TablePreview,
    pub sales: TablePreview,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub answered_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub kind: &'static str,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub answered_at: OffsetDateTime,
}

/// Request-level entry point tying uploads, sessions, storage and the
/// reasoning service together.
///
/// Session values arrive from clients as raw strings and are validated against
/// the [`SessionManager`] before any snapshot is read or written.
pub struct Workspace {
    store: Arc<dyn SnapshotStore>,
    reasoning: Arc<dyn ReasoningService>,
    sessions: SessionManager,
    config: WorkspaceConfig,
}

impl Workspace {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        reasoning: Arc<dyn ReasoningService>,
        config: WorkspaceConfig,
    ) -> Self {
        Self {
            store,
            reasoning,
            sessions: SessionManager::new(config.session_ttl),
            config,
        }
    }

    /// Builds the snapshot store described by `config.backend`.
    pub fn from_config(
        config: WorkspaceConfig,
        reasoning: Arc<dyn ReasoningService>,
    ) -> SessionResult<Self> {
        let store = crate::create_snapshot_store(&config.backend)?;
        Ok(Self::new(store, reasoning, config))
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Returns the caller's active session or a fresh one.
    pub fn start_session(&self, existing: Option<&str>) -> SessionId {
        self.sessions.issue_or_get(existing)
    }

    /// Validates, parses and stores both tables, replacing any earlier upload.
    pub fn upload(
        &self,
        existing: Option<&str>,
        ads: Option<&UploadedFile>,
        sales: Option<&UploadedFile>,
    ) -> SessionResult<UploadOutcome> {
        self.reap_if_due();
        let limit = self.config.max_upload_bytes;
        let ads_format = validate_part(ADS_FIELD, ads, limit)?;
        let sales_format = validate_part(SALES_FIELD, sales, limit)?;
        let (Some(ads), Some(sales)) = (ads, sales) else {
            return Err(invalid_input("both files are required"));
        };

        let ads_table = parse_part(ads, ads_format)?;
        let sales_table = parse_part(sales, sales_format)?;
        let mut pair = DatasetPair::new(ads_table, sales_table);
        pair.fill_nulls();

        let session = self.sessions.issue_or_get(existing);
        let snapshot = Snapshot::new(session.clone(), pair);
        let outcome = UploadOutcome {
            session: session.clone(),
            ads: preview(&snapshot.pair.ads, self.config.preview_rows),
            sales: preview(&snapshot.pair.sales, self.config.preview_rows),
            uploaded_at: snapshot.meta.uploaded_at,
        };
        self.store.save(&session, snapshot)?;
        self.sessions.touch(&session);
        info!(
            session = %session,
            ads_rows = outcome.ads.rows,
            sales_rows = outcome.sales.rows,
            "datasets stored"
        );
        Ok(outcome)
    }

    /// Loads the stored snapshot. Sessions that are not active read as absent.
    pub fn load(&self, session: Option<&str>) -> SessionResult<Option<Snapshot>> {
        match self.require_session(session) {
            Ok(id) => Ok(self.store.load(&id)?),
            Err(Error::Session(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Answers `question` from a sample of the stored data.
    pub fn ask(&self, session: Option<&str>, question: &str) -> SessionResult<Answer> {
        let id = self.require_session(session)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(invalid_input("question is required"));
        }
        let snapshot = self.require_snapshot(&id)?;
        let prompt = build_sample_context(&snapshot.pair, question, self.config.sample_rows);
        debug!(
            session = %id,
            question_chars = question.len(),
            prompt_chars = prompt.len(),
            "asking reasoning service"
        );
        let text = self
            .reasoning
            .ask(&prompt, self.config.max_tokens, self.config.temperature)?;
        self.sessions.touch(&id);
        Ok(Answer {
            text,
            answered_at: OffsetDateTime::now_utc(),
        })
    }

    /// Runs a whole-dataset analysis, refusing contexts above the configured size.
    pub fn analyze(&self, session: Option<&str>, kind: AnalysisKind) -> SessionResult<Analysis> {
        let id = self.require_session(session)?;
        let snapshot = self.require_snapshot(&id)?;
        let prompt = build_full_context(&snapshot.pair, kind);
        let actual = prompt.chars().count();
        if actual > self.config.max_context_chars {
            warn!(
                session = %id,
                actual,
                limit = self.config.max_context_chars,
                "full context too large"
            );
            return Err(Error::PayloadTooLarge {
                limit: self.config.max_context_chars,
                actual,
            });
        }
        let text = self
            .reasoning
            .ask(&prompt, self.config.max_tokens, self.config.temperature)?;
        self.sessions.touch(&id);
        Ok(Analysis {
            kind: kind.as_str(),
            text,
            answered_at: OffsetDateTime::now_utc(),
        })
    }

    /// Row counts, column names and column kinds of the stored tables.
    pub fn data_summary(&self, session: Option<&str>) -> SessionResult<SnapshotMeta> {
        let id = self.require_session(session)?;
        let snapshot = self.require_snapshot(&id)?;
        self.sessions.touch(&id);
        Ok(snapshot.meta)
    }

    /// Deletes the stored data and ends the session. Repeating it is harmless.
    pub fn clear(&self, session: Option<&str>) -> SessionResult<()> {
        let Some(id) = session.and_then(SessionId::parse) else {
            return Ok(());
        };
        if self.sessions.state(&id) == SessionState::Unborn {
            return Ok(());
        }
        self.store.clear(&id)?;
        self.sessions.invalidate(&id);
        Ok(())
    }

    /// Deletes snapshots of every session past its deadline; returns how many were reaped.
    pub fn reap_expired(&self) -> usize {
        let expired = self.sessions.drain_expired();
        self.remove_snapshots(&expired)
    }

    fn reap_if_due(&self) {
        let expired = self.sessions.drain_expired_if_due();
        self.remove_snapshots(&expired);
    }

    fn remove_snapshots(&self, ids: &[SessionId]) -> usize {
        let mut removed = 0;
        for id in ids {
            match self.store.clear(id) {
                Ok(()) => removed += 1,
                Err(err) => warn!(session = %id, error = %err, "failed to reap snapshot"),
            }
        }
        removed
    }

    fn require_session(&self, raw: Option<&str>) -> SessionResult<SessionId> {
        let id = raw
            .and_then(SessionId::parse)
            .ok_or(SessionError::Unknown)?;
        match self.sessions.state(&id) {
            SessionState::Active => Ok(id),
            SessionState::Unborn => Err(SessionError::Unknown.into()),
            SessionState::Cleared => Err(SessionError::Cleared.into()),
            SessionState::Expired => {
                if let Err(err) = self.store.clear(&id) {
                    warn!(session = %id, error = %err, "failed to remove expired snapshot");
                }
                Err(SessionError::Expired.into())
            }
        }
    }

    fn require_snapshot(&self, id: &SessionId) -> SessionResult<Snapshot> {
        self.store
            .load(id)?
            .ok_or_else(|| SessionError::NoDataset.into())
    }
}

fn parse_part(file: &UploadedFile, format: FileFormat) -> SessionResult<Table> {
    normalize(&file.bytes, format).map_err(|source| Error::Parse {
        file: file.file_name.clone(),
        source,
    })
}
