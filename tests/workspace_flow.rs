use dataset_session::context::AnalysisKind;
use dataset_session::error::{ApiError, Error, ErrorCode, SessionError, UploadError};
use dataset_session::inmemory::InMemorySnapshotStore;
use dataset_session::model::{Cell, ColumnKind};
use dataset_session::upload::{UploadedFile, ADS_FIELD, SALES_FIELD};
use dataset_session::{ReasoningService, SnapshotStore, Workspace, WorkspaceConfig};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct RecordingModel {
    prompts: Mutex<Vec<(String, u32)>>,
    fail_with: Mutex<Option<ApiError>>,
}

impl ReasoningService for RecordingModel {
    fn ask(&self, prompt: &str, max_tokens: u32, _temperature: f32) -> Result<String, ApiError> {
        if let Some(err) = self.fail_with.lock().take() {
            return Err(err);
        }
        self.prompts.lock().push((prompt.to_string(), max_tokens));
        Ok(format!("analysed {} characters", prompt.len()))
    }
}

fn ads_csv(rows: usize) -> UploadedFile {
    let mut text = String::from("campaign,spend,clicks\n");
    for i in 0..rows {
        text.push_str(&format!("campaign-{i},{}.5,{}\n", i * 10, i * 3));
    }
    UploadedFile::new(ADS_FIELD, "meta_ads.csv", text.into_bytes())
}

fn sales_csv(rows: usize) -> UploadedFile {
    let mut text = String::from("order_id,product,total\n");
    for i in 0..rows {
        text.push_str(&format!("{i},widget-{i},\n"));
    }
    UploadedFile::new(SALES_FIELD, "sales.CSV", text.into_bytes())
}

fn workspace() -> (Workspace, Arc<RecordingModel>, Arc<InMemorySnapshotStore>) {
    let model = Arc::new(RecordingModel::default());
    let store = Arc::new(InMemorySnapshotStore::new());
    let workspace = Workspace::new(store.clone(), model.clone(), WorkspaceConfig::default());
    (workspace, model, store)
}

#[test]
fn upload_then_ask_uses_a_bounded_sample() {
    let (workspace, model, store) = workspace();
    let outcome = workspace
        .upload(None, Some(&ads_csv(10)), Some(&sales_csv(3)))
        .expect("upload");
    assert_eq!(outcome.ads.rows, 10);
    assert_eq!(outcome.sales.rows, 3);
    assert_eq!(outcome.ads.sample.len(), 3);
    assert_eq!(outcome.sales.sample[0][2], Cell::text(""));

    let session = outcome.session.to_string();
    let snapshot = store
        .load(&outcome.session)
        .expect("load")
        .expect("snapshot stored");
    assert_eq!(snapshot.pair.ads.row_count(), 10);
    assert_eq!(snapshot.pair.sales.column_names(), vec!["order_id", "product", "total"]);

    let answer = workspace
        .ask(Some(&session), "  Which campaign had the best CPC?  ")
        .expect("answer");
    assert!(answer.text.starts_with("analysed"));

    let prompts = model.prompts.lock();
    let (prompt, max_tokens) = &prompts[0];
    assert_eq!(*max_tokens, 4000);
    assert!(prompt.contains("Question: Which campaign had the best CPC?"));
    assert!(prompt.contains("campaign-4"));
    assert!(!prompt.contains("campaign-5"));
}

#[test]
fn reupload_keeps_the_session_and_replaces_data() {
    let (workspace, _model, store) = workspace();
    let first = workspace
        .upload(None, Some(&ads_csv(10)), Some(&sales_csv(3)))
        .expect("first upload");
    let raw = first.session.to_string();
    let second = workspace
        .upload(Some(&raw), Some(&ads_csv(2)), Some(&sales_csv(1)))
        .expect("second upload");
    assert_eq!(second.session, first.session);

    let snapshot = store.load(&first.session).expect("load").expect("present");
    assert_eq!(snapshot.pair.ads.row_count(), 2);
    assert_eq!(snapshot.pair.sales.row_count(), 1);
}

#[test]
fn data_summary_reports_column_kinds() {
    let (workspace, _model, _store) = workspace();
    let outcome = workspace
        .upload(None, Some(&ads_csv(4)), Some(&sales_csv(2)))
        .expect("upload");
    let meta = workspace
        .data_summary(Some(&outcome.session.to_string()))
        .expect("summary");
    assert_eq!(
        meta.ads.column_kinds,
        vec![ColumnKind::Text, ColumnKind::Number, ColumnKind::Number]
    );
    assert_eq!(meta.sales.rows, 2);
    assert_eq!(meta.sales.column_kinds[2], ColumnKind::Text);
}

#[test]
fn clear_removes_data_and_ends_the_session() {
    let (workspace, _model, store) = workspace();
    let outcome = workspace
        .upload(None, Some(&ads_csv(2)), Some(&sales_csv(2)))
        .expect("upload");
    let raw = outcome.session.to_string();

    workspace.clear(Some(&raw)).expect("clear");
    workspace.clear(Some(&raw)).expect("clear is idempotent");
    assert!(store.is_empty());
    assert!(workspace.load(Some(&raw)).expect("load").is_none());
    assert!(matches!(
        workspace.ask(Some(&raw), "anything?"),
        Err(Error::Session(SessionError::Cleared))
    ));

    let fresh = workspace.start_session(Some(&raw));
    assert_ne!(fresh, outcome.session);
}

#[test]
fn session_without_upload_is_valid_but_empty() {
    let (workspace, model, _store) = workspace();
    let id = workspace.start_session(None).to_string();
    assert!(workspace.load(Some(&id)).expect("load").is_none());
    let err = workspace.ask(Some(&id), "hello?").expect_err("no data");
    assert!(matches!(err, Error::Session(SessionError::NoDataset)));
    assert!(err.client_message().contains("upload"));
    assert!(model.prompts.lock().is_empty());
}

#[test]
fn untrusted_session_values_are_rejected() {
    let (workspace, _model, _store) = workspace();
    for raw in [None, Some("../../etc/passwd"), Some("")] {
        let err = workspace.ask(raw, "q").expect_err("no session");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}

#[test]
fn upload_errors_name_the_problem() {
    let (workspace, _model, store) = workspace();
    let err = workspace
        .upload(None, Some(&ads_csv(1)), None)
        .expect_err("missing sales");
    assert!(matches!(
        err,
        Error::Upload(UploadError::MissingFile { ref field }) if field == SALES_FIELD
    ));

    let pdf = UploadedFile::new(SALES_FIELD, "sales.pdf", b"%PDF".to_vec());
    let err = workspace
        .upload(None, Some(&ads_csv(1)), Some(&pdf))
        .expect_err("pdf rejected");
    assert_eq!(err.code(), ErrorCode::InvalidInput);

    let broken = UploadedFile::new(SALES_FIELD, "sales.csv", b"a,b\n1,2,3\n".to_vec());
    let err = workspace
        .upload(None, Some(&ads_csv(1)), Some(&broken))
        .expect_err("bad csv");
    assert!(err.client_message().starts_with("sales.csv:"));
    assert!(store.is_empty());
}

#[test]
fn oversized_upload_is_a_client_error() {
    let model = Arc::new(RecordingModel::default());
    let config = WorkspaceConfig {
        max_upload_bytes: 64,
        ..WorkspaceConfig::default()
    };
    let workspace = Workspace::new(Arc::new(InMemorySnapshotStore::new()), model, config);
    let err = workspace
        .upload(None, Some(&ads_csv(50)), Some(&sales_csv(1)))
        .expect_err("too large");
    assert_eq!(err.code(), ErrorCode::PayloadTooLarge);
}

#[test]
fn full_analysis_respects_context_limit() {
    let model = Arc::new(RecordingModel::default());
    let config = WorkspaceConfig {
        max_context_chars: 2_000,
        ..WorkspaceConfig::default()
    };
    let workspace = Workspace::new(
        Arc::new(InMemorySnapshotStore::new()),
        model.clone(),
        config,
    );
    let small = workspace
        .upload(None, Some(&ads_csv(3)), Some(&sales_csv(2)))
        .expect("upload");
    let analysis = workspace
        .analyze(
            Some(&small.session.to_string()),
            AnalysisKind::from_name("performance_summary"),
        )
        .expect("analysis");
    assert_eq!(analysis.kind, "performance_summary");
    assert!(model.prompts.lock()[0].0.contains("campaign-2"));

    let large = workspace
        .upload(None, Some(&ads_csv(200)), Some(&sales_csv(2)))
        .expect("upload");
    let err = workspace
        .analyze(Some(&large.session.to_string()), AnalysisKind::General)
        .expect_err("too large");
    assert!(matches!(err, Error::PayloadTooLarge { limit: 2_000, .. }));
}

#[test]
fn api_failures_keep_their_kind() {
    let (workspace, model, _store) = workspace();
    let outcome = workspace
        .upload(None, Some(&ads_csv(1)), Some(&sales_csv(1)))
        .expect("upload");
    let raw = outcome.session.to_string();

    *model.fail_with.lock() = Some(ApiError::RateLimited);
    let err = workspace.ask(Some(&raw), "q").expect_err("rate limited");
    assert_eq!(err.code(), ErrorCode::RateLimited);
    assert!(err.is_retryable());

    *model.fail_with.lock() = Some(ApiError::Connection("reset by peer".into()));
    let err = workspace.ask(Some(&raw), "q").expect_err("connection");
    assert_eq!(err.code(), ErrorCode::Unavailable);
    assert!(!err.client_message().contains("reset by peer"));

    assert!(workspace.ask(Some(&raw), "q").is_ok());
}

#[test]
fn blank_question_is_rejected() {
    let (workspace, _model, _store) = workspace();
    let outcome = workspace
        .upload(None, Some(&ads_csv(1)), Some(&sales_csv(1)))
        .expect("upload");
    let err = workspace
        .ask(Some(&outcome.session.to_string()), "   ")
        .expect_err("blank");
    assert_eq!(err.code(), ErrorCode::InvalidInput);
}
