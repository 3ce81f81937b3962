//! Session behaviour against an in-memory transport.

use qc_app::{
    AppConfig, AppError, BulkAction, BulkProgress, CellTarget, Endpoint, QcSession, RetryPolicy,
    Transport, TransportError,
};
use qc_core::{ColumnIndex, RowIndex, ServiceItemIndex};
use qc_schema::{Payload, RequestKind, RequestPayload};
use qc_store::{ChangeKind, OperationKind, OperationOutcome};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

fn fixture() -> Payload {
    qc_schema::load_json("../../fixtures/sample_job.json".as_ref()).unwrap()
}

#[derive(Default)]
struct MockTransport {
    payload: Option<Payload>,
    /// Failures returned, in order, before calls start succeeding.
    failures: RefCell<VecDeque<TransportError>>,
    calls: RefCell<usize>,
    saved: RefCell<Vec<Payload>>,
    requests: RefCell<Vec<RequestPayload>>,
}

impl MockTransport {
    fn serving(payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    fn failing_with(self, failures: impl IntoIterator<Item = TransportError>) -> Self {
        self.failures.borrow_mut().extend(failures);
        self
    }

    fn next(&self) -> Result<(), TransportError> {
        *self.calls.borrow_mut() += 1;
        match self.failures.borrow_mut().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Transport for MockTransport {
    fn fetch_payload(&self, _endpoint: &str) -> Result<Payload, TransportError> {
        self.next()?;
        self.payload.clone().ok_or(TransportError::NotFound)
    }

    fn save_payload(&self, _endpoint: &str, payload: &Payload) -> Result<(), TransportError> {
        self.next()?;
        self.saved.borrow_mut().push(payload.clone());
        Ok(())
    }

    fn submit_request(&self, _endpoint: &str, request: &RequestPayload) -> Result<(), TransportError> {
        self.next()?;
        self.requests.borrow_mut().push(request.clone());
        Ok(())
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::from_yaml_str(
        "endpoints:\n  load: http://lims.test/load\n  save: http://lims.test/save\n  request: http://lims.test/request\n",
    )
    .unwrap();
    config.retry = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 0,
        max_delay_ms: 0,
    };
    config
}

#[test]
fn load_retries_transient_failures() {
    let transport = MockTransport::serving(fixture())
        .failing_with([TransportError::Timeout, TransportError::Network("reset".into())]);
    let mut session = QcSession::new(config(), &transport);

    let summary = session.load().unwrap();
    assert_eq!(summary.job_code, "JOB-2024-0117");
    assert_eq!(summary.rows, 10);
    assert_eq!(*transport.calls.borrow(), 3);
    assert_eq!(session.saved_fingerprint(), Some(summary.fingerprint.as_str()));
    assert!(!session.has_unsaved_changes());
}

#[test]
fn load_surfaces_http_errors_without_retry() {
    let transport = MockTransport::serving(fixture()).failing_with([TransportError::Forbidden]);
    let mut session = QcSession::new(config(), &transport);

    let err = session.load().unwrap_err();
    assert!(matches!(err, AppError::Transport(TransportError::Forbidden)));
    assert_eq!(*transport.calls.borrow(), 1);
    assert!(!session.store().with(|s| s.is_loaded()));
}

#[test]
fn invalid_payload_is_not_loaded() {
    let mut bad = fixture();
    let dup = bad.rows[0].clone();
    bad.rows.push(dup);
    let transport = MockTransport::serving(bad);
    let mut session = QcSession::new(config(), &transport);

    assert!(matches!(session.load(), Err(AppError::Validation(_))));
    assert!(!session.store().with(|s| s.is_loaded()));
}

#[test]
fn save_requires_dataset_and_endpoint() {
    let transport = MockTransport::default();
    let mut session = QcSession::new(config(), &transport);
    assert!(matches!(session.save(), Err(AppError::NoDataset)));

    let mut no_save = config();
    no_save.endpoints.save = None;
    let mut session = QcSession::new(no_save, &transport);
    session.load_payload(fixture()).unwrap();
    assert!(matches!(
        session.save(),
        Err(AppError::NoEndpoint {
            which: Endpoint::Save
        })
    ));
    assert_eq!(*transport.calls.borrow(), 0);
}

#[test]
fn save_sends_edits_and_clears_unsaved_flag() {
    let transport = MockTransport::default();
    let mut session = QcSession::new(config(), &transport);
    session.load_payload(fixture()).unwrap();
    let loaded = session.saved_fingerprint().map(str::to_string);

    session
        .store()
        .with(|s| s.set_manual_correction(RowIndex::new(0), ColumnIndex::new(8), Some(-10.0), None));
    assert!(session.has_unsaved_changes());

    let receipt = session.save().unwrap();
    assert!(receipt.clean);
    assert!(!session.has_unsaved_changes());
    assert_ne!(Some(receipt.fingerprint.clone()), loaded);

    let saved = transport.saved.borrow();
    let cell = saved[0].rows[0]
        .values
        .iter()
        .find(|c| c.column_index == ColumnIndex::new(8))
        .unwrap();
    assert_eq!(cell.value.as_f64(), Some(90.0));
    assert_eq!(cell.baseline_correction, Some(-10.0));
}

#[test]
fn failed_save_keeps_unsaved_flag() {
    let transport = MockTransport::default()
        .failing_with([TransportError::Server { status: 502 }]);
    let mut session = QcSession::new(config(), &transport);
    session.load_payload(fixture()).unwrap();
    session
        .store()
        .with(|s| s.mark_result_cell_final(RowIndex::new(0), ColumnIndex::new(8)));

    assert!(session.save().is_err());
    assert!(session.has_unsaved_changes());
}

#[test]
fn submitted_request_reaches_transport() {
    let transport = MockTransport::default();
    let mut session = QcSession::new(config(), &transport);
    session.load_payload(fixture()).unwrap();

    let rows = [RowIndex::new(1), RowIndex::new(0)];
    let request = session
        .submit_request(RequestKind::Overlimit, ServiceItemIndex::new(0), &rows)
        .unwrap();
    assert_eq!(request.samples.len(), 2);
    assert_eq!(request.samples[0].sample_name, "DH17-001-R");
    assert_eq!(transport.requests.borrow()[0].request_id, request.request_id);
}

#[test]
fn bulk_finalize_is_one_notice_with_chunked_progress() {
    let transport = MockTransport::default();
    let mut cfg = config();
    cfg.bulk.chunk_size = 4;
    let mut session = QcSession::new(cfg, &transport);
    session.load_payload(fixture()).unwrap();

    let notices = Arc::new(Mutex::new(Vec::new()));
    let outcomes = Arc::new(Mutex::new(Vec::<OperationOutcome>::new()));
    {
        let notices = Arc::clone(&notices);
        let outcomes = Arc::clone(&outcomes);
        session.store().with(|s| {
            s.subscribe(move |n| notices.lock().unwrap().push(n.kind));
            s.on_operation_complete(move |o| outcomes.lock().unwrap().push(*o));
        });
    }

    // Row 2 is already final, so it is skipped.
    session
        .store()
        .with(|s| s.mark_result_cell_final(RowIndex::new(2), ColumnIndex::new(8)));
    notices.lock().unwrap().clear();

    let targets: Vec<_> = (0..10_u32).map(|r| CellTarget::new(r, 8_u32)).collect();
    let mut events: Vec<BulkProgress> = Vec::new();
    let mut record = |p: BulkProgress| events.push(p);
    let outcome = session.bulk(&targets, &BulkAction::MarkFinal, Some(&mut record));

    // Row 9 has no Cu result.
    assert_eq!(outcome.affected, 8);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(*notices.lock().unwrap(), vec![ChangeKind::Rows]);
    assert_eq!(
        *outcomes.lock().unwrap(),
        vec![OperationOutcome {
            kind: OperationKind::MarkFinal,
            affected: 8,
            skipped: 2,
        }]
    );

    let processed: Vec<_> = events.iter().map(|e| e.processed).collect();
    assert_eq!(processed, vec![4, 8, 10]);
    assert!(events.last().is_some_and(BulkProgress::is_done));
}

#[test]
fn bulk_correction_skips_final_cells() {
    let transport = MockTransport::default();
    let mut session = QcSession::new(config(), &transport);
    session.load_payload(fixture()).unwrap();
    session
        .store()
        .with(|s| s.mark_result_cell_final(RowIndex::new(7), ColumnIndex::new(8)));

    let targets = [CellTarget::new(7_u32, 8_u32), CellTarget::new(8_u32, 8_u32)];
    let action = BulkAction::Correct {
        baseline: None,
        multiplier: Some(0.5),
    };
    let outcome = session.bulk(&targets, &action, None);
    assert_eq!((outcome.affected, outcome.skipped), (1, 1));

    let values = session.store().with(|s| {
        (
            s.cell_value(RowIndex::new(7), ColumnIndex::new(8)).and_then(|v| v.as_f64()),
            s.cell_value(RowIndex::new(8), ColumnIndex::new(8)).and_then(|v| v.as_f64()),
        )
    });
    assert_eq!(values, (Some(200.0), Some(115.0)));
}
