//! A loaded job bound to a remote backend.

use qc_core::{RowIndex, ServiceItemIndex};
use qc_schema::{Payload, RequestKind, RequestPayload, payload_fingerprint, validate_payload};
use qc_store::GridStore;
use tracing::{info, warn};

use crate::bulk::{BulkAction, BulkOutcome, CellTarget, apply_bulk};
use crate::config::{AppConfig, Endpoint};
use crate::error::{AppError, AppResult};
use crate::progress::BulkProgress;
use crate::request::build_request;
use crate::shared::SharedStore;
use crate::transport::{Transport, retry_with_backoff};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub job_code: String,
    pub rows: usize,
    pub columns: usize,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub fingerprint: String,
    pub rows: usize,
    /// False when the store changed while the save was in flight.
    pub clean: bool,
}

pub struct QcSession<T: Transport> {
    config: AppConfig,
    transport: T,
    store: SharedStore,
    saved_fingerprint: Option<String>,
}

impl<T: Transport> QcSession<T> {
    pub fn new(config: AppConfig, transport: T) -> Self {
        let store = SharedStore::new(GridStore::with_rules(config.variance));
        Self {
            config,
            transport,
            store,
            saved_fingerprint: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Fingerprint of the payload as last loaded or saved.
    pub fn saved_fingerprint(&self) -> Option<&str> {
        self.saved_fingerprint.as_deref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.store.with(|s| s.has_unsaved_changes())
    }

    fn endpoint(&self, which: Endpoint) -> AppResult<&str> {
        self.config
            .endpoints
            .get(which)
            .ok_or(AppError::NoEndpoint { which })
    }

    /// Fetch the job from the load endpoint and replace the current dataset.
    pub fn load(&mut self) -> AppResult<LoadSummary> {
        let endpoint = self.endpoint(Endpoint::Load)?;
        let payload = retry_with_backoff(&self.config.retry, "load", || {
            self.transport.fetch_payload(endpoint)
        })?;
        self.load_payload(payload)
    }

    /// Replace the current dataset with an already-obtained payload.
    pub fn load_payload(&mut self, payload: Payload) -> AppResult<LoadSummary> {
        validate_payload(&payload)?;
        let summary = LoadSummary {
            job_code: payload.metadata.job.code.clone(),
            rows: payload.rows.len(),
            columns: payload.metadata.schema.column_definitions.len(),
            fingerprint: payload_fingerprint(&payload),
        };
        self.store.with(|s| s.load(payload));
        self.saved_fingerprint = Some(summary.fingerprint.clone());
        info!(job = %summary.job_code, rows = summary.rows, "dataset loaded");
        Ok(summary)
    }

    /// Send the whole payload to the save endpoint.
    pub fn save(&mut self) -> AppResult<SaveReceipt> {
        let payload = self
            .store
            .with(|s| s.payload().cloned())
            .ok_or(AppError::NoDataset)?;
        let endpoint = self.endpoint(Endpoint::Save)?;

        retry_with_backoff(&self.config.retry, "save", || {
            self.transport.save_payload(endpoint, &payload)
        })?;

        let fingerprint = payload_fingerprint(&payload);
        let clean = self.store.with(|s| {
            let unchanged = s
                .payload()
                .is_some_and(|current| payload_fingerprint(current) == fingerprint);
            if unchanged {
                s.mark_saved();
            }
            unchanged
        });
        if !clean {
            warn!("dataset changed during save; unsaved flag kept");
        }
        self.saved_fingerprint = Some(fingerprint.clone());
        info!(rows = payload.rows.len(), "dataset saved");
        Ok(SaveReceipt {
            fingerprint,
            rows: payload.rows.len(),
            clean,
        })
    }

    /// Build and submit a repeat/overlimit request for `rows`.
    pub fn submit_request(
        &self,
        kind: RequestKind,
        service_item: ServiceItemIndex,
        rows: &[RowIndex],
    ) -> AppResult<RequestPayload> {
        let request = self
            .store
            .with(|s| build_request(s, kind, service_item, rows))?;
        let endpoint = self.endpoint(Endpoint::Request)?;
        retry_with_backoff(&self.config.retry, "request", || {
            self.transport.submit_request(endpoint, &request)
        })?;
        info!(request_id = %request.request_id, %kind, samples = request.samples.len(), "request submitted");
        Ok(request)
    }

    /// Run a bulk action with the configured chunk size.
    pub fn bulk(
        &self,
        targets: &[CellTarget],
        action: &BulkAction,
        progress_cb: Option<&mut dyn FnMut(BulkProgress)>,
    ) -> BulkOutcome {
        apply_bulk(
            &self.store,
            targets,
            action,
            self.config.bulk.chunk_size,
            progress_cb,
        )
    }
}
