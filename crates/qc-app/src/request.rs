//! Repeat/overlimit request assembly.

use chrono::Utc;
use qc_core::{RowIndex, ServiceItemIndex};
use qc_schema::{RequestKind, RequestPayload, RequestSample};
use qc_store::GridStore;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Build a request for `rows` under `service_item`. Samples keep the
/// selection order and carry 1-based positions; rows that no longer exist
/// are left out.
pub fn build_request(
    store: &GridStore,
    kind: RequestKind,
    service_item: ServiceItemIndex,
    rows: &[RowIndex],
) -> AppResult<RequestPayload> {
    let payload = store.require_payload()?;
    if rows.is_empty() {
        return Err(AppError::InvalidInput("no rows selected".to_string()));
    }
    let si = store
        .schema_index()
        .service_item(payload, service_item)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown service item {service_item}")))?;

    let samples: Vec<RequestSample> = rows
        .iter()
        .filter_map(|&r| {
            let row = store.row(r);
            if row.is_none() {
                debug!(row = %r, "selected row not found; left out of request");
            }
            row
        })
        .zip(1_u32..)
        .map(|(row, position)| RequestSample {
            original_row_index: row.row_index,
            seq_no: row.seq_no,
            position,
            sample_name: row.sample_name.clone(),
            traveler_no: row.traveler_no.clone(),
            material_type: row.material_type.clone(),
            control_type: row.control_type.clone(),
        })
        .collect();

    if samples.is_empty() {
        return Err(AppError::InvalidInput(
            "none of the selected rows exist".to_string(),
        ));
    }

    Ok(RequestPayload {
        request_id: Uuid::new_v4(),
        request_type: kind,
        job_code: payload.metadata.job.code.clone(),
        service_item_index: si.si_index,
        service_item_code: si.code.clone(),
        created_at: Utc::now(),
        samples,
    })
}
