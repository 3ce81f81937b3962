//! qc-store: the in-memory QC grid store.
//!
//! Provides:
//! - Indexing over the payload (columns, rows, cells, codes, result columns)
//! - The mutation API with fail-soft semantics
//! - Batching so bulk edits produce a single change notice
//! - Filter, conditional-formatting, and grid projection engines
//!
//! # Example
//!
//! ```no_run
//! use qc_core::{ColumnIndex, RowIndex};
//! use qc_store::GridStore;
//!
//! let payload = qc_schema::load_json("fixtures/sample_job.json".as_ref()).unwrap();
//! let mut store = GridStore::new();
//! store.load(payload);
//!
//! store.batch(|s| {
//!     for row in 0..3 {
//!         s.mark_result_cell_final(RowIndex::new(row), ColumnIndex::new(8));
//!     }
//! });
//! let (rows, _) = store.grid_rows();
//! assert!(!rows.is_empty());
//! ```

pub mod batch;
pub mod error;
pub mod filter;
pub mod format;
pub mod header;
pub mod mutate;
pub mod notify;
pub mod projection;
pub mod row_cache;
pub mod schema_index;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchController, BatchState};
pub use error::{StoreError, StoreResult};
pub use filter::{FilterState, ViewMode};
pub use format::{
    CRD_VARIANCE_THRESHOLDS, CellFlag, ControlType, DUP_VARIANCE_THRESHOLDS, FormatRules,
    PRD_VARIANCE_THRESHOLDS, VarianceFamily, VarianceLevel, VarianceThresholds,
};
pub use header::{AnalyteHeader, ColumnHeader, GridHeader, HeaderGroup};
pub use notify::{ChangeKind, ChangeNotice, OperationKind, OperationOutcome, SubscriptionId};
pub use projection::{GridRow, GridRows, ProjectionUpdate, ROW_INDEX_KEY};
pub use store::GridStore;
