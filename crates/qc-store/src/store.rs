//! The grid store: one loaded payload plus every derived view of it.

use qc_core::{AnalyteIndex, ColumnIndex, RowIndex, ServiceItemIndex};
use qc_schema::{CellValue, ColumnDefinition, Payload, RowData};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::batch::BatchController;
use crate::error::{StoreError, StoreResult};
use crate::filter::{FilterCache, FilterState, ViewMode};
use crate::format::{self, CellFlag, FormatRules, FormatSource};
use crate::header::{self, GridHeader};
use crate::notify::{ChangeKind, ChangeNotice, Notifier, OperationOutcome, SubscriptionId};
use crate::projection::{self, GridRows, ProjectionCache, ProjectionUpdate};
use crate::row_cache::RowCache;
use crate::schema_index::SchemaIndex;

/// Single-writer store over one payload.
///
/// Reads always observe every applied mutation. Notifications to subscribers
/// are deferred while a batch is open and issued once when it closes.
#[derive(Debug, Default)]
pub struct GridStore {
    pub(crate) payload: Option<Payload>,
    pub(crate) generation: u64,
    pub(crate) schema_index: SchemaIndex,
    pub(crate) rows: RowCache,
    /// Rows notified as changed but not yet consumed by a projection.
    pub(crate) changed_rows: BTreeSet<RowIndex>,
    pub(crate) batch: BatchController,
    pub(crate) notifier: Notifier,
    pub(crate) has_unsaved_changes: bool,
    filters: FilterState,
    filter_cache: FilterCache,
    projection: ProjectionCache,
    rules: FormatRules,
}

impl GridStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: FormatRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    // ---- dataset lifecycle -------------------------------------------------

    /// Replace the dataset wholesale. Every cache is invalidated.
    pub fn load(&mut self, payload: Payload) {
        self.generation += 1;
        self.schema_index = SchemaIndex::build(&payload, self.generation);
        self.rows.refresh(&payload, self.generation, &BTreeSet::new());
        self.changed_rows.clear();
        self.filter_cache.invalidate();
        self.projection.invalidate();
        self.has_unsaved_changes = false;
        debug!(
            generation = self.generation,
            rows = payload.rows.len(),
            columns = payload.metadata.schema.column_definitions.len(),
            "dataset loaded"
        );
        self.payload = Some(payload);
        self.emit(ChangeKind::Reload, Vec::new());
    }

    pub fn unload(&mut self) -> Option<Payload> {
        let payload = self.payload.take()?;
        self.generation += 1;
        self.schema_index = SchemaIndex::default();
        self.rows.clear();
        self.changed_rows.clear();
        self.filter_cache.invalidate();
        self.projection.invalidate();
        self.has_unsaved_changes = false;
        self.emit(ChangeKind::Unload, Vec::new());
        Some(payload)
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn require_payload(&self) -> StoreResult<&Payload> {
        self.payload.as_ref().ok_or(StoreError::NoDataset)
    }

    pub fn is_loaded(&self) -> bool {
        self.payload.is_some()
    }

    /// Bumped on every load/unload; identifies the current payload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    pub fn mark_saved(&mut self) {
        self.has_unsaved_changes = false;
    }

    pub fn rules(&self) -> &FormatRules {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: FormatRules) {
        self.rules = rules;
    }

    // ---- lookups ----------------------------------------------------------

    pub fn row(&self, row: RowIndex) -> Option<&RowData> {
        self.rows.row(self.payload.as_ref()?, row)
    }

    pub fn cell(&self, row: RowIndex, column: ColumnIndex) -> Option<&CellValue> {
        let payload = self.payload.as_ref()?;
        let pos = self.rows.row_position(row)?;
        let cell = self.rows.cell_position(row, column)?;
        payload.rows.get(pos)?.values.get(cell)
    }

    pub fn column(&self, column: ColumnIndex) -> Option<&ColumnDefinition> {
        self.schema_index.column(self.payload.as_ref()?, column)
    }

    pub fn service_item_by_code(&self, code: &str) -> Option<ServiceItemIndex> {
        self.schema_index.service_item_by_code(code)
    }

    pub fn analyte_by_code(&self, code: &str) -> Option<AnalyteIndex> {
        self.schema_index.analyte_by_code(code)
    }

    pub fn schema_index(&self) -> &SchemaIndex {
        &self.schema_index
    }

    // ---- notification -----------------------------------------------------

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&ChangeNotice) + Send + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn on_operation_complete(
        &mut self,
        listener: impl FnMut(&OperationOutcome) + Send + 'static,
    ) -> SubscriptionId {
        self.notifier.on_operation_complete(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn report_outcome(&mut self, outcome: OperationOutcome) {
        debug!(
            kind = ?outcome.kind,
            affected = outcome.affected,
            skipped = outcome.skipped,
            "operation complete"
        );
        self.notifier.emit_outcome(&outcome);
    }

    /// Total change notices issued since the store was created.
    pub fn signal_count(&self) -> u64 {
        self.notifier.signal_count()
    }

    fn emit(&mut self, kind: ChangeKind, rows: Vec<RowIndex>) {
        let notice = ChangeNotice {
            kind,
            generation: self.generation,
            rows,
        };
        self.notifier.emit(&notice);
    }

    /// Record that `row` was mutated: deferred while batching, notified
    /// immediately otherwise.
    pub(crate) fn touch_row(&mut self, row: RowIndex) {
        self.has_unsaved_changes = true;
        if self.batch.record(row) {
            return;
        }
        self.changed_rows.insert(row);
        self.emit(ChangeKind::Rows, vec![row]);
    }

    // ---- batching ---------------------------------------------------------

    pub fn start_batch(&mut self) {
        self.batch.start();
    }

    /// Close the batch. The outermost close issues exactly one notice,
    /// whatever the number of mutations inside it.
    pub fn end_batch(&mut self) {
        if let Some(pending) = self.batch.end() {
            self.changed_rows.extend(pending.iter().copied());
            self.emit(ChangeKind::Rows, pending.into_iter().collect());
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_batching()
    }

    /// Run `f` inside a batch.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.start_batch();
        let out = f(self);
        self.end_batch();
        out
    }

    /// Rows notified as changed and not yet folded into a projection.
    pub fn changed_rows(&self) -> &BTreeSet<RowIndex> {
        &self.changed_rows
    }

    // ---- filters ----------------------------------------------------------

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn has_active_filters(&self) -> bool {
        self.filters.has_active_filters()
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        if self.filters == filters {
            return;
        }
        self.filters = filters;
        self.emit(ChangeKind::Filters, Vec::new());
    }

    pub fn set_selected_service_item(&mut self, si: Option<ServiceItemIndex>) {
        let filters = FilterState {
            selected_service_item: si,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_show_reportable_only(&mut self, on: bool) {
        let filters = FilterState {
            show_reportable_only: on,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        let filters = FilterState {
            view_mode: mode,
            ..self.filters.clone()
        };
        self.set_filters(filters);
    }

    pub fn clear_filters(&mut self) {
        self.set_filters(FilterState::default());
    }

    /// Visible columns; the same allocation is returned while the filter
    /// inputs and payload are unchanged.
    pub fn filtered_columns(&mut self) -> Arc<[ColumnDefinition]> {
        let Some(payload) = self.payload.as_ref() else {
            return Arc::from(Vec::new());
        };
        self.filter_cache
            .columns(payload, &self.schema_index, self.generation, &self.filters)
    }

    pub fn filtered_rows(&mut self) -> Arc<[RowIndex]> {
        let Some(payload) = self.payload.as_ref() else {
            return Arc::from(Vec::new());
        };
        self.filter_cache
            .rows(payload, &self.schema_index, self.generation, &self.filters)
    }

    // ---- projection -------------------------------------------------------

    /// Grid records for the visible rows and columns.
    ///
    /// Consumes the changed-row set: rows listed there are rebuilt, every
    /// other record is handed back as the same shared allocation.
    pub fn grid_rows(&mut self) -> (GridRows, ProjectionUpdate) {
        let columns = self.filtered_columns();
        let rows = self.filtered_rows();
        let changed = std::mem::take(&mut self.changed_rows);

        let payload = self.payload.as_ref();
        let row_cache = &self.rows;
        self.projection.project(&columns, &rows, &changed, |r| {
            let payload = payload?;
            let pos = row_cache.row_position(r)?;
            let data = payload.rows.get(pos)?;
            Some(projection::build_row(data, &columns, |c| {
                row_cache
                    .cell_position(r, c)
                    .and_then(|i| data.values.get(i))
                    .map(|cell| projection::cell_json(&cell.value))
            }))
        })
    }

    /// Row index at each position of the last `grid_rows` output.
    pub fn row_keys(&self) -> &[RowIndex] {
        self.projection.row_keys()
    }

    pub fn grid_header(&mut self) -> GridHeader {
        let columns = self.filtered_columns();
        match self.payload.as_ref() {
            Some(payload) => header::build_header(payload, &self.schema_index, &columns),
            None => GridHeader::default(),
        }
    }

    // ---- formatting -------------------------------------------------------

    /// Classify one result cell. Recomputed on every call.
    pub fn classify_cell(&self, row: RowIndex, column: ColumnIndex) -> Option<CellFlag> {
        let payload = self.payload.as_ref()?;
        let col = self.schema_index.column(payload, column)?;
        if !col.is_result() {
            return None;
        }
        let analyte = col
            .analyte_index
            .and_then(|a| self.schema_index.analyte(payload, a));
        format::classify(self, &self.rules, row, column, analyte)
    }

    /// Flags for every visible result column of `row`, keyed by grid key.
    pub fn row_flags(&mut self, row: RowIndex) -> BTreeMap<String, CellFlag> {
        let columns = self.filtered_columns();
        columns
            .iter()
            .filter(|c| c.is_result())
            .filter_map(|c| {
                self.classify_cell(row, c.column_index)
                    .map(|flag| (c.column_index.grid_key(), flag))
            })
            .collect()
    }

    /// JSON value of a cell, static or dynamic, or `None` if absent.
    pub fn cell_json(&self, row: RowIndex, column: ColumnIndex) -> Option<Value> {
        if column.is_static() {
            return self.cell_value(row, column).map(|v| v.to_json());
        }
        self.cell(row, column).map(|c| projection::cell_json(&c.value))
    }
}

impl FormatSource for GridStore {
    fn row(&self, row: RowIndex) -> Option<&RowData> {
        GridStore::row(self, row)
    }

    fn numeric_value(&self, row: RowIndex, column: ColumnIndex) -> Option<f64> {
        self.cell(row, column).and_then(|c| c.value.as_f64())
    }

    fn traveler_rows(&self, traveler_no: &str) -> &[RowIndex] {
        self.schema_index.traveler_rows(traveler_no)
    }
}
