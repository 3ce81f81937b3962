//! Mutation API. Every operation is a no-op (returning `false`) when the
//! dataset, row, or cell it targets cannot be resolved.
//!
//! Final cells are not protected here; callers check [`GridStore::is_cell_final`]
//! before mutating.

use chrono::Utc;
use qc_core::{AnalyteIndex, ColumnIndex, RowIndex, ServiceItemIndex, StaticField, ensure_finite};
use qc_schema::{CellScalar, CellValue, ColumnDefinition, RowData};
use tracing::{debug, warn};

use crate::store::GridStore;

fn static_scalar(row: &RowData, field: StaticField) -> CellScalar {
    match field {
        StaticField::SeqNo => CellScalar::Number(row.seq_no as f64),
        StaticField::SampleName => CellScalar::Text(row.sample_name.clone()),
        StaticField::TravelerNo => CellScalar::Text(row.traveler_no.clone()),
        StaticField::MaterialType => CellScalar::Text(row.material_type.clone()),
        StaticField::ControlType => CellScalar::Text(row.control_type.clone()),
    }
}

impl GridStore {
    /// Value at `(row, column)`. Static columns read the row's own fields;
    /// dynamic columns read the sparse cell list.
    pub fn cell_value(&self, row: RowIndex, column: ColumnIndex) -> Option<CellScalar> {
        let data = self.row(row)?;
        if let Some(field) = StaticField::from_column(column) {
            return Some(static_scalar(data, field));
        }
        self.cell(row, column).map(|c| c.value.clone())
    }

    pub fn is_cell_final(&self, row: RowIndex, column: ColumnIndex) -> bool {
        self.cell(row, column).is_some_and(|c| c.is_final)
    }

    pub fn find_result_column(
        &self,
        si: ServiceItemIndex,
        analyte: AnalyteIndex,
    ) -> Option<&ColumnDefinition> {
        let column = self.schema_index.result_column(si, analyte)?;
        self.column(column)
    }

    /// Run `f` on the cell at `(row, column)`, creating it with `init` when
    /// absent and `init` is given. Returns `None` if nothing was touched,
    /// including when `column` is not in the schema.
    fn with_cell<R>(
        &mut self,
        row: RowIndex,
        column: ColumnIndex,
        init: Option<CellScalar>,
        f: impl FnOnce(&mut CellValue) -> R,
    ) -> Option<R> {
        self.column(column)?;
        let pos = self.rows.row_position(row)?;
        let cell_pos = self.rows.cell_position(row, column);
        let data = self.payload.as_mut()?.rows.get_mut(pos)?;

        let out = match cell_pos {
            Some(i) => f(data.values.get_mut(i)?),
            None => {
                let mut cell = CellValue::new(column, init?);
                let out = f(&mut cell);
                data.values.push(cell);
                self.rows.reindex_row(pos, data);
                out
            }
        };
        self.touch_row(row);
        Some(out)
    }

    /// Set a dynamic cell's value, creating the cell if needed. `source`
    /// is recorded as the cell's provenance when given.
    pub fn set_cell_value(
        &mut self,
        row: RowIndex,
        column: ColumnIndex,
        value: impl Into<CellScalar>,
        source: Option<&str>,
    ) -> bool {
        if column.is_static() {
            debug!(%row, %column, "static columns are not writable");
            return false;
        }
        let value = value.into();
        let applied = self.with_cell(row, column, Some(value.clone()), |cell| {
            cell.value = value;
            if let Some(source) = source {
                cell.copied_from = Some(source.to_string());
            }
        });
        if applied.is_none() {
            debug!(%row, %column, "set_cell_value: row not found");
        }
        applied.is_some()
    }

    /// Lock a cell as final. No-op when the cell has no value.
    pub fn mark_result_cell_final(&mut self, row: RowIndex, column: ColumnIndex) -> bool {
        if column.is_static() {
            return false;
        }
        let has_value = self.cell(row, column).is_some_and(|c| !c.value.is_blank());
        if !has_value {
            debug!(%row, %column, "mark final skipped: cell has no value");
            return false;
        }
        let now = Utc::now();
        self.with_cell(row, column, None, |cell| {
            cell.is_final = true;
            cell.marked_final_at = Some(now);
        })
        .is_some()
    }

    /// Remove the cell from the row's sparse list entirely.
    pub fn clear_result_cell(&mut self, row: RowIndex, column: ColumnIndex) -> bool {
        let (Some(pos), Some(cell_pos)) = (
            self.rows.row_position(row),
            self.rows.cell_position(row, column),
        ) else {
            debug!(%row, %column, "clear skipped: no such cell");
            return false;
        };
        let Some(data) = self.payload.as_mut().and_then(|p| p.rows.get_mut(pos)) else {
            return false;
        };
        if cell_pos >= data.values.len() {
            return false;
        }
        data.values.remove(cell_pos);
        self.rows.reindex_row(pos, data);
        self.touch_row(row);
        true
    }

    /// Store a baseline and/or multiplier correction and recompute the value
    /// as `(original + baseline) * multiplier` from the first numeric value
    /// the cell held. Both stored factors apply on every recompute.
    pub fn set_manual_correction(
        &mut self,
        row: RowIndex,
        column: ColumnIndex,
        baseline: Option<f64>,
        multiplier: Option<f64>,
    ) -> bool {
        if column.is_static() || (baseline.is_none() && multiplier.is_none()) {
            return false;
        }
        let applied = self.with_cell(row, column, Some(CellScalar::Text(String::new())), |cell| {
            if let Some(b) = baseline {
                cell.baseline_correction = Some(b);
            }
            if let Some(m) = multiplier {
                cell.multiplier = Some(m);
            }
            if cell.original_value.is_none() && cell.value.as_f64().is_some() {
                cell.original_value = Some(cell.value.clone());
            }

            let Some(original) = cell.original_value.as_ref().and_then(CellScalar::as_f64) else {
                debug!(%row, %column, "no numeric original value; correction stored only");
                return;
            };
            let corrected = (original + cell.baseline_correction.unwrap_or(0.0))
                * cell.multiplier.unwrap_or(1.0);
            match ensure_finite(corrected, "corrected value") {
                Ok(v) => cell.value = CellScalar::Number(v),
                Err(err) => warn!(%row, %column, %err, "correction left value unchanged"),
            }
        });
        applied.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_payload;

    fn loaded() -> GridStore {
        let mut store = GridStore::new();
        store.load(sample_payload());
        store
    }

    const CU: ColumnIndex = ColumnIndex::new(8);
    const ZN: ColumnIndex = ColumnIndex::new(9);

    #[test]
    fn static_columns_read_row_fields() {
        let store = loaded();
        let r = RowIndex::new(1);
        assert_eq!(store.cell_value(r, ColumnIndex::new(0)), Some(CellScalar::Number(2.0)));
        assert_eq!(store.cell_value(r, ColumnIndex::new(1)), Some("A1-R".into()));
        assert_eq!(store.cell_value(r, ColumnIndex::new(4)), Some("REJECTDUP".into()));
        assert_eq!(store.cell_value(RowIndex::new(99), ColumnIndex::new(0)), None);
    }

    #[test]
    fn set_then_get() {
        let mut store = loaded();
        let r = RowIndex::new(1);
        assert_eq!(store.cell_value(r, ZN), None);
        assert!(store.set_cell_value(r, ZN, 12.5, None));
        assert_eq!(store.cell_value(r, ZN), Some(CellScalar::Number(12.5)));

        assert!(store.set_cell_value(r, ZN, "13", Some("A1")));
        assert_eq!(store.cell_value(r, ZN), Some("13".into()));
        let cell = store.cell(r, ZN).unwrap();
        assert_eq!(cell.copied_from.as_deref(), Some("A1"));
        assert_eq!(store.row(r).unwrap().values.len(), 2);
        assert!(store.has_unsaved_changes());
    }

    #[test]
    fn writes_to_static_or_missing_rows_are_noops() {
        let mut store = loaded();
        assert!(!store.set_cell_value(RowIndex::new(0), ColumnIndex::new(1), "X", None));
        assert!(!store.set_cell_value(RowIndex::new(99), CU, 1.0, None));
        assert!(!store.has_unsaved_changes());
    }

    #[test]
    fn writes_to_unknown_columns_are_noops() {
        let mut store = loaded();
        let r = RowIndex::new(0);
        let before = store.row(r).unwrap().values.len();
        assert!(!store.set_cell_value(r, ColumnIndex::new(999), 1.0, None));
        assert!(!store.set_manual_correction(r, ColumnIndex::new(998), Some(1.0), None));
        assert_eq!(store.row(r).unwrap().values.len(), before);
        assert!(!store.has_unsaved_changes());
        assert!(qc_schema::validate_payload(store.payload().unwrap()).is_ok());
    }

    #[test]
    fn blank_corrected_cell_projects_as_null() {
        let mut store = loaded();
        let r = RowIndex::new(3);
        assert!(store.clear_result_cell(r, CU));
        assert!(store.set_manual_correction(r, CU, Some(1.0), None));
        assert_eq!(store.cell_json(r, CU), Some(serde_json::Value::Null));
        let (rows, _) = store.grid_rows();
        assert_eq!(rows[3]["col_8"], serde_json::Value::Null);
    }

    #[test]
    fn mark_final_requires_a_value() {
        let mut store = loaded();
        let r = RowIndex::new(1);
        assert!(!store.mark_result_cell_final(r, ZN));
        assert!(!store.is_cell_final(r, ZN));
        assert!(store.cell(r, ZN).is_none());

        assert!(store.mark_result_cell_final(r, CU));
        let cell = store.cell(r, CU).unwrap();
        assert!(cell.is_final);
        assert!(cell.marked_final_at.is_some());
    }

    #[test]
    fn mark_final_skips_blank_text() {
        let mut store = loaded();
        let r = RowIndex::new(2);
        store.set_cell_value(r, ZN, "  ", None);
        assert!(!store.mark_result_cell_final(r, ZN));
        assert!(!store.is_cell_final(r, ZN));
    }

    #[test]
    fn clear_removes_the_cell() {
        let mut store = loaded();
        let r = RowIndex::new(0);
        assert!(store.clear_result_cell(r, CU));
        assert_eq!(store.cell_value(r, CU), None);
        assert!(store.row(r).unwrap().values.iter().all(|c| c.column_index != CU));
        // The remaining cells still resolve after positions shifted.
        assert_eq!(store.cell_value(r, ZN), Some(CellScalar::Number(55.0)));
        assert!(!store.clear_result_cell(r, CU));
    }

    #[test]
    fn corrections_recompute_from_original() {
        let mut store = loaded();
        let r = RowIndex::new(0);
        assert!(store.set_manual_correction(r, CU, Some(2.5), None));
        assert_eq!(store.cell_value(r, CU), Some(CellScalar::Number(102.5)));
        assert!(store.set_manual_correction(r, CU, None, Some(3.0)));
        assert_eq!(store.cell_value(r, CU), Some(CellScalar::Number(307.5)));
        assert!(store.set_manual_correction(r, CU, None, Some(3.0)));
        assert_eq!(store.cell_value(r, CU), Some(CellScalar::Number(307.5)));

        let cell = store.cell(r, CU).unwrap();
        assert_eq!(cell.original_value, Some(CellScalar::Number(100.0)));
        assert_eq!(cell.baseline_correction, Some(2.5));
        assert_eq!(cell.multiplier, Some(3.0));
    }

    #[test]
    fn correction_on_absent_cell_stores_factors_only() {
        let mut store = loaded();
        let r = RowIndex::new(3);
        assert!(store.set_manual_correction(r, ZN, Some(1.0), None));
        let cell = store.cell(r, ZN).unwrap();
        assert_eq!(cell.baseline_correction, Some(1.0));
        assert_eq!(cell.original_value, None);

        // The first numeric value becomes the baseline for later corrections.
        store.set_cell_value(r, ZN, 10.0, None);
        store.set_manual_correction(r, ZN, None, Some(2.0));
        assert_eq!(store.cell_value(r, ZN), Some(CellScalar::Number(22.0)));
    }

    #[test]
    fn non_finite_correction_keeps_value() {
        let mut store = loaded();
        let r = RowIndex::new(0);
        assert!(store.set_manual_correction(r, CU, None, Some(f64::INFINITY)));
        assert_eq!(store.cell_value(r, CU), Some(CellScalar::Number(100.0)));
    }

    #[test]
    fn find_result_column_is_keyed_by_item_and_analyte() {
        let store = loaded();
        let col = store
            .find_result_column(ServiceItemIndex::new(0), AnalyteIndex::new(1))
            .unwrap();
        assert_eq!(col.column_index, ZN);
        assert!(store
            .find_result_column(ServiceItemIndex::new(1), AnalyteIndex::new(0))
            .is_none());
    }

    #[test]
    fn unloaded_store_is_inert() {
        let mut store = GridStore::new();
        assert_eq!(store.cell_value(RowIndex::new(0), CU), None);
        assert!(!store.set_cell_value(RowIndex::new(0), CU, 1.0, None));
        assert!(!store.mark_result_cell_final(RowIndex::new(0), CU));
        assert!(!store.clear_result_cell(RowIndex::new(0), CU));
        assert!(!store.set_manual_correction(RowIndex::new(0), CU, Some(1.0), None));
        assert_eq!(store.signal_count(), 0);
    }
}
