//! Bulk cell operations over many targets.
//!
//! Targets are processed in chunks inside a single batch, so the whole
//! operation produces one change notice. The store lock is released and
//! the thread yields between chunks. A progress event follows each chunk.

use qc_core::{ColumnIndex, RowIndex};
use qc_schema::{CellScalar, ColumnType};
use qc_store::{GridStore, OperationKind, OperationOutcome};
use std::thread;
use tracing::{debug, info};

use crate::progress::BulkProgress;
use crate::shared::SharedStore;

#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    MarkFinal,
    Clear,
    Correct {
        baseline: Option<f64>,
        multiplier: Option<f64>,
    },
    SetValue {
        value: CellScalar,
        source: Option<String>,
    },
}

impl BulkAction {
    pub fn kind(&self) -> OperationKind {
        match self {
            BulkAction::MarkFinal => OperationKind::MarkFinal,
            BulkAction::Clear => OperationKind::Clear,
            BulkAction::Correct { .. } => OperationKind::Correct,
            BulkAction::SetValue { .. } => OperationKind::SetValue,
        }
    }

    fn requires_result_column(&self) -> bool {
        !matches!(self, BulkAction::SetValue { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellTarget {
    pub row: RowIndex,
    pub column: ColumnIndex,
}

impl CellTarget {
    pub fn new(row: impl Into<RowIndex>, column: impl Into<ColumnIndex>) -> Self {
        Self {
            row: row.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub affected: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    UnknownColumn,
    WrongColumnType(ColumnType),
    Final,
    NoEffect,
}

fn check_target(store: &GridStore, target: CellTarget, action: &BulkAction) -> Result<(), Skip> {
    let column = store.column(target.column).ok_or(Skip::UnknownColumn)?;
    let column_type = column.column_type();
    if action.requires_result_column() {
        if column_type != ColumnType::Result {
            return Err(Skip::WrongColumnType(column_type));
        }
    } else if column_type == ColumnType::Static {
        return Err(Skip::WrongColumnType(column_type));
    }
    if store.is_cell_final(target.row, target.column) {
        return Err(Skip::Final);
    }
    Ok(())
}

fn apply_one(store: &mut GridStore, target: CellTarget, action: &BulkAction) -> Result<(), Skip> {
    check_target(store, target, action)?;
    let CellTarget { row, column } = target;
    let applied = match action {
        BulkAction::MarkFinal => store.mark_result_cell_final(row, column),
        BulkAction::Clear => store.clear_result_cell(row, column),
        BulkAction::Correct {
            baseline,
            multiplier,
        } => store.set_manual_correction(row, column, *baseline, *multiplier),
        BulkAction::SetValue { value, source } => {
            store.set_cell_value(row, column, value.clone(), source.as_deref())
        }
    };
    if applied { Ok(()) } else { Err(Skip::NoEffect) }
}

/// Apply `action` to every target, `chunk_size` targets per lock hold.
pub fn apply_bulk(
    store: &SharedStore,
    targets: &[CellTarget],
    action: &BulkAction,
    chunk_size: usize,
    mut progress_cb: Option<&mut dyn FnMut(BulkProgress)>,
) -> BulkOutcome {
    let kind = action.kind();
    let total = targets.len();
    let mut outcome = BulkOutcome::default();

    store.with(GridStore::start_batch);
    for chunk in targets.chunks(chunk_size.max(1)) {
        store.with(|s| {
            for &target in chunk {
                match apply_one(s, target, action) {
                    Ok(()) => outcome.affected += 1,
                    Err(reason) => {
                        debug!(row = %target.row, column = %target.column, ?reason, "bulk target skipped");
                        outcome.skipped += 1;
                    }
                }
            }
        });

        if let Some(cb) = progress_cb.as_deref_mut() {
            cb(BulkProgress {
                kind,
                processed: outcome.affected + outcome.skipped,
                total,
                affected: outcome.affected,
                skipped: outcome.skipped,
            });
        }
        thread::yield_now();
    }

    store.with(|s| {
        s.end_batch();
        s.report_outcome(OperationOutcome {
            kind,
            affected: outcome.affected,
            skipped: outcome.skipped,
        });
    });
    info!(?kind, total, affected = outcome.affected, skipped = outcome.skipped, "bulk operation done");
    outcome
}

/// Every result cell in `columns` that holds a value, in row order.
pub fn result_targets(store: &GridStore, rows: &[RowIndex], columns: &[ColumnIndex]) -> Vec<CellTarget> {
    rows.iter()
        .flat_map(|&row| columns.iter().map(move |&column| CellTarget { row, column }))
        .filter(|t| {
            store
                .column(t.column)
                .is_some_and(|c| c.column_type() == ColumnType::Result)
                && store.cell(t.row, t.column).is_some_and(|c| !c.value.is_blank())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> SharedStore {
        let payload = qc_schema::load_json("../../fixtures/sample_job.json".as_ref()).unwrap();
        let shared = SharedStore::default();
        shared.with(|s| s.load(payload));
        shared
    }

    #[test]
    fn static_and_non_result_columns_are_skipped() {
        let shared = loaded();
        let targets = [
            CellTarget::new(0_u32, 1_u32), // static
            CellTarget::new(0_u32, 5_u32), // rawdata
            CellTarget::new(0_u32, 8_u32), // result
        ];
        let outcome = apply_bulk(&shared, &targets, &BulkAction::MarkFinal, 10, None);
        assert_eq!(outcome, BulkOutcome { affected: 1, skipped: 2 });
    }

    #[test]
    fn set_value_accepts_any_dynamic_column() {
        let shared = loaded();
        let targets = [
            CellTarget::new(0_u32, 0_u32),
            CellTarget::new(0_u32, 6_u32),
            CellTarget::new(0_u32, 7_u32),
        ];
        let action = BulkAction::SetValue {
            value: CellScalar::Number(3.5),
            source: Some("bulk".into()),
        };
        let outcome = apply_bulk(&shared, &targets, &action, 10, None);
        assert_eq!(outcome, BulkOutcome { affected: 2, skipped: 1 });
        let copied = shared.with(|s| s.cell(RowIndex::new(0), ColumnIndex::new(7)).cloned());
        assert_eq!(copied.and_then(|c| c.copied_from).as_deref(), Some("bulk"));
    }

    #[test]
    fn unknown_rows_count_as_skipped() {
        let shared = loaded();
        let targets = [CellTarget::new(999_u32, 8_u32)];
        let outcome = apply_bulk(&shared, &targets, &BulkAction::Clear, 10, None);
        assert_eq!(outcome, BulkOutcome { affected: 0, skipped: 1 });
    }

    #[test]
    fn result_targets_only_lists_filled_result_cells() {
        let shared = loaded();
        let rows: Vec<RowIndex> = (0..10).map(RowIndex::new).collect();
        let columns = [ColumnIndex::new(5), ColumnIndex::new(9)];
        let targets = shared.with(|s| result_targets(s, &rows, &columns));
        assert_eq!(
            targets,
            vec![CellTarget::new(0_u32, 9_u32), CellTarget::new(1_u32, 9_u32)]
        );
    }
}
