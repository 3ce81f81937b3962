//! Property tests over the store's mutation and batching contracts.

use proptest::prelude::*;
use qc_core::{ColumnIndex, RowIndex};
use qc_schema::{CellScalar, load_json};
use qc_store::GridStore;
use std::path::Path;
use std::sync::Arc;

const CU: ColumnIndex = ColumnIndex::new(8);

fn loaded() -> GridStore {
    let payload = load_json(Path::new("../../fixtures/sample_job.json")).unwrap();
    let mut store = GridStore::new();
    store.load(payload);
    store
}

proptest! {
    #[test]
    fn corrections_never_compound(
        original in 0.1_f64..1.0e4,
        baseline in -100.0_f64..100.0,
        multiplier in 0.1_f64..10.0,
        repeats in 1_usize..5,
    ) {
        let mut store = loaded();
        let r = RowIndex::new(9);
        store.set_cell_value(r, CU, original, None);
        for _ in 0..repeats {
            store.set_manual_correction(r, CU, Some(baseline), None);
            store.set_manual_correction(r, CU, None, Some(multiplier));
        }
        let expected = (original + baseline) * multiplier;
        let actual = store.cell_value(r, CU).and_then(|v| v.as_f64()).unwrap();
        prop_assert!((actual - expected).abs() <= 1e-9 * expected.abs().max(1.0));
    }

    #[test]
    fn set_then_get_returns_value(row in 0_u32..10, value in -1.0e6_f64..1.0e6) {
        let mut store = loaded();
        prop_assert!(store.set_cell_value(RowIndex::new(row), CU, value, None));
        prop_assert_eq!(
            store.cell_value(RowIndex::new(row), CU),
            Some(CellScalar::Number(value))
        );
    }

    #[test]
    fn one_notice_per_batch(edits in prop::collection::vec((0_u32..10, 0.0_f64..500.0), 0..200)) {
        let mut store = loaded();
        let before = store.signal_count();
        store.batch(|s| {
            for &(row, value) in &edits {
                s.set_cell_value(RowIndex::new(row), CU, value, None);
            }
        });
        prop_assert_eq!(store.signal_count() - before, 1);

        let distinct: std::collections::BTreeSet<u32> = edits.iter().map(|(r, _)| *r).collect();
        prop_assert_eq!(store.changed_rows().len(), distinct.len());
    }

    #[test]
    fn filtered_columns_are_memoized(si in prop::option::of(0_u32..3), reportable: bool) {
        let mut store = loaded();
        store.set_selected_service_item(si.map(Into::into));
        store.set_show_reportable_only(reportable);
        let a = store.filtered_columns();
        let b = store.filtered_columns();
        prop_assert!(Arc::ptr_eq(&a, &b));
    }
}
