//! View projection: flat per-row records for the grid widget.
//!
//! Output rows are shared (`Arc`) so an unchanged row keeps its identity
//! across projections, and an unchanged projection keeps the identity of
//! the whole array.

use qc_core::{ColumnIndex, RowIndex, StaticField};
use qc_schema::{CellScalar, ColumnDefinition, RowData};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub type GridRow = Map<String, Value>;
pub type GridRows = Arc<Vec<Arc<GridRow>>>;

/// Key under which each projected row carries its source row index.
pub const ROW_INDEX_KEY: &str = "_rowIndex";

/// How the last call to [`ProjectionCache::project`] produced its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionUpdate {
    /// Nothing changed; the previous array was returned as is.
    Reused,
    /// Columns or the visible row set changed; every row was rebuilt.
    Rebuilt,
    /// Only the listed number of changed rows were rebuilt.
    Patched(usize),
}

pub fn static_value(row: &RowData, field: StaticField) -> Value {
    match field {
        StaticField::SeqNo => Value::from(row.seq_no),
        StaticField::SampleName => Value::from(row.sample_name.clone()),
        StaticField::TravelerNo => Value::from(row.traveler_no.clone()),
        StaticField::MaterialType => Value::from(row.material_type.clone()),
        StaticField::ControlType => Value::from(row.control_type.clone()),
    }
}

/// Build one grid row: the five static fields, then every visible dynamic
/// column resolved through `cell` (`null` when absent).
/// JSON for a dynamic cell. Blank text renders as null, like an absent cell.
pub fn cell_json(value: &CellScalar) -> Value {
    if value.is_blank() {
        Value::Null
    } else {
        value.to_json()
    }
}

pub fn build_row(
    row: &RowData,
    columns: &[ColumnDefinition],
    cell: impl Fn(ColumnIndex) -> Option<Value>,
) -> GridRow {
    let mut out = Map::new();
    out.insert(ROW_INDEX_KEY.to_string(), Value::from(row.row_index.get()));
    for field in StaticField::ALL {
        out.insert(field.column().grid_key(), static_value(row, field));
    }
    for col in columns.iter().filter(|c| !c.column_index.is_static()) {
        out.insert(
            col.column_index.grid_key(),
            cell(col.column_index).unwrap_or(Value::Null),
        );
    }
    out
}

#[derive(Debug, Default)]
pub struct ProjectionCache {
    columns: Option<Arc<[ColumnDefinition]>>,
    rows: Option<Arc<[RowIndex]>>,
    positions: HashMap<RowIndex, usize>,
    keys: Vec<RowIndex>,
    output: GridRows,
}

fn same<T: PartialEq>(prev: Option<&Arc<[T]>>, current: &Arc<[T]>) -> bool {
    prev.is_some_and(|p| Arc::ptr_eq(p, current) || **p == **current)
}

impl ProjectionCache {
    /// Produce grid rows for `columns` × `rows`.
    ///
    /// `changed` lists rows mutated since the previous call. `build` returns
    /// `None` for a row that no longer resolves; such rows are left out.
    pub fn project(
        &mut self,
        columns: &Arc<[ColumnDefinition]>,
        rows: &Arc<[RowIndex]>,
        changed: &BTreeSet<RowIndex>,
        mut build: impl FnMut(RowIndex) -> Option<GridRow>,
    ) -> (GridRows, ProjectionUpdate) {
        let structure_same =
            same(self.columns.as_ref(), columns) && same(self.rows.as_ref(), rows);

        if !structure_same {
            let mut output = Vec::with_capacity(rows.len());
            let mut positions = HashMap::with_capacity(rows.len());
            let mut keys = Vec::with_capacity(rows.len());
            for &row in rows.iter() {
                if let Some(record) = build(row) {
                    positions.insert(row, output.len());
                    keys.push(row);
                    output.push(Arc::new(record));
                }
            }
            self.keys = keys;
            self.columns = Some(Arc::clone(columns));
            self.rows = Some(Arc::clone(rows));
            self.positions = positions;
            self.output = Arc::new(output);
            return (Arc::clone(&self.output), ProjectionUpdate::Rebuilt);
        }

        let touched: Vec<(usize, RowIndex)> = changed
            .iter()
            .filter_map(|row| self.positions.get(row).map(|&pos| (pos, *row)))
            .collect();
        if touched.is_empty() {
            return (Arc::clone(&self.output), ProjectionUpdate::Reused);
        }

        let mut output: Vec<Arc<GridRow>> = self.output.as_ref().clone();
        let mut patched = 0;
        for (pos, row) in touched {
            if let Some(record) = build(row) {
                output[pos] = Arc::new(record);
                patched += 1;
            }
        }
        self.output = Arc::new(output);
        (Arc::clone(&self.output), ProjectionUpdate::Patched(patched))
    }

    /// Row index at each position of the current output.
    pub fn row_keys(&self) -> &[RowIndex] {
        &self.keys
    }

    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}
