//! Row and cell lookup maps, maintained incrementally.
//!
//! Rows are addressed by `RowIndex` and cells by `(RowIndex, ColumnIndex)`.
//! Both resolve to positions in the payload's vectors, so lookups hand out
//! borrows of the payload itself rather than copies.

use qc_core::{ColumnIndex, RowIndex};
use qc_schema::{Payload, RowData};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
struct RowEntry {
    /// Position of the row in `payload.rows`.
    position: usize,
    /// columnIndex -> position in `row.values`.
    cells: HashMap<ColumnIndex, usize>,
}

impl RowEntry {
    fn scan(position: usize, row: &RowData) -> Self {
        let cells = row
            .values
            .iter()
            .enumerate()
            .map(|(i, cell)| (cell.column_index, i))
            .collect();
        Self { position, cells }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RowCache {
    generation: Option<u64>,
    entries: HashMap<RowIndex, RowEntry>,
}

impl RowCache {
    /// Bring the cache up to date with `payload`.
    ///
    /// A new `generation` drops every entry first. Otherwise only rows listed
    /// in `changed`, or missing from the cache, are re-scanned; all other
    /// entries are kept as they are. Returns the number of rows re-scanned.
    pub fn refresh(
        &mut self,
        payload: &Payload,
        generation: u64,
        changed: &BTreeSet<RowIndex>,
    ) -> usize {
        if self.generation != Some(generation) {
            self.entries.clear();
            self.generation = Some(generation);
        }

        let mut rebuilt = 0;
        for (position, row) in payload.rows.iter().enumerate() {
            let stale = match self.entries.get(&row.row_index) {
                Some(entry) => entry.position != position || changed.contains(&row.row_index),
                None => true,
            };
            if stale {
                self.entries
                    .insert(row.row_index, RowEntry::scan(position, row));
                rebuilt += 1;
            }
        }
        rebuilt
    }

    /// Re-scan a single row after it was mutated in place.
    pub fn reindex_row(&mut self, position: usize, row: &RowData) {
        self.entries
            .insert(row.row_index, RowEntry::scan(position, row));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation = None;
    }

    pub fn row_position(&self, row: RowIndex) -> Option<usize> {
        self.entries.get(&row).map(|e| e.position)
    }

    pub fn cell_position(&self, row: RowIndex, column: ColumnIndex) -> Option<usize> {
        self.entries
            .get(&row)
            .and_then(|e| e.cells.get(&column).copied())
    }

    pub fn row<'p>(&self, payload: &'p Payload, row: RowIndex) -> Option<&'p RowData> {
        self.row_position(row).and_then(|i| payload.rows.get(i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
