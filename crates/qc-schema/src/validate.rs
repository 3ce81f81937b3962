//! Payload validation logic.

use crate::schema::{ColumnKind, Payload};
use qc_core::{AnalyteIndex, ColumnIndex, RowIndex, ServiceItemIndex};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate column index {column}")]
    DuplicateColumn { column: ColumnIndex },

    #[error("Column {column} is {kind} but static columns occupy indices 0..5")]
    MisplacedColumn { column: ColumnIndex, kind: String },

    #[error("Duplicate row index {row}")]
    DuplicateRow { row: RowIndex },

    #[error("Row {row} stores a cell for static column {column}")]
    StaticCellInRow { row: RowIndex, column: ColumnIndex },

    #[error("Row {row} stores a cell for unknown column {column}")]
    UnknownCellColumn { row: RowIndex, column: ColumnIndex },

    #[error("Row {row} stores more than one cell for column {column}")]
    DuplicateCell { row: RowIndex, column: ColumnIndex },

    #[error("Analyte {analyte} refers to unknown service item {service_item}")]
    UnknownServiceItem {
        analyte: AnalyteIndex,
        service_item: ServiceItemIndex,
    },

    #[error("Duplicate service item index {service_item}")]
    DuplicateServiceItem { service_item: ServiceItemIndex },

    #[error("Duplicate analyte index {analyte}")]
    DuplicateAnalyte { analyte: AnalyteIndex },
}

pub fn validate_payload(payload: &Payload) -> Result<(), ValidationError> {
    let schema = &payload.metadata.schema;

    let mut si_indices = HashSet::new();
    for si in &schema.service_items {
        if !si_indices.insert(si.si_index) {
            return Err(ValidationError::DuplicateServiceItem {
                service_item: si.si_index,
            });
        }
    }

    let mut analyte_indices = HashSet::new();
    for analyte in &schema.analytes {
        if !analyte_indices.insert(analyte.analyte_index) {
            return Err(ValidationError::DuplicateAnalyte {
                analyte: analyte.analyte_index,
            });
        }
        if !si_indices.contains(&analyte.si_index) {
            return Err(ValidationError::UnknownServiceItem {
                analyte: analyte.analyte_index,
                service_item: analyte.si_index,
            });
        }
    }

    let mut columns = HashSet::new();
    for col in &schema.column_definitions {
        if !columns.insert(col.column_index) {
            return Err(ValidationError::DuplicateColumn {
                column: col.column_index,
            });
        }
        let is_static_kind = matches!(col.kind, ColumnKind::Static);
        if is_static_kind != col.column_index.is_static() {
            return Err(ValidationError::MisplacedColumn {
                column: col.column_index,
                kind: col.column_type().to_string(),
            });
        }
    }

    let mut rows = HashSet::new();
    for row in &payload.rows {
        if !rows.insert(row.row_index) {
            return Err(ValidationError::DuplicateRow { row: row.row_index });
        }
        let mut cells = HashSet::new();
        for cell in &row.values {
            if cell.column_index.is_static() {
                return Err(ValidationError::StaticCellInRow {
                    row: row.row_index,
                    column: cell.column_index,
                });
            }
            if !columns.contains(&cell.column_index) {
                return Err(ValidationError::UnknownCellColumn {
                    row: row.row_index,
                    column: cell.column_index,
                });
            }
            if !cells.insert(cell.column_index) {
                return Err(ValidationError::DuplicateCell {
                    row: row.row_index,
                    column: cell.column_index,
                });
            }
        }
    }

    Ok(())
}
