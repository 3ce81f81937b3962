//! Schema-sized lookup maps, rebuilt whenever a new payload is loaded.

use qc_core::{AnalyteIndex, ColumnIndex, RowIndex, ServiceItemIndex};
use qc_schema::{Analyte, ColumnDefinition, Payload, ServiceItem};
use std::collections::HashMap;

/// O(1) lookups over the static parts of a payload: columns, service items,
/// analytes, result columns, and rows grouped by traveler number.
///
/// Everything indexed here is immutable for the lifetime of one payload
/// generation, so the whole structure is rebuilt on load and never patched.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    generation: Option<u64>,

    /// columnIndex -> position in `column_definitions`.
    columns: HashMap<ColumnIndex, usize>,

    /// siIndex -> position in `service_items`.
    service_items: HashMap<ServiceItemIndex, usize>,
    service_item_codes: HashMap<String, ServiceItemIndex>,

    /// analyteIndex -> position in `analytes`.
    analytes: HashMap<AnalyteIndex, usize>,
    analyte_codes: HashMap<String, AnalyteIndex>,

    /// (serviceItemIndex, analyteIndex) -> result column.
    result_columns: HashMap<(ServiceItemIndex, AnalyteIndex), ColumnIndex>,

    /// travelerNo -> rows in payload order.
    travelers: HashMap<String, Vec<RowIndex>>,
}

impl SchemaIndex {
    pub fn build(payload: &Payload, generation: u64) -> Self {
        let schema = &payload.metadata.schema;

        let columns = schema
            .column_definitions
            .iter()
            .enumerate()
            .map(|(i, c)| (c.column_index, i))
            .collect();

        let service_items = schema
            .service_items
            .iter()
            .enumerate()
            .map(|(i, si)| (si.si_index, i))
            .collect();

        let mut service_item_codes = HashMap::new();
        for si in &schema.service_items {
            service_item_codes
                .entry(si.code.clone())
                .or_insert(si.si_index);
        }

        let analytes = schema
            .analytes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.analyte_index, i))
            .collect();

        let mut analyte_codes = HashMap::new();
        for analyte in &schema.analytes {
            analyte_codes
                .entry(analyte.code.clone())
                .or_insert(analyte.analyte_index);
        }

        let mut result_columns = HashMap::new();
        for col in schema.column_definitions.iter().filter(|c| c.is_result()) {
            if let (Some(si), Some(analyte)) = (col.service_item_index, col.analyte_index) {
                result_columns.entry((si, analyte)).or_insert(col.column_index);
            }
        }

        let mut travelers: HashMap<String, Vec<RowIndex>> = HashMap::new();
        for row in &payload.rows {
            travelers
                .entry(row.traveler_no.clone())
                .or_default()
                .push(row.row_index);
        }

        Self {
            generation: Some(generation),
            columns,
            service_items,
            service_item_codes,
            analytes,
            analyte_codes,
            result_columns,
            travelers,
        }
    }

    /// Rebuild unless already built for `generation`. Returns true on rebuild.
    pub fn ensure(&mut self, payload: &Payload, generation: u64) -> bool {
        if self.generation == Some(generation) {
            return false;
        }
        *self = Self::build(payload, generation);
        true
    }

    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn column<'p>(&self, payload: &'p Payload, column: ColumnIndex) -> Option<&'p ColumnDefinition> {
        self.columns
            .get(&column)
            .and_then(|&i| payload.metadata.schema.column_definitions.get(i))
    }

    pub fn service_item<'p>(
        &self,
        payload: &'p Payload,
        si: ServiceItemIndex,
    ) -> Option<&'p ServiceItem> {
        self.service_items
            .get(&si)
            .and_then(|&i| payload.metadata.schema.service_items.get(i))
    }

    pub fn service_item_by_code(&self, code: &str) -> Option<ServiceItemIndex> {
        self.service_item_codes.get(code).copied()
    }

    pub fn analyte<'p>(&self, payload: &'p Payload, analyte: AnalyteIndex) -> Option<&'p Analyte> {
        self.analytes
            .get(&analyte)
            .and_then(|&i| payload.metadata.schema.analytes.get(i))
    }

    pub fn analyte_by_code(&self, code: &str) -> Option<AnalyteIndex> {
        self.analyte_codes.get(code).copied()
    }

    pub fn result_column(&self, si: ServiceItemIndex, analyte: AnalyteIndex) -> Option<ColumnIndex> {
        self.result_columns.get(&(si, analyte)).copied()
    }

    /// Rows sharing a traveler number, in payload order.
    pub fn traveler_rows(&self, traveler_no: &str) -> &[RowIndex] {
        self.travelers
            .get(traveler_no)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
