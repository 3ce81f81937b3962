//! Grouped (service item → analyte → column) header projection.

use qc_core::{AnalyteIndex, ColumnIndex, ServiceItemIndex};
use qc_schema::{ColumnDefinition, Payload};
use serde::Serialize;

use crate::schema_index::SchemaIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    pub column: ColumnIndex,
    pub key: String,
    pub label: String,
    pub column_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyteHeader {
    pub analyte: Option<AnalyteIndex>,
    pub label: String,
    /// Formatted limits and unit, when the analyte has any.
    pub limits: Option<String>,
    pub columns: Vec<ColumnHeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderGroup {
    pub service_item: Option<ServiceItemIndex>,
    pub label: String,
    pub analytes: Vec<AnalyteHeader>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridHeader {
    pub static_columns: Vec<ColumnHeader>,
    pub groups: Vec<HeaderGroup>,
}

fn column_header(col: &ColumnDefinition) -> ColumnHeader {
    ColumnHeader {
        column: col.column_index,
        key: col.column_index.grid_key(),
        label: col.label.clone(),
        column_type: col.column_type().to_string(),
    }
}

/// Group dynamic columns by service item, then analyte, in first-seen order.
pub fn build_header(payload: &Payload, index: &SchemaIndex, columns: &[ColumnDefinition]) -> GridHeader {
    let mut header = GridHeader::default();

    for col in columns {
        if col.is_static() {
            header.static_columns.push(column_header(col));
            continue;
        }

        let group_pos = match header
            .groups
            .iter()
            .position(|g| g.service_item == col.service_item_index)
        {
            Some(pos) => pos,
            None => {
                let label = col
                    .service_item_index
                    .and_then(|si| index.service_item(payload, si))
                    .map(|si| si.name.clone())
                    .unwrap_or_default();
                header.groups.push(HeaderGroup {
                    service_item: col.service_item_index,
                    label,
                    analytes: Vec::new(),
                });
                header.groups.len() - 1
            }
        };
        let group = &mut header.groups[group_pos];

        let analyte_pos = match group
            .analytes
            .iter()
            .position(|a| a.analyte == col.analyte_index)
        {
            Some(pos) => pos,
            None => {
                let analyte = col.analyte_index.and_then(|a| index.analyte(payload, a));
                group.analytes.push(AnalyteHeader {
                    analyte: col.analyte_index,
                    label: analyte.map(|a| a.code.clone()).unwrap_or_default(),
                    limits: analyte.and_then(|a| a.limits_label()),
                    columns: Vec::new(),
                });
                group.analytes.len() - 1
            }
        };
        group.analytes[analyte_pos].columns.push(column_header(col));
    }

    header
}
