//! Payload schema definitions.

use chrono::{DateTime, Utc};
use qc_core::{AnalyteIndex, ColumnIndex, RowIndex, ServiceItemIndex, parse_leading_f64};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::wire;

/// A full dataset as delivered by the load endpoint and submitted back on save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    pub metadata: Metadata,
    #[serde(default)]
    pub rows: Vec<RowData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub job: Job,
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(deserialize_with = "wire::string")]
    pub code: String,
    #[serde(default, deserialize_with = "wire::string")]
    pub name: String,
    #[serde(default, deserialize_with = "wire::opt_string", skip_serializing_if = "Option::is_none")]
    pub customer_code: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_string", skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_string", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub service_items: Vec<ServiceItem>,
    #[serde(default)]
    pub analytes: Vec<Analyte>,
    #[serde(default)]
    pub column_definitions: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceItem {
    pub si_index: ServiceItemIndex,
    #[serde(deserialize_with = "wire::string")]
    pub code: String,
    #[serde(default, deserialize_with = "wire::string")]
    pub name: String,
    #[serde(default)]
    pub analyte_indices: Vec<AnalyteIndex>,
    /// Traveler numbers this service item applies to. Drives row filtering.
    #[serde(default)]
    pub traveler_nos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analyte {
    pub analyte_index: AnalyteIndex,
    pub si_index: ServiceItemIndex,
    #[serde(deserialize_with = "wire::string")]
    pub code: String,
    #[serde(default, deserialize_with = "wire::string")]
    pub name: String,
    #[serde(default, deserialize_with = "wire::opt_string", skip_serializing_if = "Option::is_none")]
    pub lower_limit: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_string", skip_serializing_if = "Option::is_none")]
    pub upper_limit: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_string", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub reportable: bool,
}

impl Analyte {
    pub fn lower_limit_value(&self) -> Option<f64> {
        self.lower_limit.as_deref().and_then(parse_leading_f64)
    }

    pub fn upper_limit_value(&self) -> Option<f64> {
        self.upper_limit.as_deref().and_then(parse_leading_f64)
    }

    /// Human-readable limits and unit, e.g. `"10 - 20 ppm"`, `"> 5"`.
    pub fn limits_label(&self) -> Option<String> {
        let range = match (self.lower_limit.as_deref(), self.upper_limit.as_deref()) {
            (Some(lo), Some(hi)) => Some(format!("{lo} - {hi}")),
            (Some(lo), None) => Some(format!("> {lo}")),
            (None, Some(hi)) => Some(format!("< {hi}")),
            (None, None) => None,
        };
        match (range, self.unit.as_deref()) {
            (Some(range), Some(unit)) => Some(format!("{range} {unit}")),
            (Some(range), None) => Some(range),
            (None, Some(unit)) => Some(unit.to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub column_index: ColumnIndex,
    #[serde(default, deserialize_with = "wire::string")]
    pub column_key: String,
    #[serde(default, with = "wire::owner_index")]
    pub service_item_index: Option<ServiceItemIndex>,
    #[serde(default, with = "wire::owner_index")]
    pub analyte_index: Option<AnalyteIndex>,
    #[serde(default, deserialize_with = "wire::string")]
    pub label: String,
    #[serde(flatten)]
    pub kind: ColumnKind,
}

impl ColumnDefinition {
    pub fn column_type(&self) -> ColumnType {
        self.kind.column_type()
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, ColumnKind::Static)
    }

    pub fn is_result(&self) -> bool {
        matches!(self.kind, ColumnKind::Result)
    }
}

/// Column type plus the fields that only exist for that type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "columnType", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ColumnKind {
    Static,
    Rawdata {
        #[serde(default, deserialize_with = "wire::opt_string", skip_serializing_if = "Option::is_none")]
        wavelength: Option<String>,
        #[serde(default)]
        is_selected: bool,
    },
    Correction {
        #[serde(default, deserialize_with = "wire::opt_string", skip_serializing_if = "Option::is_none")]
        correction_type: Option<String>,
    },
    Result,
}

impl ColumnKind {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnKind::Static => ColumnType::Static,
            ColumnKind::Rawdata { .. } => ColumnType::Rawdata,
            ColumnKind::Correction { .. } => ColumnType::Correction,
            ColumnKind::Result => ColumnType::Result,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Static,
    Rawdata,
    Correction,
    Result,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Static => "static",
            ColumnType::Rawdata => "rawdata",
            ColumnType::Correction => "correction",
            ColumnType::Result => "result",
        };
        f.write_str(name)
    }
}

/// One sample row. Only non-empty dynamic cells are stored in `values`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowData {
    pub row_index: RowIndex,
    #[serde(default)]
    pub seq_no: i64,
    #[serde(default, deserialize_with = "wire::string")]
    pub sample_name: String,
    #[serde(default, deserialize_with = "wire::string")]
    pub traveler_no: String,
    #[serde(default, deserialize_with = "wire::string")]
    pub material_type: String,
    #[serde(default, deserialize_with = "wire::string")]
    pub control_type: String,
    #[serde(default)]
    pub values: Vec<CellValue>,
}

/// A scalar cell value as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CellScalar {
    Number(f64),
    Text(String),
}

impl CellScalar {
    /// Numeric interpretation, parsing text leniently (`"12 ppm"` → 12).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellScalar::Number(v) if v.is_finite() => Some(*v),
            CellScalar::Number(_) => None,
            CellScalar::Text(s) => parse_leading_f64(s),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellScalar::Number(_) => false,
            CellScalar::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellScalar::Number(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellScalar::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for CellScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellScalar::Number(v) => write!(f, "{v}"),
            CellScalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellScalar {
    fn from(v: f64) -> Self {
        CellScalar::Number(v)
    }
}

impl From<&str> for CellScalar {
    fn from(s: &str) -> Self {
        CellScalar::Text(s.to_string())
    }
}

impl From<String> for CellScalar {
    fn from(s: String) -> Self {
        CellScalar::Text(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CellValue {
    pub column_index: ColumnIndex,
    pub value: CellScalar,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked_final_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_correction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<CellScalar>,
}

impl CellValue {
    pub fn new(column_index: ColumnIndex, value: CellScalar) -> Self {
        Self {
            column_index,
            value,
            is_final: false,
            copied_from: None,
            marked_final_at: None,
            baseline_correction: None,
            multiplier: None,
            original_value: None,
        }
    }
}
