//! Filter engine: visible columns and rows derived from filter state.

use qc_core::{RowIndex, ServiceItemIndex};
use qc_schema::{ColumnDefinition, ColumnKind, Payload};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::schema_index::SchemaIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Qc,
    Report,
    Customer,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Qc => f.write_str("qc"),
            ViewMode::Report => f.write_str("report"),
            ViewMode::Customer => f.write_str("customer"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "qc" => Ok(ViewMode::Qc),
            "report" => Ok(ViewMode::Report),
            "customer" => Ok(ViewMode::Customer),
            other => Err(format!("unknown view mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub selected_service_item: Option<ServiceItemIndex>,
    pub show_reportable_only: bool,
    pub view_mode: ViewMode,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            selected_service_item: None,
            show_reportable_only: true,
            view_mode: ViewMode::Qc,
        }
    }
}

impl FilterState {
    /// Composite key of all three inputs, used to memoize the column filter.
    pub fn cache_key(&self) -> String {
        let si = self
            .selected_service_item
            .map(|si| si.to_string())
            .unwrap_or_else(|| "all".to_string());
        format!("{si}|{}|{}", self.show_reportable_only, self.view_mode)
    }

    /// `show_reportable_only` defaults to on and is not counted.
    pub fn has_active_filters(&self) -> bool {
        self.selected_service_item.is_some() || self.view_mode != ViewMode::Qc
    }
}

/// Apply the column pipeline: service item, then reportable, then view mode.
/// Static columns always pass.
pub fn filter_columns(
    payload: &Payload,
    index: &SchemaIndex,
    state: &FilterState,
) -> Vec<ColumnDefinition> {
    payload
        .metadata
        .schema
        .column_definitions
        .iter()
        .filter(|col| {
            if col.is_static() {
                return true;
            }
            if let Some(si) = state.selected_service_item
                && col.service_item_index != Some(si)
            {
                return false;
            }
            if state.show_reportable_only {
                let reportable = col
                    .analyte_index
                    .and_then(|a| index.analyte(payload, a))
                    .is_some_and(|a| a.reportable);
                if !reportable {
                    return false;
                }
            }
            if state.view_mode == ViewMode::Report {
                match col.kind {
                    ColumnKind::Correction { .. } => return false,
                    ColumnKind::Rawdata { is_selected, .. } if !is_selected => return false,
                    _ => {}
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// Rows visible under `state`, in payload order.
///
/// With a service item selected only rows whose traveler number is in that
/// item's allow-list pass. An empty (or unresolvable) allow-list yields no rows.
pub fn filter_rows(payload: &Payload, index: &SchemaIndex, state: &FilterState) -> Vec<RowIndex> {
    let Some(si) = state.selected_service_item else {
        return payload.rows.iter().map(|r| r.row_index).collect();
    };

    let allowed: HashSet<&str> = index
        .service_item(payload, si)
        .map(|item| item.traveler_nos.iter().map(String::as_str).collect())
        .unwrap_or_default();

    payload
        .rows
        .iter()
        .filter(|r| allowed.contains(r.traveler_no.as_str()))
        .map(|r| r.row_index)
        .collect()
}

/// Memoized filter results keyed on (payload generation, filter inputs).
#[derive(Debug, Default)]
pub struct FilterCache {
    column_key: Option<(u64, String)>,
    columns: Option<Arc<[ColumnDefinition]>>,
    row_key: Option<(u64, Option<ServiceItemIndex>)>,
    rows: Option<Arc<[RowIndex]>>,
}

impl FilterCache {
    pub fn columns(
        &mut self,
        payload: &Payload,
        index: &SchemaIndex,
        generation: u64,
        state: &FilterState,
    ) -> Arc<[ColumnDefinition]> {
        let key = (generation, state.cache_key());
        if self.column_key.as_ref() == Some(&key)
            && let Some(columns) = &self.columns
        {
            return Arc::clone(columns);
        }
        let columns: Arc<[ColumnDefinition]> = filter_columns(payload, index, state).into();
        self.column_key = Some(key);
        self.columns = Some(Arc::clone(&columns));
        columns
    }

    pub fn rows(
        &mut self,
        payload: &Payload,
        index: &SchemaIndex,
        generation: u64,
        state: &FilterState,
    ) -> Arc<[RowIndex]> {
        let key = (generation, state.selected_service_item);
        if self.row_key == Some(key)
            && let Some(rows) = &self.rows
        {
            return Arc::clone(rows);
        }
        let rows: Arc<[RowIndex]> = filter_rows(payload, index, state).into();
        self.row_key = Some(key);
        self.rows = Some(Arc::clone(&rows));
        rows
    }

    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}
