//! Conditional formatting: classify result cells against limits or against
//! matched duplicate/control sibling rows.
//!
//! Classification is never cached. A sibling row changing does not mark this
//! row as changed, so callers recompute on every render.

use qc_core::{ColumnIndex, RowIndex};
use qc_schema::{Analyte, RowData};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sample role, parsed case-insensitively from a row's `controlType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    Crm,
    Original,
    OrgCrd,
    OrgPrd,
    RejectDup,
    PulpDup,
    Crd,
    Prd,
}

impl ControlType {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "CRM" => Some(ControlType::Crm),
            "ORIGINAL" => Some(ControlType::Original),
            "ORGCRD" => Some(ControlType::OrgCrd),
            "ORGPRD" => Some(ControlType::OrgPrd),
            "REJECTDUP" => Some(ControlType::RejectDup),
            "PULPDUP" => Some(ControlType::PulpDup),
            "CRD" => Some(ControlType::Crd),
            "PRD" => Some(ControlType::Prd),
            _ => None,
        }
    }

    pub fn family(self) -> Option<VarianceFamily> {
        match self {
            ControlType::Crm => None,
            ControlType::Original | ControlType::RejectDup | ControlType::PulpDup => {
                Some(VarianceFamily::Dup)
            }
            ControlType::OrgPrd | ControlType::Prd => Some(VarianceFamily::Prd),
            ControlType::OrgCrd | ControlType::Crd => Some(VarianceFamily::Crd),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarianceFamily {
    Dup,
    Prd,
    Crd,
}

/// Percent thresholds: strictly above `high` is high, strictly above
/// `medium` (and not high) is medium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl VarianceThresholds {
    pub fn level(&self, variance_pct: f64) -> Option<VarianceLevel> {
        if variance_pct > self.high {
            Some(VarianceLevel::High)
        } else if variance_pct > self.medium {
            Some(VarianceLevel::Medium)
        } else {
            None
        }
    }
}

pub const DUP_VARIANCE_THRESHOLDS: VarianceThresholds = VarianceThresholds {
    high: 20.0,
    medium: 10.0,
};

pub const PRD_VARIANCE_THRESHOLDS: VarianceThresholds = VarianceThresholds {
    high: 20.0,
    medium: 10.0,
};

pub const CRD_VARIANCE_THRESHOLDS: VarianceThresholds = VarianceThresholds {
    high: 20.0,
    medium: 10.0,
};

/// One threshold table per family; tuned independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatRules {
    pub dup: VarianceThresholds,
    pub prd: VarianceThresholds,
    pub crd: VarianceThresholds,
}

impl Default for FormatRules {
    fn default() -> Self {
        Self {
            dup: DUP_VARIANCE_THRESHOLDS,
            prd: PRD_VARIANCE_THRESHOLDS,
            crd: CRD_VARIANCE_THRESHOLDS,
        }
    }
}

impl FormatRules {
    pub fn thresholds(&self, family: VarianceFamily) -> &VarianceThresholds {
        match family {
            VarianceFamily::Dup => &self.dup,
            VarianceFamily::Prd => &self.prd,
            VarianceFamily::Crd => &self.crd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarianceLevel {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CellFlag {
    BelowLimit,
    AboveLimit,
    WithinLimit,
    Variance {
        family: VarianceFamily,
        level: VarianceLevel,
        variance_pct: f64,
    },
}

impl CellFlag {
    /// Display tag: `below-limit`, `above-limit`, `within-limit`, `medium`, `high`.
    pub fn tag(&self) -> &'static str {
        match self {
            CellFlag::BelowLimit => "below-limit",
            CellFlag::AboveLimit => "above-limit",
            CellFlag::WithinLimit => "within-limit",
            CellFlag::Variance {
                level: VarianceLevel::Medium,
                ..
            } => "medium",
            CellFlag::Variance {
                level: VarianceLevel::High,
                ..
            } => "high",
        }
    }
}

impl fmt::Display for CellFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellFlag::Variance {
                family,
                variance_pct,
                ..
            } => write!(f, "{} ({family:?} {variance_pct:.1}%)", self.tag()),
            _ => f.write_str(self.tag()),
        }
    }
}

/// Read access the formatter needs; implemented by the store.
pub trait FormatSource {
    fn row(&self, row: RowIndex) -> Option<&RowData>;
    fn numeric_value(&self, row: RowIndex, column: ColumnIndex) -> Option<f64>;
    fn traveler_rows(&self, traveler_no: &str) -> &[RowIndex];
}

/// CRM rule: compare against the analyte's own limits.
pub fn classify_limits(value: f64, analyte: &Analyte) -> Option<CellFlag> {
    let lower = analyte.lower_limit_value();
    let upper = analyte.upper_limit_value();

    if let Some(lo) = lower
        && value < lo
    {
        return Some(CellFlag::BelowLimit);
    }
    if let Some(hi) = upper
        && value > hi
    {
        return Some(CellFlag::AboveLimit);
    }
    match (lower, upper) {
        (Some(_), Some(_)) => Some(CellFlag::WithinLimit),
        _ => None,
    }
}

/// `|this - sibling| / |this| * 100`; `None` when `this` is zero.
pub fn variance_pct(this: f64, sibling: f64) -> Option<f64> {
    let v = (this - sibling).abs() / this.abs() * 100.0;
    v.is_finite().then_some(v)
}

fn is_sibling(this: &RowData, this_type: ControlType, other: &RowData) -> bool {
    if other.row_index == this.row_index || other.traveler_no != this.traveler_no {
        return false;
    }
    let other_type = ControlType::parse(&other.control_type);
    match this_type {
        ControlType::Original => match other_type {
            Some(ControlType::RejectDup) => other.sample_name == format!("{}-R", this.sample_name),
            Some(ControlType::PulpDup) => other.sample_name == format!("{}-X", this.sample_name),
            _ => false,
        },
        ControlType::RejectDup | ControlType::PulpDup => {
            let suffix = if this_type == ControlType::RejectDup { "-R" } else { "-X" };
            match this.sample_name.strip_suffix(suffix) {
                Some(base) => {
                    other_type == Some(ControlType::Original) && other.sample_name == base
                }
                None => false,
            }
        }
        ControlType::OrgCrd => {
            other_type == Some(ControlType::Crd) && this.seq_no.checked_add(1) == Some(other.seq_no)
        }
        ControlType::OrgPrd => {
            other_type == Some(ControlType::Prd) && this.seq_no.checked_add(1) == Some(other.seq_no)
        }
        ControlType::Crd => {
            other_type == Some(ControlType::OrgCrd) && this.seq_no.checked_sub(1) == Some(other.seq_no)
        }
        ControlType::Prd => {
            other_type == Some(ControlType::OrgPrd) && this.seq_no.checked_sub(1) == Some(other.seq_no)
        }
        ControlType::Crm => false,
    }
}

/// Largest variance between `row`'s value in `column` and any matched
/// sibling's value in the same column.
pub fn max_sibling_variance<S: FormatSource + ?Sized>(
    source: &S,
    row: &RowData,
    control: ControlType,
    column: ColumnIndex,
    this_value: f64,
) -> Option<f64> {
    source
        .traveler_rows(&row.traveler_no)
        .iter()
        .filter_map(|&idx| source.row(idx))
        .filter(|other| is_sibling(row, control, other))
        .filter_map(|other| source.numeric_value(other.row_index, column))
        .filter_map(|sibling| variance_pct(this_value, sibling))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

/// Classify one result cell.
///
/// `analyte` is the column's analyte (needed for CRM limits). Returns `None`
/// for unknown control types, missing/unparseable values, and variances at
/// or below the medium threshold.
pub fn classify<S: FormatSource + ?Sized>(
    source: &S,
    rules: &FormatRules,
    row: RowIndex,
    column: ColumnIndex,
    analyte: Option<&Analyte>,
) -> Option<CellFlag> {
    let data = source.row(row)?;
    let control = ControlType::parse(&data.control_type)?;
    let value = source.numeric_value(row, column)?;

    match control.family() {
        None => classify_limits(value, analyte?),
        Some(family) => {
            let variance = max_sibling_variance(source, data, control, column, value)?;
            let level = rules.thresholds(family).level(variance)?;
            Some(CellFlag::Variance {
                family,
                level,
                variance_pct: variance,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_core::{AnalyteIndex, ServiceItemIndex};

    fn analyte(lo: Option<&str>, hi: Option<&str>) -> Analyte {
        Analyte {
            analyte_index: AnalyteIndex::new(0),
            si_index: ServiceItemIndex::new(0),
            code: "Cu".to_string(),
            name: "Copper".to_string(),
            lower_limit: lo.map(str::to_string),
            upper_limit: hi.map(str::to_string),
            unit: None,
            reportable: true,
        }
    }

    #[test]
    fn control_type_is_case_insensitive() {
        assert_eq!(ControlType::parse("original"), Some(ControlType::Original));
        assert_eq!(ControlType::parse(" PulpDup "), Some(ControlType::PulpDup));
        assert_eq!(ControlType::parse("BLANK"), None);
        assert_eq!(ControlType::parse(""), None);
    }

    #[test]
    fn crm_limits() {
        let a = analyte(Some("10"), Some("20"));
        assert_eq!(classify_limits(25.0, &a), Some(CellFlag::AboveLimit));
        assert_eq!(classify_limits(15.0, &a), Some(CellFlag::WithinLimit));
        assert_eq!(classify_limits(5.0, &a), Some(CellFlag::BelowLimit));
        assert_eq!(classify_limits(10.0, &a), Some(CellFlag::WithinLimit));
    }

    #[test]
    fn crm_with_one_limit_only_flags_violations() {
        let a = analyte(Some("10"), None);
        assert_eq!(classify_limits(5.0, &a), Some(CellFlag::BelowLimit));
        assert_eq!(classify_limits(50.0, &a), None);

        let b = analyte(Some("n/a"), Some("20"));
        assert_eq!(classify_limits(15.0, &b), None);
        assert_eq!(classify_limits(21.0, &b), Some(CellFlag::AboveLimit));
    }

    #[test]
    fn variance_is_relative_to_this_value() {
        assert_eq!(variance_pct(100.0, 85.0), Some(15.0));
        assert_eq!(variance_pct(85.0, 100.0).map(|v| (v * 100.0).round()), Some(1765.0));
        assert_eq!(variance_pct(0.0, 5.0), None);
    }

    #[test]
    fn threshold_boundaries() {
        let t = DUP_VARIANCE_THRESHOLDS;
        assert_eq!(t.level(10.0), None);
        assert_eq!(t.level(10.01), Some(VarianceLevel::Medium));
        assert_eq!(t.level(20.0), Some(VarianceLevel::Medium));
        assert_eq!(t.level(20.01), Some(VarianceLevel::High));
    }

    fn store_with(edit: impl FnOnce(&mut qc_schema::Payload)) -> crate::GridStore {
        let mut payload = crate::testing::sample_payload();
        edit(&mut payload);
        let mut store = crate::GridStore::new();
        store.load(payload);
        store
    }

    const CU: ColumnIndex = ColumnIndex::new(8);

    #[test]
    fn original_pairs_only_with_matching_duplicate_type() {
        let store = store_with(|p| p.rows[1].control_type = "CRM".to_string());
        assert_eq!(store.classify_cell(RowIndex::new(0), CU), None);

        // A "-R" name on a pulp duplicate is not a reject duplicate.
        let store = store_with(|p| p.rows[1].control_type = "PULPDUP".to_string());
        assert_eq!(store.classify_cell(RowIndex::new(0), CU), None);

        let store = store_with(|_| {});
        assert!(matches!(
            store.classify_cell(RowIndex::new(0), CU),
            Some(CellFlag::Variance { family: VarianceFamily::Dup, level: VarianceLevel::Medium, .. })
        ));
    }

    #[test]
    fn sequence_neighbours_at_integer_bounds() {
        let store = store_with(|p| {
            p.rows[2].seq_no = i64::MAX;
            p.rows[3].seq_no = i64::MIN;
            p.rows[5].seq_no = i64::MAX;
            p.rows[6].seq_no = i64::MIN;
        });
        for row in [2, 3, 5, 6] {
            assert_eq!(store.classify_cell(RowIndex::new(row), CU), None);
        }

        let store = store_with(|p| {
            p.rows[2].seq_no = i64::MAX - 1;
            p.rows[3].seq_no = i64::MAX;
        });
        assert!(store.classify_cell(RowIndex::new(3), CU).is_some());
    }

    #[test]
    fn families_are_tuned_independently() {
        let mut rules = FormatRules::default();
        rules.prd.medium = 5.0;
        assert_eq!(rules.thresholds(VarianceFamily::Prd).level(7.0), Some(VarianceLevel::Medium));
        assert_eq!(rules.thresholds(VarianceFamily::Dup).level(7.0), None);
        assert_eq!(rules.thresholds(VarianceFamily::Crd).level(7.0), None);
    }
}
