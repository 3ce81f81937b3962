//! Shared in-crate test fixtures.

use qc_core::{AnalyteIndex, ColumnIndex, RowIndex, ServiceItemIndex};
use qc_schema::*;

fn column(
    index: u32,
    si: Option<u32>,
    analyte: Option<u32>,
    label: &str,
    kind: ColumnKind,
) -> ColumnDefinition {
    ColumnDefinition {
        column_index: ColumnIndex::new(index),
        column_key: format!("c{index}"),
        service_item_index: si.map(ServiceItemIndex::new),
        analyte_index: analyte.map(AnalyteIndex::new),
        label: label.to_string(),
        kind,
    }
}

fn analyte(index: u32, si: u32, code: &str, limits: (Option<&str>, Option<&str>), reportable: bool) -> Analyte {
    Analyte {
        analyte_index: AnalyteIndex::new(index),
        si_index: ServiceItemIndex::new(si),
        code: code.to_string(),
        name: code.to_string(),
        lower_limit: limits.0.map(str::to_string),
        upper_limit: limits.1.map(str::to_string),
        unit: Some("ppm".to_string()),
        reportable,
    }
}

fn row(index: u32, seq: i64, name: &str, traveler: &str, control: &str, values: &[(u32, f64)]) -> RowData {
    RowData {
        row_index: RowIndex::new(index),
        seq_no: seq,
        sample_name: name.to_string(),
        traveler_no: traveler.to_string(),
        material_type: "Core".to_string(),
        control_type: control.to_string(),
        values: values
            .iter()
            .map(|&(c, v)| CellValue::new(ColumnIndex::new(c), CellScalar::Number(v)))
            .collect(),
    }
}

/// Two service items (ICP: Cu, Zn; FA: Au), eleven columns, nine rows.
///
/// Column 8 is the Cu result; rows pair up as ORIGINAL/REJECTDUP (0, 1),
/// ORGCRD/CRD (2, 3), CRM (4), ORGPRD/PRD (5, 6), ORIGINAL/PULPDUP (7, 8).
/// FA has an empty traveler list.
pub(crate) fn sample_payload() -> Payload {
    let statics = ["Seq", "Sample", "Traveler", "Material", "Control"];
    let mut column_definitions: Vec<ColumnDefinition> = statics
        .iter()
        .enumerate()
        .map(|(i, label)| column(i as u32, None, None, label, ColumnKind::Static))
        .collect();
    column_definitions.extend([
        column(5, Some(0), Some(0), "Cu 324", ColumnKind::Rawdata { wavelength: Some("324.754".into()), is_selected: true }),
        column(6, Some(0), Some(0), "Cu 327", ColumnKind::Rawdata { wavelength: Some("327.395".into()), is_selected: false }),
        column(7, Some(0), Some(0), "Cu dil", ColumnKind::Correction { correction_type: Some("dilution".into()) }),
        column(8, Some(0), Some(0), "Cu", ColumnKind::Result),
        column(9, Some(0), Some(1), "Zn", ColumnKind::Result),
        column(10, Some(1), Some(2), "Au", ColumnKind::Result),
    ]);

    Payload {
        metadata: Metadata {
            job: Job {
                code: "J-1".to_string(),
                name: "Test job".to_string(),
                ..Default::default()
            },
            schema: Schema {
                service_items: vec![
                    ServiceItem {
                        si_index: ServiceItemIndex::new(0),
                        code: "ICP".to_string(),
                        name: "ICP panel".to_string(),
                        analyte_indices: vec![AnalyteIndex::new(0), AnalyteIndex::new(1)],
                        traveler_nos: vec!["T1".to_string(), "T2".to_string()],
                    },
                    ServiceItem {
                        si_index: ServiceItemIndex::new(1),
                        code: "FA".to_string(),
                        name: "Fire assay".to_string(),
                        analyte_indices: vec![AnalyteIndex::new(2)],
                        traveler_nos: vec![],
                    },
                ],
                analytes: vec![
                    analyte(0, 0, "Cu", (Some("10"), Some("20")), true),
                    analyte(1, 0, "Zn", (None, None), false),
                    analyte(2, 1, "Au", (Some("0.005"), None), true),
                ],
                column_definitions,
            },
        },
        rows: vec![
            row(0, 1, "A1", "T1", "ORIGINAL", &[(5, 101.0), (8, 100.0), (9, 55.0)]),
            row(1, 2, "A1-R", "T1", "REJECTDUP", &[(8, 85.0)]),
            row(2, 3, "A2", "T1", "ORGCRD", &[(8, 50.0)]),
            row(3, 4, "A2 CRD", "T1", "CRD", &[(8, 62.0)]),
            row(4, 5, "STD-1", "T1", "CRM", &[(8, 25.0)]),
            row(5, 6, "B1", "T2", "ORGPRD", &[(8, 40.0)]),
            row(6, 7, "B1 PRD", "T2", "PRD", &[(8, 41.0)]),
            row(7, 8, "B2", "T2", "original", &[(8, 200.0)]),
            row(8, 9, "B2-X", "T2", "PULPDUP", &[(8, 230.0)]),
        ],
    }
}
