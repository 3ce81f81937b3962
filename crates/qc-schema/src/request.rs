//! Outbound repeat/overlimit request payloads.

use chrono::{DateTime, Utc};
use qc_core::{RowIndex, ServiceItemIndex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Repeat,
    Overlimit,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Repeat => f.write_str("repeat"),
            RequestKind::Overlimit => f.write_str("overlimit"),
        }
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "repeat" => Ok(RequestKind::Repeat),
            "overlimit" => Ok(RequestKind::Overlimit),
            other => Err(format!("unknown request kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub request_id: Uuid,
    pub request_type: RequestKind,
    pub job_code: String,
    pub service_item_index: ServiceItemIndex,
    pub service_item_code: String,
    pub created_at: DateTime<Utc>,
    pub samples: Vec<RequestSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestSample {
    pub original_row_index: RowIndex,
    pub seq_no: i64,
    /// 1-based position in the selection order.
    pub position: u32,
    pub sample_name: String,
    pub traveler_no: String,
    pub material_type: String,
    pub control_type: String,
}
