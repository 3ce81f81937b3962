//! qc-core: shared foundation for the QC grid crates.
//!
//! Contains:
//! - ids (typed row/column/service-item/analyte indices)
//! - numeric (lenient number parsing + finiteness checks)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;

pub use error::{QcError, QcResult};
pub use ids::*;
pub use numeric::*;
