//! Store error types.
//!
//! Missing rows, cells and columns are not errors here; mutation methods
//! report them by returning `false`. Only precondition violations surface.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("No dataset loaded")]
    NoDataset,

    #[error(transparent)]
    Core(#[from] qc_core::QcError),
}
