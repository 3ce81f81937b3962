//! Application service layer for the QC grid.
//!
//! Ties the store to a remote backend: configuration, transport with
//! retry, bulk operations, request submission and save tracking. Shared
//! by the CLI and any other front end.

pub mod bulk;
pub mod config;
pub mod error;
pub mod progress;
pub mod request;
pub mod session;
pub mod shared;
pub mod transport;

pub use bulk::{BulkAction, BulkOutcome, CellTarget, apply_bulk, result_targets};
pub use config::{AppConfig, BulkConfig, Endpoint, Endpoints, RetryPolicy};
pub use error::{AppError, AppResult, TransportError};
pub use progress::BulkProgress;
pub use request::build_request;
pub use session::{LoadSummary, QcSession, SaveReceipt};
pub use shared::SharedStore;
pub use transport::{CSRF_HEADER, HttpTransport, Transport, retry_with_backoff};
