use qc_store::OperationKind;

/// Emitted after each chunk of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkProgress {
    pub kind: OperationKind,
    pub processed: usize,
    pub total: usize,
    pub affected: usize,
    pub skipped: usize,
}

impl BulkProgress {
    pub fn fraction_complete(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }

    pub fn is_done(&self) -> bool {
        self.processed >= self.total
    }
}
