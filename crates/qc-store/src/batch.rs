//! Batching controller: collapses many row mutations into one notification.

use qc_core::RowIndex;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Batching {
        /// Open `start` calls not yet matched by `end`.
        depth: usize,
        pending: BTreeSet<RowIndex>,
    },
}

/// Two-state machine (Idle / Batching) tracking rows touched inside a batch.
///
/// Nested `start` calls are counted; only the outermost `end` flushes.
#[derive(Debug, Clone, Default)]
pub struct BatchController {
    state: BatchState,
}

impl BatchController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if let BatchState::Batching { depth, .. } = &mut self.state {
            *depth += 1;
            return;
        }
        self.state = BatchState::Batching {
            depth: 1,
            pending: BTreeSet::new(),
        };
    }

    /// Close one level. Returns the pending rows when the outermost batch
    /// closes, `None` otherwise (including when no batch was open).
    pub fn end(&mut self) -> Option<BTreeSet<RowIndex>> {
        let BatchState::Batching { depth, .. } = &mut self.state else {
            return None;
        };
        if *depth > 1 {
            *depth -= 1;
            return None;
        }
        match std::mem::take(&mut self.state) {
            BatchState::Batching { pending, .. } => Some(pending),
            BatchState::Idle => None,
        }
    }

    /// Record a touched row. Returns false when no batch is open, in which
    /// case the caller must notify immediately.
    pub fn record(&mut self, row: RowIndex) -> bool {
        match &mut self.state {
            BatchState::Idle => false,
            BatchState::Batching { pending, .. } => {
                pending.insert(row);
                true
            }
        }
    }

    pub fn is_batching(&self) -> bool {
        matches!(self.state, BatchState::Batching { .. })
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }
}
