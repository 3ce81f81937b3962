//! Listener registry for change notices and operation outcomes.

use qc_core::RowIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new payload replaced the previous one.
    Reload,
    /// Cells in `rows` were mutated.
    Rows,
    /// Filter state changed; the visible columns/rows may differ.
    Filters,
    /// The dataset was dropped.
    Unload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    pub kind: ChangeKind,
    pub generation: u64,
    pub rows: Vec<RowIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    MarkFinal,
    Clear,
    Correct,
    SetValue,
}

/// Emitted once per bulk operation so a front end can decide how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    pub affected: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChangeListener = Box<dyn FnMut(&ChangeNotice) + Send>;
type OutcomeListener = Box<dyn FnMut(&OperationOutcome) + Send>;

#[derive(Default)]
pub struct Notifier {
    next_id: u64,
    change_listeners: Vec<(SubscriptionId, ChangeListener)>,
    outcome_listeners: Vec<(SubscriptionId, OutcomeListener)>,
    signals: u64,
}

impl Notifier {
    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeNotice) + Send + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.change_listeners.push((id, Box::new(listener)));
        id
    }

    pub fn on_operation_complete(
        &mut self,
        listener: impl FnMut(&OperationOutcome) + Send + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.outcome_listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener of either kind. Returns false if `id` was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.change_listeners.len() + self.outcome_listeners.len();
        self.change_listeners.retain(|(i, _)| *i != id);
        self.outcome_listeners.retain(|(i, _)| *i != id);
        before != self.change_listeners.len() + self.outcome_listeners.len()
    }

    pub fn emit(&mut self, notice: &ChangeNotice) {
        self.signals += 1;
        for (_, listener) in &mut self.change_listeners {
            listener(notice);
        }
    }

    pub fn emit_outcome(&mut self, outcome: &OperationOutcome) {
        for (_, listener) in &mut self.outcome_listeners {
            listener(outcome);
        }
    }

    /// Total change notices emitted so far.
    pub fn signal_count(&self) -> u64 {
        self.signals
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("change_listeners", &self.change_listeners.len())
            .field("outcome_listeners", &self.outcome_listeners.len())
            .field("signals", &self.signals)
            .finish()
    }
}
