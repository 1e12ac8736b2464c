use crate::storage::AccountId;

/// Change notifications emitted by [`super::AccountModel`].
///
/// Row-count changes are bracketed: an `*AboutTo*` event precedes the change
/// and the matching completion event follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    RowsAboutToBeInserted { first: usize, last: usize },
    RowsInserted { first: usize, last: usize },
    RowsAboutToBeRemoved { first: usize, last: usize },
    RowsRemoved { first: usize, last: usize },
    ModelAboutToBeReset,
    ModelReset,
    /// Every column of `row` may have changed.
    RowChanged { row: usize },
    DefaultChanged {
        account_type: String,
        old: Option<AccountId>,
        new: Option<AccountId>,
    },
    ListChanged,
    LatestChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Observer = Box<dyn FnMut(&ModelEvent)>;

#[derive(Default)]
pub(crate) struct Observers {
    next: u64,
    entries: Vec<(SubscriptionId, Observer)>,
}

impl Observers {
    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        self.next += 1;
        let id = SubscriptionId(self.next);
        self.entries.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sub, _)| *sub != id);
        self.entries.len() != before
    }

    pub fn emit(&mut self, event: ModelEvent) {
        for (_, observer) in self.entries.iter_mut() {
            observer(&event);
        }
    }
}
