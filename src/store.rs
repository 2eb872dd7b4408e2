use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Anything a resource store can hold.
pub trait Keyed {
    fn key(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Uninitialized,
    Loading,
    Loaded,
}

/// Sequence number handed out to each mutation before it goes remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

struct StoreState<T> {
    items: Vec<T>,
    phase: LoadPhase,
    next_ticket: u64,
    applied: HashMap<Uuid, Ticket>,
    loaded_for: Option<u64>,
}

/// In-memory list of one entity type for the current user.
///
/// Mutation responses are applied in ticket order per entity: a response whose
/// ticket is older than one already applied for the same id is dropped.
pub struct ResourceStore<T> {
    state: Mutex<StoreState<T>>,
}

impl<T> Default for ResourceStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceStore<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                items: Vec::new(),
                phase: LoadPhase::Uninitialized,
                next_ticket: 1,
                applied: HashMap::new(),
                loaded_for: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> LoadPhase {
        self.lock().phase
    }

    /// True until the first fetch settles.
    pub fn is_loading(&self) -> bool {
        self.lock().phase != LoadPhase::Loaded
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn begin_fetch(&self) {
        self.lock().phase = LoadPhase::Loading;
    }

    /// Replace the whole list with rows fetched for session `generation`.
    pub fn finish_fetch(&self, generation: u64, items: Vec<T>) {
        let mut state = self.lock();
        state.items = items;
        state.applied.clear();
        state.phase = LoadPhase::Loaded;
        state.loaded_for = Some(generation);
    }

    /// A failed fetch leaves an empty, loaded list behind.
    pub fn fail_fetch(&self, generation: u64) {
        let mut state = self.lock();
        state.items.clear();
        state.applied.clear();
        state.phase = LoadPhase::Loaded;
        state.loaded_for = Some(generation);
    }

    /// Drop a fetch issued for an earlier session generation. A list already
    /// loaded for a later generation stays; anything else is reset.
    pub fn abandon_fetch(&self, generation: u64) {
        let mut state = self.lock();
        if matches!(state.loaded_for, Some(loaded) if loaded > generation) {
            return;
        }
        state.clear();
    }

    /// Forget everything, e.g. once nobody is signed in.
    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn ticket(&self) -> Ticket {
        let mut state = self.lock();
        let ticket = Ticket(state.next_ticket);
        state.next_ticket += 1;
        ticket
    }
}

impl<T> StoreState<T> {
    fn clear(&mut self) {
        self.items.clear();
        self.applied.clear();
        self.phase = LoadPhase::Uninitialized;
        self.loaded_for = None;
    }
}

impl<T: Keyed> StoreState<T> {
    fn accept(&mut self, id: Uuid, ticket: Ticket) -> bool {
        match self.applied.get(&id) {
            Some(last) if *last > ticket => false,
            _ => {
                self.applied.insert(id, ticket);
                true
            }
        }
    }
}

impl<T: Keyed + Clone> ResourceStore<T> {
    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.lock().items.iter().find(|item| item.key() == id).cloned()
    }

    /// Put a newly created row at the front. Returns false if the response was stale.
    pub fn prepend(&self, ticket: Ticket, item: T) -> bool {
        let mut state = self.lock();
        let id = item.key();
        if !state.accept(id, ticket) {
            return false;
        }
        state.items.retain(|existing| existing.key() != id);
        state.items.insert(0, item);
        true
    }

    /// Swap in the server's copy of an existing row.
    pub fn replace(&self, ticket: Ticket, item: T) -> bool {
        let mut state = self.lock();
        let id = item.key();
        if !state.accept(id, ticket) {
            return false;
        }
        if let Some(slot) = state.items.iter_mut().find(|existing| existing.key() == id) {
            *slot = item;
        }
        true
    }

    pub fn remove(&self, ticket: Ticket, id: Uuid) -> bool {
        let mut state = self.lock();
        if !state.accept(id, ticket) {
            return false;
        }
        state.items.retain(|existing| existing.key() != id);
        state.applied.remove(&id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: Uuid,
        label: &'static str,
    }

    impl Keyed for Row {
        fn key(&self) -> Uuid {
            self.id
        }
    }

    fn row(label: &'static str) -> Row {
        Row {
            id: Uuid::new_v4(),
            label,
        }
    }

    #[test]
    fn test_phase_transitions() {
        let store: ResourceStore<Row> = ResourceStore::new();
        assert_eq!(store.phase(), LoadPhase::Uninitialized);
        assert!(store.is_loading());

        store.begin_fetch();
        assert_eq!(store.phase(), LoadPhase::Loading);

        store.finish_fetch(1, vec![row("a")]);
        assert_eq!(store.phase(), LoadPhase::Loaded);
        assert!(!store.is_loading());

        store.begin_fetch();
        store.fail_fetch(1);
        assert!(store.is_empty());
        assert_eq!(store.phase(), LoadPhase::Loaded);

        store.reset();
        assert_eq!(store.phase(), LoadPhase::Uninitialized);
    }

    #[test]
    fn test_prepend_keeps_single_copy() {
        let store = ResourceStore::new();
        let a = row("a");
        let b = row("b");
        store.finish_fetch(1, vec![a.clone()]);

        assert!(store.prepend(store.ticket(), b.clone()));
        assert!(store.prepend(store.ticket(), b.clone()));
        assert_eq!(store.items(), vec![b, a]);
    }

    #[test]
    fn test_replace_and_remove_leave_others_untouched() {
        let store = ResourceStore::new();
        let (a, b, c) = (row("a"), row("b"), row("c"));
        store.finish_fetch(1, vec![a.clone(), b.clone(), c.clone()]);

        let edited = Row { id: b.id, label: "b2" };
        store.replace(store.ticket(), edited.clone());
        assert_eq!(store.items(), vec![a.clone(), edited, c.clone()]);

        store.remove(store.ticket(), a.id);
        assert_eq!(store.items().len(), 2);
        assert_eq!(store.items()[1], c);
        assert!(store.get(a.id).is_none());
    }

    #[test]
    fn test_stale_ticket_is_dropped() {
        let store = ResourceStore::new();
        let a = row("a");
        store.finish_fetch(1, vec![a.clone()]);

        let first = store.ticket();
        let second = store.ticket();

        assert!(store.replace(second, Row { id: a.id, label: "second" }));
        assert!(!store.replace(first, Row { id: a.id, label: "first" }));
        assert_eq!(store.get(a.id).unwrap().label, "second");

        // Other ids keep their own sequence
        let b = row("b");
        assert!(store.prepend(first, b.clone()));
    }

    #[test]
    fn test_tickets_are_forgotten_after_remove_and_fetch() {
        let store = ResourceStore::new();
        let (a, b) = (row("a"), row("b"));
        store.finish_fetch(1, vec![a.clone(), b.clone()]);

        store.replace(store.ticket(), Row { id: a.id, label: "a2" });
        store.remove(store.ticket(), b.id);
        assert_eq!(store.lock().applied.len(), 1);

        store.finish_fetch(1, vec![a.clone()]);
        assert!(store.lock().applied.is_empty());
    }

    #[test]
    fn test_abandoned_fetch_keeps_newer_list() {
        let store = ResourceStore::new();
        store.finish_fetch(1, vec![row("alice")]);

        // A generation 1 fetch returning after the switch clears alice's rows
        store.begin_fetch();
        store.abandon_fetch(1);
        assert!(store.is_empty());
        assert_eq!(store.phase(), LoadPhase::Uninitialized);

        // but leaves a list already loaded for generation 2 alone
        let bob = row("bob");
        store.finish_fetch(2, vec![bob.clone()]);
        store.abandon_fetch(1);
        assert_eq!(store.items(), vec![bob]);
        assert_eq!(store.phase(), LoadPhase::Loaded);
    }
}
