//! The memo table: accumulated results and pending continuations for
//! every (rule, position) a run has touched.
//!
//! Everything in here is monotone. Entries are created, never removed;
//! result sets and waiter lists only grow. The table itself cannot fail
//! and enforces no budgets; cutting off runaway grammars is the
//! engine's job.

use crate::engine::Engine;
use crate::{Error, Location, OutputPair};

use std::collections::HashMap;
use std::rc::Rc;

/// A continuation waiting on results at some location. Multi-shot: fired
/// once per distinct result, any number of times over the run. Shared
/// ownership, because waiter lists outlive the stack frames that
/// register them.
pub(crate) type Waiter<T, V> =
    Rc<dyn Fn(&mut Engine<'_, T, V>, &OutputPair<V>) -> Result<(), Error>>;

/// Fixpoint progress marker for an insertion.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Changed {
    Unchanged,
    Changed,
}

/// What one location knows: the results derived so far (insertion
/// ordered, duplicate free) and the continuations to tell about the
/// next one.
pub(crate) struct LocationEntry<T: 'static, V: 'static> {
    results: Vec<OutputPair<V>>,
    waiters: Vec<Waiter<T, V>>,
}

impl<T, V> LocationEntry<T, V> {
    fn new() -> Self {
        LocationEntry {
            results: Vec::new(),
            waiters: Vec::new(),
        }
    }

    pub(crate) fn results(&self) -> &[OutputPair<V>] {
        &self.results
    }

    pub(crate) fn result_count(&self) -> usize {
        self.results.len()
    }

    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Register-then-snapshot. The waiter joins the list first and the
    /// caller gets the number of results already present, to replay to
    /// it. One step, so no result can slip between the two: anything
    /// recorded after this is the fan-out's responsibility, everything
    /// up to here the caller's.
    pub(crate) fn register(&mut self, k: Waiter<T, V>) -> usize {
        self.waiters.push(k);
        self.results.len()
    }
}

impl<T, V: Clone + PartialEq> LocationEntry<T, V> {
    /// Idempotent recording. `Changed` means the pair is new; recording
    /// a pair already present is a no-op and must not re-deliver.
    pub(crate) fn note(&mut self, pair: &OutputPair<V>) -> Changed {
        if self.results.contains(pair) {
            Changed::Unchanged
        } else {
            self.results.push(pair.clone());
            Changed::Changed
        }
    }
}

/// The evolving state of one run: location to entry, grown until
/// quiescence, then discarded with the engine.
pub(crate) struct MemoTable<T: 'static, V: 'static> {
    entries: HashMap<Location, LocationEntry<T, V>>,
}

impl<T, V> MemoTable<T, V> {
    pub(crate) fn new() -> Self {
        MemoTable {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, loc: &Location) -> bool {
        self.entries.contains_key(loc)
    }

    /// Get-or-create. At most one entry ever exists per location.
    pub(crate) fn entry(&mut self, loc: &Location) -> &mut LocationEntry<T, V> {
        self.entries
            .entry(loc.clone())
            .or_insert_with(LocationEntry::new)
    }

    pub(crate) fn get(&self, loc: &Location) -> Option<&LocationEntry<T, V>> {
        self.entries.get(loc)
    }

    /// Indexed fetch of one waiter, cloned out so the caller can run it
    /// while the table is being mutated under it. Entries are never
    /// removed during a run, so indexing an entry seen earlier is fine.
    pub(crate) fn snapshot_waiter(&self, loc: &Location, i: usize) -> Waiter<T, V> {
        Rc::clone(&self.entries[loc].waiters[i])
    }
}

impl<T, V: Clone> MemoTable<T, V> {
    pub(crate) fn snapshot_result(&self, loc: &Location, i: usize) -> OutputPair<V> {
        self.entries[loc].results[i].clone()
    }
}

#[cfg(test)]
#[path = "tests/memo.rs"]
mod tests_for_memo;
