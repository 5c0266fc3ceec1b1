//! The continuation scheduler: get-or-create discipline at every rule
//! location, register-then-snapshot delivery, and depth-first fan-out of
//! newly recorded results until nothing new can happen.
//!
//! There is no work queue. Recording a result synchronously runs every
//! waiter registered at that location, and those waiters record further
//! results, recursively. When the outermost invocation returns, every
//! consequence of every result has been driven out and the memo table is
//! at its fixed point. I found that coincidence suspicious for a while;
//! the argument for it is that each of the three delivery rules below
//! runs to completion before its caller resumes, so "returned" and
//! "quiescent" are the same event.
//!
//! The delivery rules, where K(R, i) is the waiter list and S(R, i) the
//! result set of a location:
//!
//!   entry(R, i) absent    k joins K(R, i)    body of R runs once at i
//!  -------------------------------------------------------------------- M-First
//!   every (j, v) the body derives is recorded into S(R, i)
//!
//!   entry(R, i) present    k joins K(R, i)    (j, v) in S(R, i) already
//!  -------------------------------------------------------------------- M-Rejoin
//!   k sees (j, v), body does not run again
//!
//!   (j, v) fresh in S(R, i)    k in K(R, i) when it lands
//!  ------------------------------------------------------- M-Spread
//!   k sees (j, v)
//!
//! M-Rejoin replays results present at registration; M-Spread covers
//! results recorded later. A waiter that registers mid-fan-out gets the
//! in-flight pair from its M-Rejoin snapshot, and the fan-out loop stops
//! at the waiter count captured when the pair landed, so each (k, pair)
//! meeting happens exactly once.

use crate::grammar::{Combinator, Grammar};
use crate::memo::{Changed, MemoTable, Waiter};
use crate::negation::Strata;
use crate::{Error, Location, OutputPair, Parses, Pos, RuleTag};

use std::rc::Rc;

use linear_map::LinearMap;
use log::{debug, trace};

/// Budgets and stratification for one run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Bound on distinct (rule, position) locations explored.
    pub max_locations: usize,
    /// Bound on results recorded at any one location. This is the bound
    /// that cuts off grammars whose ambiguity is genuinely infinite, the
    /// zero-width cycle that grows its value each time around being the
    /// canonical offender.
    pub max_results_per_location: usize,
    /// Rule groups, earliest first, for negation: a rule may only negate
    /// rules of a strictly earlier group. Ignored by grammars that never
    /// negate.
    pub strata: Vec<Vec<RuleTag>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_locations: 1 << 20,
            max_results_per_location: 1 << 12,
            strata: Vec::new(),
        }
    }
}

/// Counters accumulated over a run and reported at quiescence.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct RunStats {
    pub locations: usize,
    pub results: usize,
    pub duplicates: usize,
    pub deliveries: usize,
    pub refutations: usize,
}

/// One run in flight: the input, the grammar, and the mutable state the
/// fixpoint grows in. Single-threaded by construction; continuations
/// thread `&mut Engine` rather than capturing any of this.
pub(crate) struct Engine<'i, T: 'static, V: 'static> {
    pub(crate) input: &'i [T],
    pub(crate) grammar: &'i Grammar<T, V>,
    pub(crate) memo: MemoTable<T, V>,
    pub(crate) strata: Strata,
    /// Per-rule count of locations whose first-arrival body run has not
    /// yet returned. Negation consults this: refuting a rule while
    /// anything it can reach is still open would answer from a table
    /// that is not yet closed.
    pub(crate) open: LinearMap<RuleTag, usize>,
    /// Deduplicated root results in discovery order.
    pub(crate) accepted: Vec<OutputPair<V>>,
    pub(crate) max_locations: usize,
    pub(crate) max_results: usize,
    pub(crate) stats: RunStats,
}

impl<'i, T: Clone, V: Clone + PartialEq> Engine<'i, T, V> {
    pub(crate) fn new(
        grammar: &'i Grammar<T, V>,
        input: &'i [T],
        strata: Strata,
        config: &Config,
    ) -> Self {
        Engine {
            input,
            grammar,
            memo: MemoTable::new(),
            strata,
            open: LinearMap::new(),
            accepted: Vec::new(),
            max_locations: config.max_locations,
            max_results: config.max_results_per_location,
            stats: RunStats::default(),
        }
    }

    /// Run `parser` at `at`, feeding every (end, value) it derives to
    /// `k`. Synchronous: by the time this returns, every consequence
    /// reachable from the invocation has been driven out.
    pub(crate) fn invoke(
        &mut self,
        parser: &Rc<Combinator<T, V>>,
        at: Pos,
        k: Waiter<T, V>,
    ) -> Result<(), Error> {
        match &**parser {
            Combinator::Unit(value) => k(
                self,
                &OutputPair {
                    end: at,
                    value: value.clone(),
                },
            ),
            Combinator::Fail => Ok(()),
            Combinator::Satisfy { accept, .. } => match self.input.get(at.0) {
                Some(t) => match accept(t) {
                    Some(value) => k(
                        self,
                        &OutputPair {
                            end: Pos(at.0 + 1),
                            value,
                        },
                    ),
                    None => Ok(()),
                },
                // at or past the end of the input
                None => Ok(()),
            },
            Combinator::AtEnd(value) => {
                if at.0 == self.input.len() {
                    k(
                        self,
                        &OutputPair {
                            end: at,
                            value: value.clone(),
                        },
                    )
                } else {
                    Ok(())
                }
            }
            Combinator::Seq {
                first,
                second,
                merge,
            } => {
                let second = Rc::clone(second);
                let merge = Rc::clone(merge);
                let after_first: Waiter<T, V> = Rc::new(move |eng, head| {
                    let merge = Rc::clone(&merge);
                    let k = Rc::clone(&k);
                    let head_value = head.value.clone();
                    let after_second: Waiter<T, V> = Rc::new(move |eng, tail| {
                        k(
                            eng,
                            &OutputPair {
                                end: tail.end,
                                value: merge(&head_value, &tail.value),
                            },
                        )
                    });
                    eng.invoke(&second, head.end, after_second)
                });
                self.invoke(first, at, after_first)
            }
            Combinator::Alt { left, right } => {
                self.invoke(left, at, Rc::clone(&k))?;
                self.invoke(right, at, k)
            }
            Combinator::Map { inner, f } => {
                let f = Rc::clone(f);
                let after: Waiter<T, V> = Rc::new(move |eng, pair| {
                    k(
                        eng,
                        &OutputPair {
                            end: pair.end,
                            value: f(&pair.value),
                        },
                    )
                });
                self.invoke(inner, at, after)
            }
            Combinator::Call(tag) => self.enter(tag.clone(), at, k),
            Combinator::Not { target, value } => {
                if self.refute(target, at)? {
                    k(
                        self,
                        &OutputPair {
                            end: at,
                            value: value.clone(),
                        },
                    )
                } else {
                    Ok(())
                }
            }
        }
    }

    /// The memo discipline for rule invocations. The first arrival at a
    /// location registers its continuation and then runs the rule body,
    /// exactly once; every later arrival, the left-recursive re-entry
    /// included, only registers and replays. That existing-entry check
    /// is the entire left-recursion story: the recursive occurrence
    /// becomes a waiter on its own location instead of a loop.
    pub(crate) fn enter(&mut self, rule: RuleTag, at: Pos, k: Waiter<T, V>) -> Result<(), Error> {
        let loc = Location { rule, at };
        if self.memo.contains(&loc) {
            let replay = self.memo.entry(&loc).register(Rc::clone(&k));
            trace!("rejoin {:?} behind {} results", loc, replay);
            for i in 0..replay {
                let pair = self.memo.snapshot_result(&loc, i);
                self.stats.deliveries += 1;
                k(self, &pair)?;
            }
            return Ok(());
        }

        if self.memo.len() >= self.max_locations {
            return Err(Error::LocationsExhausted {
                limit: self.max_locations,
            });
        }
        trace!("first arrival at {:?}", loc);
        self.stats.locations += 1;
        self.memo.entry(&loc).register(k);
        let body = match self.grammar.body(&loc.rule) {
            Some(body) => Rc::clone(body),
            None => return Err(Error::UndefinedRule(loc.rule.clone())),
        };
        self.mark_open(&loc.rule);
        let recorded = loc.clone();
        let recorder: Waiter<T, V> = Rc::new(move |eng, pair| eng.record(&recorded, pair));
        let ran = self.invoke(&body, at, recorder);
        self.mark_closed(&loc.rule);
        ran
    }

    /// Idempotent recording plus fan-out to the waiters present when the
    /// result landed. The waiter count is captured before the loop;
    /// waiters that join during the fan-out already got this pair from
    /// their registration snapshot, so running them here too would
    /// deliver it twice.
    pub(crate) fn record(&mut self, loc: &Location, pair: &OutputPair<V>) -> Result<(), Error> {
        let entry = self.memo.entry(loc);
        if let Changed::Unchanged = entry.note(pair) {
            self.stats.duplicates += 1;
            return Ok(());
        }
        if entry.result_count() > self.max_results {
            return Err(Error::ResultsExhausted {
                rule: loc.rule.clone(),
                at: loc.at,
                limit: self.max_results,
            });
        }
        let fanout = entry.waiter_count();
        self.stats.results += 1;
        trace!("{:?} gains end {} ({} waiters)", loc, pair.end, fanout);
        for i in 0..fanout {
            let k = self.memo.snapshot_waiter(loc, i);
            self.stats.deliveries += 1;
            k(self, pair)?;
        }
        Ok(())
    }

    fn mark_open(&mut self, rule: &RuleTag) {
        match self.open.get_mut(rule) {
            Some(n) => *n += 1,
            None => {
                self.open.insert(rule.clone(), 1);
            }
        }
    }

    fn mark_closed(&mut self, rule: &RuleTag) {
        if let Some(n) = self.open.get_mut(rule) {
            *n -= 1;
        }
    }

    pub(crate) fn is_open(&self, rule: &RuleTag) -> bool {
        self.open.get(rule).map_or(false, |n| *n > 0)
    }
}

impl<T: Clone, V: Clone + PartialEq> Grammar<T, V> {
    /// Drive `root` over `input` from position 0 and collect every
    /// (end, value) it derives, in discovery order. An empty vector
    /// means the input has no derivation; that is an answer, not an
    /// error. Results never cover less than the run explored: any error
    /// abandons the run whole rather than reporting a partial set.
    pub fn run(&self, root: &Rc<Combinator<T, V>>, input: &[T]) -> Result<Parses<V>, Error> {
        self.run_with(&Config::default(), root, input)
    }

    pub fn run_with(
        &self,
        config: &Config,
        root: &Rc<Combinator<T, V>>,
        input: &[T],
    ) -> Result<Parses<V>, Error> {
        // dangling references inside rule bodies were caught at sealing
        // time; the root combinator is the caller's and gets checked here.
        let mut calls = Vec::new();
        let mut negations = Vec::new();
        root.references(&mut calls, &mut negations);
        for tag in calls.iter().chain(negations.iter()) {
            if self.body(tag).is_none() {
                return Err(Error::UndefinedRule(tag.clone()));
            }
        }
        let strata = Strata::arrange(self, root, config)?;
        let mut engine = Engine::new(self, input, strata, config);
        debug!("run over {} tokens begins", input.len());
        let collect: Waiter<T, V> = Rc::new(|eng, pair| {
            if !eng.accepted.contains(pair) {
                eng.accepted.push(pair.clone());
            }
            Ok(())
        });
        engine.invoke(root, Pos(0), collect)?;
        let Engine {
            accepted, stats, ..
        } = engine;
        debug!("quiescent: {:?}", stats);
        Ok(accepted)
    }
}

// Declared from here rather than from tests.rs so the suite can reach
// this module's internals.
#[cfg(test)]
#[path = "tests/engine.rs"]
mod tests_for_engine;
