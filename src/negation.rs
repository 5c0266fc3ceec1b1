//! Negation as failure, made safe by stratification.
//!
//! "No derivation" is only a usable answer under a closed-world reading:
//! the result set consulted must already be everything that will ever be
//! true of it. A grammar that negates itself, even through
//! intermediaries, has no such reading, and a grammar that negates a
//! rule whose evaluation is still in flight would be answering from a
//! half-built table. The first problem is lexical and caught before the
//! run starts; the second is temporal and caught by the openness check
//! at the moment of refutation.
//!
//!   no rule reachable from R is open    S(R, i) saturated and empty
//!  -------------------------------------------------------------------- NAF
//!   not R at i succeeds, width zero
//!
//! The call-monotonicity check below looks stricter than it needs to be
//! at first sight. It is not: if a rule could positively call into a
//! *later* stratum, that later stratum's pending work could flow back
//! down and add results to a rule an earlier negation already answered
//! about, and the closed world reopens. Calls level or down, negations
//! strictly down.

use crate::engine::{Config, Engine};
use crate::grammar::{Combinator, Grammar};
use crate::memo::Waiter;
use crate::{Error, Location, Pos, RuleTag};

use std::rc::Rc;

use linear_map::LinearMap;
use log::trace;

/// Stratum assignment for one run, plus the positive-call closure of
/// every negated rule. Rules listed in the configuration get their
/// group's index; everything else, the root combinator included,
/// evaluates in the implicit final stratum after all listed groups.
pub(crate) struct Strata {
    index: LinearMap<RuleTag, usize>,
    /// Index of the implicit final stratum.
    last: usize,
    /// For every negated tag: every rule its saturation can touch
    /// through positive calls, itself included. Openness of any of
    /// these at refutation time means the target is not yet quiescent.
    reach: LinearMap<RuleTag, Vec<RuleTag>>,
}

impl Strata {
    /// Build and check the assignment for one run. A grammar that never
    /// negates collapses into a single stratum and the configured
    /// listing is ignored entirely.
    pub(crate) fn arrange<T, V>(
        grammar: &Grammar<T, V>,
        root: &Rc<Combinator<T, V>>,
        config: &Config,
    ) -> Result<Self, Error> {
        let mut negated = Vec::new();
        let mut root_calls = Vec::new();
        let mut root_negated = Vec::new();
        for (_, body) in grammar.rules() {
            let mut calls = Vec::new();
            body.references(&mut calls, &mut negated);
        }
        root.references(&mut root_calls, &mut root_negated);
        if negated.is_empty() && root_negated.is_empty() {
            return Ok(Strata {
                index: LinearMap::new(),
                last: 0,
                reach: LinearMap::new(),
            });
        }

        let mut index = LinearMap::new();
        for (group, tags) in config.strata.iter().enumerate() {
            for tag in tags {
                if grammar.body(tag).is_none() {
                    return Err(Error::UndefinedRule(tag.clone()));
                }
                if index.insert(tag.clone(), group).is_some() {
                    return Err(Error::DuplicateStratum(tag.clone()));
                }
            }
        }
        let mut strata = Strata {
            index,
            last: config.strata.len(),
            reach: LinearMap::new(),
        };

        // negations point strictly down, calls never up
        for (tag, body) in grammar.rules() {
            let home = strata.stratum_of(tag);
            let mut calls = Vec::new();
            let mut negations = Vec::new();
            body.references(&mut calls, &mut negations);
            for bad in negations {
                if strata.stratum_of(&bad) >= home {
                    return Err(Error::UnstratifiedNegation {
                        within: tag.clone(),
                        negated: bad,
                    });
                }
            }
            for callee in calls {
                if strata.stratum_of(&callee) > home {
                    return Err(Error::UnstratifiedCall {
                        from: tag.clone(),
                        to: callee,
                    });
                }
            }
        }
        // the root lives in the final stratum, so its negations must
        // target listed rules
        for bad in &root_negated {
            if strata.stratum_of(bad) >= strata.last {
                return Err(Error::UnstratifiedNegation {
                    within: RuleTag::from("(root)"),
                    negated: bad.clone(),
                });
            }
        }

        for target in negated.iter().chain(root_negated.iter()) {
            strata.close_over(grammar, target);
        }
        Ok(strata)
    }

    /// Positive-call closure of `target`, depth first, recorded for the
    /// openness check at refutation time.
    fn close_over<T, V>(&mut self, grammar: &Grammar<T, V>, target: &RuleTag) {
        if self.reach.contains_key(target) {
            return;
        }
        let mut seen = vec![target.clone()];
        let mut stack = vec![target.clone()];
        while let Some(tag) = stack.pop() {
            if let Some(body) = grammar.body(&tag) {
                let mut calls = Vec::new();
                let mut negations = Vec::new();
                body.references(&mut calls, &mut negations);
                for callee in calls {
                    if !seen.contains(&callee) {
                        seen.push(callee.clone());
                        stack.push(callee);
                    }
                }
            }
        }
        self.reach.insert(target.clone(), seen);
    }

    pub(crate) fn stratum_of(&self, tag: &RuleTag) -> usize {
        self.index.get(tag).copied().unwrap_or(self.last)
    }

    pub(crate) fn reach_of(&self, tag: &RuleTag) -> &[RuleTag] {
        match self.reach.get(tag) {
            Some(rules) => rules,
            None => &[],
        }
    }
}

impl<'i, T: Clone, V: Clone + PartialEq> Engine<'i, T, V> {
    /// Negation as failure. Saturates the positive side, then answers
    /// from the closed result set: true iff the target admits no
    /// derivation at `at`. Absence-so-far is not absence: if anything
    /// the target can reach is still open, its result set could still
    /// grow after we answer, so that case is an error, never a guess.
    pub(crate) fn refute(&mut self, target: &RuleTag, at: Pos) -> Result<bool, Error> {
        for rule in self.strata.reach_of(target) {
            if self.is_open(rule) {
                return Err(Error::PrematureNegation {
                    negated: target.clone(),
                    at,
                });
            }
        }
        // drive the positive side to quiescence; the memo table reuses
        // any saturation already paid for at this location
        let sink: Waiter<T, V> = Rc::new(|_, _| Ok(()));
        self.enter(target.clone(), at, sink)?;
        self.stats.refutations += 1;
        let loc = Location {
            rule: target.clone(),
            at,
        };
        let refuted = self
            .memo
            .get(&loc)
            .map_or(true, |entry| entry.results().is_empty());
        trace!(
            "refute {:?}: {}",
            loc,
            if refuted { "no derivation" } else { "derivable" }
        );
        Ok(refuted)
    }
}

#[cfg(test)]
#[path = "tests/negation.rs"]
mod tests_for_negation;
