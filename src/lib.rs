//! Fixed-point evaluation of parser combinators: grammars may be
//! left-recursive, mutually recursive, and ambiguous, and are run by
//! saturating a memo table under continuation-passing delivery instead of
//! returning parse results up a call stack. Negation as failure is
//! supported for stratified grammars.

use std::rc::Rc;

use derive_more::{Display, From, Into};
use thiserror::Error;

pub mod grammar;

mod display;
mod engine;
mod memo;
mod negation;

pub use engine::{Config, RunStats};
pub use grammar::{Combinator, Grammar, RuleSet};


/// Index into the input token sequence. Position `i` sits *before* the
/// `i`-th token, so a parse over the whole of an `n`-token input runs
/// from position 0 to position `n`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, From, Into)]
#[display(fmt = "{}", _0)]
pub struct Pos(pub usize);

/// Stable identity for a memoized rule. Re-invoking the same tag at the
/// same position hits the same memo entry; that is the entire mechanism
/// by which recursion terminates. Cloned on every memo operation, so the
/// name sits behind a shared allocation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RuleTag(Rc<str>);

impl RuleTag {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        RuleTag(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RuleTag {
    fn from(name: &str) -> Self {
        RuleTag(Rc::from(name))
    }
}

impl From<String> for RuleTag {
    fn from(name: String) -> Self {
        RuleTag(Rc::from(name))
    }
}

impl std::fmt::Debug for RuleTag {
    fn fmt(&self, w: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(w, "RuleTag({})", self.0)
    }
}

/// A completed parse: where it ended and what it produced. Compared by
/// value for deduplication.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct OutputPair<V> {
    pub end: Pos,
    pub value: V,
}

/// Memo key: one rule invoked at one input position. At most one entry
/// exists per location during a run.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub rule: RuleTag,
    pub at: Pos,
}

impl std::fmt::Debug for Location {
    fn fmt(&self, w: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(w, "Location({}, {})", self.rule.name(), self.at)
    }
}

/// Results of a driver run, deduplicated, in discovery order.
pub type Parses<V> = Vec<OutputPair<V>>;

/// Everything that can go wrong while defining or running a grammar.
/// Budget overruns are the only recoverable kind: rerun with a larger
/// budget, or reject the input. An input with no derivation is *not* an
/// error; the driver reports it as an empty result set.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(RuleTag),
    #[error("rule `{0}` is referenced but never defined")]
    UndefinedRule(RuleTag),
    #[error("rule `{0}` is assigned to more than one stratum")]
    DuplicateStratum(RuleTag),
    #[error("`{within}` negates `{negated}`, which does not lie in a strictly earlier stratum")]
    UnstratifiedNegation { within: RuleTag, negated: RuleTag },
    #[error("`{from}` calls `{to}`, which lies in a later stratum")]
    UnstratifiedCall { from: RuleTag, to: RuleTag },
    #[error("negation of `{negated}` at position {at} before its rules went quiet")]
    PrematureNegation { negated: RuleTag, at: Pos },
    #[error("more than {limit} distinct (rule, position) locations explored")]
    LocationsExhausted { limit: usize },
    #[error("more than {limit} results recorded for `{rule}` at position {at}")]
    ResultsExhausted { rule: RuleTag, at: Pos, limit: usize },
}

impl Error {
    /// True for budget overruns, the recoverable kind.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Error::LocationsExhausted { .. } | Error::ResultsExhausted { .. }
        )
    }
}

/// Convenience queries over a driver result set.
pub trait ParseMatches<V> {
    fn has_parse(&self) -> bool;
    fn no_parse(&self) -> bool {
        !self.has_parse()
    }
    /// The subset of results that consumed the entire input.
    fn complete(&self, input_len: usize) -> Parses<V>
    where
        V: Clone;
}

impl<V> ParseMatches<V> for [OutputPair<V>] {
    fn has_parse(&self) -> bool {
        !self.is_empty()
    }

    fn complete(&self, input_len: usize) -> Parses<V>
    where
        V: Clone,
    {
        self.iter()
            .filter(|pair| pair.end == Pos(input_len))
            .cloned()
            .collect()
    }
}
