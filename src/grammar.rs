//! Combinator graphs and the rule sets that close over them.
//!
//! A grammar here is a static structure: a tree of combinators in which
//! recursion is never a closure calling back into itself, always a
//! reference to a rule by name (`call`). The engine resolves those names
//! through its memo table, which is what turns left recursion and mutual
//! recursion into ordinary, terminating cases.

use crate::{Error, RuleTag};

use std::rc::Rc;

use linear_map::LinearMap;

/// Rule tables are insertion-ordered so that rendering and iteration
/// follow definition order.
pub(crate) type RuleMap<T, V> = LinearMap<RuleTag, Rc<Combinator<T, V>>>;

type AcceptFn<T, V> = dyn Fn(&T) -> Option<V>;
type MergeFn<V> = dyn Fn(&V, &V) -> V;
type MapFn<V> = dyn Fn(&V) -> V;

/// One node of a combinator graph. `T` is the token type of the input;
/// `V` the value type every parse produces.
///
/// Leaves consume at most one token. Everything wider is built from
/// `seq` and `alt`, and everything recursive goes through `call` so the
/// engine can memoize it.
pub enum Combinator<T: 'static, V: 'static> {
    /// Zero-width success carrying a fixed value.
    Unit(V),
    /// The empty language: succeeds never, for any input.
    Fail,
    /// Single-token leaf: consumes one token iff the predicate produces
    /// a value from it. The label only exists for rendering.
    Satisfy {
        label: String,
        accept: Rc<AcceptFn<T, V>>,
    },
    /// Zero-width success only at the end of the input.
    AtEnd(V),
    Seq {
        first: Rc<Self>,
        second: Rc<Self>,
        merge: Rc<MergeFn<V>>,
    },
    Alt {
        left: Rc<Self>,
        right: Rc<Self>,
    },
    Map {
        inner: Rc<Self>,
        f: Rc<MapFn<V>>,
    },
    /// Reference to a rule by tag; the memoization point.
    Call(RuleTag),
    /// Negation as failure: zero-width success carrying the given value
    /// iff the rule admits no derivation here. Only meaningful under a
    /// stratification that closes the rule off first; see the negation
    /// module.
    Not { target: RuleTag, value: V },
}

impl<T, V> Combinator<T, V> {
    pub fn unit(value: V) -> Rc<Self> {
        Rc::new(Combinator::Unit(value))
    }

    pub fn fail() -> Rc<Self> {
        Rc::new(Combinator::Fail)
    }

    pub fn satisfy(
        label: impl Into<String>,
        accept: impl Fn(&T) -> Option<V> + 'static,
    ) -> Rc<Self> {
        Rc::new(Combinator::Satisfy {
            label: label.into(),
            accept: Rc::new(accept),
        })
    }

    pub fn at_end(value: V) -> Rc<Self> {
        Rc::new(Combinator::AtEnd(value))
    }

    pub fn seq(
        first: Rc<Self>,
        second: Rc<Self>,
        merge: impl Fn(&V, &V) -> V + 'static,
    ) -> Rc<Self> {
        Rc::new(Combinator::Seq {
            first,
            second,
            merge: Rc::new(merge),
        })
    }

    pub fn alt(left: Rc<Self>, right: Rc<Self>) -> Rc<Self> {
        Rc::new(Combinator::Alt { left, right })
    }

    pub fn map(inner: Rc<Self>, f: impl Fn(&V) -> V + 'static) -> Rc<Self> {
        Rc::new(Combinator::Map {
            inner,
            f: Rc::new(f),
        })
    }

    pub fn call(tag: impl Into<RuleTag>) -> Rc<Self> {
        Rc::new(Combinator::Call(tag.into()))
    }

    pub fn not(target: impl Into<RuleTag>, value: V) -> Rc<Self> {
        Rc::new(Combinator::Not {
            target: target.into(),
            value,
        })
    }
}

impl<T: Clone, V: From<T>> Combinator<T, V> {
    /// Leaf that consumes one token, whatever it is.
    pub fn any_token() -> Rc<Self> {
        Self::satisfy("any", |t: &T| Some(V::from(t.clone())))
    }
}

impl<T: Clone + PartialEq + std::fmt::Debug, V: From<T>> Combinator<T, V> {
    /// Leaf that consumes exactly the given token.
    pub fn token(want: T) -> Rc<Self> {
        let label = format!("{:?}", want);
        Self::satisfy(label, move |t: &T| {
            if *t == want {
                Some(V::from(t.clone()))
            } else {
                None
            }
        })
    }
}

impl<T, V> Combinator<T, V> {
    /// Every rule this tree mentions, split into positive references
    /// (`call`) and negative ones (`not`).
    pub(crate) fn references(&self, calls: &mut Vec<RuleTag>, negations: &mut Vec<RuleTag>) {
        match self {
            Combinator::Unit(_)
            | Combinator::Fail
            | Combinator::Satisfy { .. }
            | Combinator::AtEnd(_) => {}
            Combinator::Seq { first, second, .. } => {
                first.references(calls, negations);
                second.references(calls, negations);
            }
            Combinator::Alt { left, right } => {
                left.references(calls, negations);
                right.references(calls, negations);
            }
            Combinator::Map { inner, .. } => inner.references(calls, negations),
            Combinator::Call(tag) => calls.push(tag.clone()),
            Combinator::Not { target, .. } => negations.push(target.clone()),
        }
    }
}

impl<T, V: std::fmt::Debug> std::fmt::Debug for Combinator<T, V> {
    fn fmt(&self, w: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Combinator::Unit(v) => write!(w, "Unit({:?})", v),
            Combinator::Fail => write!(w, "Fail"),
            Combinator::Satisfy { label, .. } => write!(w, "Satisfy[{}]", label),
            Combinator::AtEnd(v) => write!(w, "AtEnd({:?})", v),
            Combinator::Seq { first, second, .. } => {
                write!(w, "Seq({:?}, {:?})", first, second)
            }
            Combinator::Alt { left, right } => write!(w, "Alt({:?}, {:?})", left, right),
            Combinator::Map { inner, .. } => write!(w, "Map({:?})", inner),
            Combinator::Call(tag) => write!(w, "Call({})", tag.name()),
            Combinator::Not { target, value } => {
                write!(w, "Not({}, {:?})", target.name(), value)
            }
        }
    }
}

/// Rules under construction. Bodies may reference any tag, defined yet
/// or not; dangling references are caught when the set is sealed.
pub struct RuleSet<T: 'static, V: 'static> {
    rules: RuleMap<T, V>,
}

impl<T, V> RuleSet<T, V> {
    pub fn new() -> Self {
        RuleSet {
            rules: LinearMap::new(),
        }
    }

    /// Bind `tag` to `body`. Each tag gets exactly one body; a second
    /// definition is an error, not a silent overwrite.
    pub fn define(
        &mut self,
        tag: impl Into<RuleTag>,
        body: Rc<Combinator<T, V>>,
    ) -> Result<(), Error> {
        let tag = tag.into();
        if self.rules.contains_key(&tag) {
            return Err(Error::DuplicateRule(tag));
        }
        self.rules.insert(tag, body);
        Ok(())
    }

    /// Installs `tag ::= '' | item tag` and hands back `call(tag)`. This
    /// is the whole of repetition support: expressed as a named rule it
    /// is memoized like anything else, so zero-or-more of a recursive
    /// item still terminates.
    pub fn define_repetition(
        &mut self,
        tag: impl Into<RuleTag>,
        item: Rc<Combinator<T, V>>,
        empty: V,
        fold: impl Fn(&V, &V) -> V + 'static,
    ) -> Result<Rc<Combinator<T, V>>, Error> {
        let tag = tag.into();
        let body = Combinator::alt(
            Combinator::unit(empty),
            Combinator::seq(item, Combinator::call(tag.clone()), fold),
        );
        self.define(tag.clone(), body)?;
        Ok(Combinator::call(tag))
    }

    /// Seal the set. Every `call` and `not` target inside any body must
    /// name a defined rule.
    pub fn into_grammar(self) -> Result<Grammar<T, V>, Error> {
        let mut calls = Vec::new();
        let mut negations = Vec::new();
        for (_, body) in self.rules.iter() {
            body.references(&mut calls, &mut negations);
        }
        for tag in calls.iter().chain(negations.iter()) {
            if !self.rules.contains_key(tag) {
                return Err(Error::UndefinedRule(tag.clone()));
            }
        }
        Ok(Grammar { rules: self.rules })
    }
}

/// A sealed rule set: every rule reference inside it is known to
/// resolve. Construction goes through [`RuleSet::into_grammar`].
pub struct Grammar<T: 'static, V: 'static> {
    rules: RuleMap<T, V>,
}

impl<T, V> Grammar<T, V> {
    /// The grammar with no rules at all. Still useful: rule-free
    /// combinators run against it directly.
    pub fn empty() -> Self {
        Grammar {
            rules: LinearMap::new(),
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = (&RuleTag, &Rc<Combinator<T, V>>)> {
        self.rules.iter()
    }

    pub(crate) fn body(&self, tag: &RuleTag) -> Option<&Rc<Combinator<T, V>>> {
        self.rules.get(tag)
    }
}

#[cfg(test)]
#[path = "tests/grammar.rs"]
mod tests_for_grammar;
