use crate::grammar::{Combinator, Grammar};
use crate::RuleTag;

#[derive(Copy, Clone)]
enum Context {
    Seq,
    Alt,
}

impl<T, V> Combinator<T, V> {
    fn needs_parens(&self, context: Context) -> bool {
        match (self, context) {
            (
                Combinator::Unit(_)
                | Combinator::Fail
                | Combinator::Satisfy { .. }
                | Combinator::AtEnd(_)
                | Combinator::Call(_)
                | Combinator::Not { .. },
                _,
            ) => false,

            (Combinator::Seq { .. }, Context::Seq) => false,
            (Combinator::Seq { .. }, Context::Alt) => true,

            (Combinator::Alt { .. }, Context::Alt) => false,
            (Combinator::Alt { .. }, Context::Seq) => true,

            // value reshaping is invisible in the rendered grammar
            (Combinator::Map { inner, .. }, context) => inner.needs_parens(context),
        }
    }
}

impl<T, V> std::fmt::Display for Combinator<T, V> {
    fn fmt(&self, w: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Combinator::Unit(_) => write!(w, "''"),
            Combinator::Fail => write!(w, "empty"),
            Combinator::Satisfy { label, .. } => write!(w, "{}", label),
            Combinator::AtEnd(_) => write!(w, "$"),
            Combinator::Seq { first, second, .. } => {
                let ctxt = Context::Seq;
                if !first.needs_parens(ctxt) && !second.needs_parens(ctxt) {
                    write!(w, "{} {}", first, second)
                } else {
                    write!(w, "({}) ({})", first, second)
                }
            }
            Combinator::Alt { left, right } => {
                let ctxt = Context::Alt;
                if !left.needs_parens(ctxt) && !right.needs_parens(ctxt) {
                    write!(w, "{} | {}", left, right)
                } else {
                    write!(w, "({}) | ({})", left, right)
                }
            }
            Combinator::Map { inner, .. } => write!(w, "{}", inner),
            Combinator::Call(tag) => write!(w, "{}", tag),
            Combinator::Not { target, .. } => write!(w, "!{}", target),
        }
    }
}

impl<T, V> std::fmt::Display for Grammar<T, V> {
    fn fmt(&self, w: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (tag, body) in self.rules() {
            writeln!(w, "{} ::= {}", tag, body)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for RuleTag {
    fn fmt(&self, w: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(w, "{}", self.name())
    }
}
