use crate::*;
use super::*;

use crate::tests::{ch, digit, glue, seq, sum_grammar, StrParser};

use expect_test::expect;

#[test]
fn rendering_follows_precedence() {
    let g = sum_grammar();
    expect![[r#"
        E ::= (E '+' digit) | (digit)
    "#]]
    .assert_eq(&g.to_string());
}

#[test]
fn rendering_of_leaves() {
    let unit: StrParser = Combinator::unit(String::new());
    assert_eq!(unit.to_string(), "''");
    assert_eq!(Combinator::<char, String>::fail().to_string(), "empty");
    assert_eq!(ch('a').to_string(), "'a'");
    assert_eq!(digit().to_string(), "digit");
    assert_eq!(Combinator::<char, String>::any_token().to_string(), "any");
    assert_eq!(
        Combinator::<char, String>::at_end(String::new()).to_string(),
        "$"
    );
    assert_eq!(Combinator::<char, String>::call("E").to_string(), "E");
    assert_eq!(
        Combinator::<char, String>::not("E", String::new()).to_string(),
        "!E"
    );
}

#[test]
fn rendering_nests_mixed_operators() {
    let alt_in_seq = seq(Combinator::alt(ch('a'), ch('b')), ch('c'));
    assert_eq!(alt_in_seq.to_string(), "('a' | 'b') ('c')");
    let seq_chain = seq(seq(ch('a'), ch('b')), ch('c'));
    assert_eq!(seq_chain.to_string(), "'a' 'b' 'c'");
    // value reshaping is invisible, but the inner shape still decides
    // its own parenthesization
    let mapped = Combinator::map(Combinator::alt(ch('a'), ch('b')), |v: &String| v.clone());
    assert_eq!(seq(mapped, ch('c')).to_string(), "('a' | 'b') ('c')");
}

#[test]
fn repetition_desugars_to_a_rule() {
    let mut rules: RuleSet<char, String> = RuleSet::new();
    let root = rules
        .define_repetition("As", ch('a'), String::new(), glue)
        .unwrap();
    let g = rules.into_grammar().unwrap();
    assert_eq!(root.to_string(), "As");
    expect![[r#"
        As ::= ('') | ('a' As)
    "#]]
    .assert_eq(&g.to_string());
}

#[test]
fn grammars_render_rules_in_definition_order() {
    let mut rules: RuleSet<char, String> = RuleSet::new();
    rules.define("A", ch('a')).unwrap();
    rules
        .define("B", seq(Combinator::call("A"), Combinator::not("A", String::new())))
        .unwrap();
    let g = rules.into_grammar().unwrap();
    expect![[r#"
        A ::= 'a'
        B ::= A !A
    "#]]
    .assert_eq(&g.to_string());
}

#[test]
fn references_walk_both_polarities() {
    let body: StrParser = Combinator::alt(
        seq(Combinator::call("A"), Combinator::not("B", String::new())),
        Combinator::map(Combinator::call("C"), |v: &String| v.clone()),
    );
    let mut calls = Vec::new();
    let mut negations = Vec::new();
    body.references(&mut calls, &mut negations);
    assert_eq!(calls, vec![RuleTag::from("A"), RuleTag::from("C")]);
    assert_eq!(negations, vec![RuleTag::from("B")]);
}

#[test]
fn debug_formats_elide_closures() {
    let p = seq(ch('a'), digit());
    assert_eq!(format!("{:?}", p), "Seq(Satisfy['a'], Satisfy[digit])");
    assert_eq!(
        format!("{:?}", Combinator::<char, String>::call("E")),
        "Call(E)"
    );
}
