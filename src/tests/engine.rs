// Declared from crate::engine as tests_for_engine. These drive the
// engine directly: delivery accounting needs eyes on the memo table and
// the counters, not just on what reaches the root.

use super::*;

use crate::tests::{init_logging, input, pair, StrParser};
use crate::RuleSet;

use std::cell::RefCell;

type DeliveryLog = Rc<RefCell<Vec<(usize, OutputPair<String>)>>>;

fn logging_waiter(log: &DeliveryLog, id: usize) -> Waiter<char, String> {
    let log = Rc::clone(log);
    Rc::new(move |_, pair| {
        log.borrow_mut().push((id, pair.clone()));
        Ok(())
    })
}

fn engine_over<'i>(
    g: &'i Grammar<char, String>,
    root: &Rc<Combinator<char, String>>,
    toks: &'i [char],
    config: &Config,
) -> Engine<'i, char, String> {
    let strata = Strata::arrange(g, root, config).unwrap();
    Engine::new(g, toks, strata, config)
}

#[test]
fn waiters_see_each_result_exactly_once() {
    init_logging();
    let mut rules: RuleSet<char, String> = RuleSet::new();
    rules.define("R", Combinator::fail()).unwrap();
    let g = rules.into_grammar().unwrap();
    let toks = input("ab");
    let config = Config::default();
    let root = Combinator::call("R");
    let mut eng = engine_over(&g, &root, &toks, &config);

    let log: DeliveryLog = Rc::new(RefCell::new(Vec::new()));
    let loc = Location {
        rule: RuleTag::from("R"),
        at: Pos(0),
    };

    // first arrival runs the body (which yields nothing) and leaves the
    // entry behind
    eng.invoke(&root, Pos(0), logging_waiter(&log, 1)).unwrap();
    assert!(log.borrow().is_empty());

    // a result recorded later reaches the registered waiter
    eng.record(&loc, &pair(1, "a")).unwrap();
    assert_eq!(*log.borrow(), vec![(1, pair(1, "a"))]);

    // a waiter registered later gets the backlog replayed
    eng.invoke(&root, Pos(0), logging_waiter(&log, 2)).unwrap();
    assert_eq!(*log.borrow(), vec![(1, pair(1, "a")), (2, pair(1, "a"))]);

    // recording the same pair again moves nothing
    eng.record(&loc, &pair(1, "a")).unwrap();
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(eng.stats.duplicates, 1);

    // a second distinct result reaches both waiters, registration order
    eng.record(&loc, &pair(2, "ab")).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            (1, pair(1, "a")),
            (2, pair(1, "a")),
            (1, pair(2, "ab")),
            (2, pair(2, "ab")),
        ]
    );
    // the counter agrees with the log: one tick per logged delivery
    assert_eq!(eng.stats.deliveries, 4);
}

#[test]
fn waiter_joining_mid_fanout_sees_the_pair_once() {
    init_logging();
    let mut rules: RuleSet<char, String> = RuleSet::new();
    rules.define("R", Combinator::fail()).unwrap();
    let g = rules.into_grammar().unwrap();
    let toks = input("a");
    let config = Config::default();
    let root = Combinator::call("R");
    let mut eng = engine_over(&g, &root, &toks, &config);

    let log: DeliveryLog = Rc::new(RefCell::new(Vec::new()));
    let loc = Location {
        rule: RuleTag::from("R"),
        at: Pos(0),
    };

    // a waiter that reacts to its first delivery by registering another
    // waiter at the same location, mid-fan-out
    let reentrant: Waiter<char, String> = {
        let log = Rc::clone(&log);
        Rc::new(move |eng, pair| {
            log.borrow_mut().push((1, pair.clone()));
            let late = logging_waiter(&log, 2);
            eng.invoke(&Combinator::call("R"), Pos(0), late)
        })
    };
    eng.invoke(&root, Pos(0), reentrant).unwrap();
    eng.record(&loc, &pair(1, "a")).unwrap();

    // the late waiter got the in-flight pair from its registration
    // snapshot, not from the fan-out as well
    assert_eq!(*log.borrow(), vec![(1, pair(1, "a")), (2, pair(1, "a"))]);
}

#[test]
fn identical_branches_record_once() {
    let mut rules: RuleSet<char, String> = RuleSet::new();
    rules
        .define("S", Combinator::alt(Combinator::token('a'), Combinator::token('a')))
        .unwrap();
    let g = rules.into_grammar().unwrap();
    let toks = input("a");
    let config = Config::default();
    let root = Combinator::call("S");
    let mut eng = engine_over(&g, &root, &toks, &config);

    let log: DeliveryLog = Rc::new(RefCell::new(Vec::new()));
    eng.invoke(&root, Pos(0), logging_waiter(&log, 0)).unwrap();
    assert_eq!(*log.borrow(), vec![(0, pair(1, "a"))]);
    assert_eq!(eng.stats.locations, 1);
    assert_eq!(eng.stats.results, 1);
    assert_eq!(eng.stats.duplicates, 1);
}

#[test]
fn leaves_respect_input_bounds() {
    let g: Grammar<char, String> = Grammar::empty();
    let toks = input("xy");
    let config = Config::default();
    let any: StrParser = Combinator::any_token();
    let mut eng = engine_over(&g, &any, &toks, &config);

    let log: DeliveryLog = Rc::new(RefCell::new(Vec::new()));
    eng.invoke(&any, Pos(1), logging_waiter(&log, 0)).unwrap();
    // position n sits past the last token: nothing to consume
    eng.invoke(&any, Pos(2), logging_waiter(&log, 1)).unwrap();
    assert_eq!(*log.borrow(), vec![(0, pair(2, "y"))]);
}

#[test]
fn left_recursive_entry_does_not_rerun_the_body() {
    init_logging();
    let g = crate::tests::sum_grammar();
    let toks = input("1+2");
    let config = Config::default();
    let root = Combinator::call("E");
    let mut eng = engine_over(&g, &root, &toks, &config);

    let log: DeliveryLog = Rc::new(RefCell::new(Vec::new()));
    eng.invoke(&root, Pos(0), logging_waiter(&log, 0)).unwrap();
    assert_eq!(*log.borrow(), vec![(0, pair(1, "1")), (0, pair(3, "1+2"))]);
    // one location per position E was invoked at, despite re-entry
    assert_eq!(eng.stats.locations, 1);
    assert_eq!(eng.stats.results, 2);
}
