//! Universal properties of the algebra: totality of `optional`, lookahead
//! invariance, cut propagation, drop elision, determinism, listener
//! ordering.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use rstest::rstest;

use multiparse::{
    alt, check, commit, discard, literal, many, many1, not, optional, pattern, repeat, run,
    run_with_listener, seq, seq_ignore, EngineError, ParserRef, Value, UNBOUNDED,
};

#[rstest]
#[case("abc")]
#[case("xyz")]
#[case("")]
fn test_optional_always_succeeds(#[case] input: &str) {
    let parser = optional(literal("abc"));
    let results = run(&parser, input).unwrap();
    assert!(results.is_settled());
    let expected = if input.starts_with("abc") {
        Value::from("abc")
    } else {
        Value::from("")
    };
    assert_eq!(results.values(), vec![expected]);
}

#[test]
fn test_check_consumes_nothing() {
    let digits = || pattern(r"\d+").unwrap();
    let parser = seq([
        ParserRef::from(check(digits())),
        ParserRef::from(digits()),
    ]);
    let results = run(&parser, "42").unwrap();
    // Both elements saw the same text: the lookahead left pos untouched.
    assert_eq!(
        results.values(),
        vec![Value::List(vec![Value::from("42"), Value::from("42")])]
    );
}

#[test]
fn test_check_failure_is_forwarded() {
    let parser = check(literal("x"));
    assert!(run(&parser, "y").unwrap().is_empty());
}

#[test]
fn test_not_succeeds_where_parser_fails() {
    let parser = seq([
        ParserRef::from(not(literal("#"))),
        ParserRef::from(pattern(r"\w+").unwrap()),
    ]);
    assert_eq!(
        run(&parser, "word").unwrap().values(),
        vec![Value::List(vec![Value::from(""), Value::from("word")])]
    );
    assert!(run(&parser, "#word").unwrap().is_empty());
}

#[test]
fn test_commit_prunes_later_alternatives() {
    let committed = alt([
        ParserRef::from(seq([
            ParserRef::from(commit(literal("if"))),
            ParserRef::from(literal(" then")),
        ])),
        ParserRef::from(literal("if")),
    ]);
    // The cut branch fails after committing, so the bare "if" branch is
    // never tried.
    assert!(run(&committed, "if else").unwrap().is_empty());

    let uncommitted = alt([
        ParserRef::from(seq([
            ParserRef::from(literal("if")),
            ParserRef::from(literal(" then")),
        ])),
        ParserRef::from(literal("if")),
    ]);
    assert_eq!(
        run(&uncommitted, "if else").unwrap().values(),
        vec![Value::from("if")]
    );
}

#[test]
fn test_commit_is_sticky_across_seq() {
    let parser = alt([
        ParserRef::from(seq([
            ParserRef::from(literal("a")),
            ParserRef::from(commit(literal("b"))),
            ParserRef::from(literal("c")),
        ])),
        ParserRef::from(literal("a")),
    ]);
    // The commit sits mid-sequence; the failure of "c" still aborts.
    assert!(run(&parser, "abX").unwrap().is_empty());
}

#[test]
fn test_drop_elision() {
    let parser = seq([
        ParserRef::from(discard(literal("("))),
        ParserRef::from(pattern(r"\d+").unwrap()),
        ParserRef::from(discard(literal(")"))),
    ]);
    assert_eq!(
        run(&parser, "(42)").unwrap().values(),
        vec![Value::List(vec![Value::from("42")])]
    );
}

#[test]
fn test_single_element_seq_is_transparent() {
    let bare = literal("hello");
    let wrapped = seq([ParserRef::from(literal("hello"))]);
    let a = run(&bare, "hello world").unwrap().values();
    let b = run(&wrapped, "hello world").unwrap().values();
    // Equivalent to the parser itself: no list wrapping.
    assert_eq!(a, b);
    assert_eq!(a, vec![Value::from("hello")]);
}

#[test]
fn test_seq_ignore_skips_whitespace() {
    let parser = seq_ignore(
        pattern(r"\s+").unwrap(),
        [ParserRef::from(literal("hello")), ParserRef::from(literal("world"))],
    );
    assert_eq!(
        run(&parser, "hello   world").unwrap().values(),
        vec![Value::List(vec![Value::from("hello"), Value::from("world")])]
    );
    assert_eq!(
        run(&parser, "helloworld").unwrap().values(),
        vec![Value::List(vec![Value::from("hello"), Value::from("world")])]
    );
}

#[test]
fn test_many_accepts_zero() {
    let results = run(&many(literal("a")), "bbb").unwrap();
    assert_eq!(results.values(), vec![Value::List(Vec::new())]);
}

#[test]
fn test_many1_requires_one() {
    assert!(run(&many1(literal("a")), "bbb").unwrap().is_empty());
    assert!(run(&many1(literal("a")), "abbb").unwrap().is_settled());
}

#[test]
fn test_repeat_below_min_fails_at_origin() {
    let parser = repeat(literal("a"), 3, UNBOUNDED);
    let results = run(&parser, "aa").unwrap();
    assert!(results.is_empty());
    assert!(results.furthest_failure().is_some());
}

#[test]
fn test_zero_width_repeat_with_min_one() {
    let parser = repeat(optional(literal("x")), 1, UNBOUNDED);
    match run(&parser, "y") {
        Err(EngineError::ZeroWidthRepeat { pos: 0 }) => {}
        other => panic!("expected grammar error, got {:?}", other),
    }
}

#[test]
fn test_listeners_observe_identical_sequences() {
    let parser = repeat(literal("a"), 0, 3);
    let first = Rc::new(RefCell::new(Vec::new()));
    let second = Rc::new(RefCell::new(Vec::new()));
    let sink = first.clone();
    let results = run_with_listener(&parser, "aaa", move |value| {
        sink.borrow_mut().push(value.clone())
    })
    .unwrap();
    {
        let sink = second.clone();
        results.then(move |value| sink.borrow_mut().push(value.clone()));
    }
    assert_eq!(*first.borrow(), *second.borrow());
    assert_eq!(first.borrow().len(), 4);
}

#[test]
fn test_reregistered_listener_sees_values_twice() {
    let results = run(&literal("a"), "a").unwrap();
    let count = Rc::new(RefCell::new(0));
    for _ in 0..2 {
        let count = count.clone();
        results.then(move |_| *count.borrow_mut() += 1);
    }
    assert_eq!(*count.borrow(), 2);
}

proptest! {
    #[test]
    fn prop_runs_are_deterministic(input in "[ab]{0,12}") {
        let grammar = || {
            alt([
                ParserRef::from(many1(literal("a"))),
                ParserRef::from(seq([
                    ParserRef::from(many(literal("ab"))),
                    ParserRef::from(optional(literal("b"))),
                ])),
            ])
        };
        let first = run(&grammar(), &input).unwrap().values();
        let second = run(&grammar(), &input).unwrap().values();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_optional_is_total(input in "\\PC{0,16}") {
        let parser = optional(literal("needle"));
        let results = run(&parser, &input).unwrap();
        prop_assert!(results.is_settled());
    }

    #[test]
    fn prop_check_never_advances(input in "[0-9a-f]{0,10}") {
        let hex = pattern(r"[0-9a-f]+").unwrap();
        let parser = seq([
            ParserRef::from(check(&hex)),
            ParserRef::from(&hex),
        ]);
        let results = run(&parser, &input).unwrap();
        for value in results.values() {
            let items = value.as_list().expect("seq produces lists").to_vec();
            prop_assert_eq!(items[0].clone(), items[1].clone());
        }
    }
}
