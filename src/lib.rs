//! # multiparse
//!
//! A parser combinator engine that reports *every* distinct successful
//! parse of an input, incrementally, instead of committing to one tree.
//! Parsers are built from a small algebra (`seq`, `alt`, `repeat`, cut and
//! lookahead) and executed in continuation-passing style over a cooperative
//! job queue, so ambiguous grammars enumerate and long repetitions never
//! exhaust the call stack.
//!
//! ```
//! use multiparse::{alt, literal, run, ParserRef, Value};
//!
//! let word = alt([ParserRef::from(literal("foo")), ParserRef::from(literal("foobar"))]);
//! let results = run(&word, "foobar").unwrap();
//! assert_eq!(results.values(), vec![Value::from("foo"), Value::from("foobar")]);
//! ```
//!
//! Backtracking is pruned with `commit`: a failure after a committed match
//! aborts the enclosing alternation instead of trying further branches.
//! Recursive grammars tie their cycles through [`ParserSlot`] forward
//! declarations, resolved at invocation time.

pub mod engine;

pub use engine::{
    alt, chain, check, commit, discard, end_of_input, fail_with, literal, many, many1, match_fn,
    not, optional, optional_or, pattern, reduce, reduce_with, repeat, repeat_ignore,
    repeat_separated, run, run_with_config, run_with_listener, seq, seq_ignore, succeed_with,
    Continuation, CustomValue, DebugSink, EngineError, Failure, FailureDiagnostic, MatchResult,
    MessageThunk, Parser, ParserRef, ParserSlot, ParserState, ResultSet, RunConfig, Scheduler,
    Success, Value, UNBOUNDED,
};
