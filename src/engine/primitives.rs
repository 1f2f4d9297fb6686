//! Leaf parsers: fixed text, regex patterns, user functions and constants.
//!
//! Every primitive either succeeds advancing `pos` by the matched length or
//! fails at the state it was invoked at. Matching never looks past the
//! state's `end_pos`.

use std::rc::Rc;

use regex::Regex;

use super::error::EngineError;
use super::parser::Parser;
use super::result::{Continuation, Failure, MatchResult, MessageThunk, Success};
use super::state::ParserState;
use super::value::Value;

/// Match a fixed prefix. The value is the matched text.
pub fn literal(text: impl Into<String>) -> Parser {
    let text: Rc<str> = Rc::from(text.into());
    let message: MessageThunk = {
        let text = text.clone();
        Rc::new(move || format!("'{}'", text))
    };
    let exec_message = message.clone();
    Parser::build("literal", message, move |state, k| {
        if state.remaining().starts_with(text.as_ref()) {
            k.accept(MatchResult::Success(Success {
                state: state.advance(text.len()),
                value: Value::Str(text.clone()),
                commit: false,
            }));
        } else {
            k.accept(MatchResult::Failure(Failure::at(state, exec_message.clone())));
        }
    })
}

/// Match a regex at the current position, consuming the longest match the
/// pattern allows. The value is the matched text.
pub fn pattern(source: &str) -> Result<Parser, EngineError> {
    // Anchor at the start of the unconsumed slice; the slice already stops
    // at end_pos, so the bound is respected for free.
    let regex = Regex::new(&format!(r"\A(?:{})", source))
        .map_err(|err| EngineError::InvalidPattern(err.to_string()))?;
    let regex = Rc::new(regex);
    let printable: Rc<str> = Rc::from(source);
    let message: MessageThunk = {
        let printable = printable.clone();
        Rc::new(move || format!("/{}/", printable))
    };
    let exec_message = message.clone();
    Ok(Parser::build("pattern", message, move |state, k| {
        match regex.find(state.remaining()) {
            Some(found) => {
                let text: Rc<str> = Rc::from(found.as_str());
                k.accept(MatchResult::Success(Success {
                    state: state.advance(found.end()),
                    value: Value::Str(text),
                    commit: false,
                }));
            }
            None => k.accept(MatchResult::Failure(Failure::at(state, exec_message.clone()))),
        }
    }))
}

/// Wrap user code as a parser. The function is handed the input state and
/// returns a full match result; the usual contract applies (advance on
/// success, fail at the input state).
pub fn match_fn(
    name: impl Into<String>,
    f: impl Fn(&ParserState) -> MatchResult + 'static,
) -> Parser {
    let name: Rc<str> = Rc::from(name.into());
    let message: MessageThunk = Rc::new(move || name.to_string());
    Parser::build("function", message, move |state, k| {
        k.accept(f(state));
    })
}

/// Always succeed with `value`, consuming nothing.
pub fn succeed_with(value: Value) -> Parser {
    Parser::build(
        "succeed",
        Rc::new(|| "anything".to_string()),
        move |state, k| {
            k.accept(MatchResult::success(state.clone(), value.clone()));
        },
    )
}

/// Always fail with `message`.
pub fn fail_with(message: impl Into<String>) -> Parser {
    let text: Rc<str> = Rc::from(message.into());
    let thunk: MessageThunk = Rc::new(move || text.to_string());
    let exec_thunk = thunk.clone();
    Parser::build("fail", thunk, move |state, k| {
        k.accept(MatchResult::Failure(Failure::at(state, exec_thunk.clone())));
    })
}

/// Succeed (with a null value) only when the matching bound is reached.
pub fn end_of_input() -> Parser {
    let message: MessageThunk = Rc::new(|| "end of input".to_string());
    let exec_message = message.clone();
    Parser::build("end", message, move |state, k| {
        if state.at_end() {
            k.accept(MatchResult::success(state.clone(), Value::Null));
        } else {
            k.accept(MatchResult::Failure(Failure::at(state, exec_message.clone())));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run::run;

    #[test]
    fn test_literal_matches_prefix() {
        let results = run(&literal("foo"), "foobar").unwrap();
        assert_eq!(results.values(), vec![Value::from("foo")]);
    }

    #[test]
    fn test_literal_fails_elsewhere() {
        let results = run(&literal("foo"), "barfoo").unwrap();
        assert!(results.is_empty());
        let diagnostic = results.furthest_failure().unwrap();
        assert_eq!(diagnostic.pos, 0);
        assert_eq!(diagnostic.message, "'foo'");
    }

    #[test]
    fn test_pattern_takes_longest_match() {
        let digits = pattern(r"\d+").unwrap();
        let results = run(&digits, "12345x").unwrap();
        assert_eq!(results.values(), vec![Value::from("12345")]);
    }

    #[test]
    fn test_pattern_is_anchored() {
        let digits = pattern(r"\d+").unwrap();
        let results = run(&digits, "x12345").unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_pattern_rejects_bad_regex() {
        match pattern("(") {
            Err(EngineError::InvalidPattern(_)) => {}
            other => panic!("expected InvalidPattern, got {:?}", other.map(|p| p.kind())),
        }
    }

    #[test]
    fn test_match_fn_contract() {
        let two = match_fn("two of anything", |state| {
            if state.remaining().len() >= 2 {
                let text = state.remaining()[..2].to_string();
                MatchResult::success(state.advance(2), Value::from(text))
            } else {
                MatchResult::Failure(Failure::at(
                    state,
                    Rc::new(|| "two of anything".to_string()),
                ))
            }
        });
        assert_eq!(run(&two, "abc").unwrap().values(), vec![Value::from("ab")]);
        assert!(run(&two, "a").unwrap().is_empty());
    }

    #[test]
    fn test_end_of_input() {
        assert!(run(&end_of_input(), "").unwrap().is_settled());
        assert!(run(&end_of_input(), "x").unwrap().is_empty());
    }

    #[test]
    fn test_pattern_respects_end_pos() {
        use crate::engine::scheduler::Scheduler;
        use std::cell::RefCell;

        let state = ParserState::root(Rc::from("12345"), Scheduler::new(None, None), None)
            .with_end_pos(3);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let k = Continuation::new(move |result| {
            if let MatchResult::Success(s) = result {
                sink.borrow_mut().push(s.value);
            }
        });
        pattern(r"\d+").unwrap().parse(&state, &k);
        assert_eq!(*seen.borrow(), vec![Value::from("123")]);
    }
}
