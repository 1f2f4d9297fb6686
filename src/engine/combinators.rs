//! The combinator algebra.
//!
//! Everything here composes [`Parser`]s out of smaller ones. Sub-parsers
//! are taken as `impl Into<ParserRef>` and resolved inside the execute
//! closures, at invocation time, so recursive grammars compose freely.
//!
//! Alternation and repetition never recurse on the call stack: each branch
//! and each iteration goes through the run's job queue. Both enumerate.
//! `alt` delivers every successful branch, `repeat` delivers every
//! accepting count, and the cut machinery (`commit` / abort) is the one
//! way to prune that enumeration.

use std::cell::Cell;
use std::rc::Rc;

use super::error::EngineError;
use super::parser::{Parser, ParserRef};
use super::primitives::succeed_with;
use super::result::{Continuation, Failure, MatchResult, MessageThunk, Success};
use super::state::ParserState;
use super::value::Value;

/// Open upper bound for the repeat family.
pub const UNBOUNDED: usize = usize::MAX;

/// Match `p` or succeed with `""` at the input state.
pub fn optional(p: impl Into<ParserRef>) -> Parser {
    optional_or(p, Value::from(""))
}

/// Match `p` or succeed with `default` at the input state. An aborted
/// failure is not recovered: a cut inside `p` passes through.
pub fn optional_or(p: impl Into<ParserRef>, default: Value) -> Parser {
    let p = p.into();
    let message: MessageThunk = {
        let p = p.clone();
        Rc::new(move || format!("optional {}", p.describe()))
    };
    Parser::build("optional", message, move |state, k| {
        let origin = state.clone();
        let default = default.clone();
        let k = k.clone();
        p.resolve().parse(
            state,
            &Continuation::new(move |result| match result {
                MatchResult::Success(s) => k.accept(MatchResult::Success(s)),
                MatchResult::Failure(f) => {
                    if f.abort {
                        k.accept(MatchResult::Failure(f));
                    } else {
                        k.accept(MatchResult::Success(Success {
                            state: origin.clone(),
                            value: default.clone(),
                            commit: f.commit,
                        }));
                    }
                }
            }),
        );
    })
}

/// Zero-width lookahead: succeed with `p`'s value but at the input state.
pub fn check(p: impl Into<ParserRef>) -> Parser {
    let p = p.into();
    let message: MessageThunk = {
        let p = p.clone();
        Rc::new(move || p.describe())
    };
    Parser::build("check", message, move |state, k| {
        let origin = state.clone();
        let k = k.clone();
        p.resolve().parse(
            state,
            &Continuation::new(move |result| match result {
                MatchResult::Success(s) => k.accept(MatchResult::Success(Success {
                    state: origin.clone(),
                    value: s.value,
                    commit: s.commit,
                })),
                failure => k.accept(failure),
            }),
        );
    })
}

/// Cut: on success, mark the result committed. Enclosing chains convert a
/// later failure into an abort, and aborts stop alternation.
pub fn commit(p: impl Into<ParserRef>) -> Parser {
    let p = p.into();
    let message: MessageThunk = {
        let p = p.clone();
        Rc::new(move || p.describe())
    };
    Parser::build("commit", message, move |state, k| {
        let k = k.clone();
        p.resolve().parse(
            state,
            &Continuation::new(move |result| match result {
                MatchResult::Success(mut s) => {
                    s.commit = true;
                    k.accept(MatchResult::Success(s));
                }
                failure => k.accept(failure),
            }),
        );
    })
}

/// Negative lookahead: succeed with `""` at the input state when `p`
/// fails, fail when it matches.
pub fn not(p: impl Into<ParserRef>) -> Parser {
    let p = p.into();
    let message: MessageThunk = {
        let p = p.clone();
        Rc::new(move || format!("not {}", p.describe()))
    };
    let exec_message = message.clone();
    Parser::build("not", message, move |state, k| {
        let origin = state.clone();
        let message = exec_message.clone();
        let k = k.clone();
        p.resolve().parse(
            state,
            &Continuation::new(move |result| match result {
                MatchResult::Success(s) => k.accept(MatchResult::Failure(
                    Failure::at(&origin, message.clone()).with_commit(s.commit),
                )),
                MatchResult::Failure(f) => k.accept(MatchResult::Success(Success {
                    state: origin.clone(),
                    value: Value::from(""),
                    commit: f.commit,
                })),
            }),
        );
    })
}

/// Free-function form of [`Parser::discard`]: match `p`, produce the
/// discard marker. Sequences elide the marker from their output lists.
pub fn discard(p: impl Into<ParserRef>) -> Parser {
    let p = p.into();
    let message: MessageThunk = {
        let p = p.clone();
        Rc::new(move || p.describe())
    };
    Parser::build("discard", message, move |state, k| {
        let k = k.clone();
        p.resolve().parse(
            state,
            &Continuation::new(move |result| match result {
                MatchResult::Success(s) => k.accept(MatchResult::Success(Success {
                    state: s.state,
                    value: Value::Null,
                    commit: s.commit,
                })),
                failure => k.accept(failure),
            }),
        );
    })
}

/// Match `a` then `b`, combining the two values. Commit is sticky: the
/// composite success is committed if either side was, and a failure of `b`
/// after a committed `a` is re-raised as an abort.
pub fn chain(
    a: impl Into<ParserRef>,
    b: impl Into<ParserRef>,
    combiner: impl Fn(Value, Value) -> Value + 'static,
) -> Parser {
    let a = a.into();
    let b = b.into();
    let combiner: Rc<dyn Fn(Value, Value) -> Value> = Rc::new(combiner);
    let message: MessageThunk = {
        let a = a.clone();
        let b = b.clone();
        Rc::new(move || format!("{} then {}", a.describe(), b.describe()))
    };
    Parser::build("chain", message, move |state, k| {
        let b = b.clone();
        let combiner = combiner.clone();
        let k = k.clone();
        a.resolve().parse(
            state,
            &Continuation::new(move |result| match result {
                MatchResult::Failure(f) => k.accept(MatchResult::Failure(f)),
                MatchResult::Success(first) => {
                    let committed = first.commit;
                    let first_value = first.value;
                    let combiner = combiner.clone();
                    let k = k.clone();
                    b.resolve().parse(
                        &first.state,
                        &Continuation::new(move |second| match second {
                            MatchResult::Failure(mut f) => {
                                if committed {
                                    f.abort = true;
                                    f.commit = true;
                                }
                                k.accept(MatchResult::Failure(f));
                            }
                            MatchResult::Success(s) => {
                                let value =
                                    (combiner.as_ref())(first_value.clone(), s.value);
                                k.accept(MatchResult::Success(Success {
                                    state: s.state,
                                    value,
                                    commit: committed || s.commit,
                                }));
                            }
                        }),
                    );
                }
            }),
        );
    })
}

/// Match every parser in order, collecting the non-null values into a
/// list. A one-element sequence is equivalent to that parser; an empty one
/// succeeds with the empty list.
pub fn seq(parsers: impl IntoIterator<Item = ParserRef>) -> Parser {
    let items: Vec<ParserRef> = parsers.into_iter().collect();
    if items.is_empty() {
        return succeed_with(Value::List(Vec::new()));
    }
    let message: MessageThunk = {
        let items = items.clone();
        Rc::new(move || {
            items
                .iter()
                .map(|item| item.describe())
                .collect::<Vec<_>>()
                .join(" ")
        })
    };
    if items.len() == 1 {
        let only = items.into_iter().next().unwrap_or_else(|| unreachable!());
        return Parser::build("seq", message, move |state, k| {
            only.resolve().parse(state, k);
        });
    }
    let mut iter = items.into_iter();
    let first = iter.next().unwrap_or_else(|| unreachable!());
    let head = Parser::build("seq-head", message.clone(), move |state, k| {
        let k = k.clone();
        first.resolve().parse(
            state,
            &Continuation::new(move |result| match result {
                MatchResult::Success(s) => {
                    let Success { state, value, commit } = s;
                    let list = if value.is_null() { Vec::new() } else { vec![value] };
                    k.accept(MatchResult::Success(Success {
                        state,
                        value: Value::List(list),
                        commit,
                    }));
                }
                failure => k.accept(failure),
            }),
        );
    });
    let mut acc = head;
    for item in iter {
        acc = chain(acc, item, |list, value| match list {
            Value::List(mut items) => {
                if !value.is_null() {
                    items.push(value);
                }
                Value::List(items)
            }
            other => other,
        });
    }
    Parser::build("seq", message, move |state, k| acc.parse(state, k))
}

/// `seq` with an ignorable parser (typically whitespace) tried before each
/// element and dropped.
pub fn seq_ignore(
    ignore: impl Into<ParserRef>,
    parsers: impl IntoIterator<Item = ParserRef>,
) -> Parser {
    let skip = optional(ignore).discard();
    let mut interleaved = Vec::new();
    for item in parsers {
        interleaved.push(ParserRef::from(skip.clone()));
        interleaved.push(item);
    }
    seq(interleaved)
}

/// Try every alternative from the same starting state, one scheduler job
/// per branch in source order, and forward every result. An aborting
/// failure stops the branches that have not started yet.
pub fn alt(parsers: impl IntoIterator<Item = ParserRef>) -> Parser {
    let items: Vec<ParserRef> = parsers.into_iter().collect();
    let message: MessageThunk = {
        let items = items.clone();
        Rc::new(move || {
            items
                .iter()
                .map(|item| item.describe())
                .collect::<Vec<_>>()
                .join(" or ")
        })
    };
    let exec_message = message.clone();
    Parser::build("alt", message, move |state, k| {
        if items.is_empty() {
            k.accept(MatchResult::Failure(Failure::at(state, exec_message.clone())));
            return;
        }
        let aborting = Rc::new(Cell::new(false));
        for (index, item) in items.iter().enumerate() {
            let item = item.clone();
            let label_item = item.clone();
            let aborting = aborting.clone();
            let branch_state = state.clone();
            let k = k.clone();
            state.scheduler().add_job(
                move || format!("alt[{}]: {}", index, label_item.describe()),
                move || {
                    if aborting.get() {
                        return;
                    }
                    let k = k.clone();
                    let aborting = aborting.clone();
                    item.resolve().parse(
                        &branch_state,
                        &Continuation::new(move |result| {
                            if let MatchResult::Failure(f) = &result {
                                if f.abort {
                                    aborting.set(true);
                                }
                            }
                            k.accept(result);
                        }),
                    );
                },
            );
        }
    })
}

struct RepeatRun {
    parser: ParserRef,
    min: usize,
    max: usize,
    origin: ParserState,
    message: MessageThunk,
    k: Continuation,
}

impl RepeatRun {
    /// Enter the iteration at `count` matches: report the accepting prefix,
    /// then schedule one more attempt while under the bound. Scheduling per
    /// iteration keeps the call stack flat on long inputs.
    fn advance(run: &Rc<RepeatRun>, state: ParserState, count: usize, items: Vec<Value>, committed: bool) {
        if count >= run.min {
            run.k.accept(MatchResult::Success(Success {
                state: state.clone(),
                value: Value::List(items.clone()),
                commit: committed,
            }));
        }
        if count >= run.max {
            return;
        }
        let rc = run.clone();
        let label_rc = run.clone();
        let job_state = state.clone();
        run.origin.scheduler().add_job(
            move || format!("repeat[{}]: {}", count, (label_rc.message.as_ref())()),
            move || {
                let before_pos = job_state.pos();
                let run = rc.clone();
                rc.parser.resolve().parse(
                    &job_state,
                    &Continuation::new(move |result| match result {
                        MatchResult::Success(s) => {
                            if s.state.pos() == before_pos {
                                // Zero-width repetition would loop forever;
                                // this is a grammar bug, surfaced fatally.
                                run.origin
                                    .scheduler()
                                    .set_fatal(EngineError::ZeroWidthRepeat { pos: before_pos });
                                return;
                            }
                            let mut next_items = items.clone();
                            if !s.value.is_null() {
                                next_items.push(s.value.clone());
                            }
                            RepeatRun::advance(
                                &run,
                                s.state.clone(),
                                count + 1,
                                next_items,
                                committed || s.commit,
                            );
                        }
                        MatchResult::Failure(f) => {
                            if count < run.min {
                                run.k.accept(MatchResult::Failure(
                                    Failure::at(&run.origin, run.message.clone())
                                        .with_commit(f.commit)
                                        .with_abort(f.abort),
                                ));
                            } else if f.abort {
                                // A cut inside the repeated parser still
                                // has to reach the enclosing alternation.
                                run.k.accept(MatchResult::Failure(f));
                            }
                        }
                    }),
                );
            },
        );
    }
}

/// Match `p` between `min` and `max` times, delivering one success per
/// accepting count in ascending order. A match that consumes nothing is a
/// fatal grammar error.
pub fn repeat(p: impl Into<ParserRef>, min: usize, max: usize) -> Parser {
    let p = p.into();
    let message: MessageThunk = {
        let p = p.clone();
        Rc::new(move || {
            if max == UNBOUNDED {
                format!("{}{{{},}}", p.describe(), min)
            } else {
                format!("{}{{{},{}}}", p.describe(), min, max)
            }
        })
    };
    let exec_message = message.clone();
    Parser::build("repeat", message, move |state, k| {
        let run = Rc::new(RepeatRun {
            parser: p.clone(),
            min,
            max,
            origin: state.clone(),
            message: exec_message.clone(),
            k: k.clone(),
        });
        RepeatRun::advance(&run, state.clone(), 0, Vec::new(), false);
    })
}

/// Zero or more.
pub fn many(p: impl Into<ParserRef>) -> Parser {
    repeat(p, 0, UNBOUNDED)
}

/// One or more.
pub fn many1(p: impl Into<ParserRef>) -> Parser {
    repeat(p, 1, UNBOUNDED)
}

/// `repeat` with an ignorable parser tried before each element and
/// dropped.
pub fn repeat_ignore(
    ignore: impl Into<ParserRef>,
    p: impl Into<ParserRef>,
    min: usize,
    max: usize,
) -> Parser {
    let element = seq([ParserRef::from(optional(ignore).discard()), p.into()]).on_match(|value| {
        match value {
            Value::List(items) => items.into_iter().next().unwrap_or(Value::Null),
            other => other,
        }
    });
    repeat(element, min, max)
}

/// Match `p (separator p)*` within the count bounds, discarding the
/// separator values. The result is the list of `p` values in order.
pub fn repeat_separated(
    p: impl Into<ParserRef>,
    separator: impl Into<ParserRef>,
    min: usize,
    max: usize,
) -> Parser {
    let p = p.into();
    let separator = separator.into();
    if max == 0 {
        return succeed_with(Value::List(Vec::new()));
    }
    if min == 0 {
        return optional_or(
            repeat_separated(p, separator, 1, max),
            Value::List(Vec::new()),
        );
    }
    let rest_max = if max == UNBOUNDED { UNBOUNDED } else { max - 1 };
    let tail = seq([ParserRef::from(discard(separator)), p.clone()]).on_match(|value| {
        match value {
            Value::List(items) => items.into_iter().next().unwrap_or(Value::Null),
            other => other,
        }
    });
    chain(p, repeat(tail, min - 1, rest_max), |first, rest| {
        let mut out = vec![first];
        if let Value::List(mut items) = rest {
            out.append(&mut items);
        }
        Value::List(out)
    })
}

/// Like [`repeat_separated`], but the separator values are kept and folded
/// through a user reducer: `sum = reducer(sum, separator, element)` with
/// `sum` seeded by `accumulator(first)`.
pub fn reduce_with(
    p: impl Into<ParserRef>,
    separator: impl Into<ParserRef>,
    accumulator: impl Fn(Value) -> Value + 'static,
    reducer: impl Fn(Value, Value, Value) -> Value + 'static,
    min: usize,
    max: usize,
) -> Parser {
    let p = p.into();
    let separator = separator.into();
    let accumulator: Rc<dyn Fn(Value) -> Value> = Rc::new(accumulator);
    let reducer: Rc<dyn Fn(Value, Value, Value) -> Value> = Rc::new(reducer);
    let min = min.max(1);
    let rest_max = if max == UNBOUNDED { UNBOUNDED } else { max.saturating_sub(1) };
    let pair = seq([separator, p.clone()]);
    chain(
        p,
        repeat(pair, min - 1, rest_max),
        move |first, rest| {
            let mut sum = (accumulator.as_ref())(first);
            if let Value::List(pairs) = rest {
                for pair in pairs {
                    let (sep_value, element) = match pair {
                        Value::List(mut parts) if parts.len() >= 2 => {
                            let element = parts.pop().unwrap_or(Value::Null);
                            let sep_value = parts.pop().unwrap_or(Value::Null);
                            (sep_value, element)
                        }
                        Value::List(mut parts) => (Value::Null, parts.pop().unwrap_or(Value::Null)),
                        other => (Value::Null, other),
                    };
                    sum = (reducer.as_ref())(sum, sep_value, element);
                }
            }
            sum
        },
    )
}

/// [`reduce_with`] using the default list accumulator: the result is the
/// list of `p` values, separators dropped after the fold.
pub fn reduce(
    p: impl Into<ParserRef>,
    separator: impl Into<ParserRef>,
    min: usize,
    max: usize,
) -> Parser {
    reduce_with(
        p,
        separator,
        |first| Value::List(vec![first]),
        |sum, _separator, element| match sum {
            Value::List(mut items) => {
                items.push(element);
                Value::List(items)
            }
            other => other,
        },
        min,
        max,
    )
}
