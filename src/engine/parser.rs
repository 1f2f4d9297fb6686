//! The opaque parser unit and the references combinators hold on each
//! other.
//!
//! A `Parser` is a shared value: cloning is cheap, and one parser may appear
//! in many compositions (and in cyclic grammars). Sub-parsers are held as
//! [`ParserRef`]s, which are either direct or deferred; deferred references
//! resolve on first *invocation*, never at composition time, so mutually
//! recursive grammars can be assembled in any order. [`ParserSlot`] is the
//! forward declaration used to tie such cycles.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::unsync::OnceCell;

use super::error::EngineError;
use super::result::{Continuation, Failure, MatchResult, MessageThunk, Success};
use super::state::ParserState;
use super::value::Value;

static NEXT_PARSER_ID: AtomicU64 = AtomicU64::new(1);

struct ParserInner {
    id: u64,
    kind: &'static str,
    message: MessageThunk,
    cacheable: bool,
    exec: Box<dyn Fn(&ParserState, &Continuation)>,
}

/// A composable parser. Given a state and a continuation, eventually
/// delivers zero or more match results to that continuation.
#[derive(Clone)]
pub struct Parser {
    inner: Rc<ParserInner>,
}

impl Parser {
    pub(crate) fn build(
        kind: &'static str,
        message: MessageThunk,
        exec: impl Fn(&ParserState, &Continuation) + 'static,
    ) -> Parser {
        Parser::new_inner(kind, message, false, exec)
    }

    pub(crate) fn build_cacheable(
        kind: &'static str,
        message: MessageThunk,
        exec: impl Fn(&ParserState, &Continuation) + 'static,
    ) -> Parser {
        Parser::new_inner(kind, message, true, exec)
    }

    fn new_inner(
        kind: &'static str,
        message: MessageThunk,
        cacheable: bool,
        exec: impl Fn(&ParserState, &Continuation) + 'static,
    ) -> Parser {
        Parser {
            inner: Rc::new(ParserInner {
                id: NEXT_PARSER_ID.fetch_add(1, Ordering::Relaxed),
                kind,
                message,
                cacheable,
                exec: Box::new(exec),
            }),
        }
    }

    /// Stable identity for memoization and debugging.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    pub(crate) fn message_thunk(&self) -> MessageThunk {
        self.inner.message.clone()
    }

    /// Render this parser's self-description.
    ///
    /// Descriptions of composites are built from their children, so a
    /// cyclic grammar would recurse forever; a thread-local guard breaks
    /// the cycle by rendering a revisited parser as `...`.
    pub fn describe(&self) -> String {
        thread_local! {
            static RENDERING: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
        }
        let id = self.inner.id;
        let entered = RENDERING.with(|guard| guard.borrow_mut().insert(id));
        if !entered {
            return "...".to_string();
        }
        let text = (self.inner.message.as_ref())();
        RENDERING.with(|guard| {
            guard.borrow_mut().remove(&id);
        });
        text
    }

    /// Invoke the parser. The continuation may be called zero, one, or many
    /// times over the course of the run.
    pub fn parse(&self, state: &ParserState, k: &Continuation) {
        let state = state.deeper();
        let kind = self.inner.kind;
        let pos = state.pos();
        state.trace(|| format!("{} @ {}", kind, pos));
        if self.inner.cacheable {
            state.scheduler().clone().parse_memoized(self, &state, k);
        } else {
            (self.inner.exec)(&state, k);
        }
    }

    /// Run the execute closure directly, bypassing the memo table. Used by
    /// the scheduler when it already holds the entry for this invocation.
    pub(crate) fn execute(&self, state: &ParserState, k: &Continuation) {
        (self.inner.exec)(state, k);
    }

    /// Derive a parser that applies `f` to every success value.
    pub fn on_match(&self, f: impl Fn(Value) -> Value + 'static) -> Parser {
        let src = self.clone();
        let f: Rc<dyn Fn(Value) -> Value> = Rc::new(f);
        Parser::build("map", self.message_thunk(), move |state, k| {
            let f = f.clone();
            let k = k.clone();
            src.parse(
                state,
                &Continuation::new(move |result| match result {
                    MatchResult::Success(s) => {
                        let Success { state, value, commit } = s;
                        k.accept(MatchResult::Success(Success {
                            state,
                            value: (f.as_ref())(value),
                            commit,
                        }));
                    }
                    failure => k.accept(failure),
                }),
            );
        })
    }

    /// Derive a parser whose mapper may reject the value; a rejection
    /// becomes a failure at the state this parser was invoked at.
    pub fn try_on_match(&self, f: impl Fn(Value) -> Result<Value, String> + 'static) -> Parser {
        let src = self.clone();
        let f: Rc<dyn Fn(Value) -> Result<Value, String>> = Rc::new(f);
        Parser::build("map", self.message_thunk(), move |state, k| {
            let origin = state.clone();
            let f = f.clone();
            let k = k.clone();
            src.parse(
                state,
                &Continuation::new(move |result| match result {
                    MatchResult::Success(s) => {
                        let Success { state, value, commit } = s;
                        match (f.as_ref())(value) {
                            Ok(mapped) => k.accept(MatchResult::Success(Success {
                                state,
                                value: mapped,
                                commit,
                            })),
                            Err(message) => {
                                let text: Rc<str> = Rc::from(message);
                                let thunk: MessageThunk = Rc::new(move || text.to_string());
                                k.accept(MatchResult::Failure(
                                    Failure::at(&origin, thunk).with_commit(commit),
                                ));
                            }
                        }
                    }
                    failure => k.accept(failure),
                }),
            );
        })
    }

    /// Derive a parser that replaces the failure message.
    pub fn on_fail(&self, message: impl Into<String>) -> Parser {
        let text: Rc<str> = Rc::from(message.into());
        let thunk: MessageThunk = {
            let text = text.clone();
            Rc::new(move || text.to_string())
        };
        let src = self.clone();
        let exec_thunk = thunk.clone();
        Parser::build("on_fail", thunk, move |state, k| {
            let k = k.clone();
            let thunk = exec_thunk.clone();
            src.parse(
                state,
                &Continuation::new(move |result| match result {
                    MatchResult::Failure(mut f) => {
                        f.message = thunk.clone();
                        k.accept(MatchResult::Failure(f));
                    }
                    success => k.accept(success),
                }),
            );
        })
    }

    /// Derive a parser that fails when the predicate rejects the value.
    pub fn match_if(&self, predicate: impl Fn(&Value) -> bool + 'static) -> Parser {
        let src = self.clone();
        let predicate: Rc<dyn Fn(&Value) -> bool> = Rc::new(predicate);
        let message = self.message_thunk();
        let exec_message = message.clone();
        Parser::build("filter", message, move |state, k| {
            let origin = state.clone();
            let predicate = predicate.clone();
            let message = exec_message.clone();
            let k = k.clone();
            src.parse(
                state,
                &Continuation::new(move |result| match result {
                    MatchResult::Success(s) => {
                        if (predicate.as_ref())(&s.value) {
                            k.accept(MatchResult::Success(s));
                        } else {
                            k.accept(MatchResult::Failure(
                                Failure::at(&origin, message.clone()).with_commit(s.commit),
                            ));
                        }
                    }
                    failure => k.accept(failure),
                }),
            );
        })
    }

    /// Shorthand for mapping every value to the discard marker.
    pub fn discard(&self) -> Parser {
        self.on_match(|_| Value::Null)
    }

    /// Give the parser a fixed self-description. Naming a rule also stops
    /// description rendering from descending into it.
    pub fn named(&self, name: impl Into<String>) -> Parser {
        let name: Rc<str> = Rc::from(name.into());
        let thunk: MessageThunk = Rc::new(move || name.to_string());
        let src = self.clone();
        Parser::build("named", thunk, move |state, k| src.parse(state, k))
    }

    /// Mark the parser cacheable: within one run, results at a given
    /// position are computed once and replayed to later subscribers.
    pub fn memoize(&self) -> Parser {
        let src = self.clone();
        Parser::build_cacheable("memo", self.message_thunk(), move |state, k| {
            src.parse(state, k)
        })
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

/// A deferred parser reference, resolved once on first use.
pub struct DeferredParser {
    resolve_fn: Box<dyn Fn() -> Parser>,
    cell: OnceCell<Parser>,
}

/// What combinators hold: either a parser, or a recipe for one.
#[derive(Clone)]
pub enum ParserRef {
    Direct(Parser),
    Deferred(Rc<DeferredParser>),
}

impl ParserRef {
    /// Defer resolution until the reference is first invoked.
    pub fn deferred(f: impl Fn() -> Parser + 'static) -> ParserRef {
        ParserRef::Deferred(Rc::new(DeferredParser {
            resolve_fn: Box::new(f),
            cell: OnceCell::new(),
        }))
    }

    /// The referenced parser; deferred references run their recipe on the
    /// first call and memoize the outcome.
    pub fn resolve(&self) -> Parser {
        match self {
            ParserRef::Direct(parser) => parser.clone(),
            ParserRef::Deferred(deferred) => deferred
                .cell
                .get_or_init(|| (deferred.resolve_fn.as_ref())())
                .clone(),
        }
    }

    /// Self-description without forcing resolution.
    pub fn describe(&self) -> String {
        match self {
            ParserRef::Direct(parser) => parser.describe(),
            ParserRef::Deferred(deferred) => match deferred.cell.get() {
                Some(parser) => parser.describe(),
                None => "<deferred>".to_string(),
            },
        }
    }
}

impl From<Parser> for ParserRef {
    fn from(parser: Parser) -> ParserRef {
        ParserRef::Direct(parser)
    }
}

impl From<&Parser> for ParserRef {
    fn from(parser: &Parser) -> ParserRef {
        ParserRef::Direct(parser.clone())
    }
}

impl From<&str> for ParserRef {
    fn from(text: &str) -> ParserRef {
        ParserRef::Direct(super::primitives::literal(text))
    }
}

/// A forward-declared grammar rule: referenced now, bound once later.
pub struct ParserSlot {
    name: Rc<str>,
    cell: Rc<OnceCell<Parser>>,
}

impl ParserSlot {
    pub fn new(name: impl Into<String>) -> ParserSlot {
        ParserSlot {
            name: Rc::from(name.into()),
            cell: Rc::new(OnceCell::new()),
        }
    }

    /// Bind the slot to its parser. Binding twice is an error.
    pub fn define(&self, parser: Parser) -> Result<(), EngineError> {
        self.cell
            .set(parser)
            .map_err(|_| EngineError::SlotAlreadyBound(self.name.to_string()))
    }

    /// A reference that reads the binding at invocation time. Invoking a
    /// slot that was never bound ends the run with
    /// [`EngineError::SlotNotBound`].
    pub fn parser_ref(&self) -> ParserRef {
        let name = self.name.clone();
        let cell = self.cell.clone();
        ParserRef::deferred(move || match cell.get() {
            Some(parser) => parser.clone(),
            None => unbound_slot(name.clone()),
        })
    }
}

/// Stand-in for a slot that was invoked before being bound: latches the
/// fatal error on the run's scheduler and delivers nothing.
fn unbound_slot(name: Rc<str>) -> Parser {
    let message: MessageThunk = {
        let name = name.clone();
        Rc::new(move || name.to_string())
    };
    Parser::build("slot", message, move |state, _k| {
        state
            .scheduler()
            .set_fatal(EngineError::SlotNotBound(name.to_string()));
    })
}

impl From<&ParserSlot> for ParserRef {
    fn from(slot: &ParserSlot) -> ParserRef {
        slot.parser_ref()
    }
}
