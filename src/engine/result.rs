//! The sum type every parser invocation delivers, and the continuation that
//! receives it.
//!
//! A parser reports to its continuation zero, one or many times per
//! invocation: ambiguous grammars deliver several successes, alternations
//! deliver each branch outcome. Failure messages are thunks so that
//! self-referential grammars can describe themselves without recursing
//! forever at construction time.

use std::fmt;
use std::rc::Rc;

use super::state::ParserState;
use super::value::Value;

/// Lazily rendered self-description of a parser.
pub type MessageThunk = Rc<dyn Fn() -> String>;

/// A successful match.
///
/// `state` is the state *after* the match; `commit` is the sticky cut flag:
/// once a constituent of a chain succeeds committed, the composite result
/// stays committed.
#[derive(Clone)]
pub struct Success {
    pub state: ParserState,
    pub value: Value,
    pub commit: bool,
}

/// A failed match.
///
/// `state` is the state *at which* the failure was detected. `abort` tells
/// enclosing alternations to stop trying further branches.
#[derive(Clone)]
pub struct Failure {
    pub state: ParserState,
    pub message: MessageThunk,
    pub commit: bool,
    pub abort: bool,
}

impl Failure {
    /// Build a failure at `state`, reporting it to the run's
    /// furthest-failure tracker.
    pub fn at(state: &ParserState, message: MessageThunk) -> Failure {
        state.scheduler().note_failure(state.pos(), message.clone());
        Failure {
            state: state.clone(),
            message,
            commit: false,
            abort: false,
        }
    }

    pub fn with_commit(mut self, commit: bool) -> Failure {
        self.commit = commit;
        self
    }

    pub fn with_abort(mut self, abort: bool) -> Failure {
        self.abort = abort;
        self
    }

    /// Render the failure message now.
    pub fn render_message(&self) -> String {
        (self.message.as_ref())()
    }
}

/// Outcome of one parser delivery.
#[derive(Clone)]
pub enum MatchResult {
    Success(Success),
    Failure(Failure),
}

impl MatchResult {
    pub fn success(state: ParserState, value: Value) -> MatchResult {
        MatchResult::Success(Success {
            state,
            value,
            commit: false,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MatchResult::Success(_))
    }
}

impl PartialEq for Success {
    fn eq(&self, other: &Success) -> bool {
        self.state == other.state && self.commit == other.commit && self.value == other.value
    }
}

// Message thunks are excluded from failure identity: two failures at the
// same state with the same flags are the same outcome for memoization.
impl PartialEq for Failure {
    fn eq(&self, other: &Failure) -> bool {
        self.state == other.state && self.commit == other.commit && self.abort == other.abort
    }
}

impl PartialEq for MatchResult {
    fn eq(&self, other: &MatchResult) -> bool {
        match (self, other) {
            (MatchResult::Success(a), MatchResult::Success(b)) => a == b,
            (MatchResult::Failure(a), MatchResult::Failure(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Success {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Success")
            .field("pos", &self.state.pos())
            .field("value", &self.value)
            .field("commit", &self.commit)
            .finish()
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("pos", &self.state.pos())
            .field("message", &self.render_message())
            .field("commit", &self.commit)
            .field("abort", &self.abort)
            .finish()
    }
}

impl fmt::Debug for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchResult::Success(s) => s.fmt(f),
            MatchResult::Failure(e) => e.fmt(f),
        }
    }
}

/// The callback a parser invokes once per result it produces.
#[derive(Clone)]
pub struct Continuation(Rc<dyn Fn(MatchResult)>);

impl Continuation {
    pub fn new(f: impl Fn(MatchResult) + 'static) -> Continuation {
        Continuation(Rc::new(f))
    }

    pub fn accept(&self, result: MatchResult) {
        (self.0.as_ref())(result);
    }
}
