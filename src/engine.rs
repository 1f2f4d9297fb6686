//! The evaluation engine: states, results, parsers, combinators, the
//! scheduler and the result set.
//!
//! Execution is continuation-passing over a cooperative job queue. A parser
//! delivers each of its results to a continuation; alternation and
//! repetition enqueue jobs instead of recursing, which lets one invocation
//! deliver many results (ambiguity) without unbounded stacks.

pub mod combinators;
pub mod error;
pub mod parser;
pub mod primitives;
pub mod result;
pub mod results;
pub mod run;
pub mod scheduler;
pub mod state;
pub mod value;

pub use combinators::{
    alt, chain, check, commit, discard, many, many1, not, optional, optional_or, reduce,
    reduce_with, repeat, repeat_ignore, repeat_separated, seq, seq_ignore, UNBOUNDED,
};
pub use error::EngineError;
pub use parser::{Parser, ParserRef, ParserSlot};
pub use primitives::{end_of_input, fail_with, literal, match_fn, pattern, succeed_with};
pub use result::{Continuation, Failure, MatchResult, MessageThunk, Success};
pub use results::{FailureDiagnostic, ResultSet};
pub use run::{run, run_with_config, run_with_listener, RunConfig};
pub use scheduler::Scheduler;
pub use state::{DebugSink, ParserState};
pub use value::{CustomValue, Value};
