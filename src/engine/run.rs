//! Running a parser against an input.
//!
//! A run wires the pieces together: a fresh scheduler, a root state over
//! the input, and a result set that receives every distinct top-level
//! success as the queue drains. Grammar errors, exhausted job budgets and
//! unhandled listener errors come back as `Err`; a plain parse failure is
//! an empty set carrying the furthest-failure diagnostic.

use std::rc::Rc;

use super::error::EngineError;
use super::parser::Parser;
use super::result::{Continuation, MatchResult};
use super::results::{FailureDiagnostic, ResultSet};
use super::scheduler::Scheduler;
use super::state::{DebugSink, ParserState};
use super::value::Value;

/// Knobs for one run.
#[derive(Clone, Default)]
pub struct RunConfig {
    /// Sink for diagnostic trace lines.
    pub debug: Option<DebugSink>,
    /// Upper bound on executed scheduler jobs.
    pub job_limit: Option<usize>,
}

/// Parse `input` with `parser`, collecting every distinct successful
/// top-level parse.
pub fn run(parser: &Parser, input: &str) -> Result<ResultSet, EngineError> {
    run_with_config(parser, input, RunConfig::default())
}

/// Like [`run`], with a listener attached before the first job executes, so
/// successes are observed as they are found.
pub fn run_with_listener(
    parser: &Parser,
    input: &str,
    listener: impl FnMut(&Value) + 'static,
) -> Result<ResultSet, EngineError> {
    execute(parser, input, RunConfig::default(), move |results| {
        results.then(listener)
    })
}

/// Like [`run`], with explicit configuration.
pub fn run_with_config(
    parser: &Parser,
    input: &str,
    config: RunConfig,
) -> Result<ResultSet, EngineError> {
    execute(parser, input, config, |_| {})
}

fn execute(
    parser: &Parser,
    input: &str,
    config: RunConfig,
    setup: impl FnOnce(&ResultSet),
) -> Result<ResultSet, EngineError> {
    let scheduler = Scheduler::new(config.job_limit, config.debug.clone());
    let results = ResultSet::new();
    setup(&results);

    let state = ParserState::root(Rc::from(input), scheduler.clone(), config.debug);
    let top = {
        let results = results.clone();
        let scheduler = scheduler.clone();
        Continuation::new(move |result| {
            if let MatchResult::Success(s) = result {
                // A discarded top-level value publishes as the empty
                // string, like the optional default.
                let value = if s.value.is_null() { Value::from("") } else { s.value };
                if let Err(err) = results.add(value) {
                    scheduler.set_fatal(err);
                }
            }
        })
    };

    {
        let parser = parser.clone();
        let label_parser = parser.clone();
        scheduler.add_job(
            move || format!("run: {}", label_parser.describe()),
            move || parser.parse(&state, &top),
        );
    }
    scheduler.run();

    if let Some(err) = scheduler.take_fatal() {
        return Err(err);
    }
    results.set_furthest_failure(
        scheduler
            .furthest_failure()
            .map(|(pos, message)| FailureDiagnostic { pos, message }),
    );
    Ok(results)
}
