//! The cooperative job queue that drives a run.
//!
//! Single-threaded and non-preemptive: `run` pops jobs in FIFO order and
//! executes each to completion; a job may enqueue more jobs. Alternation
//! schedules one job per branch and repetition one job per iteration, which
//! bounds call-stack depth by trading it for queue depth.
//!
//! The scheduler also owns the run-wide bookkeeping: the furthest-reaching
//! failure (the best diagnostic when a parse produces nothing), the fatal
//! error latch that ends a run early, and the memoization table for parsers
//! marked cacheable.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::error::EngineError;
use super::parser::Parser;
use super::result::{Continuation, MatchResult, MessageThunk};
use super::state::{DebugSink, ParserState};

struct Job {
    label: Box<dyn Fn() -> String>,
    body: Box<dyn FnOnce()>,
}

/// Memo entries are keyed by parser identity and the span it was invoked
/// on; `end_pos` participates because lookahead can narrow the bound.
type MemoKey = (u64, usize, usize);

struct MemoEntry {
    results: Vec<MatchResult>,
    subscribers: Vec<Continuation>,
}

struct SchedulerInner {
    queue: VecDeque<Job>,
    furthest: Option<(usize, MessageThunk)>,
    fatal: Option<EngineError>,
    executed: usize,
    job_limit: Option<usize>,
    debug: Option<DebugSink>,
    memo: HashMap<MemoKey, MemoEntry>,
}

/// Shared handle to one run's job queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Scheduler {
    pub fn new(job_limit: Option<usize>, debug: Option<DebugSink>) -> Scheduler {
        Scheduler {
            inner: Rc::new(RefCell::new(SchedulerInner {
                queue: VecDeque::new(),
                furthest: None,
                fatal: None,
                executed: 0,
                job_limit,
                debug,
                memo: HashMap::new(),
            })),
        }
    }

    /// Enqueue a job. The label thunk is only rendered when a debug sink is
    /// attached.
    pub fn add_job(&self, label: impl Fn() -> String + 'static, body: impl FnOnce() + 'static) {
        self.inner.borrow_mut().queue.push_back(Job {
            label: Box::new(label),
            body: Box::new(body),
        });
    }

    /// Drain the queue. Jobs run to completion, never preempted; the loop
    /// stops when the queue empties, the fatal latch is set, or the job
    /// budget runs out.
    pub fn run(&self) {
        loop {
            let job = {
                let mut inner = self.inner.borrow_mut();
                if inner.fatal.is_some() {
                    inner.queue.clear();
                    return;
                }
                if let Some(limit) = inner.job_limit {
                    if inner.executed >= limit && !inner.queue.is_empty() {
                        inner.fatal = Some(EngineError::JobLimitExceeded { limit });
                        inner.queue.clear();
                        return;
                    }
                }
                match inner.queue.pop_front() {
                    Some(job) => {
                        inner.executed += 1;
                        job
                    }
                    None => return,
                }
            };
            self.trace_job(&job);
            (job.body)();
        }
    }

    fn trace_job(&self, job: &Job) {
        let sink = self.inner.borrow().debug.clone();
        if let Some(sink) = sink {
            sink.as_ref()(&format!("job: {}", (job.label.as_ref())()));
        }
    }

    /// Record a failure position; the maximum over the run is kept.
    pub(crate) fn note_failure(&self, pos: usize, message: MessageThunk) {
        let mut inner = self.inner.borrow_mut();
        let further = match &inner.furthest {
            Some((best, _)) => pos > *best,
            None => true,
        };
        if further {
            inner.furthest = Some((pos, message));
        }
    }

    /// The furthest-reaching failure seen so far, message rendered.
    pub fn furthest_failure(&self) -> Option<(usize, String)> {
        let thunk = self.inner.borrow().furthest.clone();
        thunk.map(|(pos, message)| (pos, (message.as_ref())()))
    }

    /// Latch a fatal error. The first one wins; pending jobs are dropped.
    pub(crate) fn set_fatal(&self, error: EngineError) {
        let mut inner = self.inner.borrow_mut();
        if inner.fatal.is_none() {
            inner.fatal = Some(error);
        }
        inner.queue.clear();
    }

    pub(crate) fn take_fatal(&self) -> Option<EngineError> {
        self.inner.borrow_mut().fatal.take()
    }

    /// Invoke a cacheable parser through the memo table.
    ///
    /// The first invocation at a key executes the parser with a
    /// broadcasting continuation; every later invocation replays the
    /// recorded results and subscribes for any still to come. Duplicate
    /// results are dropped at the entry, which keeps saturation finite.
    pub(crate) fn parse_memoized(&self, parser: &Parser, state: &ParserState, k: &Continuation) {
        let key = (parser.id(), state.pos(), state.end_pos());
        let replay = {
            let mut inner = self.inner.borrow_mut();
            match inner.memo.get_mut(&key) {
                Some(entry) => {
                    entry.subscribers.push(k.clone());
                    Some(entry.results.clone())
                }
                None => {
                    inner.memo.insert(
                        key,
                        MemoEntry {
                            results: Vec::new(),
                            subscribers: vec![k.clone()],
                        },
                    );
                    None
                }
            }
        };
        match replay {
            Some(results) => {
                for result in results {
                    k.accept(result);
                }
            }
            None => {
                let scheduler = self.clone();
                let broadcast = Continuation::new(move |result: MatchResult| {
                    let subscribers = {
                        let mut inner = scheduler.inner.borrow_mut();
                        let Some(entry) = inner.memo.get_mut(&key) else {
                            return;
                        };
                        if entry.results.iter().any(|seen| seen == &result) {
                            return;
                        }
                        entry.results.push(result.clone());
                        entry.subscribers.clone()
                    };
                    for subscriber in subscribers {
                        subscriber.accept(result.clone());
                    }
                });
                parser.execute(state, &broadcast);
            }
        }
    }
}
