//! Engine-level error taxonomy.
//!
//! Parse failures are *data* (the `Failure` variant of a match result) and
//! never appear here. `EngineError` covers the conditions that end a run or
//! reject a construction: grammar bugs, bad patterns, exhausted budgets and
//! unhandled listener errors.

use std::fmt;

/// Errors that terminate a run or reject a parser construction
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A repeated parser succeeded without consuming input. This is a
    /// grammar bug, not a parse failure: the repetition would never
    /// terminate.
    ZeroWidthRepeat { pos: usize },
    /// The regex source given to `pattern` did not compile.
    InvalidPattern(String),
    /// The run executed more scheduler jobs than the configured budget.
    JobLimitExceeded { limit: usize },
    /// `ParserSlot::define` was called twice on the same slot.
    SlotAlreadyBound(String),
    /// A parser slot was invoked before `ParserSlot::define` bound it.
    SlotNotBound(String),
    /// A fallible result-set listener returned an error and no listener
    /// error handler was installed.
    Listener(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ZeroWidthRepeat { pos } => {
                write!(f, "repeated parser matched without consuming input at offset {}", pos)
            }
            EngineError::InvalidPattern(msg) => write!(f, "invalid pattern: {}", msg),
            EngineError::JobLimitExceeded { limit } => {
                write!(f, "parse exceeded the job limit of {}", limit)
            }
            EngineError::SlotAlreadyBound(name) => {
                write!(f, "parser slot '{}' is already bound", name)
            }
            EngineError::SlotNotBound(name) => {
                write!(f, "parser slot '{}' was used before being defined", name)
            }
            EngineError::Listener(msg) => write!(f, "result listener failed: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_zero_width() {
        let err = EngineError::ZeroWidthRepeat { pos: 7 };
        assert_eq!(
            err.to_string(),
            "repeated parser matched without consuming input at offset 7"
        );
    }

    #[test]
    fn test_display_job_limit() {
        let err = EngineError::JobLimitExceeded { limit: 100 };
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_display_slot_not_bound() {
        let err = EngineError::SlotNotBound("expr".to_string());
        assert_eq!(
            err.to_string(),
            "parser slot 'expr' was used before being defined"
        );
    }

    #[test]
    fn test_errors_compare() {
        assert_eq!(
            EngineError::InvalidPattern("x".to_string()),
            EngineError::InvalidPattern("x".to_string())
        );
        assert_ne!(
            EngineError::ZeroWidthRepeat { pos: 0 },
            EngineError::ZeroWidthRepeat { pos: 1 }
        );
    }
}
