//! The immutable cursor a parse moves through.
//!
//! A `ParserState` is a value: advancing produces a new state, and published
//! states are never mutated. Every state carries a handle to the run's
//! scheduler (so combinators can enqueue work) and an optional debug sink.

use std::fmt;
use std::rc::Rc;

use super::scheduler::Scheduler;

/// Destination for diagnostic messages, opaque strings only.
pub type DebugSink = Rc<dyn Fn(&str)>;

/// An immutable position in the input, bound to one run.
///
/// Invariant: `0 <= pos <= end_pos <= input.len()`, with both offsets on
/// `char` boundaries.
#[derive(Clone)]
pub struct ParserState {
    input: Rc<str>,
    pos: usize,
    end_pos: usize,
    depth: usize,
    scheduler: Scheduler,
    debug: Option<DebugSink>,
}

impl ParserState {
    pub(crate) fn root(input: Rc<str>, scheduler: Scheduler, debug: Option<DebugSink>) -> Self {
        let end_pos = input.len();
        ParserState {
            input,
            pos: 0,
            end_pos,
            depth: 0,
            scheduler,
            debug,
        }
    }

    /// The full input buffer.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Current offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Exclusive upper bound for matching.
    pub fn end_pos(&self) -> usize {
        self.end_pos
    }

    /// Nesting depth, maintained for debug output only.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The unconsumed slice between `pos` and `end_pos`.
    pub fn remaining(&self) -> &str {
        &self.input[self.pos..self.end_pos]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.end_pos
    }

    /// A new state `len` bytes further along.
    pub fn advance(&self, len: usize) -> ParserState {
        debug_assert!(self.pos + len <= self.end_pos);
        ParserState {
            pos: (self.pos + len).min(self.end_pos),
            ..self.clone()
        }
    }

    /// A new state with the matching bound narrowed to `end_pos`. Bounds
    /// wider than the current one are clamped.
    pub fn with_end_pos(&self, end_pos: usize) -> ParserState {
        ParserState {
            end_pos: end_pos.clamp(self.pos, self.end_pos),
            ..self.clone()
        }
    }

    pub(crate) fn deeper(&self) -> ParserState {
        ParserState {
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Emit a diagnostic line, indented by depth. The message closure is
    /// only evaluated when a sink is attached.
    pub fn trace(&self, message: impl FnOnce() -> String) {
        if let Some(sink) = &self.debug {
            let mut line = String::new();
            for _ in 0..self.depth {
                line.push_str("  ");
            }
            line.push_str(&message());
            sink.as_ref()(&line);
        }
    }
}

impl PartialEq for ParserState {
    fn eq(&self, other: &ParserState) -> bool {
        Rc::ptr_eq(&self.input, &other.input)
            && self.pos == other.pos
            && self.end_pos == other.end_pos
    }
}

impl fmt::Debug for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let excerpt: String = self.remaining().chars().take(16).collect();
        f.debug_struct("ParserState")
            .field("pos", &self.pos)
            .field("end_pos", &self.end_pos)
            .field("ahead", &excerpt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scheduler::Scheduler;

    fn state(input: &str) -> ParserState {
        ParserState::root(Rc::from(input), Scheduler::new(None, None), None)
    }

    #[test]
    fn test_root_bounds() {
        let s = state("hello");
        assert_eq!(s.pos(), 0);
        assert_eq!(s.end_pos(), 5);
        assert_eq!(s.remaining(), "hello");
        assert!(!s.at_end());
    }

    #[test]
    fn test_advance_is_a_new_value() {
        let s = state("hello");
        let t = s.advance(2);
        assert_eq!(s.pos(), 0);
        assert_eq!(t.pos(), 2);
        assert_eq!(t.remaining(), "llo");
    }

    #[test]
    fn test_equality_ignores_depth() {
        let s = state("hello");
        let a = s.advance(1);
        let b = s.advance(1).deeper();
        assert_eq!(a, b);
        assert_ne!(a, s);
    }

    #[test]
    fn test_with_end_pos_narrows_remaining() {
        let s = state("hello");
        let narrowed = s.with_end_pos(3);
        assert_eq!(narrowed.remaining(), "hel");
        assert_eq!(narrowed.advance(3).remaining(), "");
        assert!(narrowed.advance(3).at_end());
    }

    #[test]
    fn test_with_end_pos_clamps() {
        let s = state("hello").advance(2);
        assert_eq!(s.with_end_pos(1).end_pos(), 2);
        assert_eq!(s.with_end_pos(99).end_pos(), 5);
    }

    #[test]
    fn test_states_on_different_inputs_differ() {
        let a = state("same");
        let b = state("same");
        assert_ne!(a, b);
    }
}
