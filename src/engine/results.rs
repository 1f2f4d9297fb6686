//! The incremental set of successful top-level parses.
//!
//! Values arrive as the scheduler drains; each distinct one is appended and
//! pushed to every listener synchronously, in registration order. A
//! listener attached late is first replayed everything already present, so
//! every listener observes the same sequence. The set only ever grows.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::error::EngineError;
use super::value::Value;

type Listener = Box<dyn FnMut(&Value) -> Result<(), String>>;
type ErrorHandler = Box<dyn FnMut(String)>;

/// Where the run's best failure ended up, for callers whose set is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureDiagnostic {
    pub pos: usize,
    pub message: String,
}

struct ResultSetInner {
    values: Vec<Value>,
    listeners: Vec<Listener>,
    error_handler: Option<ErrorHandler>,
    failure: Option<FailureDiagnostic>,
}

/// Monotone, de-duplicated collection of parse results.
#[derive(Clone)]
pub struct ResultSet {
    inner: Rc<RefCell<ResultSetInner>>,
}

impl ResultSet {
    pub fn new() -> ResultSet {
        ResultSet {
            inner: Rc::new(RefCell::new(ResultSetInner {
                values: Vec::new(),
                listeners: Vec::new(),
                error_handler: None,
                failure: None,
            })),
        }
    }

    /// Add a value unless an equal one is already present. Returns whether
    /// the value was new. Listener errors are routed to the error handler;
    /// with no handler installed the first error is returned, after every
    /// listener has still been notified.
    ///
    /// Null values are forbidden here: a null marks a discarded value and
    /// must be resolved by the caller before publication.
    pub fn add(&self, value: Value) -> Result<bool, EngineError> {
        assert!(!value.is_null(), "null values cannot be added to a result set");
        // Listeners are moved out while they run so a listener can touch
        // the set (read values, attach another listener) without
        // re-borrowing panics.
        let mut running = {
            let mut inner = self.inner.borrow_mut();
            if inner.values.iter().any(|seen| seen == &value) {
                return Ok(false);
            }
            inner.values.push(value.clone());
            std::mem::take(&mut inner.listeners)
        };
        let mut errors = Vec::new();
        for listener in running.iter_mut() {
            if let Err(message) = listener(&value) {
                errors.push(message);
            }
        }
        {
            let mut inner = self.inner.borrow_mut();
            let added_during_notify = std::mem::take(&mut inner.listeners);
            running.extend(added_during_notify);
            inner.listeners = running;
        }
        self.route_errors(errors)?;
        Ok(true)
    }

    fn route_errors(&self, errors: Vec<String>) -> Result<(), EngineError> {
        if errors.is_empty() {
            return Ok(());
        }
        let handler = self.inner.borrow_mut().error_handler.take();
        match handler {
            Some(mut handler) => {
                for message in errors {
                    handler(message);
                }
                self.inner.borrow_mut().error_handler = Some(handler);
                Ok(())
            }
            None => {
                let mut iter = errors.into_iter();
                let first = iter.next().unwrap_or_default();
                Err(EngineError::Listener(first))
            }
        }
    }

    /// Register a listener; it is immediately replayed every value already
    /// present, in insertion order. Listeners are not de-duplicated.
    pub fn then(&self, f: impl FnMut(&Value) + 'static) {
        let mut f = f;
        let _ = self.then_fallible(move |value| {
            f(value);
            Ok(())
        });
    }

    /// Register a listener whose error is routed to the error handler (or
    /// returned, during replay, when no handler is installed).
    pub fn then_fallible(
        &self,
        f: impl FnMut(&Value) -> Result<(), String> + 'static,
    ) -> Result<(), EngineError> {
        let mut f = f;
        let snapshot: Vec<Value> = self.inner.borrow().values.clone();
        let mut errors = Vec::new();
        for value in &snapshot {
            if let Err(message) = f(value) {
                errors.push(message);
            }
        }
        self.inner.borrow_mut().listeners.push(Box::new(f));
        self.route_errors(errors)
    }

    /// Install the handler that receives listener errors.
    pub fn on_listener_error(&self, handler: impl FnMut(String) + 'static) {
        self.inner.borrow_mut().error_handler = Some(Box::new(handler));
    }

    /// True once at least one value has been added.
    pub fn is_settled(&self) -> bool {
        !self.inner.borrow().values.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().values.len()
    }

    /// The distinct values in insertion order.
    pub fn values(&self) -> Vec<Value> {
        self.inner.borrow().values.clone()
    }

    /// The furthest-reaching failure of the run that produced this set.
    pub fn furthest_failure(&self) -> Option<FailureDiagnostic> {
        self.inner.borrow().failure.clone()
    }

    pub(crate) fn set_furthest_failure(&self, diagnostic: Option<FailureDiagnostic>) {
        self.inner.borrow_mut().failure = diagnostic;
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        ResultSet::new()
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("values", &self.inner.borrow().values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_deduplicates() {
        let set = ResultSet::new();
        assert_eq!(set.add(Value::from("a")), Ok(true));
        assert_eq!(set.add(Value::from("a")), Ok(false));
        assert_eq!(set.add(Value::from("b")), Ok(true));
        assert_eq!(set.values(), vec![Value::from("a"), Value::from("b")]);
        assert!(set.is_settled());
    }

    #[test]
    fn test_listener_sees_each_value_once_in_order() {
        let set = ResultSet::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        set.add(Value::from("a")).unwrap();
        {
            let seen = seen.clone();
            set.then(move |value| seen.borrow_mut().push(value.clone()));
        }
        set.add(Value::from("b")).unwrap();
        set.add(Value::from("b")).unwrap();
        assert_eq!(*seen.borrow(), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_listeners_are_not_deduplicated() {
        let set = ResultSet::new();
        let count = Rc::new(RefCell::new(0));
        for _ in 0..2 {
            let count = count.clone();
            set.then(move |_| *count.borrow_mut() += 1);
        }
        set.add(Value::from("a")).unwrap();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_listener_error_goes_to_handler() {
        let set = ResultSet::new();
        let handled = Rc::new(RefCell::new(Vec::new()));
        {
            let handled = handled.clone();
            set.on_listener_error(move |message| handled.borrow_mut().push(message));
        }
        let _ = set.then_fallible(|_| Err("broken".to_string()));
        assert_eq!(set.add(Value::from("a")), Ok(true));
        assert_eq!(*handled.borrow(), vec!["broken".to_string()]);
    }

    #[test]
    fn test_listener_error_without_handler_surfaces() {
        let set = ResultSet::new();
        let _ = set.then_fallible(|_| Err("broken".to_string()));
        assert_eq!(
            set.add(Value::from("a")),
            Err(EngineError::Listener("broken".to_string()))
        );
        // The value was still recorded and later adds still work.
        assert_eq!(set.values(), vec![Value::from("a")]);
    }

    #[test]
    fn test_failing_listener_does_not_disrupt_others() {
        let set = ResultSet::new();
        set.on_listener_error(|_| {});
        let _ = set.then_fallible(|_| Err("broken".to_string()));
        let seen = Rc::new(RefCell::new(0));
        {
            let seen = seen.clone();
            set.then(move |_| *seen.borrow_mut() += 1);
        }
        set.add(Value::from("a")).unwrap();
        set.add(Value::from("b")).unwrap();
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn test_listener_may_attach_listener() {
        let set = ResultSet::new();
        let late = Rc::new(RefCell::new(Vec::new()));
        {
            let set2 = set.clone();
            let late = late.clone();
            let mut attached = false;
            set.then(move |_| {
                if !attached {
                    attached = true;
                    let late = late.clone();
                    set2.then(move |value| late.borrow_mut().push(value.clone()));
                }
            });
        }
        set.add(Value::from("a")).unwrap();
        set.add(Value::from("b")).unwrap();
        // The late listener replayed "a" on attach and then saw "b" live.
        assert_eq!(*late.borrow(), vec![Value::from("a"), Value::from("b")]);
    }
}
