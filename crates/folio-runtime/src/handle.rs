//! Identity-stable handles for resolved instances.
//!
//! A handle is the cached result of resolving one (node, scope, overrides)
//! triple. Its state machine is `pending -> fulfilled` or
//! `pending -> rejected`; terminal states are immutable and there is no
//! cancelled state, since stale work becomes irrelevant through cache
//! versioning rather than cancellation.
//!
//! Handles support a subscribe-or-get contract: a synchronous read when
//! already settled, callback registration while pending. A caller driving an
//! already-settled graph pays zero asynchronous overhead.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;

use folio_expr::Value;

use crate::ident::{CanonicalKey, ScopedStateKey};
use crate::registry::AttributeProblem;

/// A handler failure caught at the resolution boundary.
///
/// Converted into a rejected handle carrying the original detail for
/// diagnostic display; it never propagates as a panic through the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler for <{tag}> failed: {message}")]
pub struct HandlerFailure {
    /// Tag of the component whose handler failed
    pub tag: String,
    /// Original error detail
    pub message: String,
}

impl HandlerFailure {
    /// Create a new failure record.
    pub fn new(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
        }
    }
}

/// A structural content problem recovered as a renderable result.
///
/// These are values, not exceptions: a parent embeds the error where the
/// child would have rendered, so one bad node degrades gracefully instead of
/// blanking the document. Each variant carries enough to render a friendly
/// message to a content author without a stack trace.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineError {
    /// A referenced key has no node in the graph.
    NotFoundInGraph {
        /// The missing key
        key: CanonicalKey,
    },
    /// The node's tag has no registered handler.
    UnknownTag {
        /// The unregistered tag
        tag: String,
        /// Key of the node carrying it
        key: String,
    },
    /// The node's attributes failed the handler's schema.
    AttributeValidationFailed {
        /// Tag whose schema was violated
        tag: String,
        /// Key of the node carrying the attributes
        key: String,
        /// The offending fields
        problems: Vec<AttributeProblem>,
    },
    /// A parent-constrained component appeared outside its required parent.
    MisplacedComponent {
        /// The misplaced tag
        tag: String,
        /// Key of the node carrying it
        key: String,
        /// The tag it must be nested under
        requires: &'static str,
    },
    /// A node was re-entered while already resolving on the current descent.
    CycleDetected {
        /// Composite key description of the re-entered node
        key: String,
    },
}

impl InlineError {
    /// Author-facing message for display in place of the failed content.
    pub fn author_message(&self) -> String {
        match self {
            InlineError::NotFoundInGraph { key } => {
                format!("nothing named '{key}' exists in this document")
            }
            InlineError::UnknownTag { tag, key } => {
                format!("'{key}' uses <{tag}>, which is not an available component")
            }
            InlineError::AttributeValidationFailed { tag, key, problems } => {
                let fields: Vec<&str> =
                    problems.iter().map(|p| p.field.as_str()).collect();
                format!(
                    "'{key}' has invalid attributes for <{tag}>: {}",
                    fields.join(", ")
                )
            }
            InlineError::MisplacedComponent { tag, key, requires } => {
                format!("'{key}' uses <{tag}>, which belongs inside <{requires}>")
            }
            InlineError::CycleDetected { key } => {
                format!("'{key}' refers back to itself through its own children")
            }
        }
    }
}

impl fmt::Display for InlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.author_message())
    }
}

/// The runtime result of resolving one node.
#[derive(Debug, Clone)]
pub enum Instance {
    /// An instantiated component
    Component(ComponentInstance),
    /// An inline text run
    Text(String),
    /// A structural problem rendered in place
    Error(InlineError),
}

/// An instantiated component with its resolved children.
#[derive(Debug, Clone)]
pub struct ComponentInstance {
    /// Component tag
    pub tag: String,
    /// Reactive-store identity of this instance
    pub state_key: ScopedStateKey,
    /// Merged attributes (overrides and schema defaults applied)
    pub attributes: IndexMap<String, Value>,
    /// Child handles in authored order
    pub kids: Vec<Handle>,
    /// Value produced by the handler's setup
    pub value: Value,
}

/// How a handle settled.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// Resolution completed
    Fulfilled(Rc<Instance>),
    /// The handler failed
    Rejected(Rc<HandlerFailure>),
}

type Waiter = Box<dyn FnOnce(&Settlement)>;

enum HandleState {
    Pending(Vec<Waiter>),
    Settled(Settlement),
}

/// Identity-stable, cached result of one resolution.
///
/// Cloning a handle clones the identity, not the state: two clones observe
/// the same settlement and compare equal under [`Handle::same`].
#[derive(Clone)]
pub struct Handle {
    inner: Rc<RefCell<HandleState>>,
}

impl Handle {
    /// Create a pending handle.
    pub(crate) fn pending() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HandleState::Pending(Vec::new()))),
        }
    }

    /// Create an already-fulfilled handle.
    pub fn fulfilled(instance: Instance) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HandleState::Settled(Settlement::Fulfilled(
                Rc::new(instance),
            )))),
        }
    }

    /// Create an already-rejected handle.
    pub fn rejected(failure: HandlerFailure) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HandleState::Settled(Settlement::Rejected(
                Rc::new(failure),
            )))),
        }
    }

    /// Synchronous read: the settlement if settled, `None` while pending.
    pub fn try_get(&self) -> Option<Settlement> {
        match &*self.inner.borrow() {
            HandleState::Pending(_) => None,
            HandleState::Settled(settlement) => Some(settlement.clone()),
        }
    }

    /// Is this handle still pending?
    pub fn is_pending(&self) -> bool {
        self.try_get().is_none()
    }

    /// Register interest in settlement.
    ///
    /// Fires immediately (synchronously) when already settled; otherwise
    /// exactly once at settlement, in registration order.
    pub fn subscribe(&self, callback: impl FnOnce(&Settlement) + 'static) {
        let settled = match &*self.inner.borrow() {
            HandleState::Pending(_) => None,
            HandleState::Settled(settlement) => Some(settlement.clone()),
        };
        match settled {
            // Fire outside the borrow so the callback may inspect the handle.
            Some(settlement) => callback(&settlement),
            None => {
                if let HandleState::Pending(waiters) = &mut *self.inner.borrow_mut() {
                    waiters.push(Box::new(callback));
                }
            }
        }
    }

    /// Pointer identity: do two handles denote the same logical instance?
    pub fn same(a: &Handle, b: &Handle) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Fulfil a pending handle.
    pub(crate) fn fulfil(&self, instance: Instance) {
        self.settle(Settlement::Fulfilled(Rc::new(instance)));
    }

    /// Reject a pending handle.
    pub(crate) fn reject(&self, failure: HandlerFailure) {
        self.settle(Settlement::Rejected(Rc::new(failure)));
    }

    fn settle(&self, settlement: Settlement) {
        let waiters = {
            let mut state = self.inner.borrow_mut();
            match std::mem::replace(&mut *state, HandleState::Settled(settlement.clone())) {
                HandleState::Pending(waiters) => waiters,
                HandleState::Settled(_) => {
                    panic!("BUG: handle settled twice; terminal states are immutable")
                }
            }
        };
        for waiter in waiters {
            waiter(&settlement);
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_get() {
            None => write!(f, "Handle(pending)"),
            Some(Settlement::Fulfilled(_)) => write!(f, "Handle(fulfilled)"),
            Some(Settlement::Rejected(_)) => write!(f, "Handle(rejected)"),
        }
    }
}

/// Outcome of deferred handler setup.
pub type DeferredOutcome = Result<Value, HandlerFailure>;

enum DeferredState {
    Waiting(Vec<Box<dyn FnOnce(&DeferredOutcome)>>),
    Done(DeferredOutcome),
}

/// Completion side handed out by a handler whose setup finishes later (e.g.
/// a dynamically loaded component).
///
/// The handler keeps a clone and calls [`Deferred::fulfill`] or
/// [`Deferred::reject`] exactly once; the owning handle settles once its
/// children have also settled.
#[derive(Clone)]
pub struct Deferred {
    inner: Rc<RefCell<DeferredState>>,
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

impl Deferred {
    /// Create a new open deferred.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DeferredState::Waiting(Vec::new()))),
        }
    }

    /// Complete with a value.
    pub fn fulfill(&self, value: Value) {
        self.finish(Ok(value));
    }

    /// Complete with a failure; the owning handle rejects.
    pub fn reject(&self, failure: HandlerFailure) {
        self.finish(Err(failure));
    }

    /// Synchronous read of the outcome, if done.
    pub fn try_get(&self) -> Option<DeferredOutcome> {
        match &*self.inner.borrow() {
            DeferredState::Waiting(_) => None,
            DeferredState::Done(outcome) => Some(outcome.clone()),
        }
    }

    /// Register interest; fires immediately if already done.
    pub(crate) fn on_done(&self, callback: impl FnOnce(&DeferredOutcome) + 'static) {
        let done = match &*self.inner.borrow() {
            DeferredState::Waiting(_) => None,
            DeferredState::Done(outcome) => Some(outcome.clone()),
        };
        match done {
            Some(outcome) => callback(&outcome),
            None => {
                if let DeferredState::Waiting(waiters) = &mut *self.inner.borrow_mut() {
                    waiters.push(Box::new(callback));
                }
            }
        }
    }

    fn finish(&self, outcome: DeferredOutcome) {
        let waiters = {
            let mut state = self.inner.borrow_mut();
            match std::mem::replace(&mut *state, DeferredState::Done(outcome.clone())) {
                DeferredState::Waiting(waiters) => waiters,
                DeferredState::Done(_) => {
                    panic!("BUG: deferred completed twice")
                }
            }
        };
        for waiter in waiters {
            waiter(&outcome);
        }
    }
}
