//! State and action contracts.

use std::fmt;
use std::sync::Arc;

/// An opaque, value-like search state.
///
/// The explorer only ever asks a state for its identity and whether it is
/// terminal. `hash` must be stable and unique per distinguishable state; it
/// does not have to be derived from the state's contents.
pub trait State: Clone + Send + Sync + 'static {
    fn hash(&self) -> String;

    fn terminal(&self) -> bool;
}

/// A labelled transition from one state to the next.
///
/// Labels only need to be unique among the actions proposed for one state.
pub struct Action<S> {
    label: String,
    apply: Arc<dyn Fn(&S) -> S + Send + Sync>,
}

impl<S> Action<S> {
    pub fn new(label: impl Into<String>, apply: impl Fn(&S) -> S + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            apply: Arc::new(apply),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Produce the successor state; `state` is left untouched.
    pub fn apply(&self, state: &S) -> S {
        (self.apply)(state)
    }
}

impl<S> Clone for Action<S> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<S> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("label", &self.label).finish()
    }
}

/// A state identified by its start and the labels taken from it.
///
/// Fits searches where a model proposes free-text steps: every step extends
/// the hash with `|label`, and a finishing step makes the trail terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trail {
    start: String,
    steps: Vec<String>,
    finished: bool,
}

impl Trail {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            steps: Vec::new(),
            finished: false,
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Action appending `label` to the trail.
    pub fn step(label: impl Into<String>) -> Action<Trail> {
        let label = label.into();
        let step = label.clone();
        Action::new(label, move |t: &Trail| t.extended(&step, false))
    }

    /// Action appending `label` and ending the trail.
    pub fn finishing_step(label: impl Into<String>) -> Action<Trail> {
        let label = label.into();
        let step = label.clone();
        Action::new(label, move |t: &Trail| t.extended(&step, true))
    }

    fn extended(&self, label: &str, finished: bool) -> Trail {
        let mut next = self.clone();
        next.steps.push(label.to_string());
        next.finished = self.finished || finished;
        next
    }
}

impl State for Trail {
    fn hash(&self) -> String {
        let mut hash = self.start.clone();
        for step in &self.steps {
            hash.push('|');
            hash.push_str(step);
        }
        hash
    }

    fn terminal(&self) -> bool {
        self.finished
    }
}
