//! Typed errors for the execution engine.
//!
//! Contract violations (finish-lock misuse, selectors that push more than one
//! element) are reported through these variants and abort the running
//! session. Absent optional capabilities are never errors.

use thiserror::Error;

use crate::element::ElementId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task {task}: finish called without holding the finish lock")]
    FinishWithoutLock { task: String },

    #[error("task {task}: finish lock is held by another thread")]
    FinishFromWrongThread { task: String },

    #[error("task {task}: execution already finished")]
    AlreadyFinished { task: String },

    #[error("task {task} is already running")]
    AlreadyRunning { task: String },

    #[error("selector on {element} pushed {pushed} element(s) but reported push={reported}")]
    SelectorContract {
        element: String,
        pushed: isize,
        reported: bool,
    },

    #[error("cannot push {element}: not a child of stack top {top}")]
    NotAChildOfTop { element: String, top: String },

    #[error("unknown element {0}")]
    UnknownElement(ElementId),

    #[error("element stack is empty")]
    EmptyStack,

    #[error("invalid element tree: {0}")]
    InvalidTree(String),

    #[error("interaction thread is no longer running")]
    InteractionThreadGone,
}
