//! Execution engine for hierarchical, adaptive training sessions.
//!
//! A session walks a tree of elements: grouping nodes decide which child runs
//! next through pluggable selectors, and leaf tasks block the scheduler thread
//! until the interaction thread (or a timeout) reports completion. Outcomes
//! feed a points/level controller that adapts difficulty between tasks.
//!
//! - **[`element`]**, **[`handler`]**: the element arena, the active stack and
//!   the capability-tagged handlers attached to elements.
//! - **[`strategy`]**, **[`select`]**: the tree scheduler and its selectors.
//! - **[`exec`]**, **[`timer`]**: leaf executables and the cross-thread
//!   completion hand-off.
//! - **[`phase`]**, **[`pause`]**, **[`timeout`]**, **[`score`]**, **[`handlers`]**:
//!   lifecycle broadcast and the handlers that listen to it.
//! - **[`executor`]**: drives a whole session and exposes a thread-safe handle
//!   for stop, cancel and key events.

pub mod config;
pub mod context;
pub mod data;
pub mod element;
pub mod error;
pub mod exec;
pub mod executor;
pub mod handler;
pub mod handlers;
pub mod logging;
pub mod node;
pub mod pause;
pub mod phase;
pub mod score;
pub mod select;
pub mod strategy;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod timeout;
pub mod timer;
pub mod value;

pub use error::EngineError;
