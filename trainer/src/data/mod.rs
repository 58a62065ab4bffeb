//! Data collaborators: trials, persisted properties and session history.
//!
//! The engine only talks to persistence through the traits in this module;
//! in-memory implementations back the CLI and the tests.

pub mod props;
mod recorder;
mod store;
mod trial;

pub use recorder::{MemoryRecorder, TrialId, TrialRecorder};
pub use store::{FixedSessionCount, MemoryStore, PropertyStore, SessionCounter};
pub use trial::{Trial, TrialProperty};
