//! Node identity: local ids and dotted full ids.
//!
//! Every element and handler has a local id. The full id is the dot-joined
//! chain of local ids from the root down to the node and is recomputed on
//! demand, so reparenting never leaves a stale id behind.

use rand::Rng;

/// Build a local id from a default prefix and a random four digit suffix,
/// e.g. `list-4711`.
pub fn generated_local_id(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
    format!("{prefix}-{suffix}")
}

/// Use `requested` when non-empty, otherwise generate an id from `prefix`.
pub fn local_id_or_generated(requested: &str, prefix: &str) -> String {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        generated_local_id(prefix)
    } else {
        trimmed.to_string()
    }
}

/// Join local ids (root first) into a full id.
pub fn join_ids<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter().collect::<Vec<_>>().join(".")
}

/// Full id of a child given the parent's full id.
pub fn child_id(parent_full_id: &str, local_id: &str) -> String {
    if parent_full_id.is_empty() {
        local_id.to_string()
    } else {
        format!("{parent_full_id}.{local_id}")
    }
}
