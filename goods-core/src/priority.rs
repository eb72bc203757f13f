//! Priority ordering rules.
//!
//! Reprioritization shifts every good whose id is at or after the anchor's
//! id. Ids are assignment-ordered, so the affected set is a single range
//! comparison and stays well defined even when priorities tie.

use crate::{Good, GoodId, PriorityChange};

/// Priority for a newly created good: one past the current maximum.
pub fn next_priority<I>(existing: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    existing.into_iter().max().unwrap_or(0) + 1
}

/// Add `delta` to the priority of every good with `id >= anchor_id`.
///
/// Returns the new `{id, priority}` pairs in ascending id order. Callers are
/// responsible for verifying the anchor exists before calling this.
pub fn shift_priorities(goods: &mut [Good], anchor_id: GoodId, delta: i64) -> Vec<PriorityChange> {
    let mut changes: Vec<PriorityChange> = goods
        .iter_mut()
        .filter(|g| g.id >= anchor_id)
        .map(|g| {
            g.priority = g.priority.saturating_add(delta);
            PriorityChange {
                id: g.id,
                priority: g.priority,
            }
        })
        .collect();
    changes.sort_by_key(|c| c.id);
    changes
}
