//! Set-level change detection between two polls
//!
//! Only membership counts: an alert whose value moves while staying above its
//! threshold keeps its key and does not cause a change. Keys are compared as
//! multisets, since two rules on one family can trigger for the same sample
//! and then share a key.

use std::collections::HashMap;

use crate::alerts::TriggeredSet;

fn counts(set: &TriggeredSet) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for key in set.keys() {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Occurrences of `keys` left over after matching each one against `other`.
fn unmatched<'a>(
    keys: impl Iterator<Item = &'a str>,
    mut other: HashMap<&'a str, usize>,
) -> impl Iterator<Item = &'a str> {
    keys.filter(move |key| match other.get_mut(key) {
        Some(count) if *count > 0 => {
            *count -= 1;
            false
        }
        _ => true,
    })
}

/// Keys present in one set more often than in the other, `previous`-only
/// occurrences first.
pub fn diff<'a>(previous: &'a TriggeredSet, current: &'a TriggeredSet) -> Vec<&'a str> {
    unmatched(previous.keys(), counts(current))
        .chain(unmatched(current.keys(), counts(previous)))
        .collect()
}

/// Whether the membership of the alert set differs between the two polls.
pub fn changed(previous: &TriggeredSet, current: &TriggeredSet) -> bool {
    !diff(previous, current).is_empty()
}
