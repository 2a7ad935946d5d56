//! Deduplication and ordering of collected items

use crate::types::ItemRecord;
use std::collections::HashSet;

/// Remove duplicate identities and sort ascending by creation time
///
/// The first occurrence of an identity wins. Ties on `created_at` are broken
/// by `id`, so the order is total and the function is idempotent.
pub fn process(items: Vec<ItemRecord>) -> Vec<ItemRecord> {
    let before = items.len();
    let mut seen = HashSet::with_capacity(items.len());
    let mut unique: Vec<ItemRecord> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect();

    unique.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    if unique.len() < before {
        tracing::debug!(
            before,
            after = unique.len(),
            "removed duplicate items"
        );
    }
    unique
}
