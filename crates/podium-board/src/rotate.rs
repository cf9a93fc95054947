//! Award rotation: minimal delta between the old holder set and the new top N.

use std::collections::BTreeSet;

use podium_core::types::{ParticipantId, RankedEntry, RotationDelta};

/// Compute the membership change taking `current_holders` to exactly the
/// participants in `new_top`.
///
/// Pure set difference both ways, so the operation is idempotent: applying
/// the delta and rotating again yields an empty delta. Holders who stayed in
/// the top N are never touched.
pub fn rotate(current_holders: &BTreeSet<ParticipantId>, new_top: &[RankedEntry]) -> RotationDelta {
    let top_ids: BTreeSet<ParticipantId> = new_top.iter().map(|e| e.participant).collect();

    RotationDelta {
        to_remove: current_holders.difference(&top_ids).copied().collect(),
        to_add: top_ids.difference(current_holders).copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top(ids: &[u64]) -> Vec<RankedEntry> {
        ids.iter()
            .map(|&id| RankedEntry {
                participant: ParticipantId(id),
                count: 1,
            })
            .collect()
    }

    fn holders(ids: &[u64]) -> BTreeSet<ParticipantId> {
        ids.iter().map(|&id| ParticipantId(id)).collect()
    }

    #[test]
    fn computes_minimal_delta() {
        let delta = rotate(&holders(&[1, 2, 3]), &top(&[2, 3, 4]));
        assert_eq!(delta.to_remove, holders(&[1]));
        assert_eq!(delta.to_add, holders(&[4]));
    }

    #[test]
    fn rotation_is_idempotent() {
        let current = holders(&[1, 2]);
        let new_top = top(&[2, 3]);

        let first = rotate(&current, &new_top);
        let mut after: BTreeSet<ParticipantId> = current
            .difference(&first.to_remove)
            .copied()
            .collect();
        after.extend(first.to_add.iter().copied());

        let second = rotate(&after, &new_top);
        assert!(second.is_empty());
    }

    #[test]
    fn unchanged_top_touches_nobody() {
        let delta = rotate(&holders(&[5, 6]), &top(&[5, 6]));
        assert!(delta.is_empty());
    }

    #[test]
    fn empty_top_removes_everyone() {
        let delta = rotate(&holders(&[7, 8]), &top(&[]));
        assert_eq!(delta.to_remove, holders(&[7, 8]));
        assert!(delta.to_add.is_empty());
    }
}
