// src/services/positions.rs

//! Position bookkeeping for questions within a set.
//!
//! Every set holds its questions at positions `1..=N`, no gaps and no duplicates.
//! The stores apply these rules; the functions here decide what the new positions are.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::question::PositionUpdate;

/// Position for a question appended after the current maximum (`None` for an empty set).
pub fn next_position(current_max: Option<i32>) -> i32 {
    current_max.unwrap_or(0) + 1
}

/// Positions for a bulk insert of `count` questions into a fresh set, in insertion order.
pub fn sequential_positions(count: usize) -> impl Iterator<Item = i32> {
    (1..=count).map(|p| p as i32)
}

/// New position of a question at `position` after the question at `deleted` is removed.
pub fn shifted_after_delete(position: i32, deleted: i32) -> i32 {
    if position > deleted {
        position - 1
    } else {
        position
    }
}

/// True when the positions are exactly `1..=N` in some order.
pub fn is_dense(positions: impl IntoIterator<Item = i32>) -> bool {
    let mut sorted: Vec<i32> = positions.into_iter().collect();
    sorted.sort_unstable();
    sorted.iter().zip(1..).all(|(p, expected)| *p == expected)
}

/// Checks that a reorder request is a full permutation of the set's current questions.
///
/// The pairs must name every current question exactly once, and the positions must be
/// exactly `1..=N`.
pub fn validate_reorder(current_ids: &[Uuid], moves: &[PositionUpdate]) -> Result<(), String> {
    if moves.len() != current_ids.len() {
        return Err(format!(
            "positions must cover all {} questions of the set, got {}",
            current_ids.len(),
            moves.len()
        ));
    }

    let current: HashSet<Uuid> = current_ids.iter().copied().collect();
    let mut seen = HashSet::with_capacity(moves.len());
    for mv in moves {
        if !current.contains(&mv.question_id) {
            return Err(format!("question {} does not belong to this set", mv.question_id));
        }
        if !seen.insert(mv.question_id) {
            return Err(format!("question {} appears more than once", mv.question_id));
        }
    }

    if !is_dense(moves.iter().map(|mv| mv.position)) {
        return Err(format!(
            "positions must be exactly 1..{} with no gaps or duplicates",
            moves.len()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn mv(question_id: Uuid, position: i32) -> PositionUpdate {
        PositionUpdate { question_id, position }
    }

    #[test]
    fn append_goes_after_max() {
        assert_eq!(next_position(None), 1);
        assert_eq!(next_position(Some(4)), 5);
    }

    #[test]
    fn bulk_positions_start_at_one() {
        assert_eq!(sequential_positions(3).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(sequential_positions(0).count(), 0);
    }

    #[test]
    fn delete_closes_the_gap() {
        let remaining: Vec<i32> = [1, 2, 4, 5]
            .into_iter()
            .map(|p| shifted_after_delete(p, 3))
            .collect();
        assert_eq!(remaining, vec![1, 2, 3, 4]);
        assert!(is_dense(remaining));
    }

    #[test]
    fn density_check() {
        assert!(is_dense([3, 1, 2]));
        assert!(is_dense(Vec::<i32>::new()));
        assert!(!is_dense([1, 3]));
        assert!(!is_dense([1, 1, 2]));
        assert!(!is_dense([0, 1, 2]));
    }

    #[test]
    fn valid_permutation_is_accepted() {
        let q = ids(3);
        let moves = [mv(q[2], 1), mv(q[0], 2), mv(q[1], 3)];
        assert!(validate_reorder(&q, &moves).is_ok());
    }

    #[test]
    fn partial_or_foreign_reorders_are_rejected() {
        let q = ids(3);
        assert!(validate_reorder(&q, &[mv(q[0], 1), mv(q[1], 2)]).is_err());
        assert!(validate_reorder(&q, &[mv(q[0], 1), mv(q[1], 2), mv(Uuid::new_v4(), 3)]).is_err());
        assert!(validate_reorder(&q, &[mv(q[0], 1), mv(q[0], 2), mv(q[1], 3)]).is_err());
    }

    #[test]
    fn gapped_or_duplicate_positions_are_rejected() {
        let q = ids(3);
        assert!(validate_reorder(&q, &[mv(q[0], 1), mv(q[1], 2), mv(q[2], 4)]).is_err());
        assert!(validate_reorder(&q, &[mv(q[0], 1), mv(q[1], 1), mv(q[2], 2)]).is_err());
    }
}
