use crate::op::{len_utf16, Operation};

/// Rewrite `a` to account for `b` having already been applied, preserving
/// `a`'s intended effect under concurrency.
///
/// Exhaustive over the 2×2 insert/delete cross-product. Position ties on
/// concurrent inserts order by client timestamp (lower keeps its position),
/// falling back to user id when timestamps collide so the result is
/// deterministic on every replica.
pub fn transform(a: &Operation, b: &Operation) -> Operation {
    let mut out = a.clone();
    match (&mut out, b) {
        (
            Operation::Insert {
                position: p1,
                user_id: u1,
                timestamp: t1,
                ..
            },
            Operation::Insert {
                position: p2,
                text: t2,
                user_id: u2,
                timestamp: ts2,
            },
        ) => {
            let shift = len_utf16(t2);
            if *p1 > *p2 || (*p1 == *p2 && (*t1, u1.as_str()) > (*ts2, u2.as_str())) {
                *p1 = p1.saturating_add(shift);
            }
        }

        (
            Operation::Delete {
                position: p1,
                length: l1,
                ..
            },
            Operation::Delete {
                position: p2,
                length: l2,
                ..
            },
        ) => {
            if *p1 > *p2 {
                *p1 = (*p1).saturating_sub(*l2).max(*p2);
            } else if *p1 == *p2 {
                // The applied delete already removed the shared range. Equal
                // lengths collapse to a no-op: keeping the full length would
                // eat unrelated trailing text (double-delete).
                *l1 = l1.saturating_sub(*l2);
            }
        }

        (
            Operation::Insert { position: p1, .. },
            Operation::Delete {
                position: p2,
                length: l2,
                ..
            },
        ) => {
            if *p1 > p2.saturating_add(*l2) {
                *p1 -= l2;
            } else if *p1 > *p2 {
                // Insert aimed inside the deleted window collapses onto it.
                *p1 = *p2;
            }
        }

        (
            Operation::Delete { position: p1, .. },
            Operation::Insert {
                position: p2,
                text: t2,
                ..
            },
        ) => {
            if *p1 >= *p2 {
                *p1 = p1.saturating_add(len_utf16(t2));
            }
        }
    }
    out
}

/// Fold [`transform`] over `window` in order: the result is `op` rebased
/// onto the end of the window.
pub fn transform_against(op: &Operation, window: &[Operation]) -> Operation {
    window.iter().fold(op.clone(), |acc, b| transform(&acc, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::apply;

    fn insert(position: usize, text: &str, user_id: &str, timestamp: i64) -> Operation {
        Operation::Insert {
            position,
            text: text.to_string(),
            user_id: user_id.to_string(),
            timestamp,
        }
    }

    fn delete(position: usize, length: usize, user_id: &str, timestamp: i64) -> Operation {
        Operation::Delete {
            position,
            length,
            user_id: user_id.to_string(),
            timestamp,
        }
    }

    #[test]
    fn insert_before_insert_unchanged() {
        let a = insert(1, "x", "a", 10);
        let b = insert(5, "yy", "b", 20);
        assert_eq!(transform(&a, &b), a);
    }

    #[test]
    fn insert_after_insert_shifts() {
        let a = insert(5, "x", "a", 10);
        let b = insert(1, "yy", "b", 20);
        assert_eq!(transform(&a, &b).position(), 7);
    }

    #[test]
    fn insert_tie_lower_timestamp_keeps_position() {
        let a = insert(1, "X", "a", 100);
        let b = insert(1, "Y", "b", 200);
        assert_eq!(transform(&a, &b).position(), 1);
        assert_eq!(transform(&b, &a).position(), 2);
    }

    #[test]
    fn insert_tie_equal_timestamps_break_by_user() {
        let a = insert(1, "X", "alice", 100);
        let b = insert(1, "Y", "bob", 100);
        // "alice" < "bob": a keeps, b shifts.
        assert_eq!(transform(&a, &b).position(), 1);
        assert_eq!(transform(&b, &a).position(), 2);
    }

    #[test]
    fn concurrent_inserts_converge() {
        // S2: content "ab", A inserts "X"@1 (ts=100), B inserts "Y"@1 (ts=200).
        let content = "ab";
        let a = insert(1, "X", "a", 100);
        let b = insert(1, "Y", "b", 200);

        // Hub applies A then B-transformed-by-A.
        let after_a = apply(content, &a);
        let one = apply(&after_a, &transform(&b, &a));
        // Opposite arrival order.
        let after_b = apply(content, &b);
        let two = apply(&after_b, &transform(&a, &b));

        assert_eq!(one, "aXYb");
        assert_eq!(two, "aXYb");
    }

    #[test]
    fn delete_before_delete_unchanged() {
        let a = delete(1, 2, "a", 10);
        let b = delete(5, 2, "b", 20);
        assert_eq!(transform(&a, &b), a);
    }

    #[test]
    fn delete_after_delete_shifts_with_floor() {
        let a = delete(6, 2, "a", 10);
        let b = delete(1, 2, "b", 20);
        assert_eq!(transform(&a, &b).position(), 4);

        // Position inside the removed span floors at the span start.
        let c = delete(2, 1, "c", 30);
        let d = delete(1, 4, "d", 40);
        assert_eq!(transform(&c, &d).position(), 1);
    }

    #[test]
    fn delete_same_position_longer_shrinks() {
        let a = delete(3, 5, "a", 10);
        let b = delete(3, 2, "b", 20);
        match transform(&a, &b) {
            Operation::Delete { position, length, .. } => {
                assert_eq!(position, 3);
                assert_eq!(length, 3);
            }
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn delete_same_position_shorter_becomes_noop() {
        let a = delete(3, 2, "a", 10);
        let b = delete(3, 5, "b", 20);
        assert!(transform(&a, &b).is_noop());
    }

    #[test]
    fn identical_deletes_never_double_delete() {
        let content = "abcdef";
        let a = delete(1, 2, "a", 100);
        let b = delete(1, 2, "b", 200);

        let after_a = apply(content, &a);
        let a_then_b = apply(&after_a, &transform(&b, &a));
        let after_b = apply(content, &b);
        let b_then_a = apply(&after_b, &transform(&a, &b));

        assert_eq!(a_then_b, "adef");
        assert_eq!(b_then_a, "adef");
    }

    #[test]
    fn insert_vs_overlapping_delete() {
        // S3: "abcdef", A deletes "bcd" (1,3), B inserts "Z"@3.
        let content = "abcdef";
        let a = delete(1, 3, "a", 100);
        let b = insert(3, "Z", "b", 200);

        let after_a = apply(content, &a);
        let b2 = transform(&b, &a);
        assert_eq!(b2.position(), 1);
        assert_eq!(apply(&after_a, &b2), "aZef");
    }

    #[test]
    fn insert_past_delete_shifts_left() {
        let a = insert(6, "x", "a", 10);
        let b = delete(1, 2, "b", 20);
        assert_eq!(transform(&a, &b).position(), 4);
    }

    #[test]
    fn insert_at_delete_start_unchanged() {
        let a = insert(1, "x", "a", 10);
        let b = delete(1, 3, "b", 20);
        assert_eq!(transform(&a, &b).position(), 1);
    }

    #[test]
    fn delete_after_insert_shifts_right() {
        let a = delete(2, 2, "a", 10);
        let b = insert(1, "yy", "b", 20);
        assert_eq!(transform(&a, &b).position(), 4);

        let c = delete(1, 2, "c", 30);
        assert_eq!(transform(&c, &b).position(), 3);
    }

    #[test]
    fn delete_before_insert_unchanged() {
        let a = delete(0, 1, "a", 10);
        let b = insert(3, "x", "b", 20);
        assert_eq!(transform(&a, &b), a);
    }

    #[test]
    fn hostile_positions_never_overflow() {
        let far_insert = insert(usize::MAX, "x", "a", 10);
        let far_delete = delete(usize::MAX, usize::MAX, "a", 10);
        let near_insert = insert(0, "yy", "b", 20);
        let near_delete = delete(0, 2, "b", 20);

        // Shifting past usize::MAX saturates instead of wrapping.
        assert_eq!(transform(&far_insert, &near_insert).position(), usize::MAX);
        assert_eq!(transform(&far_delete, &near_insert).position(), usize::MAX);
        assert_eq!(transform(&far_insert, &near_delete).position(), usize::MAX - 2);
        assert_eq!(transform(&far_delete, &far_delete.clone()).position(), usize::MAX);
    }

    #[test]
    fn transform_against_noop_is_identity() {
        let noop = insert(0, "", "z", 0);
        let ops = [
            insert(3, "abc", "a", 5),
            delete(2, 4, "a", 6),
        ];
        for op in &ops {
            assert_eq!(transform(op, &noop), *op);
            assert_eq!(transform_against(op, &[noop.clone()]), *op);
        }
    }

    #[test]
    fn transform_against_folds_in_order() {
        let op = insert(4, "x", "a", 10);
        let window = [
            insert(0, "12", "b", 1), // shifts to 6
            delete(1, 3, "c", 2),    // 6 > 1+3 → shifts to 3
        ];
        assert_eq!(transform_against(&op, &window).position(), 3);
    }
}
