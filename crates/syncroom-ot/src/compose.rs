use crate::op::{len_utf16, Operation};

/// Compact a sequence by merging adjacent operations from the same user:
/// contiguous inserts (`p₁ + |t₁| = p₂`) and same-position deletes.
/// Everything else is preserved in order. Used to keep the per-file
/// operation log window dense.
pub fn compose(ops: &[Operation]) -> Vec<Operation> {
    let mut out: Vec<Operation> = Vec::with_capacity(ops.len());
    for op in ops {
        if let Some(last) = out.last_mut() {
            if merge(last, op) {
                continue;
            }
        }
        out.push(op.clone());
    }
    out
}

/// Try to fold `next` into `last` in place. Returns true on success.
fn merge(last: &mut Operation, next: &Operation) -> bool {
    if last.user_id() != next.user_id() {
        return false;
    }
    match (last, next) {
        (
            Operation::Insert {
                position: p1,
                text: t1,
                timestamp: ts1,
                ..
            },
            Operation::Insert {
                position: p2,
                text: t2,
                timestamp: ts2,
                ..
            },
        ) if p1.saturating_add(len_utf16(t1)) == *p2 => {
            t1.push_str(t2);
            *ts1 = *ts2;
            true
        }
        (
            Operation::Delete {
                position: p1,
                length: l1,
                timestamp: ts1,
                ..
            },
            Operation::Delete {
                position: p2,
                length: l2,
                timestamp: ts2,
                ..
            },
        ) if *p1 == *p2 => {
            *l1 = l1.saturating_add(*l2);
            *ts1 = *ts2;
            true
        }
        _ => false,
    }
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
    fn contiguous_inserts_merge() {
        let ops = [insert(0, "he", "a", 1), insert(2, "llo", "a", 2)];
        let composed = compose(&ops);
        assert_eq!(composed, vec![insert(0, "hello", "a", 2)]);
    }

    #[test]
    fn same_position_deletes_merge() {
        // Forward-delete twice at the same offset.
        let ops = [delete(3, 1, "a", 1), delete(3, 2, "a", 2)];
        let composed = compose(&ops);
        assert_eq!(composed, vec![delete(3, 3, "a", 2)]);
    }

    #[test]
    fn different_users_never_merge() {
        let ops = [insert(0, "he", "a", 1), insert(2, "llo", "b", 2)];
        assert_eq!(compose(&ops).len(), 2);
    }

    #[test]
    fn non_contiguous_inserts_preserved_in_order() {
        let ops = [insert(0, "ab", "a", 1), insert(5, "cd", "a", 2)];
        assert_eq!(compose(&ops), ops.to_vec());
    }

    #[test]
    fn singleton_compose_is_identity_under_apply() {
        let op = insert(2, "xy", "a", 7);
        let composed = compose(std::slice::from_ref(&op));
        assert_eq!(composed.len(), 1);
        assert_eq!(apply("abcd", &composed[0]), apply("abcd", &op));
    }

    #[test]
    fn merged_run_applies_like_the_sequence() {
        let content = "||";
        let ops = [
            insert(1, "a", "a", 1),
            insert(2, "b", "a", 2),
            insert(3, "c", "a", 3),
        ];
        let mut sequential = content.to_string();
        for op in &ops {
            sequential = apply(&sequential, op);
        }
        let composed = compose(&ops);
        assert_eq!(composed.len(), 1);
        assert_eq!(apply(content, &composed[0]), sequential);
    }
}
