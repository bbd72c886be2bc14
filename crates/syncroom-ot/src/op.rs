use serde::{Deserialize, Serialize};

/// A single user-originated edit.
///
/// Wire shape: `{"type":"insert","position":0,"text":"hi",...}` or
/// `{"type":"delete","position":0,"length":2,...}`. `timestamp` is
/// client-monotonic milliseconds, trusted only as a tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Insert {
        position: usize,
        text: String,
        user_id: String,
        timestamp: i64,
    },
    Delete {
        position: usize,
        length: usize,
        user_id: String,
        timestamp: i64,
    },
}

impl Operation {
    pub fn position(&self) -> usize {
        match self {
            Operation::Insert { position, .. } | Operation::Delete { position, .. } => *position,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Operation::Insert { user_id, .. } | Operation::Delete { user_id, .. } => user_id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Operation::Insert { timestamp, .. } | Operation::Delete { timestamp, .. } => *timestamp,
        }
    }

    /// An operation with no effect. Still recorded in the log so that
    /// composition and the transform window stay faithful.
    pub fn is_noop(&self) -> bool {
        match self {
            Operation::Insert { text, .. } => text.is_empty(),
            Operation::Delete { length, .. } => *length == 0,
        }
    }
}

/// Length of a string in UTF-16 code units.
pub fn len_utf16(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Byte index corresponding to a UTF-16 code-unit offset.
///
/// Offsets past the end clamp to the end; an offset landing inside a
/// surrogate pair snaps back to the start of that character.
fn byte_of_utf16(s: &str, offset: usize) -> usize {
    let mut units = 0;
    for (byte_idx, ch) in s.char_indices() {
        let width = ch.len_utf16();
        if offset < units + width {
            return byte_idx;
        }
        units += width;
    }
    s.len()
}

/// Apply `op` to `content`, returning the new content.
///
/// Never fails: pathological positions are clamped into range. Callers
/// that care (the hub does) check [`clamps`] first and log.
pub fn apply(content: &str, op: &Operation) -> String {
    match op {
        Operation::Insert { position, text, .. } => {
            if text.is_empty() {
                return content.to_string();
            }
            let at = byte_of_utf16(content, *position);
            let mut out = String::with_capacity(content.len() + text.len());
            out.push_str(&content[..at]);
            out.push_str(text);
            out.push_str(&content[at..]);
            out
        }
        Operation::Delete {
            position, length, ..
        } => {
            if *length == 0 {
                return content.to_string();
            }
            let start = byte_of_utf16(content, *position);
            let end = byte_of_utf16(content, position.saturating_add(*length));
            let mut out = String::with_capacity(content.len() - (end - start));
            out.push_str(&content[..start]);
            out.push_str(&content[end..]);
            out
        }
    }
}

/// True when applying `op` to `content` would clamp its position or span.
pub fn clamps(content: &str, op: &Operation) -> bool {
    let total = len_utf16(content);
    match op {
        Operation::Insert { position, .. } => *position > total,
        Operation::Delete {
            position, length, ..
        } => position.saturating_add(*length) > total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(position: usize, text: &str) -> Operation {
        Operation::Insert {
            position,
            text: text.to_string(),
            user_id: "u1".to_string(),
            timestamp: 1,
        }
    }

    fn delete(position: usize, length: usize) -> Operation {
        Operation::Delete {
            position,
            length,
            user_id: "u1".to_string(),
            timestamp: 1,
        }
    }

    #[test]
    fn insert_into_empty() {
        assert_eq!(apply("", &insert(0, "hello")), "hello");
    }

    #[test]
    fn insert_mid_string() {
        assert_eq!(apply("ab", &insert(1, "X")), "aXb");
    }

    #[test]
    fn delete_span() {
        assert_eq!(apply("abcdef", &delete(1, 3)), "aef");
    }

    #[test]
    fn positions_are_utf16_units() {
        // '🦀' is two UTF-16 code units; insertion at offset 2 lands after it.
        let content = "🦀ab";
        assert_eq!(apply(content, &insert(2, "X")), "🦀Xab");
        assert_eq!(apply(content, &delete(2, 1)), "🦀b");
    }

    #[test]
    fn offset_inside_surrogate_pair_snaps_to_char_start() {
        assert_eq!(apply("🦀", &insert(1, "x")), "x🦀");
    }

    #[test]
    fn insert_past_end_clamps() {
        let op = insert(99, "!");
        assert!(clamps("ab", &op));
        assert_eq!(apply("ab", &op), "ab!");
    }

    #[test]
    fn delete_past_end_clamps() {
        let op = delete(1, 99);
        assert!(clamps("abc", &op));
        assert_eq!(apply("abc", &op), "a");
    }

    #[test]
    fn extreme_offsets_never_overflow() {
        // A hostile client can put any u64 in position/length; the engine
        // must clamp, not panic.
        let huge_delete = delete(usize::MAX, 1);
        assert!(clamps("abc", &huge_delete));
        assert_eq!(apply("abc", &huge_delete), "abc");

        let huge_span = delete(1, usize::MAX);
        assert_eq!(apply("abc", &huge_span), "a");

        let huge_insert = insert(usize::MAX, "!");
        assert_eq!(apply("ab", &huge_insert), "ab!");
    }

    #[test]
    fn noop_returns_content_unchanged() {
        assert_eq!(apply("abc", &insert(1, "")), "abc");
        assert_eq!(apply("abc", &delete(1, 0)), "abc");
        assert!(insert(1, "").is_noop());
        assert!(delete(1, 0).is_noop());
    }

    #[test]
    fn wire_tag_round_trip() {
        let op = insert(0, "hi");
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""type":"insert""#));
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
