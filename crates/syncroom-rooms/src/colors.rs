use std::collections::HashMap;

/// Fixed cursor palette, cycled per hub instance.
const PALETTE: [&str; 8] = [
    "#e06c75", "#61afef", "#98c379", "#e5c07b", "#c678dd", "#56b6c2", "#d19a66", "#abb2bf",
];

/// Stable color assignment for the participants of one room.
///
/// A user keeps their color for the lifetime of their presence entry;
/// rejoining after a release may yield a different one. State is per-hub,
/// so color cycles never leak across rooms.
#[derive(Default)]
pub struct ColorAllocator {
    assigned: HashMap<String, String>,
    next: usize,
}

impl ColorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, user_id: &str) -> String {
        if let Some(color) = self.assigned.get(user_id) {
            return color.clone();
        }
        let color = PALETTE[self.next % PALETTE.len()].to_string();
        self.next += 1;
        self.assigned.insert(user_id.to_string(), color.clone());
        color
    }

    pub fn release(&mut self, user_id: &str) {
        self.assigned.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_is_stable() {
        let mut colors = ColorAllocator::new();
        let first = colors.assign("u1");
        colors.assign("u2");
        assert_eq!(colors.assign("u1"), first);
    }

    #[test]
    fn palette_cycles_after_eight_users() {
        let mut colors = ColorAllocator::new();
        let first = colors.assign("u0");
        for i in 1..8 {
            colors.assign(&format!("u{i}"));
        }
        assert_eq!(colors.assign("u8"), first);
    }

    #[test]
    fn release_frees_the_user_not_the_slot() {
        let mut colors = ColorAllocator::new();
        colors.assign("u1");
        colors.release("u1");
        // Re-assignment advances the cycle instead of reusing the old slot.
        assert_eq!(colors.assign("u1"), PALETTE[1]);
    }
}
