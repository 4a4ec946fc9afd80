//! Credential rotation
//!
//! Completion keys are tried round-robin. The cursor points at the key the next
//! call starts with; after a successful call it moves one past the key that
//! worked so load spreads across keys between runs. The shell persists it as a
//! single decimal number.

/// Index of the next credential to try, out of `len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCursor {
    next: usize,
    len: usize,
}

impl RotationCursor {
    pub fn new(next: usize, len: usize) -> Self {
        Self {
            next: if len == 0 { 0 } else { next % len },
            len,
        }
    }

    /// Restore a cursor from the persisted state.
    ///
    /// Missing or unreadable state starts at the first credential.
    pub fn from_state(state: Option<&str>, len: usize) -> Self {
        let next = state
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(0);
        Self::new(next, len)
    }

    pub fn to_state(&self) -> String {
        self.next.to_string()
    }

    pub fn next(&self) -> usize {
        self.next
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Credential indices in the order one call should try them.
    pub fn attempt_order(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).map(move |offset| (self.next + offset) % self.len)
    }

    /// Record that credential `index` succeeded.
    pub fn after_success(&mut self, index: usize) {
        if self.len > 0 {
            self.next = (index + 1) % self.len;
        }
    }
}
