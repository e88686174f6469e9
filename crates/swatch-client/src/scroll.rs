//! Page scroll lock held while an edit modal is open.

/// Whether the page behind a modal may scroll.
///
/// Owned by the component view; nothing else toggles it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollLock {
    locked: bool,
}

impl ScrollLock {
    /// Locks scrolling; returns false when it was already locked.
    pub fn lock(&mut self) -> bool {
        !std::mem::replace(&mut self.locked, true)
    }

    /// Unlocks scrolling; returns false when it was not locked.
    pub fn unlock(&mut self) -> bool {
        std::mem::replace(&mut self.locked, false)
    }

    /// Current state.
    #[must_use]
    pub fn is_locked(self) -> bool {
        self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_and_unlock_report_transitions() {
        let mut scroll = ScrollLock::default();
        assert!(scroll.lock());
        assert!(!scroll.lock());
        assert!(scroll.is_locked());
        assert!(scroll.unlock());
        assert!(!scroll.unlock());
        assert!(!scroll.is_locked());
    }
}
