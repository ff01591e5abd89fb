//! Linear undo/redo over full snapshots.
//!
//! The log always holds at least one snapshot. Recording after an undo discards
//! everything past the current position, so history never branches.

/// A linear log of snapshots with a cursor.
#[derive(Debug, Clone)]
pub struct UndoHistory<T> {
    log: Vec<T>,
    index: usize,
}

impl<T: Default> Default for UndoHistory<T> {
    /// Starts with a single empty snapshot, so the first recorded change can be undone.
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> UndoHistory<T> {
    /// Creates a history whose only entry is `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            log: vec![initial],
            index: 0,
        }
    }

    /// The snapshot at the cursor.
    pub fn current(&self) -> &T {
        &self.log[self.index]
    }

    /// Records a new snapshot after the cursor, discarding the redo branch.
    pub fn record(&mut self, snapshot: T) {
        self.log.truncate(self.index + 1);
        self.log.push(snapshot);
        self.index = self.log.len() - 1;
    }

    /// Steps back one snapshot. Returns the new current snapshot, or `None` at the start.
    pub fn undo(&mut self) -> Option<&T> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        log::debug!("Undo to history entry {}/{}", self.index, self.log.len() - 1);
        Some(&self.log[self.index])
    }

    /// Steps forward one snapshot. Returns the new current snapshot, or `None` at the tip.
    pub fn redo(&mut self) -> Option<&T> {
        if self.index + 1 >= self.log.len() {
            return None;
        }
        self.index += 1;
        log::debug!("Redo to history entry {}/{}", self.index, self.log.len() - 1);
        Some(&self.log[self.index])
    }

    /// Returns true if there is a snapshot before the cursor.
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    /// Returns true if there is a snapshot after the cursor.
    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.log.len()
    }

    /// Position of the cursor.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of snapshots in the log.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Never true: the log always holds the initial snapshot.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_single_empty_entry() {
        let history: UndoHistory<Vec<u32>> = UndoHistory::default();
        assert_eq!(history.len(), 1);
        assert_eq!(history.index(), 0);
        assert!(history.current().is_empty());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_after_first_record_returns_to_empty() {
        let mut history: UndoHistory<Vec<u32>> = UndoHistory::default();
        history.record(vec![1]);

        assert_eq!(history.undo(), Some(&Vec::new()));
        assert!(history.current().is_empty());
    }

    #[test]
    fn test_undo_at_start_and_redo_at_tip_are_noops() {
        let mut history = UndoHistory::new(0);
        assert_eq!(history.undo(), None);
        assert_eq!(history.index(), 0);

        history.record(1);
        assert_eq!(history.redo(), None);
        assert_eq!(history.index(), 1);
        assert_eq!(*history.current(), 1);
    }

    #[test]
    fn test_undo_redo_walks_the_log() {
        let mut history = UndoHistory::new(0);
        history.record(1);
        history.record(2);

        assert_eq!(history.undo(), Some(&1));
        assert_eq!(history.undo(), Some(&0));
        assert_eq!(history.redo(), Some(&1));
        assert_eq!(history.redo(), Some(&2));
    }

    #[test]
    fn test_record_after_undo_discards_redo_branch() {
        let mut history = UndoHistory::new(0);
        history.record(1);
        history.record(2);
        history.record(3);
        history.undo();
        history.undo();

        history.record(10);
        assert_eq!(history.len(), 3);
        assert_eq!(*history.current(), 10);
        assert!(!history.can_redo());
        assert_eq!(history.undo(), Some(&1));
    }
}
