use super::types::Turn;

/// Append-and-trim policy bounding a session's message log.
///
/// The retention cap is decoupled from the prompt window: a long audit trail
/// is kept so callers can vary the window per read without refetching.
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow {
    max_size: usize,
}

impl HistoryWindow {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    #[must_use]
    pub fn max_size(self) -> usize {
        self.max_size
    }

    /// Push to the end; evict from the front (pure FIFO) until within bound.
    pub fn append(self, history: &mut Vec<Turn>, turn: Turn) {
        history.push(turn);
        if history.len() > self.max_size {
            let excess = history.len() - self.max_size;
            history.drain(..excess);
        }
    }

    /// The last `min(window, len)` turns, oldest first, without mutating.
    /// A zero window reads empty; an oversized window reads everything.
    #[must_use]
    pub fn windowed_read(history: &[Turn], window: usize) -> Vec<Turn> {
        let start = history.len().saturating_sub(window);
        history[start..].to_vec()
    }
}
