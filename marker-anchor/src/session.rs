use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one scan session. Work captured under an older generation is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}", self.0)
    }
}

/// A monotonically increasing scan session counter shared between the frame callback and the
/// workers.
///
/// Every pipeline run captures the current [`Generation`] when it starts and checks
/// [`ScanSession::is_current`] before any side effect. A rescan bumps the counter so that every
/// run in flight discards its result.
#[derive(Debug, Default)]
pub struct ScanSession {
    generation: AtomicU64,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Generation {
        Generation(self.generation.load(Ordering::Acquire))
    }

    /// Captures the token a new pipeline run carries.
    pub fn begin(&self) -> Generation {
        self.current()
    }

    /// Invalidates all outstanding work and returns the new generation.
    pub fn rescan(&self) -> Generation {
        Generation(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescan_invalidates() {
        let session = ScanSession::new();
        let token = session.begin();
        assert!(session.is_current(token));
        let next = session.rescan();
        assert!(!session.is_current(token));
        assert!(session.is_current(next));
        assert!(next > token);
        assert_eq!(next.to_string(), "session 1");
    }
}
