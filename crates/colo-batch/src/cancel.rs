use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation shared by every worker of a sweep.
///
/// Fires when [`cancel`](Self::cancel) is called or the deadline passes.
/// Workers check it before starting a point; points already running finish
/// within the solver time limit derived from the deadline.
#[derive(Debug, Clone, Default)]
pub struct SweepCancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl SweepCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline_passed()
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, `None` without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = SweepCancellation::new();
        let worker = token.clone();
        assert!(!worker.is_cancelled());
        token.cancel();
        assert!(worker.is_cancelled());
        assert_eq!(worker.remaining(), None);
    }

    #[test]
    fn expired_deadline_cancels() {
        let token = SweepCancellation::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        assert_eq!(token.remaining(), Some(Duration::ZERO));

        let later = SweepCancellation::with_timeout(Duration::from_secs(3600));
        assert!(!later.is_cancelled());
        assert!(later.remaining().unwrap() > Duration::from_secs(3000));
    }
}
