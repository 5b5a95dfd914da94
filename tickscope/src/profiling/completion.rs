//! Single-assignment result cell

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A value set at most once, readable by any number of waiters
///
/// Later [`complete`](Self::complete) calls are ignored.
#[derive(Debug)]
pub struct CompletionCell<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Default for CompletionCell<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }
}

impl<T: Clone> CompletionCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` unless already set; returns whether it was stored
    pub fn complete(&self, value: T) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.ready.notify_all();
        true
    }

    pub fn is_complete(&self) -> bool {
        self.lock().is_some()
    }

    /// The value, without blocking
    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }

    /// Block until the value is set
    pub fn wait(&self) -> T {
        let mut slot = self.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let slot = self.lock();
        let (slot, _) = self
            .ready
            .wait_timeout_while(slot, timeout, |value| value.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        slot.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_completion_wins() {
        let cell = CompletionCell::new();
        assert!(!cell.is_complete());
        assert!(cell.complete(1));
        assert!(!cell.complete(2));
        assert_eq!(cell.get(), Some(1));
    }

    #[test]
    fn test_wait_blocks_until_completed() {
        let cell = Arc::new(CompletionCell::new());
        let setter = {
            let cell = cell.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                cell.complete("done".to_string());
            })
        };
        assert_eq!(cell.wait(), "done");
        setter.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let cell: CompletionCell<u8> = CompletionCell::new();
        assert_eq!(cell.wait_timeout(Duration::from_millis(10)), None);
        cell.complete(3);
        assert_eq!(cell.wait_timeout(Duration::from_millis(10)), Some(3));
    }
}
