//! Lock helpers for state shared between concurrent generation tasks.

use std::sync::{Mutex, MutexGuard};

/// Extension trait for `Mutex` that ignores lock poisoning.
///
/// A panicking sub-task must not make the usage ledger or the response cache
/// unreadable for the rest of the reading; the data they hold stays valid
/// after any single push or insert.
pub trait IgnoreLock<T> {
    /// Locks the mutex, recovering the guard from a poisoned lock.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnoreLock<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn test_poisoned_lock_still_readable() {
        let shared = Mutex::new(vec![1u32]);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut guard = shared.lock_ignore_poison();
            guard.push(2);
            panic!("poison the lock");
        }));
        assert!(result.is_err());
        assert!(shared.is_poisoned());
        assert_eq!(*shared.lock_ignore_poison(), vec![1, 2]);
    }
}
