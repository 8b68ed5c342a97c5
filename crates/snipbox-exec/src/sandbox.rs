//! Scoped activation of the restricted execution context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use snipbox_engine::{Access, AccessDenied, AccessGate};

use crate::error::SandboxError;
use crate::filter::{ExecutionFilter, Verdict};

/// Cloneable handle to the restricted context of one evaluator.
///
/// The sandbox is the [`AccessGate`] handed to the engine. It is fail-closed:
/// while no sandboxed action is running every access is denied, so an engine
/// that runs code outside [`Sandbox::run_in_sandbox`] gets nothing.
#[derive(Debug, Clone)]
pub struct Sandbox {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    filter: ExecutionFilter,
    active: AtomicBool,
}

/// Deactivates the context when dropped, including during unwinding.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Sandbox {
    #[must_use]
    pub fn new(filter: ExecutionFilter) -> Self {
        Self {
            inner: Arc::new(Inner {
                filter,
                active: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn filter(&self) -> &ExecutionFilter {
        &self.inner.filter
    }

    /// Run `action` with the restricted context active. The context is torn
    /// down on every exit path, including a panic inside `action`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::AlreadyActive`] if another action is running.
    pub fn run_in_sandbox<T>(&self, action: impl FnOnce() -> T) -> Result<T, SandboxError> {
        let _guard = self.activate()?;
        Ok(action())
    }

    fn activate(&self) -> Result<ActiveGuard<'_>, SandboxError> {
        self.inner
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SandboxError::AlreadyActive)?;
        Ok(ActiveGuard(&self.inner.active))
    }
}

impl AccessGate for Sandbox {
    fn check(&self, access: &Access<'_>) -> Result<(), AccessDenied> {
        if !self.is_active() {
            tracing::warn!(%access, "access outside an active sandbox denied");
            return Err(AccessDenied::new(format!(
                "{access} denied: restricted context is not active"
            )));
        }
        match self.inner.filter.check(access) {
            Verdict::Allow => Ok(()),
            Verdict::Deny(reason) => {
                tracing::debug!(%access, %reason, "access denied by policy");
                Err(AccessDenied::new(format!("access denied: {reason}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;

    fn sandbox() -> Sandbox {
        Sandbox::new(
            ExecutionFilter::from_lists(["java.nio"], ["java.io.File"], ["java.lang.System#exit"])
                .unwrap(),
        )
    }

    #[test]
    fn fail_closed_when_inactive() {
        let sb = sandbox();
        assert!(!sb.is_active());
        let err = sb.check(&Access::Class("java.lang.Math")).unwrap_err();
        assert!(err.message.contains("not active"));
    }

    #[test]
    fn active_applies_policy() {
        let sb = sandbox();
        sb.run_in_sandbox(|| {
            assert!(sb.is_active());
            assert!(sb.check(&Access::Class("java.lang.Math")).is_ok());
            let err = sb.check(&Access::Class("java.io.File")).unwrap_err();
            assert_eq!(err.message, "access denied: class java.io.File is blocked");
        })
        .unwrap();
        assert!(!sb.is_active());
    }

    #[test]
    fn returns_action_result() {
        let sb = sandbox();
        assert_eq!(sb.run_in_sandbox(|| 41 + 1), Ok(42));
    }

    #[test]
    fn nested_use_rejected() {
        let sb = sandbox();
        let inner = sb.run_in_sandbox(|| sb.run_in_sandbox(|| ())).unwrap();
        assert_eq!(inner, Err(SandboxError::AlreadyActive));
        assert!(!sb.is_active());
    }

    #[test]
    fn concurrent_use_rejected() {
        let sb = sandbox();
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let worker = {
            let sb = sb.clone();
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            std::thread::spawn(move || {
                sb.run_in_sandbox(|| {
                    entered.wait();
                    release.wait();
                })
            })
        };
        entered.wait();
        assert_eq!(sb.run_in_sandbox(|| ()), Err(SandboxError::AlreadyActive));
        release.wait();
        assert!(worker.join().unwrap().is_ok());
        assert!(sb.run_in_sandbox(|| ()).is_ok());
    }

    #[test]
    fn deactivated_after_panic() {
        let sb = sandbox();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sb.run_in_sandbox(|| panic!("engine blew up"))
        }));
        assert!(result.is_err());
        assert!(!sb.is_active());
        assert!(sb.check(&Access::Class("java.lang.Math")).is_err());
    }
}
