//! Invariant PPT Testing Framework
//!
//! Runtime invariant checking plus contract tests that prove the checks ran.
//! Session invariants are asserted on the lifecycle worker and the frame
//! queue thread, so the log is process-wide rather than thread-local.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crabcamera_session::assert_invariant;
//!
//! assert_invariant!(
//!     previous.is_none(),
//!     "at most one active capture session per view",
//!     "view"
//! );
//!
//! // In tests, after driving a configuration pass
//! contract_test("single flight", &["at most one active capture session per view"]);
//! ```

use std::collections::HashSet;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

/// Assert an invariant and log it for contract testing.
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    {
        let mut log = INVARIANT_LOG.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !log.contains(message) {
            log.insert(message.to_string());
        }
    }

    if !condition {
        let ctx = context.unwrap_or("unknown");
        log::error!("Invariant violated [{}]: {}", ctx, message);
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Whether an invariant has been checked at least once in this process
pub fn invariant_checked(message: &str) -> bool {
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains(message)
}

/// Check that specific invariants were verified during test execution.
///
/// # Panics
/// Panics if any required invariant was not checked.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !invariant_checked(invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_invariant_is_logged() {
        assert_invariant!(true, "invariant log records passing checks", "test");
        assert!(invariant_checked("invariant log records passing checks"));
        contract_test("log", &["invariant log records passing checks"]);
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [test]")]
    fn test_violation_panics() {
        assert_invariant!(false, "invariant violation panics", "test");
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE")]
    fn test_missing_invariant_fails_contract() {
        contract_test("missing", &["an invariant nobody ever checks"]);
    }
}
