//! # treiber-stack
//!
//! A concurrent LIFO stack that any number of producer and consumer threads can
//! share without locks, together with a coarse-locked baseline and a timed
//! throughput driver that compares the two.
//!
//! ## Features
//!
//! - **Lock-free stack**: Treiber's algorithm with epoch-based reclamation
//! - **Locked stack**: one mutex around head and counter, used as a baseline
//! - **Operation counter**: exact count of completed `push` and `pop` calls
//! - **Throughput driver**: N pushers and M poppers for a fixed wall-clock window
//!
//! ## Quick Start
//!
//! ```rust
//! use treiber_stack::stack::{ConcurrentStack, LockFreeStack};
//!
//! let stack = LockFreeStack::new();
//! stack.push(42);
//! assert_eq!(stack.pop(), Some(42));
//! assert_eq!(stack.pop(), None);
//!
//! // empty pops are still operations
//! assert_eq!(stack.counter(), 3);
//! ```
//!
//! ## Thread Safety
//!
//! Both stacks are `Send + Sync` for `T: Send` and are meant to be shared
//! through an `Arc` without further synchronization.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod driver;
pub mod metrics;
pub mod stack;

pub use crate::driver::{run_throughput, run_variant, DriverConfig, StackVariant, ThroughputReport};
pub use crate::stack::{ConcurrentStack, LockFreeStack, LockedStack};

/// Common utilities and helper types
pub mod util {
    use core::fmt;
    use core::str::FromStr;
    use std::time::Duration;

    /// How a thread pauses after losing a compare-and-swap race
    ///
    /// Every policy is bounded per attempt: a failed CAS never turns into an
    /// unbounded wait.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum BackoffPolicy {
        /// Exponential spin with a capped number of `spin_loop` hints
        Spin,
        /// Spin for the first few attempts, then yield the time slice
        #[default]
        Snooze,
        /// Park the thread for a short fixed timeout
        Park(Duration),
    }

    impl BackoffPolicy {
        /// Park for one nanosecond, the shortest pause the OS will honour
        pub const PARK_MIN: BackoffPolicy = BackoffPolicy::Park(Duration::from_nanos(1));

        /// Start a fresh backoff sequence for one operation
        #[inline]
        pub fn start(self) -> Backoff {
            Backoff {
                policy: self,
                inner: crossbeam_utils::Backoff::new(),
            }
        }
    }

    impl fmt::Display for BackoffPolicy {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                BackoffPolicy::Spin => f.write_str("spin"),
                BackoffPolicy::Snooze => f.write_str("snooze"),
                BackoffPolicy::Park(d) => write!(f, "park:{}", d.as_nanos()),
            }
        }
    }

    impl FromStr for BackoffPolicy {
        type Err = crate::Error;

        /// Accepts `spin`, `snooze`, `park` (1ns) or `park:<nanos>`
        fn from_str(s: &str) -> crate::Result<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "spin" => Ok(BackoffPolicy::Spin),
                "snooze" => Ok(BackoffPolicy::Snooze),
                "park" => Ok(BackoffPolicy::PARK_MIN),
                other => other
                    .strip_prefix("park:")
                    .and_then(|nanos| nanos.parse::<u64>().ok())
                    .filter(|&nanos| nanos > 0)
                    .map(|nanos| BackoffPolicy::Park(Duration::from_nanos(nanos)))
                    .ok_or_else(|| crate::Error::UnknownBackoff(s.to_string())),
            }
        }
    }

    /// Per-operation backoff state created by [`BackoffPolicy::start`]
    #[derive(Debug)]
    pub struct Backoff {
        policy: BackoffPolicy,
        inner: crossbeam_utils::Backoff,
    }

    impl Backoff {
        /// Pause once after a failed CAS
        #[inline]
        pub fn pause(&self) {
            match self.policy {
                BackoffPolicy::Spin => self.inner.spin(),
                BackoffPolicy::Snooze => self.inner.snooze(),
                BackoffPolicy::Park(timeout) => std::thread::park_timeout(timeout),
            }
        }
    }
}

/// Errors raised by the throughput driver and by parsing its configuration
///
/// Stack operations themselves never fail: an empty `pop` is `None`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Driver configuration cannot produce a meaningful run
    #[error("invalid driver configuration: {0}")]
    InvalidConfig(String),
    /// The OS refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// A worker thread panicked before it could be joined
    #[error("worker thread `{0}` panicked")]
    WorkerPanicked(String),
    /// Unrecognised stack variant name
    #[error("unknown stack variant `{0}` (expected `lock-free` or `locked`)")]
    UnknownVariant(String),
    /// Unrecognised backoff policy name
    #[error("unknown backoff policy `{0}` (expected `spin`, `snooze`, `park` or `park:<nanos>`)")]
    UnknownBackoff(String),
}

/// Result type for driver operations
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::util::BackoffPolicy;
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_backoff_policy_parse() {
        assert_eq!("spin".parse::<BackoffPolicy>().unwrap(), BackoffPolicy::Spin);
        assert_eq!("Snooze".parse::<BackoffPolicy>().unwrap(), BackoffPolicy::Snooze);
        assert_eq!("park".parse::<BackoffPolicy>().unwrap(), BackoffPolicy::PARK_MIN);
        assert_eq!(
            "park:250".parse::<BackoffPolicy>().unwrap(),
            BackoffPolicy::Park(Duration::from_nanos(250))
        );
        assert!(matches!(
            "park:0".parse::<BackoffPolicy>(),
            Err(Error::UnknownBackoff(_))
        ));
        assert!(matches!(
            "sleep".parse::<BackoffPolicy>(),
            Err(Error::UnknownBackoff(_))
        ));
    }

    #[test]
    fn test_backoff_policy_display_round_trips() {
        for policy in [BackoffPolicy::Spin, BackoffPolicy::Snooze, BackoffPolicy::PARK_MIN] {
            assert_eq!(policy.to_string().parse::<BackoffPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_backoff_pause_is_bounded() {
        for policy in [BackoffPolicy::Spin, BackoffPolicy::Snooze, BackoffPolicy::PARK_MIN] {
            let backoff = policy.start();
            for _ in 0..64 {
                backoff.pause();
            }
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::InvalidConfig("duration must be non-zero".into()).to_string(),
            "invalid driver configuration: duration must be non-zero"
        );
        assert_eq!(
            Error::WorkerPanicked("pusher-0".into()).to_string(),
            "worker thread `pusher-0` panicked"
        );
    }
}
