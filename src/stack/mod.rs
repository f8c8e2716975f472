//! Stack Module
//!
//! Two concurrent LIFO stacks with the same observable contract:
//!
//! - [`LockFreeStack`]: Treiber's CAS retry loop over a shared head, with
//!   epoch-based reclamation of popped nodes
//! - [`LockedStack`]: head and counter behind a single mutex, used as the
//!   correctness and throughput baseline
//!
//! Both count every completed `push` and every completed `pop`, including a
//! `pop` that found the stack empty.

use core::fmt;
use core::str::FromStr;

pub mod lock_free;
pub mod locked;

pub use lock_free::LockFreeStack;
pub use locked::LockedStack;


#[cfg(test)]
mod proptests;


/// The operation surface shared by every stack variant
///
/// Implementations are linearizable: each call takes effect at a single
/// instant between its invocation and its return.
pub trait ConcurrentStack<T>: Send + Sync {
    /// Push `value` on top of the stack
    fn push(&self, value: T);

    /// Remove and return the top value, or `None` if the stack was empty
    fn pop(&self) -> Option<T>;

    /// Number of completed `push` and `pop` calls, empty pops included
    fn counter(&self) -> u64;

    /// Snapshot emptiness check
    fn is_empty(&self) -> bool;

    /// Which implementation this is
    fn variant(&self) -> StackVariant;
}

/// Names the available stack implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackVariant {
    /// [`LockFreeStack`]
    LockFree,
    /// [`LockedStack`]
    Locked,
}

impl StackVariant {
    /// Every variant, in reporting order
    pub const ALL: [StackVariant; 2] = [StackVariant::LockFree, StackVariant::Locked];
}

impl fmt::Display for StackVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackVariant::LockFree => f.write_str("lock-free"),
            StackVariant::Locked => f.write_str("locked"),
        }
    }
}

impl FromStr for StackVariant {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lock-free" | "lockfree" | "lock_free" | "treiber" => Ok(StackVariant::LockFree),
            "locked" | "lock-based" | "mutex" | "baseline" => Ok(StackVariant::Locked),
            _ => Err(crate::Error::UnknownVariant(s.to_string())),
        }
    }
}
