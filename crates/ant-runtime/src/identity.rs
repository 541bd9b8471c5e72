//! Coordinator identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one coordinator instance.
///
/// Every plugin and capability records the id it was built against;
/// registries compare ids to reject items owned by another coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AntId(u64);

impl AntId {
    /// Allocates a fresh identity, distinct from every id allocated before.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for AntId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ant#{}", self.0)
    }
}
