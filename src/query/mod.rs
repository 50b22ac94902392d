//! Query support: result sets, the best-first candidate queue and
//! cooperative cancellation.

mod queue;
mod result;

pub use queue::{Candidate, CandidateQueue};
pub use result::{ResultPair, ResultSet};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag checked between page fetches.
///
/// Cancelling does not fail the query: the traversal stops early and the
/// partial result set reports `complete() == false`.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the queries holding this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Re-arm the token for the next query
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}
