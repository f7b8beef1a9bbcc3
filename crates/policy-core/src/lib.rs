//! Shared primitives for the pull-request policy engine workspace.

#![deny(unsafe_code)]

pub mod ids {
    //! Correlation id utilities used by evaluation logs and the simulation harness.

    use uuid::Uuid;

    /// Opaque correlation id (UUID v4 string), threaded through a single evaluation's
    /// tracing spans so a whole rule/predicate walk can be grepped as one unit.
    pub fn new_trace_id() -> String {
        Uuid::new_v4().to_string()
    }

}

pub mod cancellation {
    //! Cooperative cancellation token threaded through `PullContext` IO calls.
    //! The external dispatcher owns the deadline; this crate only supplies the
    //! cheap, clonable flag that evaluators poll at each suspension point.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// A cooperative cancellation flag. Cloning shares the same underlying flag.
    #[derive(Debug, Clone, Default)]
    pub struct CancellationToken {
        cancelled: Arc<AtomicBool>,
    }

    impl CancellationToken {
        /// Create a fresh, not-yet-cancelled token.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Mark this token (and every clone of it) as cancelled.
        pub fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }

        /// True once [`cancel`](Self::cancel) has been called on this token or a clone of it.
        #[must_use]
        pub fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

}
