//! In-process observability glue for policy evaluations: an installable observer
//! hook, a low-cardinality counter registry, and an audit sink for test
//! inspection. Mirrors the shape of a typical decision-engine's observer/metrics
//! pairing, adapted from `{phase, kind, action}` to `{phase, status}`.

use crate::result::{EvalResult, Status};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

/// Observer invoked for each top-level policy evaluation.
///
/// Install an implementation via [`set_observer`] to receive callbacks for both
/// the approval and disapproval evaluations of a pull request. Implementations
/// must be cheap and non-blocking; avoid I/O on hot paths.
pub trait PolicyObserver: Send + Sync {
    /// Called once per top-level evaluation with the evaluation phase
    /// (`"approval"` or `"disapproval"`) and its result.
    fn on_result(&self, phase: &str, result: &EvalResult);
}

static OBSERVER: OnceLock<RwLock<Option<Arc<dyn PolicyObserver>>>> = OnceLock::new();

/// Install or clear the global policy observer used by this crate.
///
/// Passing `Some(Box::new(obs))` installs the observer; passing `None` clears it.
pub fn set_observer(observer: Option<Box<dyn PolicyObserver>>) {
    let cell = OBSERVER.get_or_init(|| RwLock::new(None));
    let mut w = cell.write().expect("observer write lock poisoned");
    *w = observer.map(Arc::from);
}

fn status_str(status: Status) -> &'static str {
    match status {
        Status::Skipped => "skipped",
        Status::Pending => "pending",
        Status::Approved => "approved",
        Status::Disapproved => "disapproved",
        Status::Error => "error",
    }
}

/// In-process counters for policy results keyed by `{phase, status}`.
///
/// Low-cardinality by construction; intended for tests and local observability.
/// Not persisted across process restarts.
#[derive(Default)]
pub struct PolicyMetrics {
    inner: Arc<Mutex<HashMap<String, u64>>>,
}

impl PolicyMetrics {
    /// Read the current count for a given `{phase, status}` pair.
    #[must_use]
    pub fn count(&self, phase: &str, status: &str) -> u64 {
        let key = format!("{phase}:{status}");
        self.inner.lock().expect("metrics lock poisoned").get(&key).copied().unwrap_or(0)
    }

    fn inc(&self, phase: &str, status: &str) {
        let mut g = self.inner.lock().expect("metrics lock poisoned");
        *g.entry(format!("{phase}:{status}")).or_insert(0) += 1;
    }
}

static METRICS: OnceLock<PolicyMetrics> = OnceLock::new();

/// Access the global policy metrics registry.
#[must_use]
pub fn policy_metrics() -> &'static PolicyMetrics {
    METRICS.get_or_init(PolicyMetrics::default)
}

/// Audit record for a single top-level policy evaluation.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub phase: String,
    pub status: Status,
    pub status_description: String,
}

/// Handle for draining captured audit records. Cheap to clone; thread-safe.
#[derive(Clone)]
pub struct AuditSink {
    inner: Arc<Mutex<Vec<AuditRecord>>>,
}

impl AuditSink {
    /// Drain and return all captured audit records.
    pub fn drain(&self) -> Vec<AuditRecord> {
        let mut g = self.inner.lock().expect("audit lock poisoned");
        std::mem::take(&mut *g)
    }
}

static AUDIT: OnceLock<AuditSink> = OnceLock::new();

/// Install (or retrieve) the process-global audit sink.
pub fn install_audit_sink() -> AuditSink {
    if let Some(s) = AUDIT.get() {
        return s.clone();
    }
    let sink = AuditSink { inner: Arc::new(Mutex::new(Vec::new())) };
    let _ = AUDIT.set(sink.clone());
    sink
}

/// Notify the installed observer, increment the metrics registry, and append to
/// the audit sink (if installed) for a single top-level evaluation. Called by the
/// dispatcher after running the approval or disapproval evaluator.
pub fn record(phase: &str, result: &EvalResult) {
    let metrics = METRICS.get_or_init(PolicyMetrics::default);
    metrics.inc(phase, status_str(result.status));

    if let Some(lock) = OBSERVER.get() {
        if let Ok(r) = lock.read() {
            if let Some(obs) = r.as_ref() {
                obs.on_result(phase, result);
            }
        }
    }

    if let Some(s) = AUDIT.get() {
        let mut g = s.inner.lock().expect("audit lock poisoned");
        g.push(AuditRecord {
            phase: phase.to_string(),
            status: result.status,
            status_description: result.status_description.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::EvalResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn approved(name: &str) -> EvalResult {
        EvalResult {
            name: name.to_string(),
            description: String::new(),
            status: Status::Approved,
            status_description: "Approved by alice".to_string(),
            error: None,
            approvers: vec![],
            dismissals: vec![],
            review_request_rule: None,
            predicate_results: vec![],
            children: vec![],
        }
    }

    struct CountingObserver(Arc<AtomicUsize>);
    impl PolicyObserver for CountingObserver {
        fn on_result(&self, _phase: &str, _result: &EvalResult) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn metrics_increment_by_phase_and_status() {
        let before = policy_metrics().count("test-approval", "approved");
        record("test-approval", &approved("r1"));
        assert_eq!(policy_metrics().count("test-approval", "approved"), before + 1);
    }

    #[test]
    fn installed_observer_is_notified() {
        let calls = Arc::new(AtomicUsize::new(0));
        set_observer(Some(Box::new(CountingObserver(calls.clone()))));
        record("test-observer", &approved("r1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        set_observer(None);
    }
}
