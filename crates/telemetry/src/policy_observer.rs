#![allow(clippy::module_name_repetitions)]

use once_cell::sync::OnceCell;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;

struct Instruments {
    counter: Counter<u64>,
}

static INSTR: OnceCell<Instruments> = OnceCell::new();

fn ensure_instruments() -> &'static Instruments {
    INSTR.get_or_init(|| {
        // Use the global meter provider (may be a no-op if OTLP not initialized).
        let meter: Meter = global::meter("policybot.evaluation");
        let counter = meter
            .u64_counter("policy.result.count")
            .with_description("Top-level policy evaluation result counter")
            .init();
        Instruments { counter }
    })
}

fn status_str(status: policy::Status) -> &'static str {
    match status {
        policy::Status::Skipped => "skipped",
        policy::Status::Pending => "pending",
        policy::Status::Approved => "approved",
        policy::Status::Disapproved => "disapproved",
        policy::Status::Error => "error",
    }
}

/// OTel-backed observer for top-level approval/disapproval evaluations.
#[derive(Clone, Copy, Debug, Default)]
pub struct OtelPolicyObserver;

impl policy::PolicyObserver for OtelPolicyObserver {
    fn on_result(&self, phase: &str, result: &policy::EvalResult) {
        let inst = ensure_instruments();
        let attrs = [
            KeyValue::new("phase", phase.to_string()),
            KeyValue::new("status", status_str(result.status).to_string()),
        ];
        inst.counter.add(1, &attrs);
    }
}

/// Return an observer instance. Prefer a new value instead of &'static for simplicity.
pub fn global() -> OtelPolicyObserver {
    let _ = ensure_instruments();
    OtelPolicyObserver
}
