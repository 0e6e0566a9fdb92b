use prometheus_exporter::prometheus::{
    HistogramTimer, HistogramVec, IntCounterVec, IntGaugeVec, default_registry,
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry,
};

// Instruments are private; callers go through the domain functions below.
// Registration can only fail on a duplicate name, which is a programming
// error, so construction panics up front.
lazy_static::lazy_static! {
    static ref PROOF_GENERATION_TIME: HistogramVec = histogram(
        "weisyn_proof_generation_time",
        "Duration of zero-knowledge proof generation",
        &["circuit_id"],
    );

    static ref EXECUTION_TIME: HistogramVec = histogram(
        "weisyn_execution_time",
        "End-to-end duration of coordinated executions",
        &["engine"],
    );

    static ref ZK_TASK_QUEUE_DEPTH: IntGaugeVec = gauge(
        "weisyn_zk_task_queue_depth",
        "Number of queued asynchronous proving tasks",
        &[],
    );

    static ref ACTIVE_EXECUTION_CONTEXTS: IntGaugeVec = gauge(
        "weisyn_active_execution_contexts",
        "Execution contexts currently alive",
        &[],
    );

    static ref ZK_TASKS_FINISHED: IntCounterVec = counter(
        "weisyn_zk_tasks_finished",
        "Completed and failed asynchronous proving tasks",
        &["outcome"],
    );
}

fn gauge(name: &str, help: &str, labels: &[&str]) -> IntGaugeVec {
    register_int_gauge_vec_with_registry!(name, help, labels, default_registry())
        .unwrap_or_else(|error| panic!("gauge {name} failed to register: {error}"))
}

fn counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    register_int_counter_vec_with_registry!(name, help, labels, default_registry())
        .unwrap_or_else(|error| panic!("counter {name} failed to register: {error}"))
}

fn histogram(name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    register_histogram_vec_with_registry!(name, help, labels, default_registry())
        .unwrap_or_else(|error| panic!("histogram {name} failed to register: {error}"))
}

/// Time one proof generation; call `observe_duration()` on the returned
/// timer when the proof is ready (or let it observe on drop).
pub fn time_proof_generation(circuit_id: &str) -> HistogramTimer {
    PROOF_GENERATION_TIME
        .with_label_values(&[circuit_id])
        .start_timer()
}

/// Time one coordinated execution, labelled by engine (`wasm` / `onnx`).
pub fn time_execution(engine: &str) -> HistogramTimer {
    EXECUTION_TIME.with_label_values(&[engine]).start_timer()
}

pub fn observe_task_queue_depth(depth: i64) {
    ZK_TASK_QUEUE_DEPTH.with_label_values(&[]).set(depth);
}

pub fn observe_active_contexts(count: i64) {
    ACTIVE_EXECUTION_CONTEXTS.with_label_values(&[]).set(count);
}

/// Count a finished proving task by outcome (`completed` / `failed`).
pub fn record_task_outcome(outcome: &str) {
    ZK_TASKS_FINISHED.with_label_values(&[outcome]).inc();
}
