use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use weisyn_metrics::{observe_task_queue_depth, record_task_outcome, time_proof_generation};
use weisyn_types::state_output::{Curve, PENDING_PROOF_BYTES, ProvingScheme, ZkStateProof};

use crate::{
    errors::ProverError,
    input::ZkProofInput,
    queue::TaskQueue,
    registry::CircuitRegistry,
    task::{ZkProofTask, ZkTaskState, ZkTaskStats},
};

#[derive(Debug, Clone)]
pub struct ZkProverConfig {
    pub queue_capacity: usize,
    /// Per-attempt proving deadline; exceeding it fails the task outright.
    pub task_deadline: Duration,
    /// How long finished tasks stay in the store for polling.
    pub task_retention: Duration,
    /// Generation errors are retried up to this many attempts before the
    /// task is marked failed. Deadline and panic failures are terminal.
    pub task_max_attempts: u32,
    pub default_scheme: ProvingScheme,
    pub default_curve: Curve,
}

impl Default for ZkProverConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            task_deadline: Duration::from_secs(300),
            task_retention: Duration::from_secs(3600),
            task_max_attempts: 2,
            default_scheme: ProvingScheme::Groth16,
            default_curve: Curve::Bn254,
        }
    }
}

struct AsyncRuntime {
    queue: Arc<TaskQueue>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    sweeper: JoinHandle<()>,
    min_workers: usize,
    max_workers: usize,
}

type TaskStore = Arc<RwLock<HashMap<String, ZkProofTask>>>;

/// Maps proof inputs to state proofs and manages circuits, keys and the
/// asynchronous proving task lifecycle.
pub struct ZkProofManager {
    registry: Arc<CircuitRegistry>,
    tasks: TaskStore,
    runtime: Mutex<Option<AsyncRuntime>>,
    config: ZkProverConfig,
}

impl ZkProofManager {
    pub fn new(config: ZkProverConfig) -> Self {
        Self {
            registry: Arc::new(CircuitRegistry::with_default_circuits()),
            tasks: Arc::new(RwLock::new(HashMap::new())),
            runtime: Mutex::new(None),
            config,
        }
    }

    pub fn with_registry(config: ZkProverConfig, registry: CircuitRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            tasks: Arc::new(RwLock::new(HashMap::new())),
            runtime: Mutex::new(None),
            config,
        }
    }

    pub fn registry(&self) -> &CircuitRegistry {
        &self.registry
    }

    pub fn default_scheme(&self) -> ProvingScheme {
        self.config.default_scheme
    }

    pub fn default_curve(&self) -> Curve {
        self.config.default_curve
    }

    /// Synchronous generation. Reentrant; concurrent calls for the same
    /// circuit share one compiled constraint system and key pair.
    pub fn generate_state_proof(&self, input: &ZkProofInput) -> Result<ZkStateProof, ProverError> {
        let timer = time_proof_generation(&input.circuit_id);
        let result = self.registry.generate(input);
        timer.observe_duration();
        result
    }

    /// The pending placeholder returned while an asynchronous task is in
    /// flight. Downstream validation must reject it.
    pub fn pending_proof(&self, input: &ZkProofInput) -> ZkStateProof {
        ZkStateProof {
            proof: PENDING_PROOF_BYTES.to_vec(),
            public_inputs: input.public_inputs.clone(),
            proving_scheme: self.config.default_scheme,
            curve: self.config.default_curve,
            verification_key_hash: Vec::new(),
            circuit_id: input.circuit_id.clone(),
            circuit_version: input.circuit_version,
            constraint_count: 0,
            generated_at: None,
        }
    }

    pub fn is_async_enabled(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Start the worker pool. The pool holds between `min_workers` and
    /// `max_workers` workers and starts with `workers`; it is not elastic
    /// at runtime beyond these declared bounds.
    pub fn enable_async(
        &self,
        workers: usize,
        min_workers: usize,
        max_workers: usize,
    ) -> Result<(), ProverError> {
        if min_workers == 0 || workers < min_workers || workers > max_workers {
            return Err(ProverError::InvalidWorkerBounds {
                workers,
                min: min_workers,
                max: max_workers,
            });
        }

        let mut runtime = self.runtime.lock();
        if runtime.is_some() {
            warn!("asynchronous proof generation already enabled");
            return Ok(());
        }

        let queue = Arc::new(TaskQueue::new(self.config.queue_capacity));
        let (shutdown, _) = watch::channel(false);

        let mut handles = Vec::with_capacity(workers);
        for worker_index in 0..workers {
            handles.push(tokio::spawn(worker_loop(
                worker_index,
                self.registry.clone(),
                self.tasks.clone(),
                queue.clone(),
                shutdown.subscribe(),
                self.config.task_deadline,
                self.config.task_max_attempts.max(1),
            )));
        }
        let sweeper = tokio::spawn(retention_sweep(
            self.tasks.clone(),
            shutdown.subscribe(),
            self.config.task_retention,
        ));

        info!(workers, min_workers, max_workers, "async proof generation enabled");
        *runtime = Some(AsyncRuntime {
            queue,
            shutdown,
            workers: handles,
            sweeper,
            min_workers,
            max_workers,
        });
        Ok(())
    }

    /// Stop the worker pool. Queued tasks stay in the store; running
    /// workers exit after their current task.
    pub fn disable_async(&self) {
        let Some(runtime) = self.runtime.lock().take() else {
            return;
        };
        let _ = runtime.shutdown.send(true);
        runtime.sweeper.abort();
        for worker in &runtime.workers {
            worker.abort();
        }
        info!(
            min_workers = runtime.min_workers,
            max_workers = runtime.max_workers,
            "async proof generation disabled"
        );
    }

    /// Enqueue a proving task. The task id is derived from the execution id
    /// and the store size under the store's write lock, which makes it
    /// unique and reproducible per process.
    pub fn submit_task(
        &self,
        execution_id: &str,
        input: ZkProofInput,
        priority: u8,
    ) -> Result<String, ProverError> {
        let runtime = self.runtime.lock();
        let runtime = runtime.as_ref().ok_or(ProverError::AsyncDisabled)?;

        let mut store = self.tasks.write();
        let task_id = format!("zkproof_{execution_id}_{}", store.len());
        store.insert(task_id.clone(), ZkProofTask {
            task_id: task_id.clone(),
            execution_id: execution_id.to_string(),
            input,
            priority,
            deadline: self.config.task_deadline,
            state: ZkTaskState::Queued,
            finished_at: None,
        });

        if let Err(error) = runtime.queue.push(priority, task_id.clone()) {
            store.remove(&task_id);
            return Err(error);
        }
        observe_task_queue_depth(runtime.queue.len() as i64);
        debug!(%task_id, priority, "zk proof task submitted");
        Ok(task_id)
    }

    pub fn get_task(&self, task_id: &str) -> Option<ZkProofTask> {
        self.tasks.read().get(task_id).cloned()
    }

    pub fn get_stats(&self) -> ZkTaskStats {
        let mut stats = ZkTaskStats::default();
        {
            let store = self.tasks.read();
            for task in store.values() {
                match task.state {
                    ZkTaskState::Queued => stats.queued += 1,
                    ZkTaskState::Running => stats.running += 1,
                    ZkTaskState::Completed(_) => stats.completed += 1,
                    ZkTaskState::Failed(_) => stats.failed += 1,
                }
            }
        }
        stats.queue_depth = self
            .runtime
            .lock()
            .as_ref()
            .map(|runtime| runtime.queue.len() as u64)
            .unwrap_or_default();
        stats
    }
}

/// Completion callback: flips the task state under the store's write lock
/// so the transition is atomic with respect to readers.
fn complete_task(tasks: &TaskStore, task_id: &str, outcome: Result<ZkStateProof, String>) {
    let mut store = tasks.write();
    let Some(task) = store.get_mut(task_id) else {
        warn!(%task_id, "completion callback for unknown task");
        return;
    };
    match outcome {
        Ok(proof) => {
            task.state = ZkTaskState::Completed(proof);
            record_task_outcome("completed");
        }
        Err(message) => {
            warn!(%task_id, %message, "zk proof task failed");
            task.state = ZkTaskState::Failed(message);
            record_task_outcome("failed");
        }
    }
    task.finished_at = Some(Instant::now());
}

async fn worker_loop(
    worker_index: usize,
    registry: Arc<CircuitRegistry>,
    tasks: TaskStore,
    queue: Arc<TaskQueue>,
    mut shutdown: watch::Receiver<bool>,
    deadline: Duration,
    max_attempts: u32,
) {
    debug!(worker_index, "zk proof worker started");
    loop {
        let task_id = tokio::select! {
            _ = shutdown.changed() => break,
            task_id = queue.pop() => task_id,
        };
        observe_task_queue_depth(queue.len() as i64);

        let input = {
            let mut store = tasks.write();
            let Some(task) = store.get_mut(&task_id) else {
                warn!(%task_id, "dequeued task missing from store");
                continue;
            };
            task.state = ZkTaskState::Running;
            task.input.clone()
        };

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            let proving_registry = registry.clone();
            let proving_input = input.clone();
            let generation = tokio::time::timeout(
                deadline,
                tokio::task::spawn_blocking(move || proving_registry.generate(&proving_input)),
            )
            .await;

            match generation {
                Err(_) => break Err("proving deadline exceeded".to_string()),
                Ok(Err(join_error)) if join_error.is_panic() => {
                    break Err("proof generation panicked".to_string());
                }
                Ok(Err(_)) => break Err("proving task was cancelled".to_string()),
                Ok(Ok(Ok(proof))) => break Ok(proof),
                Ok(Ok(Err(error))) => {
                    if attempt >= max_attempts {
                        break Err(error.to_string());
                    }
                    warn!(%task_id, attempt, %error, "proof generation failed, retrying");
                }
            }
        };
        complete_task(&tasks, &task_id, outcome);
    }
    debug!(worker_index, "zk proof worker stopped");
}

async fn retention_sweep(
    tasks: TaskStore,
    mut shutdown: watch::Receiver<bool>,
    retention: Duration,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                tasks.write().retain(|_, task| match task.finished_at {
                    Some(finished_at) => finished_at.elapsed() < retention,
                    None => true,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn execution_input() -> ZkProofInput {
        ZkProofInput {
            public_inputs: vec![vec![0x01; 32], vec![0x02; 32], vec![0x03; 32]],
            private_inputs: BTreeMap::from([
                ("state_diff_hash".to_string(), vec![0x05; 32]),
                ("trace_hash".to_string(), vec![0x04; 32]),
            ]),
            circuit_id: "contract_execution".to_string(),
            circuit_version: 1,
        }
    }

    #[test]
    fn test_pending_proof_shape() {
        let manager = ZkProofManager::new(ZkProverConfig::default());
        let pending = manager.pending_proof(&execution_input());

        assert_eq!(pending.proof, PENDING_PROOF_BYTES);
        assert_eq!(pending.constraint_count, 0);
        assert!(pending.verification_key_hash.is_empty());
        assert_eq!(pending.public_inputs.len(), 3);
        assert_eq!(pending.proving_scheme, ProvingScheme::Groth16);
        assert!(pending.is_pending());
    }

    #[test]
    fn test_sync_generation_round_trip() {
        let manager = ZkProofManager::new(ZkProverConfig::default());
        let proof = manager.generate_state_proof(&execution_input()).unwrap();
        assert!(proof.constraint_count > 0);
        assert!(manager.registry().verify(&proof).unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_requires_enabled_async() {
        let manager = ZkProofManager::new(ZkProverConfig::default());
        assert!(matches!(
            manager.submit_task("exec_1", execution_input(), 0),
            Err(ProverError::AsyncDisabled)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_bounds_are_validated() {
        let manager = ZkProofManager::new(ZkProverConfig::default());
        assert!(matches!(
            manager.enable_async(3, 1, 2),
            Err(ProverError::InvalidWorkerBounds { .. })
        ));
        assert!(matches!(
            manager.enable_async(0, 0, 2),
            Err(ProverError::InvalidWorkerBounds { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_async_task_lifecycle() {
        let manager = ZkProofManager::new(ZkProverConfig::default());
        manager.enable_async(1, 1, 2).unwrap();

        let task_id = manager
            .submit_task("exec_1700000000000000000", execution_input(), 1)
            .unwrap();
        assert_eq!(task_id, "zkproof_exec_1700000000000000000_0");

        let mut completed = None;
        for _ in 0..600 {
            let task = manager.get_task(&task_id).expect("task disappeared");
            if task.is_finished() {
                completed = Some(task);
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let task = completed.expect("task did not finish in time");
        let proof = task.proof().expect("task failed instead of completing");
        assert!(proof.constraint_count > 0);

        let stats = manager.get_stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.queued, 0);

        manager.disable_async();
        assert!(!manager.is_async_enabled());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_task_ids_are_sequential_per_store() {
        let manager = ZkProofManager::new(ZkProverConfig::default());
        manager.enable_async(1, 1, 1).unwrap();

        let first = manager.submit_task("exec_7", execution_input(), 0).unwrap();
        let second = manager.submit_task("exec_7", execution_input(), 0).unwrap();
        assert_eq!(first, "zkproof_exec_7_0");
        assert_eq!(second, "zkproof_exec_7_1");

        manager.disable_async();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enable_then_disable_restores_sync_behavior() {
        let manager = ZkProofManager::new(ZkProverConfig::default());
        manager.enable_async(1, 1, 2).unwrap();
        manager.disable_async();

        let proof = manager.generate_state_proof(&execution_input()).unwrap();
        assert!(!proof.is_pending());
        assert!(matches!(
            manager.submit_task("exec_1", execution_input(), 0),
            Err(ProverError::AsyncDisabled)
        ));
    }
}
