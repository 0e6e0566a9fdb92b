use std::time::{Duration, Instant};

use weisyn_types::state_output::ZkStateProof;

use crate::input::ZkProofInput;

#[derive(Debug, Clone, PartialEq)]
pub enum ZkTaskState {
    Queued,
    Running,
    Completed(ZkStateProof),
    Failed(String),
}

impl ZkTaskState {
    pub fn label(&self) -> &'static str {
        match self {
            ZkTaskState::Queued => "queued",
            ZkTaskState::Running => "running",
            ZkTaskState::Completed(_) => "completed",
            ZkTaskState::Failed(_) => "failed",
        }
    }
}

/// One asynchronous proving task. The task store is the single source of
/// truth for lookups; dequeueing never removes the store entry.
#[derive(Debug, Clone)]
pub struct ZkProofTask {
    pub task_id: String,
    pub execution_id: String,
    pub input: ZkProofInput,
    pub priority: u8,
    pub deadline: Duration,
    pub state: ZkTaskState,
    pub finished_at: Option<Instant>,
}

impl ZkProofTask {
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            ZkTaskState::Completed(_) | ZkTaskState::Failed(_)
        )
    }

    pub fn proof(&self) -> Option<&ZkStateProof> {
        match &self.state {
            ZkTaskState::Completed(proof) => Some(proof),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZkTaskStats {
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub queue_depth: u64,
}
