use alloy_primitives::B256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weisyn_types::transaction::{OutPoint, TransactionDraft, TxInput, TxOutput};

/// Location of the on-chain transaction that registered a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTxInfo {
    pub tx_hash: B256,
    pub block_hash: B256,
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub amount: u64,
    pub owner: Vec<u8>,
}

/// Chain queries consumed by the host ABI and the coordinator. Backed by
/// on-chain storage outside this crate.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn get_resource_tx(&self, resource_hash: &[u8]) -> anyhow::Result<ResourceTxInfo>;

    async fn get_utxo(&self, outpoint: &OutPoint) -> anyhow::Result<Option<Utxo>>;

    async fn get_utxos_by_address(&self, address: &[u8]) -> anyhow::Result<Vec<Utxo>>;
}

/// Draft lifecycle service consumed by callers that accumulate a
/// transaction across executions. The coordinator itself only rewrites the
/// draft it is handed through the execution context.
#[async_trait]
pub trait TransactionDraftService: Send + Sync {
    async fn create(&self, draft_id: &str) -> anyhow::Result<TransactionDraft>;

    async fn load(&self, draft_id: &str) -> anyhow::Result<Option<TransactionDraft>>;

    async fn save(&self, draft: &TransactionDraft) -> anyhow::Result<()>;

    async fn delete(&self, draft_id: &str) -> anyhow::Result<()>;

    async fn seal(&self, draft_id: &str) -> anyhow::Result<TransactionDraft>;

    async fn add_input(&self, draft_id: &str, input: TxInput) -> anyhow::Result<()>;

    async fn add_output(&self, draft_id: &str, output: TxOutput) -> anyhow::Result<()>;
}
