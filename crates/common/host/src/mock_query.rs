use std::collections::HashMap;

use alloy_primitives::B256;
use async_trait::async_trait;
use parking_lot::RwLock;
use weisyn_types::transaction::OutPoint;

use crate::query::{QueryService, ResourceTxInfo, Utxo};

/// In-memory query service for tests and local runs.
#[derive(Default)]
pub struct MockQueryService {
    resource_txs: RwLock<HashMap<Vec<u8>, ResourceTxInfo>>,
    utxos: RwLock<HashMap<OutPoint, Utxo>>,
}

impl MockQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resource_tx(&self, resource_hash: &[u8], tx_hash: B256, height: u64) {
        self.resource_txs.write().insert(resource_hash.to_vec(), ResourceTxInfo {
            tx_hash,
            block_hash: B256::ZERO,
            height,
        });
    }

    pub fn insert_utxo(&self, utxo: Utxo) {
        self.utxos.write().insert(utxo.outpoint, utxo);
    }
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn get_resource_tx(&self, resource_hash: &[u8]) -> anyhow::Result<ResourceTxInfo> {
        self.resource_txs
            .read()
            .get(resource_hash)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("resource transaction not found"))
    }

    async fn get_utxo(&self, outpoint: &OutPoint) -> anyhow::Result<Option<Utxo>> {
        Ok(self.utxos.read().get(outpoint).cloned())
    }

    async fn get_utxos_by_address(&self, address: &[u8]) -> anyhow::Result<Vec<Utxo>> {
        Ok(self
            .utxos
            .read()
            .values()
            .filter(|utxo| utxo.owner == address)
            .cloned()
            .collect())
    }
}
