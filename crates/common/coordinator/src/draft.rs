use alloy_primitives::B256;
use weisyn_types::{
    execution_proof::ExecutionProof,
    transaction::{OutPoint, TransactionDraft, TxInput},
};

/// Append the execution-proof reference input to a draft and mirror the
/// proof onto every spending input that has no unlocking proof yet.
///
/// The reference input points at output 0 of the resource transaction that
/// registered the executed contract.
pub fn append_execution_proof(
    draft: &mut TransactionDraft,
    resource_tx_hash: B256,
    proof: &ExecutionProof,
) {
    for input in draft
        .inputs
        .iter_mut()
        .filter(|input| !input.is_reference && input.unlocking_proof.is_none())
    {
        input.execution_proof = Some(proof.clone());
    }

    draft.inputs.push(TxInput {
        previous_output: OutPoint {
            txid: resource_tx_hash,
            vout: 0,
        },
        is_reference: true,
        unlocking_proof: None,
        execution_proof: Some(proof.clone()),
    });
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use alloy_primitives::Address;
    use weisyn_types::execution_proof::{ExecutionContextInfo, ExecutionType, IdentityProof};

    use super::*;

    fn sample_proof() -> ExecutionProof {
        ExecutionProof {
            execution_result_hash: B256::from_slice(&[0x01; 32]),
            state_id: B256::from_slice(&[0x02; 32]),
            execution_time_ms: 1,
            context: ExecutionContextInfo {
                caller_identity: IdentityProof {
                    caller_address: vec![0x10; 20],
                    algorithm: "secp256k1".to_string(),
                    sighash_type: 1,
                    timestamp: 0,
                    context_hash: B256::ZERO,
                    public_key: vec![],
                    signature: vec![],
                    nonce: vec![],
                },
                resource_address: Address::ZERO,
                execution_type: ExecutionType::ContractCall,
                input_data_hash: B256::ZERO,
                output_data_hash: B256::ZERO,
                metadata: BTreeMap::new(),
            },
        }
    }

    fn spending_input(unlocked: bool) -> TxInput {
        TxInput {
            previous_output: OutPoint {
                txid: B256::from_slice(&[0x0A; 32]),
                vout: 1,
            },
            is_reference: false,
            unlocking_proof: unlocked.then(|| vec![0xFF]),
            execution_proof: None,
        }
    }

    #[test]
    fn test_reference_input_is_appended() {
        let mut draft = TransactionDraft::default();
        let resource_tx = B256::from_slice(&[0x0B; 32]);
        append_execution_proof(&mut draft, resource_tx, &sample_proof());

        assert_eq!(draft.inputs.len(), 1);
        let appended = &draft.inputs[0];
        assert!(appended.is_reference);
        assert_eq!(appended.previous_output, OutPoint {
            txid: resource_tx,
            vout: 0
        });
        assert!(appended.execution_proof.is_some());
    }

    #[test]
    fn test_proof_is_mirrored_onto_locked_spending_inputs() {
        let mut draft = TransactionDraft {
            inputs: vec![spending_input(false), spending_input(true)],
            ..Default::default()
        };
        append_execution_proof(&mut draft, B256::from_slice(&[0x0B; 32]), &sample_proof());

        // locked input gets the proof, unlocked one is left alone
        assert!(draft.inputs[0].execution_proof.is_some());
        assert!(draft.inputs[1].execution_proof.is_none());
        assert_eq!(draft.inputs.len(), 3);
    }
}
