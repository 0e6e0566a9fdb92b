use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Value, json};
use weisyn_context::ExecutionContext;
use weisyn_types::transaction::OutPoint;

use crate::query::QueryService;

/// Installs the chain-query ports into a context's host ABI before engine
/// execution. Registration happens once per context; no provider state is
/// mutated afterward.
pub struct HostFunctionProvider {
    query_service: Arc<dyn QueryService>,
}

impl HostFunctionProvider {
    pub fn new(query_service: Arc<dyn QueryService>) -> Self {
        Self { query_service }
    }

    pub fn register(&self, context: &ExecutionContext) {
        let service = self.query_service.clone();
        context.register_host_function(
            "get_resource_tx",
            Arc::new(
                move |params: Value| -> BoxFuture<'static, anyhow::Result<Value>> {
                    let service = service.clone();
                    Box::pin(async move {
                        let resource_hash = decode_hex_param(&params, "resource_hash")?;
                        let info = service.get_resource_tx(&resource_hash).await?;
                        Ok(serde_json::to_value(info)?)
                    })
                },
            ),
        );

        let service = self.query_service.clone();
        context.register_host_function(
            "get_utxo",
            Arc::new(
                move |params: Value| -> BoxFuture<'static, anyhow::Result<Value>> {
                    let service = service.clone();
                    Box::pin(async move {
                        let outpoint: OutPoint = serde_json::from_value(params)?;
                        let utxo = service.get_utxo(&outpoint).await?;
                        Ok(serde_json::to_value(utxo)?)
                    })
                },
            ),
        );

        let service = self.query_service.clone();
        context.register_host_function(
            "get_utxos_by_address",
            Arc::new(
                move |params: Value| -> BoxFuture<'static, anyhow::Result<Value>> {
                    let service = service.clone();
                    Box::pin(async move {
                        let address = decode_hex_param(&params, "address")?;
                        let utxos = service.get_utxos_by_address(&address).await?;
                        Ok(json!(utxos))
                    })
                },
            ),
        );
    }
}

fn decode_hex_param(params: &Value, field: &str) -> anyhow::Result<Vec<u8>> {
    let encoded = params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing {field} parameter"))?;
    Ok(alloy_primitives::hex::decode(encoded)?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use weisyn_context::{ContextManagerConfig, ContextParams, ExecutionContextManager, InitParams};
    use weisyn_types::timestamp::ClockTimestamp;

    use super::*;
    use crate::mock_query::MockQueryService;

    fn new_context() -> Arc<ExecutionContext> {
        let manager = ExecutionContextManager::new(ContextManagerConfig {
            tick_interval: Duration::from_micros(1),
            ..Default::default()
        });
        manager
            .create_context(ContextParams {
                execution_id: "exec_host".to_string(),
                caller_address: vec![0x10; 20],
                contract_address: None,
                model_hash: None,
                init_params: InitParams::Absent,
                execution_start: ClockTimestamp::from_unix_seconds(1_700_000_000),
                transaction_draft: None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_registered_queries_reach_the_service() {
        let service = Arc::new(MockQueryService::new());
        service.set_resource_tx(&[0xAA; 32], [0xBB; 32].into(), 7);

        let context = new_context();
        HostFunctionProvider::new(service).register(&context);

        let result = context
            .call_host_function(
                "get_resource_tx",
                json!({ "resource_hash": alloy_primitives::hex::encode([0xAA; 32]) }),
            )
            .await
            .unwrap();
        assert_eq!(result["height"], json!(7));

        let trace = context.execution_trace();
        assert_eq!(trace.host_function_calls.len(), 1);
        assert_eq!(context.resources().snapshot(0).resource_queries, 1);
    }
}
