pub mod mock_query;
pub mod provider;
pub mod query;

pub use mock_query::MockQueryService;
pub use provider::HostFunctionProvider;
pub use query::{QueryService, ResourceTxInfo, TransactionDraftService, Utxo};
