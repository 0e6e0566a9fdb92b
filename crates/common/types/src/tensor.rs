use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorInput {
    pub name: String,
    pub shape: Vec<u64>,
    pub dtype: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorOutput {
    pub name: String,
    pub shape: Vec<u64>,
    pub dtype: String,
    pub data: Vec<u8>,
}
