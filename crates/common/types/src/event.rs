use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::timestamp::ClockTimestamp;

/// Engine events mapped to the common shape surfaced on execution results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub contract: String,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub timestamp: ClockTimestamp,
}
