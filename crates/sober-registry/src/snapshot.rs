//! Persisted state

use serde::{Deserialize, Serialize};

use sober_core::{BlockState, DriverRecord};

/// Ordered, append-only log of verified drivers.
///
/// Insertion order is significant and entries are never deduplicated or
/// removed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverHistory(Vec<DriverRecord>);

impl DriverHistory {
    pub fn new() -> Self {
        DriverHistory(Vec::new())
    }

    pub fn append(&mut self, record: DriverRecord) {
        self.0.push(record);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&DriverRecord> {
        self.0.last()
    }

    pub fn records(&self) -> &[DriverRecord] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &DriverRecord> {
        self.0.iter()
    }
}

impl From<Vec<DriverRecord>> for DriverHistory {
    fn from(records: Vec<DriverRecord>) -> Self {
        DriverHistory(records)
    }
}

/// Everything the registry stores, as one unit
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub history: DriverHistory,
    pub block: Option<BlockState>,
}

impl RegistrySnapshot {
    pub fn new(history: DriverHistory, block: Option<BlockState>) -> Self {
        RegistrySnapshot { history, block }
    }
}
