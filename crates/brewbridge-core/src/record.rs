//! Bus record types and their JSON codec
//!
//! A record is `{ "key": .., "data": { block: {..} } }`. Blocks are kept as raw
//! JSON so that blocks we do not monitor pass through byte-for-byte equivalent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BridgeError;
use crate::state::TriState;

/// One bus message payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Service key that published the record
    pub key: String,
    /// Block name to raw block object
    #[serde(rename = "data")]
    pub blocks: Map<String, Value>,
}

/// Typed view of a binary block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockState {
    /// State requested by the controller
    pub desired_state: TriState,
    /// Last confirmed actuator state
    #[serde(default)]
    pub state: TriState,
    /// Fields we do not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockState {
    #[must_use]
    pub fn new(desired_state: TriState, state: TriState) -> Self {
        Self {
            desired_state,
            state,
            extra: Map::new(),
        }
    }
}

impl StateRecord {
    /// Typed view of block `name`
    ///
    /// # Errors
    /// `BlockNotFound` if the block is absent, `MalformedPayload` if it is not a
    /// binary block.
    pub fn block(&self, name: &str) -> Result<BlockState, BridgeError> {
        let raw = self.blocks.get(name).ok_or_else(|| BridgeError::BlockNotFound {
            key: self.key.clone(),
            block: name.to_string(),
        })?;

        BlockState::deserialize(raw)
            .map_err(|e| BridgeError::MalformedPayload(format!("block {name}: {e}")))
    }

    /// Overwrite the `state` field of block `name`, leaving everything else as-is
    ///
    /// # Errors
    /// `BlockNotFound` if the block is absent or is not a JSON object.
    pub fn set_block_state(&mut self, name: &str, state: TriState) -> Result<(), BridgeError> {
        match self.blocks.get_mut(name) {
            Some(Value::Object(block)) => {
                block.insert("state".to_string(), state.to_json());
                Ok(())
            }
            _ => Err(BridgeError::BlockNotFound {
                key: self.key.clone(),
                block: name.to_string(),
            }),
        }
    }
}

/// Parse a raw bus payload
///
/// # Errors
/// `MalformedPayload` if the bytes are not JSON, `key`/`data` are missing, or
/// `data` is not an object.
pub fn decode(payload: &[u8]) -> Result<StateRecord, BridgeError> {
    serde_json::from_slice(payload).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
}

/// Serialize a record for publishing
///
/// # Errors
/// `MalformedPayload` if the record cannot be serialized.
pub fn encode(record: &StateRecord) -> Result<Vec<u8>, BridgeError> {
    serde_json::to_vec(record).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
}
