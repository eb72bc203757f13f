//! Snapshot wire format: a JSON array of goods in ascending id order.

use goods_core::{Good, GoodsResult, StorageError};

pub fn encode_snapshot(goods: &[Good]) -> GoodsResult<Vec<u8>> {
    serde_json::to_vec(goods).map_err(|e| StorageError::from(e).into())
}

pub fn decode_snapshot(bytes: &[u8]) -> GoodsResult<Vec<Good>> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::Cache {
            reason: format!("corrupt snapshot: {}", e),
        }
        .into()
    })
}
