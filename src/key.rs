//! Physical key construction

use crate::protocol::MAX_KEY_LENGTH;
use crate::result::{OpResult, ResultCode};

/// Builds store keys as `namespace + logical key`
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    namespace: String,
}

impl KeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix `logical` with the namespace, refusing keys the protocol cannot carry
    pub fn build(&self, logical: &str) -> OpResult<Vec<u8>> {
        let len = self.namespace.len() + logical.len();
        if len > MAX_KEY_LENGTH {
            return Err(ResultCode::KeyTooLong);
        }

        let mut key = Vec::with_capacity(len);
        key.extend_from_slice(self.namespace.as_bytes());
        key.extend_from_slice(logical.as_bytes());
        Ok(key)
    }
}
