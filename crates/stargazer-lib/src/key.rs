//! Deterministic cache keys for normalized search requests.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::request::SearchRequest;

/// Number of digest bytes kept in a resource id.
const KEY_BYTES: usize = 16;

/// Identifier of a cached result set.
///
/// Derived only from the filter fields of a [`SearchRequest`]; pagination never
/// influences it, so every page of one search shares the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Build the id for a normalized request.
    pub fn for_request(request: &SearchRequest) -> Self {
        let digest = Sha256::digest(request.canonical_string().as_bytes());
        Self(hex::encode(&digest[..KEY_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}
