//! Persistence side-channel
//!
//! Nodes are written as MessagePack documents to a `ContentStore`, keyed
//! by the SHA-256 digest of those bytes. Equal nodes built in different
//! nests produce the same bytes and hence the same key.

use crate::errors::Result;
use crate::features::predicate_state::PredicateState;
use crate::features::serialization::domain::WireError;
use crate::features::serialization::infrastructure::{deserialize, serialize, WireFormat, WireNode};
use crate::features::term_algebra::FactoryNest;
use symstate_storage::{ContentKey, ContentStore};
use tracing::debug;

/// Stores `node` and returns its content key
pub fn persist<N: WireNode>(
    store: &dyn ContentStore,
    nest: &FactoryNest,
    node: &N,
) -> Result<ContentKey> {
    let bytes = serialize(nest, node, WireFormat::MessagePack)?;
    let key = store.put(N::KIND, &bytes)?;
    debug!(
        target: "symstate::wire",
        kind = N::KIND.as_str(),
        bytes = bytes.len(),
        key = %key,
        "persisted"
    );
    Ok(key)
}

/// Loads the node stored under `key` into `nest`
pub fn load<N: WireNode>(
    store: &dyn ContentStore,
    nest: &mut FactoryNest,
    key: &ContentKey,
) -> Result<N> {
    let blob = store.fetch(key)?;
    if blob.kind != N::KIND {
        return Err(WireError::BlobKind {
            expected: N::KIND.as_str(),
            found: blob.kind.as_str(),
        }
        .into());
    }
    Ok(deserialize(nest, &blob.bytes, WireFormat::MessagePack)?)
}

pub fn persist_state(
    store: &dyn ContentStore,
    nest: &FactoryNest,
    state: &PredicateState,
) -> Result<ContentKey> {
    persist(store, nest, state)
}

pub fn load_state(
    store: &dyn ContentStore,
    nest: &mut FactoryNest,
    key: &ContentKey,
) -> Result<PredicateState> {
    load(store, nest, key)
}
