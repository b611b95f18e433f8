//! Byte encodings of wire documents
//!
//! JSON for inspection and fixtures, MessagePack (named fields) for
//! persistence. Both carry the same document.

use super::codec::{WireDecoder, WireEncoder};
use crate::features::predicate_state::PredicateState;
use crate::features::serialization::domain::{
    PredicateEnvelope, StateEnvelope, TermEnvelope, TypeEnvelope, WireDocument, WireResult,
};
use crate::features::term_algebra::{FactoryNest, PredicateId, TermId, TypeId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use symstate_storage::BlobKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    Json,
    #[default]
    MessagePack,
}

impl WireFormat {
    pub fn encode<T: Serialize>(&self, doc: &WireDocument<T>) -> WireResult<Vec<u8>> {
        match self {
            WireFormat::Json => Ok(serde_json::to_vec(doc)?),
            WireFormat::MessagePack => Ok(rmp_serde::to_vec_named(doc)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> WireResult<WireDocument<T>> {
        match self {
            WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
            WireFormat::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

/// A node family with a wire envelope
pub trait WireNode: Sized {
    type Envelope: Serialize + DeserializeOwned;

    /// Blob kind used when the node is persisted
    const KIND: BlobKind;

    fn encode(&self, enc: &mut WireEncoder<'_>) -> Self::Envelope;

    fn decode(dec: &mut WireDecoder<'_>, env: &Self::Envelope) -> WireResult<Self>;
}

impl WireNode for TypeId {
    type Envelope = TypeEnvelope;
    const KIND: BlobKind = BlobKind::Type;

    fn encode(&self, enc: &mut WireEncoder<'_>) -> TypeEnvelope {
        enc.type_(*self)
    }

    fn decode(dec: &mut WireDecoder<'_>, env: &TypeEnvelope) -> WireResult<Self> {
        dec.type_(env)
    }
}

impl WireNode for TermId {
    type Envelope = TermEnvelope;
    const KIND: BlobKind = BlobKind::Term;

    fn encode(&self, enc: &mut WireEncoder<'_>) -> TermEnvelope {
        enc.term(*self)
    }

    fn decode(dec: &mut WireDecoder<'_>, env: &TermEnvelope) -> WireResult<Self> {
        dec.term(env)
    }
}

impl WireNode for PredicateId {
    type Envelope = PredicateEnvelope;
    const KIND: BlobKind = BlobKind::Predicate;

    fn encode(&self, enc: &mut WireEncoder<'_>) -> PredicateEnvelope {
        enc.predicate(*self)
    }

    fn decode(dec: &mut WireDecoder<'_>, env: &PredicateEnvelope) -> WireResult<Self> {
        dec.predicate(env)
    }
}

impl WireNode for PredicateState {
    type Envelope = StateEnvelope;
    const KIND: BlobKind = BlobKind::State;

    fn encode(&self, enc: &mut WireEncoder<'_>) -> StateEnvelope {
        enc.state(self)
    }

    fn decode(dec: &mut WireDecoder<'_>, env: &StateEnvelope) -> WireResult<Self> {
        dec.state(env)
    }
}

/// Document for `node`
pub fn to_document<N: WireNode>(nest: &FactoryNest, node: &N) -> WireDocument<N::Envelope> {
    let mut enc = WireEncoder::new(nest);
    let root = node.encode(&mut enc);
    enc.finish(root)
}

/// Re-interns a document into `nest`
pub fn from_document<N: WireNode>(
    nest: &mut FactoryNest,
    doc: &WireDocument<N::Envelope>,
) -> WireResult<N> {
    let mut dec = WireDecoder::new(nest);
    dec.prepare(doc)?;
    N::decode(&mut dec, &doc.root)
}

pub fn serialize<N: WireNode>(
    nest: &FactoryNest,
    node: &N,
    format: WireFormat,
) -> WireResult<Vec<u8>> {
    format.encode(&to_document(nest, node))
}

pub fn deserialize<N: WireNode>(
    nest: &mut FactoryNest,
    bytes: &[u8],
    format: WireFormat,
) -> WireResult<N> {
    let doc: WireDocument<N::Envelope> = format.decode(bytes)?;
    from_document(nest, &doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::serialization::domain::{WireError, WIRE_VERSION};
    use crate::features::term_algebra::Signedness;

    #[test]
    fn test_json_and_msgpack_agree() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(16, Signedness::Unsigned);
        let ptr = nest.types().pointer_to(int);

        let json = serialize(&nest, &ptr, WireFormat::Json).unwrap();
        let mp = serialize(&nest, &ptr, WireFormat::MessagePack).unwrap();
        let mut other = FactoryNest::new();
        let a: TypeId = deserialize(&mut other, &json, WireFormat::Json).unwrap();
        let b: TypeId = deserialize(&mut other, &mp, WireFormat::MessagePack).unwrap();
        assert_eq!(a, b);
        let pointed = other.type_factory().pointed(a).unwrap();
        assert_eq!(other.type_factory().bitsize(pointed), Some(16));
        assert_eq!(other.type_factory().display(a), nest.type_factory().display(ptr));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let nest = FactoryNest::new();
        let mut doc = to_document(&nest, &PredicateState::empty());
        doc.version = WIRE_VERSION + 1;
        let bytes = WireFormat::Json.encode(&doc).unwrap();
        let mut other = FactoryNest::new();
        let err = deserialize::<PredicateState>(&mut other, &bytes, WireFormat::Json).unwrap_err();
        assert!(matches!(err, WireError::Version { .. }));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let mut nest = FactoryNest::new();
        assert!(matches!(
            deserialize::<TermId>(&mut nest, b"{not json", WireFormat::Json),
            Err(WireError::Json(_))
        ));
        assert!(matches!(
            deserialize::<TermId>(&mut nest, &[0xc1], WireFormat::MessagePack),
            Err(WireError::MessagePackDecode(_))
        ));
    }
}
