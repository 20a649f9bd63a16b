use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::persistable::Persistable;
use crate::registry::TypeRegistry;

/// Errors from object encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),

    /// The encoded type tag has no registered decoder.
    #[error("unknown type tag: {0:?}")]
    UnknownTypeTag(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Serialize a concrete object's fields to the payload representation used
/// by [`BincodeCodec`]. Intended for `Persistable::encode_payload` impls.
pub fn to_payload<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Deserialize a payload produced by [`to_payload`].
pub fn from_payload<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Object serializer boundary.
///
/// A codec turns a persistable object into the byte sequence handed to the
/// backing store and back. References are encoded as OIDs (links serialize
/// as their assigned OID); non-reference fields round-trip byte-exact. The
/// concrete type of a decoded object is recovered through the
/// [`TypeRegistry`].
pub trait ObjectCodec: Send + Sync {
    /// Encode an object's fields to bytes.
    fn encode(&self, object: &dyn Persistable) -> CodecResult<Vec<u8>>;

    /// Decode bytes into a freshly materialized object of its original
    /// concrete type.
    fn decode(&self, bytes: &[u8], registry: &TypeRegistry) -> CodecResult<Box<dyn Persistable>>;
}

/// On-store framing for [`BincodeCodec`]: type tag + opaque payload.
#[derive(Serialize, Deserialize)]
struct Frame {
    tag: String,
    payload: Vec<u8>,
}

/// Default codec: the object's payload (produced by `encode_payload`) framed
/// with its type tag, both bincode-encoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl ObjectCodec for BincodeCodec {
    fn encode(&self, object: &dyn Persistable) -> CodecResult<Vec<u8>> {
        let frame = Frame {
            tag: object.type_tag().to_string(),
            payload: object.encode_payload()?,
        };
        bincode::serialize(&frame).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8], registry: &TypeRegistry) -> CodecResult<Box<dyn Persistable>> {
        let frame: Frame =
            bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        registry.decode(&frame.tag, &frame.payload)
    }
}
