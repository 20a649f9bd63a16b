use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::codec::{from_payload, CodecError, CodecResult};
use crate::persistable::Persistable;

type DecodeFn = Box<dyn Fn(&[u8]) -> CodecResult<Box<dyn Persistable>> + Send + Sync>;

/// Maps type tags to decode functions.
///
/// When a raw stub is loaded, only its bytes identify the concrete type:
/// the codec reads the type tag from the frame and asks the registry to
/// materialize an object of the right type. Every persistable type must be
/// registered before objects of that type can be loaded.
pub struct TypeRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a type whose payload is bincode-encoded (the
    /// [`to_payload`](crate::codec::to_payload) convention).
    pub fn register<T>(&mut self, tag: &'static str)
    where
        T: Persistable + DeserializeOwned + 'static,
    {
        self.register_with(tag, |bytes| {
            let value: T = from_payload(bytes)?;
            Ok(Box::new(value) as Box<dyn Persistable>)
        });
    }

    /// Register a type with a custom payload decoder.
    pub fn register_with<F>(&mut self, tag: &'static str, decode: F)
    where
        F: Fn(&[u8]) -> CodecResult<Box<dyn Persistable>> + Send + Sync + 'static,
    {
        self.decoders.insert(tag, Box::new(decode));
    }

    /// Decode a payload under the given tag.
    pub fn decode(&self, tag: &str, payload: &[u8]) -> CodecResult<Box<dyn Persistable>> {
        let decoder = self
            .decoders
            .get(tag)
            .ok_or_else(|| CodecError::UnknownTypeTag(tag.to_string()))?;
        decoder(payload)
    }

    /// Returns `true` if a decoder is registered under `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<&str> = self.decoders.keys().copied().collect();
        tags.sort_unstable();
        f.debug_struct("TypeRegistry").field("tags", &tags).finish()
    }
}
