//! Shared persistable types for engine tests.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::codec::{to_payload, CodecResult};
use crate::link::{Link, LinkVec};
use crate::persistable::Persistable;
use crate::registry::TypeRegistry;

/// Node with default (eager) recursive loading.
#[derive(Serialize, Deserialize)]
pub(crate) struct EagerNode {
    pub name: String,
    pub next: Link,
}

impl EagerNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next: Link::null(),
        }
    }
}

impl Persistable for EagerNode {
    fn type_tag(&self) -> &'static str {
        "EagerNode"
    }
    fn encode_payload(&self) -> CodecResult<Vec<u8>> {
        to_payload(self)
    }
    fn links(&self) -> Vec<&Link> {
        vec![&self.next]
    }
    fn links_mut(&mut self) -> Vec<&mut Link> {
        vec![&mut self.next]
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Node that opts out of recursive loading: its references stay raw until
/// explicitly loaded.
#[derive(Serialize, Deserialize)]
pub(crate) struct LazyNode {
    pub name: String,
    pub next: Link,
}

impl LazyNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next: Link::null(),
        }
    }
}

impl Persistable for LazyNode {
    fn type_tag(&self) -> &'static str {
        "LazyNode"
    }
    fn encode_payload(&self) -> CodecResult<Vec<u8>> {
        to_payload(self)
    }
    fn links(&self) -> Vec<&Link> {
        vec![&self.next]
    }
    fn links_mut(&mut self) -> Vec<&mut Link> {
        vec![&mut self.next]
    }
    fn recursive_loading(&self) -> bool {
        false
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owner of a one-to-many relation.
#[derive(Serialize, Deserialize)]
pub(crate) struct Team {
    pub name: String,
    pub members: LinkVec,
}

impl Team {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: LinkVec::new(),
        }
    }
}

impl Persistable for Team {
    fn type_tag(&self) -> &'static str {
        "Team"
    }
    fn encode_payload(&self) -> CodecResult<Vec<u8>> {
        to_payload(self)
    }
    fn links(&self) -> Vec<&Link> {
        self.members.links()
    }
    fn links_mut(&mut self) -> Vec<&mut Link> {
        self.members.links_mut()
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Records how many times `on_load` ran; `loads` is a transient field.
#[derive(Serialize, Deserialize)]
pub(crate) struct Probe {
    pub value: i64,
    #[serde(skip)]
    pub loads: u32,
}

impl Probe {
    pub fn new(value: i64) -> Self {
        Self { value, loads: 0 }
    }
}

impl Persistable for Probe {
    fn type_tag(&self) -> &'static str {
        "Probe"
    }
    fn encode_payload(&self) -> CodecResult<Vec<u8>> {
        to_payload(self)
    }
    fn on_load(&mut self) {
        self.loads += 1;
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registry with all fixture types registered.
pub(crate) fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register::<EagerNode>("EagerNode");
    registry.register::<LazyNode>("LazyNode");
    registry.register::<Team>("Team");
    registry.register::<Probe>("Probe");
    registry
}
