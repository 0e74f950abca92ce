//! Identity tokens for nodes and component instances.
//!
//! Instance handles are not stable: the same logical component can be
//! reachable through several handles, and some kinds have no backing object
//! at all. Everything that deduplicates or keys by instance goes through an
//! [`IdentityResolver`], which lives for exactly one fetch.

use crate::page::{Backing, ComponentRuntime, InstanceId, NodeId, ObjectKey};
use std::collections::HashMap;
use std::fmt;

/// Token shared by every absent value.
pub const ABSENT: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ObjectRef {
    Node(NodeId),
    Object(ObjectKey),
}

/// How an instance of a given backing kind gets its identity.
pub trait IdentityStrategy {
    fn identify(
        &self,
        resolver: &mut IdentityResolver,
        runtime: &dyn ComponentRuntime,
        instance: InstanceId,
    ) -> Identity;
}

/// Identity of the durable object behind the instance.
pub struct ObjectBacked;

/// `identity(parent) + "." + siblingIndex` for instances with nothing durable
/// behind them.
pub struct Positional;

impl IdentityStrategy for ObjectBacked {
    fn identify(
        &self,
        resolver: &mut IdentityResolver,
        runtime: &dyn ComponentRuntime,
        instance: InstanceId,
    ) -> Identity {
        match runtime.backing(instance) {
            Backing::Node(node) => resolver.of_node(node),
            Backing::Object(key) => resolver.token_for(ObjectRef::Object(key)),
            Backing::None => Positional.identify(resolver, runtime, instance),
        }
    }
}

impl IdentityStrategy for Positional {
    fn identify(
        &self,
        resolver: &mut IdentityResolver,
        runtime: &dyn ComponentRuntime,
        instance: InstanceId,
    ) -> Identity {
        let parent = match runtime.parent_instance(instance) {
            Some(parent) => resolver.of_instance(runtime, parent),
            None => resolver.of_absent(),
        };
        let index = resolver.sibling_index(runtime, instance);
        Identity(format!("{}.{}", parent, index))
    }
}

fn strategy_for(backing: Backing) -> &'static dyn IdentityStrategy {
    match backing {
        Backing::None => &Positional,
        Backing::Node(_) | Backing::Object(_) => &ObjectBacked,
    }
}

/// Lazily assigned identity tokens, valid for one fetch.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    tokens: HashMap<ObjectRef, Identity>,
    instances: HashMap<InstanceId, Identity>,
    sibling_indexes: HashMap<InstanceId, usize>,
    next_token: u64,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_absent(&self) -> Identity {
        Identity(ABSENT.to_string())
    }

    pub fn of_node(&mut self, node: NodeId) -> Identity {
        self.token_for(ObjectRef::Node(node))
    }

    pub fn of_instance(
        &mut self,
        runtime: &dyn ComponentRuntime,
        instance: InstanceId,
    ) -> Identity {
        if let Some(identity) = self.instances.get(&instance) {
            return identity.clone();
        }
        let identity = strategy_for(runtime.backing(instance)).identify(self, runtime, instance);
        self.instances.insert(instance, identity.clone());
        identity
    }

    pub fn of_optional_instance(
        &mut self,
        runtime: &dyn ComponentRuntime,
        instance: Option<InstanceId>,
    ) -> Identity {
        match instance {
            Some(instance) => self.of_instance(runtime, instance),
            None => self.of_absent(),
        }
    }

    /// Number of sibling links between `instance` and the end of its chain.
    pub fn sibling_index(&mut self, runtime: &dyn ComponentRuntime, instance: InstanceId) -> usize {
        if let Some(index) = self.sibling_indexes.get(&instance) {
            return *index;
        }

        // Walk to the first memoized sibling (or the end), then fill backwards.
        let mut chain = vec![instance];
        let mut base = 0;
        let mut cursor = runtime.next_sibling(instance);
        while let Some(sibling) = cursor {
            if let Some(index) = self.sibling_indexes.get(&sibling) {
                base = index + 1;
                break;
            }
            chain.push(sibling);
            cursor = runtime.next_sibling(sibling);
        }

        for (offset, member) in chain.iter().rev().enumerate() {
            self.sibling_indexes.insert(*member, base + offset);
        }
        self.sibling_indexes[&instance]
    }

    fn token_for(&mut self, object: ObjectRef) -> Identity {
        if let Some(identity) = self.tokens.get(&object) {
            return identity.clone();
        }
        let identity = Identity(self.next_token.to_string());
        self.next_token += 1;
        self.tokens.insert(object, identity.clone());
        identity
    }
}
