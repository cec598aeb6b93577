//! Immutable, chained request context.
//!
//! A [`Context`] is a handle to a persistent linked list of nodes. Deriving a
//! context with [`Context::with_value`] allocates one new node holding a
//! single key/value pair and a shared reference to the parent node; existing
//! nodes are never rewritten. Lookups walk from the newest node toward the
//! root and return the nearest match, so the most recent write along a chain
//! shadows older ones while sibling chains keep whatever they saw when they
//! were derived.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Typed key for a value carried on a [`Context`].
///
/// Keys are identified by their `TypeId`, so a private key type cannot be
/// shadowed by any other user of the same chain.
pub trait ContextKey: 'static {
    /// Type of the value stored under this key.
    type Value: Send + Sync + 'static;
}

struct Node {
    key: TypeId,
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

/// Per-request context threaded through every pipeline stage.
///
/// Cloning is cheap (one `Arc` bump) and clones share all existing nodes.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

impl Context {
    /// An empty context with no values.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Derive a new context that additionally carries `value` under `K`.
    ///
    /// `self` is left untouched and remains fully usable.
    #[must_use]
    pub fn with_value<K: ContextKey>(&self, value: K::Value) -> Self {
        Self {
            head: Some(Arc::new(Node {
                key: TypeId::of::<K>(),
                value: Box::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Look up the nearest value stored under `K`.
    #[must_use]
    pub fn value<K: ContextKey>(&self) -> Option<&K::Value> {
        let key = TypeId::of::<K>();
        self.nodes()
            .find(|node| node.key == key)
            .and_then(|node| node.value.downcast_ref::<K::Value>())
    }

    /// Number of nodes between this handle and the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.nodes().count()
    }

    /// Whether this handle has no values at all.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.head.is_none()
    }

    fn nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::successors(self.head.as_deref(), |node| node.parent.as_deref())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .finish()
    }
}

impl Drop for Context {
    // Unlinks uniquely-owned ancestors iteratively so a long chain cannot
    // overflow the stack through recursive `Arc` drops.
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            next = match Arc::try_unwrap(node) {
                Ok(mut node) => node.parent.take(),
                Err(_) => None,
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
