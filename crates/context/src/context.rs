//! Hierarchical per-request state container.
//!
//! A [`Context`] carries the conversation and mutable key/value state for one
//! logical interaction. Hand-offs create child contexts that can read the
//! parent's accumulated state but never mutate it: lookups fall back to the
//! parent chain, writes are always local.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::message::Message;

/// A unique identifier for a workflow (one logical interaction chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct Inner {
    parent: Option<Weak<Inner>>,
    conversation: RwLock<Vec<Message>>,
    state: RwLock<HashMap<String, Value>>,
    resources: RwLock<HashMap<String, Value>>,
    memory: RwLock<HashMap<String, Value>>,
    auth: RwLock<HashMap<String, Value>>,
    preferences: RwLock<HashMap<String, Value>>,
    collected: RwLock<HashSet<String>>,
    actions: RwLock<Vec<String>>,
    workflow_id: OnceLock<WorkflowId>,
}

type Partition = fn(&Inner) -> &RwLock<HashMap<String, Value>>;

impl Inner {
    /// Look up a key in the given partition, falling back to the parent chain.
    fn lookup(&self, partition: Partition, key: &str) -> Option<Value> {
        if let Some(value) = read(partition(self)).get(key) {
            return Some(value.clone());
        }
        let mut ancestor = self.parent.as_ref().and_then(Weak::upgrade);
        while let Some(inner) = ancestor {
            if let Some(value) = read(partition(&inner)).get(key) {
                return Some(value.clone());
            }
            ancestor = inner.parent.as_ref().and_then(Weak::upgrade);
        }
        None
    }

    /// Find a workflow id already assigned anywhere up the chain.
    fn find_workflow_id(&self) -> Option<WorkflowId> {
        if let Some(id) = self.workflow_id.get() {
            return Some(*id);
        }
        let mut ancestor = self.parent.as_ref().and_then(Weak::upgrade);
        while let Some(inner) = ancestor {
            if let Some(id) = inner.workflow_id.get() {
                return Some(*id);
            }
            ancestor = inner.parent.as_ref().and_then(Weak::upgrade);
        }
        None
    }
}

/// Recover the guard from a poisoned lock; the data is plain maps and vecs,
/// so a panicked writer cannot leave them logically inconsistent.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Per-request state container with read-through parent inheritance.
///
/// `Context` is a cheap-to-clone handle; clones share the same underlying
/// state. Use [`Context::create_child`] for hand-offs and
/// [`Context::deep_clone`] for a fully independent working copy.
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Create a new root context.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Conversation ---

    /// Append a message to the conversation log.
    pub fn add_message(&self, message: Message) {
        write(&self.inner.conversation).push(message);
    }

    /// The ordered conversation history.
    pub fn conversation(&self) -> Vec<Message> {
        read(&self.inner.conversation).clone()
    }

    // --- General state ---

    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        write(&self.inner.state).insert(key.into(), value);
    }

    /// Get a state value, falling back to the parent chain when absent locally.
    pub fn state(&self, key: &str) -> Option<Value> {
        self.inner.lookup(|i| &i.state, key)
    }

    // --- Resources ---

    pub fn set_resource(&self, key: impl Into<String>, value: Value) {
        write(&self.inner.resources).insert(key.into(), value);
    }

    pub fn resource(&self, key: &str) -> Option<Value> {
        self.inner.lookup(|i| &i.resources, key)
    }

    // --- Memory ---

    pub fn remember(&self, key: impl Into<String>, value: Value) {
        write(&self.inner.memory).insert(key.into(), value);
    }

    pub fn recall(&self, key: &str) -> Option<Value> {
        self.inner.lookup(|i| &i.memory, key)
    }

    // --- Auth and preferences ---

    pub fn set_auth(&self, key: impl Into<String>, value: Value) {
        write(&self.inner.auth).insert(key.into(), value);
    }

    pub fn auth_value(&self, key: &str) -> Option<Value> {
        self.inner.lookup(|i| &i.auth, key)
    }

    pub fn set_preference(&self, key: impl Into<String>, value: Value) {
        write(&self.inner.preferences).insert(key.into(), value);
    }

    pub fn preference(&self, key: &str) -> Option<Value> {
        self.inner.lookup(|i| &i.preferences, key)
    }

    // --- Collected-info flags ---

    /// Mark a workflow field as gathered.
    pub fn mark_collected(&self, field: impl Into<String>) {
        write(&self.inner.collected).insert(field.into());
    }

    /// Whether a workflow field has been gathered. Defaults to `false`.
    pub fn is_collected(&self, field: &str) -> bool {
        read(&self.inner.collected).contains(field)
    }

    // --- Action log ---

    /// Append an action identifier to the audit log.
    pub fn track_action(&self, action: impl Into<String>) {
        write(&self.inner.actions).push(action.into());
    }

    /// The ordered, append-only action log.
    pub fn actions(&self) -> Vec<String> {
        read(&self.inner.actions).clone()
    }

    // --- Workflow id ---

    /// The workflow id, if one has been assigned anywhere in the chain.
    pub fn workflow_id(&self) -> Option<WorkflowId> {
        self.inner.find_workflow_id()
    }

    /// Get or assign the workflow id for this context chain.
    ///
    /// The id is assigned at most once: repeated calls (from this context or
    /// any relative in the chain) return the same id. Assignment happens at
    /// the root so the whole chain shares it.
    pub fn initialize_workflow(&self) -> WorkflowId {
        if let Some(id) = self.inner.find_workflow_id() {
            return id;
        }
        let mut root = Arc::clone(&self.inner);
        while let Some(parent) = root.parent.as_ref().and_then(Weak::upgrade) {
            root = parent;
        }
        *root.workflow_id.get_or_init(WorkflowId::new)
    }

    // --- Hand-off and copies ---

    /// Create a child context that reads through to this one.
    ///
    /// The child holds a weak back-reference: it sees the parent's state
    /// (including writes made after creation) but its own writes stay local.
    /// A fresh child can never be its own ancestor, so chains are acyclic by
    /// construction.
    pub fn create_child(&self) -> Context {
        Context {
            inner: Arc::new(Inner {
                parent: Some(Arc::downgrade(&self.inner)),
                ..Inner::default()
            }),
        }
    }

    /// Deep-copy the conversation and all state into an independent root
    /// context with no parent link.
    ///
    /// Inherited values visible at copy time are materialized into the copy;
    /// an already-assigned workflow id is carried over.
    pub fn deep_clone(&self) -> Context {
        let inner = Inner {
            parent: None,
            conversation: RwLock::new(self.conversation()),
            state: RwLock::new(self.flatten(|i| &i.state)),
            resources: RwLock::new(self.flatten(|i| &i.resources)),
            memory: RwLock::new(self.flatten(|i| &i.memory)),
            auth: RwLock::new(self.flatten(|i| &i.auth)),
            preferences: RwLock::new(self.flatten(|i| &i.preferences)),
            collected: RwLock::new(read(&self.inner.collected).clone()),
            actions: RwLock::new(self.actions()),
            workflow_id: OnceLock::new(),
        };
        if let Some(id) = self.inner.find_workflow_id() {
            let _ = inner.workflow_id.set(id);
        }
        Context {
            inner: Arc::new(inner),
        }
    }

    /// Merge a partition across the parent chain, local entries winning.
    fn flatten(&self, partition: Partition) -> HashMap<String, Value> {
        let mut layers = vec![read(partition(&self.inner)).clone()];
        let mut ancestor = self.inner.parent.as_ref().and_then(Weak::upgrade);
        while let Some(inner) = ancestor {
            layers.push(read(partition(&inner)).clone());
            ancestor = inner.parent.as_ref().and_then(Weak::upgrade);
        }
        let mut merged = HashMap::new();
        for layer in layers.into_iter().rev() {
            merged.extend(layer);
        }
        merged
    }
}
