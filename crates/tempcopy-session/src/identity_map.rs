//! Identity map: one shared instance per model type and identifier.
//!
//! Entries are stored as type-erased `Arc<RwLock<M>>`, so fetching the same
//! identifier twice yields the same instance and edits made through one
//! reference are visible through every other.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tempcopy_core::{Identifier, Model};

/// Shared reference to a tracked entity.
pub type ModelRef<M> = Arc<RwLock<M>>;

/// Key of a tracked entity: its model type plus identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    type_id: TypeId,
    table: &'static str,
    id: Identifier,
}

impl ObjectKey {
    pub fn of<M: Model + 'static>(id: Identifier) -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            table: M::TABLE_NAME,
            id,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }
}

/// Identity map keyed by [`ObjectKey`].
#[derive(Default)]
pub struct IdentityMap {
    entries: HashMap<ObjectKey, Box<dyn Any + Send + Sync>>,
}

impl IdentityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` under `id`.
    ///
    /// If an instance is already registered under the same key, that
    /// instance is returned and `model` is ignored.
    pub fn insert<M: Model + 'static>(
        &mut self,
        id: Identifier,
        model: ModelRef<M>,
    ) -> ModelRef<M> {
        let key = ObjectKey::of::<M>(id);
        if let Some(existing) = self.lookup::<M>(&key) {
            return existing;
        }
        self.entries.insert(key, Box::new(Arc::clone(&model)));
        model
    }

    /// The instance registered under `id`, if any.
    pub fn get<M: Model + 'static>(&self, id: &Identifier) -> Option<ModelRef<M>> {
        self.lookup(&ObjectKey::of::<M>(id.clone()))
    }

    pub fn contains<M: Model + 'static>(&self, id: &Identifier) -> bool {
        self.entries.contains_key(&ObjectKey::of::<M>(id.clone()))
    }

    /// Unregister the instance under `id`. Returns whether one was present.
    pub fn remove<M: Model + 'static>(&mut self, id: &Identifier) -> bool {
        self.entries.remove(&ObjectKey::of::<M>(id.clone())).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn lookup<M: Model + 'static>(&self, key: &ObjectKey) -> Option<ModelRef<M>> {
        self.entries
            .get(key)?
            .downcast_ref::<ModelRef<M>>()
            .map(Arc::clone)
    }
}

impl std::fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMap")
            .field("entries", &self.entries.len())
            .finish()
    }
}
