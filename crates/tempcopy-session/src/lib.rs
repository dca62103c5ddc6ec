//! Unit-of-work session for tempcopy.
//!
//! A [`Session`] tracks entities added to it or loaded through it. It keeps
//! one shared instance per identifier in an [`IdentityMap`], snapshots each
//! entity with a [`ChangeTracker`] and writes new and modified entities to
//! the connection on [`save_changes`](Session::save_changes).
//!
//! Bulk copies into temp tables bypass the session entirely: a temp table
//! never reads from or writes to the identity map, so values loaded into it
//! are never replaced by a tracked instance with the same identifier.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(db.connect());
//! session.ensure_created::<Person>()?;
//! let person = session.add(Person { id: None, name: "John Doe".into() });
//! session.save_changes()?;
//! let id = person.read().unwrap().identifier();
//! ```

pub mod change_tracker;
pub mod identity_map;

pub use change_tracker::{ChangeTracker, ObjectSnapshot};
pub use identity_map::{IdentityMap, ModelRef, ObjectKey};

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tempcopy_core::{
    Connection, Identifier, Model, Result, TableSchema, TransactionOps, Value,
};

/// Configuration for [`Session`] behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether `save_changes` compares loaded entities against their
    /// snapshots and writes back the modified ones.
    pub detect_changes_on_save: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            detect_changes_on_save: true,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn detect_changes_on_save(mut self, value: bool) -> Self {
        self.detect_changes_on_save = value;
        self
    }
}

/// State of an entity relative to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Added and not yet saved.
    Added,
    /// Saved or loaded, and equal to its snapshot.
    Unchanged,
    /// Saved or loaded, and edited since.
    Modified,
    /// Not tracked by this session.
    Detached,
}

fn read<M>(model: &RwLock<M>) -> RwLockReadGuard<'_, M> {
    model.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<M>(model: &RwLock<M>) -> RwLockWriteGuard<'_, M> {
    model.write().unwrap_or_else(PoisonError::into_inner)
}

/// A row written for one entity, recorded in the session after commit.
enum Written {
    /// The entity was inserted under this identifier.
    Inserted(Identifier),
    /// The entity's row was replaced by these values.
    Updated(ObjectKey, Vec<(&'static str, Value)>),
}

/// Type-erased tracked entity, saved against connections of type `C`.
trait TrackedEntry<C: Connection>: Send {
    fn state(&self, tracker: &ChangeTracker) -> EntityState;

    /// Write the entity if it is new or modified. Neither the entity nor the
    /// session is changed.
    fn persist(
        &self,
        conn: &C,
        tracker: &ChangeTracker,
        detect_changes: bool,
    ) -> Result<Option<Written>>;

    /// Record a committed write in the entity, its snapshot and the
    /// identity map.
    fn apply(&mut self, written: Written, tracker: &mut ChangeTracker, map: &mut IdentityMap);

    fn as_any(&self) -> &dyn Any;
}

struct Entry<M: Model> {
    model: ModelRef<M>,
    added: bool,
}

impl<M: Model + 'static> Entry<M> {
    fn key(&self) -> Option<ObjectKey> {
        read(&self.model).identifier().map(ObjectKey::of::<M>)
    }
}

impl<C: Connection, M: Model + 'static> TrackedEntry<C> for Entry<M> {
    fn state(&self, tracker: &ChangeTracker) -> EntityState {
        if self.added {
            return EntityState::Added;
        }
        let Some(key) = self.key() else {
            return EntityState::Modified;
        };
        if tracker.is_dirty(&key, &read(&self.model).to_row()) {
            EntityState::Modified
        } else {
            EntityState::Unchanged
        }
    }

    fn persist(
        &self,
        conn: &C,
        tracker: &ChangeTracker,
        detect_changes: bool,
    ) -> Result<Option<Written>> {
        let schema = TableSchema::of::<M>()?;
        let model = read(&self.model);

        if self.added {
            conn.create_table(&schema)?;
            let row = schema.row_from_pairs(model.to_row())?;
            let id = conn.insert(M::TABLE_NAME, row)?;
            // The stored row must load as `M` before its identifier is
            // assigned to the entity.
            if let Some(stored) = conn.find(M::TABLE_NAME, &id)? {
                M::from_row(&stored)?;
            }
            return Ok(Some(Written::Inserted(id)));
        }

        if !detect_changes {
            return Ok(None);
        }
        let Some(id) = model.identifier() else {
            return Ok(None);
        };
        let key = ObjectKey::of::<M>(id);
        let pairs = model.to_row();
        if !tracker.is_dirty(&key, &pairs) {
            return Ok(None);
        }

        let changed = tracker.changed_columns(&key, &pairs);
        tracing::trace!(table = M::TABLE_NAME, ?changed, "Saving modified entity");
        conn.update(M::TABLE_NAME, schema.row_from_pairs(pairs.clone())?)?;
        Ok(Some(Written::Updated(key, pairs)))
    }

    fn apply(&mut self, written: Written, tracker: &mut ChangeTracker, map: &mut IdentityMap) {
        match written {
            Written::Inserted(id) => {
                {
                    let mut model = write(&self.model);
                    if let Err(e) = model.set_identifier(id.clone()) {
                        tracing::warn!(table = M::TABLE_NAME, id = %id, error = %e, "Failed to assign saved identifier");
                    }
                    tracker.snapshot(ObjectKey::of::<M>(id.clone()), &model.to_row());
                }
                map.insert(id, Arc::clone(&self.model));
                self.added = false;
            }
            Written::Updated(key, pairs) => tracker.snapshot(key, &pairs),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Tracking<C: Connection> {
    entries: Vec<Box<dyn TrackedEntry<C>>>,
    identity_map: IdentityMap,
    tracker: ChangeTracker,
}

/// The unit-of-work manager.
///
/// Every method takes `&self`, so transactions and temp tables borrowed
/// from [`connection`](Self::connection) can be used alongside it.
pub struct Session<C: Connection> {
    connection: C,
    config: SessionConfig,
    tracking: Mutex<Tracking<C>>,
}

impl<C: Connection> Session<C> {
    pub fn new(connection: C) -> Self {
        Self::with_config(connection, SessionConfig::default())
    }

    pub fn with_config(connection: C, config: SessionConfig) -> Self {
        Self {
            connection,
            config,
            tracking: Mutex::new(Tracking {
                entries: Vec::new(),
                identity_map: IdentityMap::new(),
                tracker: ChangeTracker::new(),
            }),
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Consume the session and return its connection.
    pub fn into_connection(self) -> C {
        self.connection
    }

    fn lock(&self) -> MutexGuard<'_, Tracking<C>> {
        self.tracking.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the permanent table for `M` unless it already exists.
    pub fn ensure_created<M: Model>(&self) -> Result<()> {
        self.connection.create_table(&TableSchema::of::<M>()?)
    }

    /// Start tracking `model` as a new entity.
    ///
    /// If an entity of the same type and identifier is already tracked, the
    /// tracked instance is returned and `model` is discarded.
    pub fn add<M: Model + 'static>(&self, model: M) -> ModelRef<M> {
        let mut tracking = self.lock();
        let id = model.identifier();

        if let Some(id) = &id {
            if let Some(existing) = tracking.identity_map.get::<M>(id) {
                tracing::debug!(table = M::TABLE_NAME, id = %id, "Entity already tracked");
                return existing;
            }
        }

        let model = Arc::new(RwLock::new(model));
        if let Some(id) = id {
            tracking.identity_map.insert(id, Arc::clone(&model));
        }
        tracking.entries.push(Box::new(Entry {
            model: Arc::clone(&model),
            added: true,
        }));
        model
    }

    /// Start tracking every model in `models` as a new entity.
    pub fn add_range<M, I>(&self, models: I) -> Vec<ModelRef<M>>
    where
        M: Model + 'static,
        I: IntoIterator<Item = M>,
    {
        models.into_iter().map(|m| self.add(m)).collect()
    }

    /// Write added and modified entities to the connection.
    ///
    /// Runs inside the connection's open transaction, or in a transaction of
    /// its own when none is open. Returns the number of entities written.
    ///
    /// Entities take their identifiers and become unchanged only once every
    /// write succeeded and the session's own transaction, if any, committed.
    /// On error no tracked entity changes state, so the call can be retried.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn save_changes(&self) -> Result<usize> {
        let mut tracking = self.lock();
        let Tracking {
            entries,
            identity_map,
            tracker,
        } = &mut *tracking;

        let tx = if self.connection.in_transaction() {
            None
        } else {
            Some(self.connection.begin()?)
        };

        let mut pending = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if let Some(written) =
                entry.persist(&self.connection, tracker, self.config.detect_changes_on_save)?
            {
                pending.push((index, written));
            }
        }

        if let Some(tx) = tx {
            tx.commit()?;
        }

        let written = pending.len();
        for (index, change) in pending {
            entries[index].apply(change, tracker, identity_map);
        }
        tracing::debug!(written, "Saved changes");
        Ok(written)
    }

    /// Fetch the entity of type `M` stored under `id`.
    ///
    /// A tracked instance is returned as is, without reading the store.
    /// Otherwise the row is loaded and starts being tracked.
    pub fn find<M: Model + 'static>(&self, id: &Identifier) -> Result<Option<ModelRef<M>>> {
        let mut tracking = self.lock();
        if let Some(found) = tracking.identity_map.get::<M>(id) {
            tracing::trace!(table = M::TABLE_NAME, id = %id, "Identity map hit");
            return Ok(Some(found));
        }

        let Some(row) = self.connection.find(M::TABLE_NAME, id)? else {
            return Ok(None);
        };
        let model = M::from_row(&row)?;
        tracking
            .tracker
            .snapshot(ObjectKey::of::<M>(id.clone()), &model.to_row());

        let model = tracking
            .identity_map
            .insert(id.clone(), Arc::new(RwLock::new(model)));
        tracking.entries.push(Box::new(Entry {
            model: Arc::clone(&model),
            added: false,
        }));
        Ok(Some(model))
    }

    /// State of `entity` relative to this session.
    pub fn entity_state<M: Model + 'static>(&self, entity: &ModelRef<M>) -> EntityState {
        let tracking = self.lock();
        tracking
            .entries
            .iter()
            .find(|entry| {
                entry
                    .as_any()
                    .downcast_ref::<Entry<M>>()
                    .is_some_and(|e| Arc::ptr_eq(&e.model, entity))
            })
            .map_or(EntityState::Detached, |entry| entry.state(&tracking.tracker))
    }

    /// Number of tracked entities.
    pub fn tracked_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Stop tracking every entity. Unsaved additions are discarded.
    pub fn clear(&self) {
        let mut tracking = self.lock();
        tracking.entries.clear();
        tracking.identity_map.clear();
        tracking.tracker.clear_all();
    }
}

impl<C: Connection + std::fmt::Debug> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection)
            .field("config", &self.config)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempcopy_memory::MemoryDatabase;

    #[derive(Debug, Clone, PartialEq, tempcopy_macros::Model)]
    #[tempcopy(table = "Person", identity = "int")]
    struct Person {
        #[tempcopy(primary_key, column = "Id")]
        id: Option<i64>,
        #[tempcopy(column = "Name")]
        name: String,
    }

    fn person(name: &str) -> Person {
        Person {
            id: None,
            name: name.to_string(),
        }
    }

    fn session() -> Session<tempcopy_memory::MemoryConnection> {
        let session = Session::new(MemoryDatabase::new().connect());
        session.ensure_created::<Person>().unwrap();
        session
    }

    #[test]
    fn test_save_assigns_identifiers() {
        let session = session();
        let people = session.add_range([person("John Doe"), person("Max")]);
        assert_eq!(session.entity_state(&people[0]), EntityState::Added);

        assert_eq!(session.save_changes().unwrap(), 2);
        assert_eq!(people[0].read().unwrap().id, Some(1));
        assert_eq!(people[1].read().unwrap().id, Some(2));
        assert_eq!(session.entity_state(&people[0]), EntityState::Unchanged);
        assert_eq!(session.connection().scan("Person").unwrap().len(), 2);
        assert!(!session.connection().in_transaction());
    }

    #[test]
    fn test_find_returns_tracked_instance() {
        let session = session();
        let john = session.add(person("John Doe"));
        session.save_changes().unwrap();

        let found = session.find::<Person>(&Identifier::Int(1)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&john, &found));
        assert!(session.find::<Person>(&Identifier::Int(9)).unwrap().is_none());
    }

    #[test]
    fn test_modified_entities_are_written_back() {
        let session = session();
        let john = session.add(person("John Doe"));
        session.save_changes().unwrap();

        john.write().unwrap().name = "Johnny".into();
        assert_eq!(session.entity_state(&john), EntityState::Modified);
        assert_eq!(session.save_changes().unwrap(), 1);
        assert_eq!(session.save_changes().unwrap(), 0);

        let stored = session
            .connection()
            .find("Person", &Identifier::Int(1))
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_named::<String>("Name").unwrap(), "Johnny");
    }

    #[test]
    fn test_change_detection_can_be_disabled() {
        let config = SessionConfig::new().detect_changes_on_save(false);
        let session = Session::with_config(MemoryDatabase::new().connect(), config);
        let john = session.add(person("John Doe"));
        session.save_changes().unwrap();

        john.write().unwrap().name = "Johnny".into();
        assert_eq!(session.save_changes().unwrap(), 0);
    }

    #[test]
    fn test_find_loads_untracked_rows() {
        let db = MemoryDatabase::new();
        let writer = Session::new(db.connect());
        writer.add(person("John Doe"));
        writer.save_changes().unwrap();

        let reader = Session::new(db.connect());
        let found = reader.find::<Person>(&Identifier::Int(1)).unwrap().unwrap();
        assert_eq!(found.read().unwrap().name, "John Doe");
        assert_eq!(reader.tracked_count(), 1);
        assert_eq!(reader.entity_state(&found), EntityState::Unchanged);
    }

    #[test]
    fn test_add_same_identifier_keeps_tracked_instance() {
        let session = session();
        let first = session.add(Person {
            id: Some(1),
            name: "John Doe".into(),
        });
        let second = session.add(Person {
            id: Some(1),
            name: "Jane Doe".into(),
        });
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(session.tracked_count(), 1);
    }

    #[test]
    fn test_clear_detaches_everything() {
        let session = session();
        let john = session.add(person("John Doe"));
        session.clear();
        assert_eq!(session.tracked_count(), 0);
        assert_eq!(session.entity_state(&john), EntityState::Detached);
        assert_eq!(session.save_changes().unwrap(), 0);
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let session = session();
        session.add(Person {
            id: Some(1),
            name: "a".into(),
        });
        session.save_changes().unwrap();
        session.clear();

        let b = session.add(Person {
            id: Some(2),
            name: "b".into(),
        });
        let c = session.add(person("c"));
        session.add(Person {
            id: Some(1),
            name: "dup".into(),
        });
        assert!(session.save_changes().unwrap_err().is_duplicate_key());
        assert_eq!(session.connection().scan("Person").unwrap().len(), 1);
        assert!(!session.connection().in_transaction());

        assert_eq!(session.entity_state(&b), EntityState::Added);
        assert_eq!(session.entity_state(&c), EntityState::Added);
        assert_eq!(c.read().unwrap().id, None);
        let dup = session.find::<Person>(&Identifier::Int(1)).unwrap().unwrap();
        assert_eq!(dup.read().unwrap().name, "dup", "tracked instance wins over the stored row");

        session
            .connection()
            .delete("Person", &Identifier::Int(1))
            .unwrap();
        assert_eq!(session.save_changes().unwrap(), 3);
        assert_eq!(session.entity_state(&b), EntityState::Unchanged);
        assert_eq!(session.entity_state(&c), EntityState::Unchanged);
        assert!(c.read().unwrap().id.is_some());
        assert_eq!(session.connection().scan("Person").unwrap().len(), 3);
    }

    #[test]
    fn test_failed_save_keeps_modified_entity_dirty() {
        let db = MemoryDatabase::new();
        let other = Session::new(db.connect());
        other.add(Person {
            id: Some(2),
            name: "b".into(),
        });
        other.save_changes().unwrap();

        let session = Session::new(db.connect());
        let john = session.add(Person {
            id: Some(1),
            name: "John Doe".into(),
        });
        session.save_changes().unwrap();

        john.write().unwrap().name = "Johnny".into();
        session.add(Person {
            id: Some(2),
            name: "dup".into(),
        });
        assert!(session.save_changes().unwrap_err().is_duplicate_key());
        assert_eq!(session.entity_state(&john), EntityState::Modified);

        let stored = session
            .connection()
            .find("Person", &Identifier::Int(1))
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_named::<String>("Name").unwrap(), "John Doe");
    }
}
