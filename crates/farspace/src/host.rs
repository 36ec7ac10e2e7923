//! # Host Table
//!
//! The process-global bidirectional mapping between object ids and hosted
//! objects. Ids are allocated monotonically; an explicitly supplied id moves
//! the allocation high-water mark past itself, so explicit and automatic
//! hosting never collide.

use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use farwire::ObjectId;

use crate::remotable::Obj;

/// Host-table failures.
#[derive(Debug, Clone)]
pub enum Error {
    /// The id already names another hosted object.
    IdInUse {
        id: ObjectId,
        existing: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdInUse { id, existing } => {
                write!(f, "{} already hosts a '{}' instance", id, existing)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Maps local object ids to local objects and back.
pub struct HostTable {
    by_id: DashMap<ObjectId, Obj>,
    by_identity: DashMap<usize, ObjectId>,
    next_id: AtomicI64,
}

impl HostTable {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_identity: DashMap::new(),
            next_id: AtomicI64::new(0),
        }
    }

    /// Hosts an object under the next automatic id. Hosting the same object
    /// again returns the id it already holds.
    pub fn host(&self, object: Obj) -> ObjectId {
        if let Some(existing) = self.id_of(&object) {
            return existing;
        }
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::AcqRel));
        tracing::debug!(%id, type_name = object.spec().name, "hosting object");
        // The id is fresh by construction, so the entry is always vacant.
        self.by_identity.insert(identity(&object), id);
        self.by_id.insert(id, object);
        id
    }

    /// Hosts an object under an explicit id and advances the next-id cursor
    /// past it. The id must be unused.
    pub fn host_with_id(&self, id: ObjectId, object: Obj) -> Result<ObjectId> {
        match self.by_id.entry(id) {
            Entry::Occupied(occupied) => Err(Error::IdInUse {
                id,
                existing: occupied.get().spec().name,
            }),
            Entry::Vacant(vacant) => {
                tracing::debug!(%id, type_name = object.spec().name, "hosting object");
                self.next_id.fetch_max(id.0 + 1, Ordering::AcqRel);
                self.by_identity.insert(identity(&object), id);
                vacant.insert(object);
                Ok(id)
            }
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<Obj> {
        self.by_id.get(&id).map(|entry| entry.value().clone())
    }

    /// Reverse lookup by object identity.
    pub fn id_of(&self, object: &Obj) -> Option<ObjectId> {
        self.by_identity.get(&identity(object)).map(|entry| *entry.value())
    }

    pub fn is_hosted(&self, object: &Obj) -> bool {
        self.id_of(object).is_some()
    }
}

impl Default for HostTable {
    fn default() -> Self {
        Self::new()
    }
}

fn identity(object: &Obj) -> usize {
    Arc::as_ptr(object) as *const () as usize
}
