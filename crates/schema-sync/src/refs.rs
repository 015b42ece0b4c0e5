//! Reference Tracker: central ownership of every tracked object.
//!
//! Objects are addressed by [`RefId`] and counted by the number of parent
//! slots pointing at them. Counts dropping to zero only mark a candidate;
//! the actual sweep happens once per patch in [`Refs::garbage_collect`],
//! because a value may leave one slot and enter another within one patch.
//!
//! Mutations made between [`Refs::begin`] and [`Refs::commit`] are journaled
//! as before-images so [`Refs::rollback`] can restore the exact prior graph.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;
use tracing::{debug, trace, warn};

use crate::change::{ChangeField, DataChange, Operation};
use crate::collections::Collection;
use crate::schema::SchemaInstance;
use crate::value::{RefId, Value, ROOT_REF_ID};

// ── Tracked ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Tracked {
    Schema(SchemaInstance),
    Collection(Collection),
}

impl Tracked {
    pub fn as_schema(&self) -> Option<&SchemaInstance> {
        match self {
            Tracked::Schema(s) => Some(s),
            Tracked::Collection(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Tracked::Collection(c) => Some(c),
            Tracked::Schema(_) => None,
        }
    }

    /// RefIds this object points at, one entry per slot.
    pub fn child_refs(&self) -> Vec<RefId> {
        match self {
            Tracked::Schema(s) => s.child_refs().collect(),
            Tracked::Collection(c) => c.child_refs().collect(),
        }
    }
}

impl From<SchemaInstance> for Tracked {
    fn from(s: SchemaInstance) -> Self {
        Tracked::Schema(s)
    }
}

impl From<Collection> for Tracked {
    fn from(c: Collection) -> Self {
        Tracked::Collection(c)
    }
}

// ── Refs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Journal {
    objects: HashMap<RefId, Option<Tracked>>,
    counts: HashMap<RefId, Option<u32>>,
    deleted: IndexSet<RefId>,
}

#[derive(Debug, Default)]
pub struct Refs {
    objects: HashMap<RefId, Tracked>,
    counts: HashMap<RefId, u32>,
    /// Candidates whose count dropped this patch, in drop order.
    deleted: IndexSet<RefId>,
    journal: Option<Journal>,
}

impl Refs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker holding `root` at [`ROOT_REF_ID`].
    pub fn with_root(root: SchemaInstance) -> Self {
        let mut refs = Self::new();
        refs.add(ROOT_REF_ID, Tracked::Schema(root));
        refs
    }

    // ── Journal ───────────────────────────────────────────────────────────

    /// Starts journaling mutations for a patch.
    pub fn begin(&mut self) {
        self.journal = Some(Journal {
            deleted: self.deleted.clone(),
            ..Journal::default()
        });
    }

    /// Drops the journal, keeping every mutation.
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Restores every object and count touched since [`Refs::begin`].
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        let restored = journal.objects.len();
        for (id, before) in journal.objects {
            match before {
                Some(obj) => self.objects.insert(id, obj),
                None => self.objects.remove(&id),
            };
        }
        for (id, before) in journal.counts {
            match before {
                Some(count) => self.counts.insert(id, count),
                None => self.counts.remove(&id),
            };
        }
        self.deleted = journal.deleted;
        debug!(restored, "rolled back aborted patch");
    }

    fn touch_object(&mut self, id: RefId) {
        if let Some(journal) = self.journal.as_mut() {
            journal
                .objects
                .entry(id)
                .or_insert_with(|| self.objects.get(&id).cloned());
        }
    }

    fn touch_count(&mut self, id: RefId) {
        if let Some(journal) = self.journal.as_mut() {
            journal
                .counts
                .entry(id)
                .or_insert_with(|| self.counts.get(&id).copied());
        }
    }

    // ── Registry operations ───────────────────────────────────────────────

    /// Registers an object with a usage count of zero.
    pub fn add(&mut self, id: RefId, obj: Tracked) {
        self.touch_object(id);
        self.touch_count(id);
        self.objects.insert(id, obj);
        self.counts.insert(id, 0);
    }

    pub fn get(&self, id: RefId) -> Option<&Tracked> {
        self.objects.get(&id)
    }

    /// Mutable access; journals the object's before-image on first touch.
    pub fn get_mut(&mut self, id: RefId) -> Option<&mut Tracked> {
        if !self.objects.contains_key(&id) {
            return None;
        }
        self.touch_object(id);
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: RefId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn schema(&self, id: RefId) -> Option<&SchemaInstance> {
        self.get(id)?.as_schema()
    }

    pub fn collection(&self, id: RefId) -> Option<&Collection> {
        self.get(id)?.as_collection()
    }

    pub fn schema_mut(&mut self, id: RefId) -> Option<&mut SchemaInstance> {
        match self.get_mut(id)? {
            Tracked::Schema(s) => Some(s),
            Tracked::Collection(_) => None,
        }
    }

    pub fn collection_mut(&mut self, id: RefId) -> Option<&mut Collection> {
        match self.get_mut(id)? {
            Tracked::Collection(c) => Some(c),
            Tracked::Schema(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = RefId> + '_ {
        self.objects.keys().copied()
    }

    // ── Counting ──────────────────────────────────────────────────────────

    pub fn ref_count(&self, id: RefId) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// A parent slot gained a pointer to `id`.
    pub fn add_ref(&mut self, id: RefId) {
        self.touch_count(id);
        let count = self.counts.entry(id).or_insert(0);
        *count += 1;
        trace!(ref_id = id, count = *count, "add ref");
    }

    /// A parent slot lost its pointer to `id`; marks it a GC candidate.
    pub fn remove_ref(&mut self, id: RefId) {
        self.touch_count(id);
        let count = self.counts.entry(id).or_insert(0);
        if *count == 0 {
            warn!(ref_id = id, "ref count underflow");
        } else {
            *count -= 1;
        }
        trace!(ref_id = id, count = *count, "remove ref");
        self.deleted.insert(id);
    }

    /// Moves refcounts from `old` to `new` for one slot write.
    ///
    /// `old_released` means the slot's previous occupant was already
    /// released by the DELETE half of the operation.
    pub fn swap_refs(&mut self, old: &Value, new: &Value, old_released: bool) {
        let same = old == new;
        if let Value::Ref(n) = new {
            if !same || old_released {
                self.add_ref(*n);
            }
        }
        if let Value::Ref(o) = old {
            if !same && !old_released {
                self.remove_ref(*o);
            }
        }
    }

    /// Empties a collection, releasing its children and recording one
    /// DELETE per evicted entry followed by a CLEAR record.
    pub fn clear_collection(&mut self, id: RefId, changes: &mut Vec<DataChange>) -> bool {
        let Some(coll) = self.collection_mut(id) else {
            return false;
        };
        let evicted = coll.drain();
        for (key, previous) in evicted {
            if let Value::Ref(child) = previous {
                self.remove_ref(child);
            }
            changes.push(DataChange {
                ref_id: id,
                op: Operation::Delete,
                field: Some(ChangeField::Key(key)),
                value: Value::Undefined,
                previous_value: previous,
            });
        }
        changes.push(DataChange {
            ref_id: id,
            op: Operation::Clear,
            field: None,
            value: Value::Undefined,
            previous_value: Value::Undefined,
        });
        true
    }

    // ── Garbage collection ────────────────────────────────────────────────

    /// RefIds reachable from the root through reference slots.
    pub fn reachable(&self) -> HashSet<RefId> {
        let mut seen = HashSet::new();
        if !self.objects.contains_key(&ROOT_REF_ID) {
            return seen;
        }
        let mut queue = VecDeque::from([ROOT_REF_ID]);
        seen.insert(ROOT_REF_ID);
        while let Some(id) = queue.pop_front() {
            let Some(obj) = self.objects.get(&id) else {
                continue;
            };
            for child in obj.child_refs() {
                if self.objects.contains_key(&child) && seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        seen
    }

    /// Frees every object no longer reachable from the root.
    ///
    /// Runs only when some count dropped since the last sweep. Each freed
    /// object releases its own children, so a detached subtree is freed in
    /// one pass. The root is never collected. Returns the freed ids in
    /// ascending order.
    pub fn garbage_collect(&mut self) -> Vec<RefId> {
        if self.deleted.is_empty() {
            return Vec::new();
        }
        let candidates = self.deleted.len();
        let reachable = self.reachable();
        let mut doomed: Vec<RefId> = self
            .objects
            .keys()
            .copied()
            .filter(|id| *id != ROOT_REF_ID && !reachable.contains(id))
            .collect();
        doomed.sort_unstable();

        for id in &doomed {
            if let Some(obj) = self.objects.remove(id) {
                for child in obj.child_refs() {
                    if let Some(count) = self.counts.get_mut(&child) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }
        for id in &doomed {
            self.counts.remove(id);
        }
        self.deleted.clear();
        debug!(
            candidates,
            collected = doomed.len(),
            live = self.objects.len(),
            "garbage collected"
        );
        doomed
    }

    /// Releases everything, root included.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.counts.clear();
        self.deleted.clear();
        self.journal = None;
    }
}
