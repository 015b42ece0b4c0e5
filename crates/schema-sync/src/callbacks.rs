//! Change listener registry.
//!
//! Listeners are only ever called with the change list of a patch that
//! decoded completely; an aborted patch never reaches this module.

use std::collections::BTreeMap;

use tracing::trace;

use crate::change::DataChange;
use crate::value::{RefId, Value};

pub type ListenerId = u64;

type Callback = Box<dyn FnMut(&DataChange) + Send>;
type BatchCallback = Box<dyn FnMut(&[DataChange]) + Send>;

/// Receives the ordered change list of every successful patch.
pub trait ChangeListener {
    fn on_changes(&mut self, changes: &[DataChange]);

    /// Called with the refIds a patch garbage-collected, after `on_changes`.
    fn on_collected(&mut self, _ref_ids: &[RefId]) {}
}

impl<F> ChangeListener for F
where
    F: FnMut(&[DataChange]),
{
    fn on_changes(&mut self, changes: &[DataChange]) {
        self(changes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    Change,
    Add,
    Remove,
    Field(String),
}

impl Trigger {
    fn fires_on(&self, change: &DataChange) -> bool {
        match self {
            Trigger::Change => true,
            Trigger::Add => change.op.has_add() && !change.value.is_undefined(),
            Trigger::Remove => {
                !change.previous_value.is_undefined()
                    && (change.op.has_delete() || change.value == Value::Undefined)
            }
            Trigger::Field(name) => change.field.as_ref().is_some_and(|f| f.matches(name)),
        }
    }
}

struct Subscription {
    ref_id: RefId,
    trigger: Trigger,
    callback: Callback,
}

/// Per-object subscriptions plus whole-patch listeners.
///
/// Subscriptions fire per change record, in wire order; for one record they
/// fire in registration order.
#[derive(Default)]
pub struct Listeners {
    next_id: ListenerId,
    subscriptions: BTreeMap<ListenerId, Subscription>,
    batch: BTreeMap<ListenerId, BatchCallback>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("subscriptions", &self.subscriptions.len())
            .field("batch", &self.batch.len())
            .finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> ListenerId {
        self.next_id = self.next_id.saturating_add(1);
        self.next_id
    }

    fn subscribe<F>(&mut self, ref_id: RefId, trigger: Trigger, listener: F) -> ListenerId
    where
        F: FnMut(&DataChange) + Send + 'static,
    {
        let id = self.next();
        self.subscriptions.insert(
            id,
            Subscription {
                ref_id,
                trigger,
                callback: Box::new(listener),
            },
        );
        id
    }

    /// Any change on `ref_id`.
    pub fn on_change<F>(&mut self, ref_id: RefId, listener: F) -> ListenerId
    where
        F: FnMut(&DataChange) + Send + 'static,
    {
        self.subscribe(ref_id, Trigger::Change, listener)
    }

    /// A value arriving in a slot of `ref_id`.
    pub fn on_add<F>(&mut self, ref_id: RefId, listener: F) -> ListenerId
    where
        F: FnMut(&DataChange) + Send + 'static,
    {
        self.subscribe(ref_id, Trigger::Add, listener)
    }

    /// A value leaving a slot of `ref_id`.
    pub fn on_remove<F>(&mut self, ref_id: RefId, listener: F) -> ListenerId
    where
        F: FnMut(&DataChange) + Send + 'static,
    {
        self.subscribe(ref_id, Trigger::Remove, listener)
    }

    /// Changes to one field (schema instances) or key (collections) of `ref_id`.
    pub fn listen<F>(&mut self, ref_id: RefId, field: impl Into<String>, listener: F) -> ListenerId
    where
        F: FnMut(&DataChange) + Send + 'static,
    {
        self.subscribe(ref_id, Trigger::Field(field.into()), listener)
    }

    /// The full change list of every patch.
    pub fn on_patch<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&[DataChange]) + Send + 'static,
    {
        let id = self.next();
        self.batch.insert(id, Box::new(listener));
        id
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.subscriptions.remove(&id).is_some() || self.batch.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len() + self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops subscriptions bound to objects that no longer exist.
    pub fn release(&mut self, ref_ids: &[RefId]) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, sub| !ref_ids.contains(&sub.ref_id));
        before - self.subscriptions.len()
    }

    pub fn dispatch(&mut self, changes: &[DataChange]) {
        for change in changes {
            for (id, sub) in self.subscriptions.iter_mut() {
                if sub.ref_id == change.ref_id && sub.trigger.fires_on(change) {
                    trace!(listener = id, ref_id = change.ref_id, ?change.op, "dispatch");
                    (sub.callback)(change);
                }
            }
        }
        if !changes.is_empty() {
            for listener in self.batch.values_mut() {
                listener(changes);
            }
        }
    }
}

impl ChangeListener for Listeners {
    fn on_changes(&mut self, changes: &[DataChange]) {
        self.dispatch(changes);
    }

    fn on_collected(&mut self, ref_ids: &[RefId]) {
        self.release(ref_ids);
    }
}
