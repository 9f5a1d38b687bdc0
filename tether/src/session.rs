//! Per-call session state.
//!
//! One encode or decode owns exactly one session for its whole duration.
//! Sessions are pooled: taken on entry, reset and recycled on drop, so a
//! failed operation still returns its session.

use crate::{
    error::{
        Error,
        Malformed,
    },
    graph::ObjRef,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};

/// Identity table of one top-level encode.
///
/// Maps object identity (allocation address) to the monotonically assigned
/// index of its first encounter. Comparison is by identity, never by value,
/// so shared immutables stay shared and cycles stay cycles.
#[derive(Debug, Default)]
pub struct EncodeSession {
    indices: HashMap<usize, usize>,
}

impl EncodeSession {
    /// Index previously assigned to this object, if any.
    pub fn lookup(&self, addr: usize) -> Option<usize> {
        self.indices.get(&addr).copied()
    }

    /// Assign the next index to a newly encountered object.
    pub fn allocate(&mut self, addr: usize) -> usize {
        let index = self.indices.len();
        let prior = self.indices.insert(addr, index);
        debug_assert!(prior.is_none(), "object allocated twice in one encode");
        index
    }

    /// Objects assigned so far.
    pub fn count(&self) -> usize {
        self.indices.len()
    }

    fn reset(&mut self) {
        self.indices.clear();
    }
}

/// Slot vector of one top-level decode.
///
/// A slot is allocated *before* its payload is decoded so that cyclic
/// children can resolve back-references to a handle that already exists.
/// The slot stays empty until the content formatter publishes the handle.
#[derive(Debug, Default)]
pub struct DecodeSession {
    slots: Vec<Option<ObjRef>>,
    allocated: usize,
    budget: usize,
}

impl DecodeSession {
    /// Append an empty slot, returning its index.
    pub fn allocate(&mut self) -> usize {
        let index = self.slots.len();
        self.slots.push(None);
        index
    }

    /// Publish the handle for a slot.
    pub fn set(&mut self, index: usize, obj: ObjRef) {
        self.slots[index] = Some(obj);
    }

    /// Resolve a back-reference.
    pub fn get(&self, index: usize) -> Result<ObjRef, Error> {
        match self.slots.get(index) {
            None => Err(Malformed::BadIndex {
                index,
                count: self.slots.len(),
            }
            .into()),
            Some(None) => Err(Malformed::CyclicBeforeInit { index }.into()),
            Some(Some(obj)) => Ok(obj.clone()),
        }
    }

    /// Whether a slot has been published.
    pub fn is_written(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Slots allocated so far.
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Add to the running allocation approximation, failing once it
    /// surpasses the configured ceiling.
    pub fn charge(&mut self, bytes: usize) -> Result<(), Error> {
        self.allocated = self.allocated.saturating_add(bytes);
        if self.allocated > self.budget {
            return Err(Error::QuotaExceeded {
                allocated: self.allocated,
                budget: self.budget,
            })
        }
        Ok(())
    }

    pub(crate) fn set_budget(&mut self, budget: usize) {
        self.budget = budget;
    }

    fn reset(&mut self) {
        self.slots.clear();
        self.allocated = 0;
        self.budget = 0;
    }
}

pub(crate) trait Recyclable: Default {
    fn recycle(&mut self);
}

impl Recyclable for EncodeSession {
    fn recycle(&mut self) {
        self.reset();
    }
}

impl Recyclable for DecodeSession {
    fn recycle(&mut self) {
        self.reset();
    }
}

/// Pool of session instances for reuse across top-level calls.
pub(crate) struct SessionPool<S> {
    pool: Arc<Mutex<Vec<S>>>,
}

impl<S> Default for SessionPool<S> {
    fn default() -> Self {
        Self {
            pool: Arc::default(),
        }
    }
}

impl<S> Clone for SessionPool<S> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<S: Recyclable> SessionPool<S> {
    /// Take a session from the pool, or allocate a fresh one.
    pub fn take(&self) -> PooledSession<S> {
        let session = self.pool.lock().expect("poisoned").pop().unwrap_or_default();
        PooledSession {
            pool: self.clone(),
            session: Some(session),
        }
    }

    fn recycle(&self, mut session: S) {
        session.recycle();
        self.pool.lock().expect("poisoned").push(session);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.pool.lock().expect("poisoned").len()
    }
}

/// Session originating from a pool; recycled back on drop.
pub(crate) struct PooledSession<S: Recyclable> {
    pool: SessionPool<S>,
    session: Option<S>,
}

impl<S: Recyclable> core::ops::Deref for PooledSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session.as_ref().expect("session recycled already")
    }
}

impl<S: Recyclable> core::ops::DerefMut for PooledSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().expect("session recycled already")
    }
}

impl<S: Recyclable> Drop for PooledSession<S> {
    fn drop(&mut self) {
        self.pool
            .recycle(self.session.take().expect("session recycled already"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Ref;

    #[test]
    fn encode_indices_are_assigned_in_order() {
        let mut session = EncodeSession::default();
        assert_eq!(session.lookup(10), None);
        assert_eq!(session.allocate(10), 0);
        assert_eq!(session.allocate(20), 1);
        assert_eq!(session.lookup(10), Some(0));
        assert_eq!(session.count(), 2);
    }

    #[test]
    fn decode_slots_fail_before_initialization() {
        let mut session = DecodeSession::default();
        session.set_budget(usize::MAX);
        let slot = session.allocate();
        assert!(matches!(
            session.get(slot),
            Err(Error::Malformed(Malformed::CyclicBeforeInit { index: 0 }))
        ));
        assert!(matches!(
            session.get(5),
            Err(Error::Malformed(Malformed::BadIndex { index: 5, count: 1 }))
        ));

        session.set(slot, ObjRef::from_ref(&Ref::new(1u8)));
        assert!(session.get(slot).is_ok());
        assert!(session.is_written(slot));
    }

    #[test]
    fn budget_is_a_hard_ceiling() {
        let mut session = DecodeSession::default();
        session.set_budget(100);
        session.charge(60).expect("under budget");
        assert!(matches!(
            session.charge(41),
            Err(Error::QuotaExceeded {
                allocated: 101,
                budget: 100
            })
        ));
    }

    #[test]
    fn sessions_recycle_into_the_pool() {
        let pool: SessionPool<EncodeSession> = SessionPool::default();
        {
            let mut session = pool.take();
            session.allocate(1);
            assert_eq!(pool.len(), 0);
        }
        assert_eq!(pool.len(), 1);
        let session = pool.take();
        assert_eq!(session.count(), 0, "recycled session must be reset");
    }
}
